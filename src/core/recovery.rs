//! 错误恢复引擎
//!
//! 根据 ExecutorError 类型返回 RecoveryAction，供执行循环决定是放宽重匹配、
//! 以失败收尾本回合，还是立即中止。

use crate::core::{ExecutorError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作（重匹配 / 回合失败 / 中止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 根据错误类型返回建议的恢复动作
    pub fn handle(&self, err: &ExecutorError) -> RecoveryAction {
        match err {
            ExecutorError::PlanViolation { .. } => RecoveryAction::RelaxAndRematch,
            ExecutorError::EnvironmentFault(msg) => RecoveryAction::FailEpisode {
                reason: format!("environment fault: {msg}"),
                fault: true,
            },
            ExecutorError::MissingVariable(var) => RecoveryAction::FailEpisode {
                reason: format!("malformed state, variable '{var}' missing"),
                fault: true,
            },
            ExecutorError::UnknownModelEntry(key) => RecoveryAction::FailEpisode {
                reason: format!("no model entry '{key}' for active transition"),
                fault: false,
            },
            ExecutorError::Cancelled => RecoveryAction::Abort("cancelled by caller".to_string()),
            other => RecoveryAction::Abort(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_plan_violation() {
        let engine = RecoveryEngine::new();
        let err = ExecutorError::PlanViolation {
            tick: 7,
            state: "x:(>=L0)".to_string(),
        };
        assert!(matches!(engine.handle(&err), RecoveryAction::RelaxAndRematch));
    }

    #[test]
    fn test_recovery_environment_fault() {
        let engine = RecoveryEngine::new();
        let err = ExecutorError::EnvironmentFault("step returned NaN".to_string());
        match engine.handle(&err) {
            RecoveryAction::FailEpisode { fault, .. } => assert!(fault),
            _ => panic!("Expected FailEpisode"),
        }
    }

    #[test]
    fn test_recovery_missing_variable_is_fault() {
        let engine = RecoveryEngine::new();
        let err = ExecutorError::MissingVariable("v".to_string());
        match engine.handle(&err) {
            RecoveryAction::FailEpisode { reason, fault } => {
                assert!(fault);
                assert!(reason.contains("'v'"));
            }
            _ => panic!("Expected FailEpisode"),
        }
    }

    #[test]
    fn test_recovery_unknown_model_entry_fails_without_fault() {
        let engine = RecoveryEngine::new();
        let err = ExecutorError::UnknownModelEntry("accelerate.stop".to_string());
        match engine.handle(&err) {
            RecoveryAction::FailEpisode { fault, .. } => assert!(!fault),
            _ => panic!("Expected FailEpisode"),
        }
    }

    #[test]
    fn test_recovery_cancelled() {
        let engine = RecoveryEngine::new();
        assert!(matches!(
            engine.handle(&ExecutorError::Cancelled),
            RecoveryAction::Abort(_)
        ));
    }

    #[test]
    fn test_recovery_load_time_errors_abort() {
        let engine = RecoveryEngine::new();
        let err = ExecutorError::InvalidLandmarkSet {
            variable: "x".to_string(),
            reason: "not strictly increasing".to_string(),
        };
        assert!(matches!(engine.handle(&err), RecoveryAction::Abort(_)));
    }
}
