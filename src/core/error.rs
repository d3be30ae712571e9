//! 执行器错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 ExecutorError 决定 RelaxAndRematch / FailEpisode / Abort。

use thiserror::Error;

/// 回合执行过程中可能出现的错误（配置、计划偏离、环境故障等）
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// 地标集合非严格递增或含非有限值；加载期即拒绝，回合不会开始
    #[error("Invalid landmark set for variable '{variable}': {reason}")]
    InvalidLandmarkSet { variable: String, reason: String },

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// 实际定性轨迹偏离计划（观测到计划未预期的定性状态）
    #[error("Plan violation at tick {tick}: unexpected qualitative state {state}")]
    PlanViolation { tick: u64, state: String },

    /// 环境协作者无响应或返回畸形状态
    #[error("Environment fault: {0}")]
    EnvironmentFault(String),

    #[error("Variable '{0}' missing from continuous state")]
    MissingVariable(String),

    #[error("Unknown model entry: {0}")]
    UnknownModelEntry(String),

    #[error("Adaptation rejected: {0}")]
    AdaptationRejected(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// 是否属于环境/状态畸形类故障；此类回合的轨迹不可用于自适应
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ExecutorError::EnvironmentFault(_) | ExecutorError::MissingVariable(_)
        )
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 放宽趋势标签后在剩余转移中重新匹配（有限次）
    RelaxAndRematch,
    /// 以 FAILED 结束本回合；fault 为 true 时轨迹视为畸形，自适应拒绝消费
    FailEpisode { reason: String, fault: bool },
    /// 立即中止，不产生回合结果（取消或加载期错误）
    Abort(String),
}
