//! 回合间自适应引擎
//!
//! 每个完成的回合消费一次：按回合末残差对本回合触发过的模型条目做一次
//! 有界参数修正（TIMED_OUT 按失败处理，照常修正）。畸形轨迹（环境故障）
//! 拒绝消费；同一回合重复消费被拒绝（单次使用语义）。

use std::collections::HashSet;

use crate::config::AdaptationSection;
use crate::core::ExecutorError;
use crate::executor::{EpisodeResult, EpisodeTrace};
use crate::model::{ModelStore, ObservedOutcome};
use crate::plan::Plan;

/// 一次自适应的摘要
#[derive(Debug, Clone)]
pub struct AdaptationReport {
    pub episode_id: String,
    /// 本次修正过的模型条目键
    pub updated: Vec<String>,
    pub residual: f64,
}

/// 自适应引擎：模型条目的唯一写入方，写入窗口仅在回合之间
#[derive(Debug)]
pub struct AdaptationEngine {
    config: AdaptationSection,
    /// 已消费的回合 ID
    consumed: HashSet<String>,
}

impl AdaptationEngine {
    pub fn new(config: AdaptationSection) -> Self {
        Self {
            config,
            consumed: HashSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// 消费一个回合的轨迹与结果，修正被触发条目的参数
    pub fn adapt(
        &mut self,
        trace: &EpisodeTrace,
        result: &EpisodeResult,
        plan: &Plan,
        models: &mut ModelStore,
    ) -> Result<AdaptationReport, ExecutorError> {
        if result.fault {
            return Err(ExecutorError::AdaptationRejected(format!(
                "episode {} carries a faulted trace",
                result.episode_id
            )));
        }
        if !self.consumed.insert(result.episode_id.clone()) {
            return Err(ExecutorError::AdaptationRejected(format!(
                "episode {} already consumed",
                result.episode_id
            )));
        }

        let mut updated = Vec::new();
        if self.config.enabled {
            for transition_id in trace.switch_ticks().keys() {
                let Some(transition) = plan
                    .transitions()
                    .iter()
                    .find(|t| &t.id == transition_id)
                else {
                    continue;
                };
                let outcome = ObservedOutcome {
                    switch_state: trace.switch_record(transition_id).map(|r| &r.state),
                    terminal_state: &result.terminal,
                    residuals: &result.residuals,
                };
                models.update(
                    &transition.trigger.model_key,
                    &outcome,
                    self.config.gain,
                    self.config.step_cap,
                )?;
                updated.push(transition.trigger.model_key.clone());
            }
        }

        tracing::info!(
            "Adapted episode {}: residual {:.4}, {} entries updated",
            result.episode_id,
            result.residual,
            updated.len()
        );

        Ok(AdaptationReport {
            episode_id: result.episode_id.clone(),
            updated,
            residual: result.residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunStatus;
    use crate::executor::TraceRecord;
    use crate::model::ConstantThresholdModel;
    use crate::plan::{
        ControlAction, ControlPolicy, CrossSense, Transition, TriggerCondition,
    };
    use crate::qspace::{Band, ContinuousState, QualitativeState, QualitativeValue, Trend};
    use std::collections::BTreeMap;

    fn qstate(band: Band) -> QualitativeState {
        let mut s = QualitativeState::new();
        s.insert("x", QualitativeValue::new(band, Trend::Unknown));
        s
    }

    fn fixture() -> (Plan, ModelStore, EpisodeTrace, EpisodeResult) {
        let transitions = vec![Transition {
            id: "advance".to_string(),
            source: qstate(Band::Below),
            target: qstate(Band::Above),
            pre_policy: ControlPolicy::Hold,
            post_policy: ControlPolicy::Hold,
            trigger: TriggerCondition {
                variable: "x".to_string(),
                sense: CrossSense::RisesAbove,
                model_key: "advance.at".to_string(),
            },
        }];
        let mut goals = BTreeMap::new();
        goals.insert("x".to_string(), 10.0);
        let plan = Plan::new("fixture", transitions, goals).unwrap();

        let mut models = ModelStore::new();
        models.insert(
            "advance.at",
            Box::new(ConstantThresholdModel::new("x", 10.0).unwrap()),
            1.0,
        );

        let mut trace = EpisodeTrace::new();
        trace.push(TraceRecord {
            tick: 1,
            state: ContinuousState::from_pairs(&[("x", 9.0)]),
            qstate: qstate(Band::Below),
            action: ControlAction::new(),
            threshold: Some(10.0),
            plan_index: 0,
            latched: true,
        });
        trace.record_switch("advance", 1);

        let terminal = ContinuousState::from_pairs(&[("x", 10.4)]);
        let mut residuals = BTreeMap::new();
        residuals.insert("x".to_string(), 0.4);
        let result = EpisodeResult {
            episode_id: "ep-1".to_string(),
            outcome: RunStatus::Failed,
            residual: 0.4,
            residuals,
            terminal,
            ticks: 1,
            fault: false,
            reason: None,
            finished_at: 0,
        };
        (plan, models, trace, result)
    }

    #[test]
    fn test_adapt_updates_touched_entries() {
        let (plan, mut models, trace, result) = fixture();
        let mut engine = AdaptationEngine::new(AdaptationSection::default());
        let report = engine.adapt(&trace, &result, &plan, &mut models).unwrap();
        assert_eq!(report.updated, vec!["advance.at".to_string()]);
        // 残差 0.4 全量计入偏置
        let params = models.parameters("advance.at").unwrap();
        let bias = params.iter().find(|(k, _)| *k == "bias").unwrap().1;
        assert!((bias - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_adapt_is_single_use_per_episode() {
        let (plan, mut models, trace, result) = fixture();
        let mut engine = AdaptationEngine::new(AdaptationSection::default());
        assert!(engine.adapt(&trace, &result, &plan, &mut models).is_ok());
        assert!(matches!(
            engine.adapt(&trace, &result, &plan, &mut models),
            Err(ExecutorError::AdaptationRejected(_))
        ));
    }

    #[test]
    fn test_adapt_rejects_faulted_trace() {
        let (plan, mut models, trace, mut result) = fixture();
        result.fault = true;
        let mut engine = AdaptationEngine::new(AdaptationSection::default());
        assert!(matches!(
            engine.adapt(&trace, &result, &plan, &mut models),
            Err(ExecutorError::AdaptationRejected(_))
        ));
    }

    #[test]
    fn test_adapt_honors_step_cap() {
        let (plan, mut models, trace, mut result) = fixture();
        result.residuals.insert("x".to_string(), 5.0);
        let config = AdaptationSection {
            step_cap: 0.2,
            ..AdaptationSection::default()
        };
        let mut engine = AdaptationEngine::new(config);
        engine.adapt(&trace, &result, &plan, &mut models).unwrap();
        let params = models.parameters("advance.at").unwrap();
        let bias = params.iter().find(|(k, _)| *k == "bias").unwrap().1;
        assert!((bias - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_disabled_engine_touches_nothing() {
        let (plan, mut models, trace, result) = fixture();
        let config = AdaptationSection {
            enabled: false,
            ..AdaptationSection::default()
        };
        let mut engine = AdaptationEngine::new(config);
        let report = engine.adapt(&trace, &result, &plan, &mut models).unwrap();
        assert!(report.updated.is_empty());
        let params = models.parameters("advance.at").unwrap();
        let bias = params.iter().find(|(k, _)| *k == "bias").unwrap().1;
        assert_eq!(bias, 0.0);
    }

    #[test]
    fn test_timed_out_is_adapted_like_failure() {
        let (plan, mut models, trace, mut result) = fixture();
        result.outcome = RunStatus::TimedOut;
        let mut engine = AdaptationEngine::new(AdaptationSection::default());
        let report = engine.adapt(&trace, &result, &plan, &mut models).unwrap();
        assert_eq!(report.updated.len(), 1);
    }
}
