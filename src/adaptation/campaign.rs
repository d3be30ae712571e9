//! 多回合运动
//!
//! 严格顺序地执行回合：跑一个回合、消费其结果做一次自适应、再跑下一个，
//! 直至回合数上限或残差收束。模型条目与计划由运动独占持有，不跨运动共享。

use serde::Serialize;
use tokio::sync::mpsc;

use crate::adaptation::AdaptationEngine;
use crate::config::{AdaptationSection, ExecutorSection};
use crate::core::{ExecutorError, RecoveryEngine, RunStatus};
use crate::env::Environment;
use crate::executor::{run_episode, EpisodeResult, EpisodeSession, EpisodeTrace, ExecutorEvent};
use crate::model::ModelStore;
use crate::plan::{LoadedPlan, Plan};
use crate::qspace::{ObservedEnvelope, StateAbstractor};

/// 单回合摘要（外部报告用）
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub outcome: RunStatus,
    pub residual: f64,
    pub ticks: u64,
}

/// 多回合运动循环
pub struct CampaignLoop {
    plan: Plan,
    models: ModelStore,
    abstractor: StateAbstractor,
    recovery: RecoveryEngine,
    adaptation: AdaptationEngine,
    exec_cfg: ExecutorSection,
    adapt_cfg: AdaptationSection,
    cancel_token: tokio_util::sync::CancellationToken,
    event_tx: Option<mpsc::UnboundedSender<ExecutorEvent>>,
    last_result: Option<EpisodeResult>,
    last_trace: Option<EpisodeTrace>,
}

impl CampaignLoop {
    pub fn new(
        loaded: LoadedPlan,
        exec_cfg: ExecutorSection,
        adapt_cfg: AdaptationSection,
    ) -> Result<Self, ExecutorError> {
        exec_cfg.validate()?;
        adapt_cfg.validate()?;
        let abstractor = StateAbstractor::new(loaded.landmarks, exec_cfg.tick_period())?;
        Ok(Self {
            plan: loaded.plan,
            models: loaded.models,
            abstractor,
            recovery: RecoveryEngine::new(),
            adaptation: AdaptationEngine::new(adapt_cfg.clone()),
            exec_cfg,
            adapt_cfg,
            cancel_token: tokio_util::sync::CancellationToken::new(),
            event_tx: None,
            last_result: None,
            last_trace: None,
        })
    }

    pub fn with_cancel_token(mut self, token: tokio_util::sync::CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<ExecutorEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 顺序执行至多 episodes 个回合，回合间做一次自适应
    pub async fn run(
        &mut self,
        env: &mut dyn Environment,
        episodes: usize,
    ) -> Result<Vec<EpisodeSummary>, ExecutorError> {
        let mut summaries = Vec::new();

        for episode in 1..=episodes {
            let (result, trace) = {
                let mut session = EpisodeSession::new(
                    &self.plan,
                    &self.models,
                    &self.recovery,
                    &self.exec_cfg,
                )
                .with_cancel_token(self.cancel_token.clone());
                if let Some(tx) = &self.event_tx {
                    session = session.with_event_tx(tx);
                }
                run_episode(&session, env, &mut self.abstractor).await?
            };

            tracing::info!(
                "Campaign episode {}/{}: {:?}, residual {:.4}",
                episode,
                episodes,
                result.outcome,
                result.residual
            );

            match self
                .adaptation
                .adapt(&trace, &result, &self.plan, &mut self.models)
            {
                Ok(report) => {
                    for key in &report.updated {
                        if let Some(params) = self.models.parameters(key) {
                            tracing::debug!("Model entry '{}' now {:?}", key, params);
                        }
                    }
                }
                Err(e) => tracing::warn!("Adaptation skipped: {}", e),
            }

            summaries.push(EpisodeSummary {
                episode,
                outcome: result.outcome,
                residual: result.residual,
                ticks: result.ticks,
            });

            let converged = result.outcome == RunStatus::Succeeded
                && result.residual <= self.adapt_cfg.stop_residual;
            self.last_result = Some(result);
            self.last_trace = Some(trace);
            if converged {
                tracing::info!("Campaign converged at episode {}", episode);
                break;
            }
        }

        Ok(summaries)
    }

    pub fn models(&self) -> &ModelStore {
        &self.models
    }

    /// 最近一个回合的结果（外部日志/绘图消费）
    pub fn last_result(&self) -> Option<&EpisodeResult> {
        self.last_result.as_ref()
    }

    /// 最近一个回合的完整轨迹
    pub fn last_trace(&self) -> Option<&EpisodeTrace> {
        self.last_trace.as_ref()
    }

    /// 跨回合积累的观测包络
    pub fn envelope(&self) -> &ObservedEnvelope {
        self.abstractor.envelope()
    }
}
