//! 反应式执行主循环
//!
//! 每拍：读状态 -> 抽象 -> 计划解析 -> 阈值预测 -> 容差带越界比较（锁存）->
//! 输出动作 -> 追加轨迹；支持计划偏离的放宽重匹配、取消与拍数上限。
//! 触发一经锁存不在回合内回退，计划指针在锁存的下一拍推进（单调前进）。
//! 等待环境响应（env.step 的 await）是循环唯一的挂起点。

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::ExecutorSection;
use crate::core::{
    EpisodeSnapshot, ExecutorError, RecoveryAction, RecoveryEngine, RunStatus,
};
use crate::env::Environment;
use crate::executor::{EpisodeTrace, ExecutorEvent, TraceRecord};
use crate::model::ModelStore;
use crate::plan::{ControlAction, Plan, PlanLookup};
use crate::qspace::{ContinuousState, StateAbstractor};

/// 回合执行结果：终态、残差与回合末连续状态
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeResult {
    pub episode_id: String,
    pub outcome: RunStatus,
    /// 目标变量残差幅值的最大值
    pub residual: f64,
    /// 各目标变量的带符号残差（终值 - 目标值）
    pub residuals: BTreeMap<String, f64>,
    /// 回合末连续状态
    pub terminal: ContinuousState,
    /// 实际执行拍数（等于轨迹长度）
    pub ticks: u64,
    /// 环境故障/畸形状态标志；为 true 的轨迹不可用于自适应
    pub fault: bool,
    pub reason: Option<String>,
    pub finished_at: i64,
}

/// 回合会话配置：计划、模型与恢复引擎的只读引用
pub struct EpisodeSession<'a> {
    pub plan: &'a Plan,
    pub models: &'a ModelStore,
    pub recovery: &'a RecoveryEngine,
    pub config: &'a ExecutorSection,
    /// 取消令牌
    pub cancel_token: tokio_util::sync::CancellationToken,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a mpsc::UnboundedSender<ExecutorEvent>>,
}

impl<'a> EpisodeSession<'a> {
    /// 创建最小配置的会话
    pub fn new(
        plan: &'a Plan,
        models: &'a ModelStore,
        recovery: &'a RecoveryEngine,
        config: &'a ExecutorSection,
    ) -> Self {
        Self {
            plan,
            models,
            recovery,
            config,
            cancel_token: tokio_util::sync::CancellationToken::new(),
            event_tx: None,
        }
    }

    /// 设置取消令牌
    pub fn with_cancel_token(mut self, token: tokio_util::sync::CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: &'a mpsc::UnboundedSender<ExecutorEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }
}

fn send_event(tx: &Option<&mpsc::UnboundedSender<ExecutorEvent>>, ev: ExecutorEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

/// 把回合内错误映射为失败收尾参数；Abort 类错误原样上抛
fn episode_failure(
    recovery: &RecoveryEngine,
    err: ExecutorError,
) -> Result<(String, bool), ExecutorError> {
    match recovery.handle(&err) {
        RecoveryAction::FailEpisode { reason, fault } => Ok((reason, fault)),
        RecoveryAction::RelaxAndRematch => Ok((err.to_string(), false)),
        RecoveryAction::Abort(_) => Err(err),
    }
}

fn finish(
    session: &EpisodeSession<'_>,
    episode_id: String,
    outcome: RunStatus,
    terminal: ContinuousState,
    trace: EpisodeTrace,
    fault: bool,
    reason: Option<String>,
) -> (EpisodeResult, EpisodeTrace) {
    let residuals = session.plan.residuals(&terminal);
    let residual = if residuals.is_empty() {
        f64::INFINITY
    } else {
        residuals.values().fold(0.0_f64, |acc, r| acc.max(r.abs()))
    };
    let ticks = trace.len() as u64;
    let result = EpisodeResult {
        episode_id: episode_id.clone(),
        outcome,
        residual,
        residuals,
        terminal,
        ticks,
        fault,
        reason,
        finished_at: chrono::Utc::now().timestamp(),
    };
    send_event(
        &session.event_tx,
        ExecutorEvent::EpisodeFinished {
            episode_id,
            outcome,
            residual,
            ticks,
        },
    );
    tracing::info!(
        "Episode {} finished: {:?}, residual {:.4}, {} ticks",
        result.episode_id,
        outcome,
        residual,
        ticks
    );
    (result, trace)
}

/// 执行一个回合
///
/// 除取消与加载期错误外不上抛：每个回合都收敛为 SUCCEEDED / FAILED /
/// TIMED_OUT 之一，自适应环节总能拿到完整的结果与轨迹。
pub async fn run_episode(
    session: &EpisodeSession<'_>,
    env: &mut dyn Environment,
    abstractor: &mut StateAbstractor,
) -> Result<(EpisodeResult, EpisodeTrace), ExecutorError> {
    let episode_id = uuid::Uuid::new_v4().to_string();
    send_event(
        &session.event_tx,
        ExecutorEvent::EpisodeStarted {
            episode_id: episode_id.clone(),
        },
    );

    let mut trace = EpisodeTrace::new();
    abstractor.restart();

    let max_ticks = session.config.max_ticks;
    let band = session.config.threshold_band;

    let mut state = match env.reset().await {
        Ok(s) if s.is_finite() && !s.is_empty() => s,
        Ok(_) => {
            return Ok(finish(
                session,
                episode_id,
                RunStatus::Failed,
                ContinuousState::new(),
                trace,
                true,
                Some("non-finite or empty initial state".to_string()),
            ));
        }
        Err(e) => match episode_failure(session.recovery, e) {
            Ok((reason, fault)) => {
                return Ok(finish(
                    session,
                    episode_id,
                    RunStatus::Failed,
                    ContinuousState::new(),
                    trace,
                    fault,
                    Some(reason),
                ));
            }
            Err(e) => {
                send_event(&session.event_tx, ExecutorEvent::Error { text: e.to_string() });
                return Err(e);
            }
        },
    };

    let mut index = 0usize;
    let mut latched = false;
    let mut advance_pending = false;
    let mut violation_streak: u32 = 0;
    let mut last_action = ControlAction::new();
    let mut last_threshold: Option<f64> = None;

    let mut status = RunStatus::Running;
    let mut fault = false;
    let mut reason: Option<String> = None;

    for tick in 1u64.. {
        if session.cancel_token.is_cancelled() {
            send_event(
                &session.event_tx,
                ExecutorEvent::Error {
                    text: "Cancelled by caller".to_string(),
                },
            );
            return Err(ExecutorError::Cancelled);
        }

        // 拍数预算：第 max_ticks 拍完整执行，第 max_ticks + 1 拍开始即超时
        if tick > max_ticks {
            status = RunStatus::TimedOut;
            reason = Some(format!("tick budget of {max_ticks} exhausted"));
            break;
        }

        // 上一拍锁存后，本拍推进计划指针
        if advance_pending {
            let from = index;
            index += 1;
            latched = false;
            advance_pending = false;
            send_event(&session.event_tx, ExecutorEvent::RegimeChanged { from, to: index });
        }

        send_event(
            &session.event_tx,
            ExecutorEvent::TickUpdate {
                snapshot: EpisodeSnapshot {
                    tick,
                    status,
                    plan_index: index,
                    latched,
                    last_threshold,
                },
                max_ticks,
            },
        );

        abstractor.observe(&state);
        let qstate = match abstractor.abstract_state(&state) {
            Ok(q) => q,
            Err(e) => match episode_failure(session.recovery, e) {
                Ok((r, f)) => {
                    status = RunStatus::Failed;
                    fault = f;
                    reason = Some(r);
                    break;
                }
                Err(e) => {
                    send_event(&session.event_tx, ExecutorEvent::Error { text: e.to_string() });
                    return Err(e);
                }
            },
        };

        // 计划解析；匹配失败视为「惊异」，走放宽重匹配
        let active = match session.plan.resolve(index, &qstate) {
            PlanLookup::Complete => {
                if session.plan.goal_reached(&state, session.config.goal_tolerance) {
                    status = RunStatus::Succeeded;
                } else {
                    status = RunStatus::Failed;
                    reason = Some("plan complete but residual above tolerance".to_string());
                }
                break;
            }
            PlanLookup::Active(t) => {
                violation_streak = 0;
                Some(t)
            }
            PlanLookup::Violation => {
                send_event(
                    &session.event_tx,
                    ExecutorEvent::Surprise {
                        tick,
                        observed: qstate.to_string(),
                    },
                );
                let err = ExecutorError::PlanViolation {
                    tick,
                    state: qstate.to_string(),
                };
                match session.recovery.handle(&err) {
                    RecoveryAction::RelaxAndRematch => {
                        match session.plan.rematch_relaxed(index, &qstate) {
                            Some(new_index) => {
                                if new_index != index {
                                    send_event(
                                        &session.event_tx,
                                        ExecutorEvent::Recovery {
                                            action: "RelaxAndRematch".to_string(),
                                            detail: format!(
                                                "rematched to transition '{}' at index {}",
                                                session.plan.transitions()[new_index].id,
                                                new_index
                                            ),
                                        },
                                    );
                                    index = new_index;
                                    latched = false;
                                    advance_pending = false;
                                }
                                violation_streak = 0;
                                Some(&session.plan.transitions()[index])
                            }
                            None => {
                                violation_streak += 1;
                                if violation_streak > session.config.violation_retries {
                                    status = RunStatus::Failed;
                                    reason = Some(format!(
                                        "unresolved plan violation after {} retries: {}",
                                        session.config.violation_retries, qstate
                                    ));
                                    break;
                                }
                                // 传感器毛刺容忍窗口：保持上一动作滑行
                                None
                            }
                        }
                    }
                    RecoveryAction::FailEpisode { reason: r, fault: f } => {
                        status = RunStatus::Failed;
                        fault = f;
                        reason = Some(r);
                        break;
                    }
                    RecoveryAction::Abort(_) => {
                        send_event(&session.event_tx, ExecutorEvent::Error { text: err.to_string() });
                        return Err(err);
                    }
                }
            }
        };

        let (action, threshold) = match active {
            Some(transition) => {
                let threshold =
                    match session.models.predict(&transition.trigger.model_key, &state) {
                        Ok(t) => t,
                        Err(e) => match episode_failure(session.recovery, e) {
                            Ok((r, f)) => {
                                status = RunStatus::Failed;
                                fault = f;
                                reason = Some(r);
                                break;
                            }
                            Err(e) => {
                                send_event(
                                    &session.event_tx,
                                    ExecutorEvent::Error { text: e.to_string() },
                                );
                                return Err(e);
                            }
                        },
                    };
                let value = match state.require(&transition.trigger.variable) {
                    Ok(v) => v,
                    Err(e) => match episode_failure(session.recovery, e) {
                        Ok((r, f)) => {
                            status = RunStatus::Failed;
                            fault = f;
                            reason = Some(r);
                            break;
                        }
                        Err(e) => {
                            send_event(
                                &session.event_tx,
                                ExecutorEvent::Error { text: e.to_string() },
                            );
                            return Err(e);
                        }
                    },
                };
                if !latched && transition.trigger.crossed(value, threshold, band) {
                    latched = true;
                    advance_pending = true;
                    trace.record_switch(&transition.id, tick);
                    send_event(
                        &session.event_tx,
                        ExecutorEvent::ThresholdCrossed {
                            transition: transition.id.clone(),
                            tick,
                            threshold,
                            value,
                        },
                    );
                    tracing::debug!(
                        "Transition '{}' latched at tick {}: {} crossed {:.4}",
                        transition.id,
                        tick,
                        transition.trigger.variable,
                        threshold
                    );
                }
                let policy = if latched {
                    &transition.post_policy
                } else {
                    &transition.pre_policy
                };
                match policy.action(&state) {
                    Ok(a) => (a, Some(threshold)),
                    Err(e) => match episode_failure(session.recovery, e) {
                        Ok((r, f)) => {
                            status = RunStatus::Failed;
                            fault = f;
                            reason = Some(r);
                            break;
                        }
                        Err(e) => {
                            send_event(
                                &session.event_tx,
                                ExecutorEvent::Error { text: e.to_string() },
                            );
                            return Err(e);
                        }
                    },
                }
            }
            None => (last_action.clone(), None),
        };

        last_threshold = threshold;
        trace.push(TraceRecord {
            tick,
            state: state.clone(),
            qstate,
            action: action.clone(),
            threshold,
            plan_index: index,
            latched,
        });
        last_action = action;

        // 环境步进：执行循环唯一挂起点
        match env.step(&last_action).await {
            Ok((next, done)) => {
                if !next.is_finite() {
                    let e = ExecutorError::EnvironmentFault(
                        "non-finite value in returned state".to_string(),
                    );
                    match episode_failure(session.recovery, e) {
                        Ok((r, f)) => {
                            status = RunStatus::Failed;
                            fault = f;
                            reason = Some(r);
                            break;
                        }
                        Err(e) => {
                            send_event(
                                &session.event_tx,
                                ExecutorEvent::Error { text: e.to_string() },
                            );
                            return Err(e);
                        }
                    }
                }
                state = next;
                if done {
                    // 环境侧终止（着陆、越界等），按目标贴近谓词定结果
                    if session
                        .plan
                        .goal_reached(&state, session.config.goal_tolerance)
                    {
                        status = RunStatus::Succeeded;
                    } else {
                        status = RunStatus::Failed;
                        reason = Some("environment terminated before goal".to_string());
                    }
                    break;
                }
            }
            Err(e) => match episode_failure(session.recovery, e) {
                Ok((r, f)) => {
                    status = RunStatus::Failed;
                    fault = f;
                    reason = Some(r);
                    break;
                }
                Err(e) => {
                    send_event(&session.event_tx, ExecutorEvent::Error { text: e.to_string() });
                    return Err(e);
                }
            },
        }
    }

    Ok(finish(session, episode_id, status, state, trace, fault, reason))
}
