//! 执行事件
//!
//! 可选 event_tx：向外部消费者（日志、绘图、前端）推送回合进度。
//! 执行循环不等待消费者，发送失败静默忽略。

use serde::Serialize;

use crate::core::{EpisodeSnapshot, RunStatus};

/// 执行循环推送的事件
#[derive(Debug, Clone, Serialize)]
pub enum ExecutorEvent {
    EpisodeStarted {
        episode_id: String,
    },
    /// 每拍进度快照
    TickUpdate {
        snapshot: EpisodeSnapshot,
        max_ticks: u64,
    },
    /// 计划指针推进到下一转移
    RegimeChanged {
        from: usize,
        to: usize,
    },
    /// 触发比较越界，前/后策略切换锁存
    ThresholdCrossed {
        transition: String,
        tick: u64,
        threshold: f64,
        value: f64,
    },
    /// 观测到计划未预期的定性状态
    Surprise {
        tick: u64,
        observed: String,
    },
    Recovery {
        action: String,
        detail: String,
    },
    EpisodeFinished {
        episode_id: String,
        outcome: RunStatus,
        residual: f64,
        ticks: u64,
    },
    Error {
        text: String,
    },
}
