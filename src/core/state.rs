//! 回合状态机与快照投影
//!
//! 执行循环只持有 RunStatus；外部消费者（日志、事件）通过 EpisodeSnapshot 观察进度。

use serde::Serialize;

/// 回合状态机：初始 RUNNING，其余三个为终态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// 回合进度快照（事件投影用）
#[derive(Clone, Debug, Serialize)]
pub struct EpisodeSnapshot {
    pub tick: u64,
    pub status: RunStatus,
    /// 当前计划指针
    pub plan_index: usize,
    /// 当前转移是否已触发锁存
    pub latched: bool,
    /// 最近一次预测的触发阈值
    pub last_threshold: Option<f64>,
}
