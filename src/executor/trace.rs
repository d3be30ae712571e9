//! 回合轨迹
//!
//! 逐拍追加（拍号、连续状态、定性状态、动作），回合内只写不改，
//! 结束后整体交自适应环节消费。另记各转移的触发拍号，供模型修正
//! 回查触发时刻的连续状态。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::plan::ControlAction;
use crate::qspace::{ContinuousState, QualitativeState};

/// 单拍记录
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub tick: u64,
    pub state: ContinuousState,
    pub qstate: QualitativeState,
    pub action: ControlAction,
    /// 本拍预测的触发阈值；毛刺滑行拍为 None
    pub threshold: Option<f64>,
    pub plan_index: usize,
    pub latched: bool,
}

/// 回合轨迹：追加式记录序列 + 各转移触发拍号
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeTrace {
    records: Vec<TraceRecord>,
    switch_ticks: BTreeMap<String, u64>,
}

impl EpisodeTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&TraceRecord> {
        self.records.last()
    }

    /// 记录转移的触发拍号；同一转移只记首次（回合内不回退）
    pub fn record_switch(&mut self, transition_id: &str, tick: u64) {
        self.switch_ticks
            .entry(transition_id.to_string())
            .or_insert(tick);
    }

    /// 本回合触发过的转移及其拍号
    pub fn switch_ticks(&self) -> &BTreeMap<String, u64> {
        &self.switch_ticks
    }

    /// 触发拍的完整记录
    pub fn switch_record(&self, transition_id: &str) -> Option<&TraceRecord> {
        let tick = *self.switch_ticks.get(transition_id)?;
        self.records.iter().find(|r| r.tick == tick)
    }
}
