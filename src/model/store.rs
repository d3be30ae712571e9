//! 模型条目存储
//!
//! 按条目键保存各转移的临界点模型。回合内只读（predict），回合间仅由
//! 自适应环节单写（update）；并发运行多个回合时各自持有独立副本。

use std::collections::HashMap;

use crate::core::ExecutorError;
use crate::model::traits::{CriticalPointModel, ObservedOutcome};
use crate::qspace::ContinuousState;

/// 单个模型条目：公式变体 + 条目级增益（与全局增益相乘）
#[derive(Debug)]
pub struct ModelEntry {
    pub model: Box<dyn CriticalPointModel>,
    pub gain: f64,
}

/// 模型条目存储
#[derive(Debug, Default)]
pub struct ModelStore {
    entries: HashMap<String, ModelEntry>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, model: Box<dyn CriticalPointModel>, gain: f64) {
        self.entries
            .insert(key.to_string(), ModelEntry { model, gain });
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// 查询条目并预测触发阈值
    pub fn predict(&self, key: &str, inputs: &ContinuousState) -> Result<f64, ExecutorError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| ExecutorError::UnknownModelEntry(key.to_string()))?;
        entry.model.predict(inputs)
    }

    /// 对单个条目做一次有界修正；条目级增益与全局增益相乘
    pub fn update(
        &mut self,
        key: &str,
        outcome: &ObservedOutcome<'_>,
        global_gain: f64,
        step_cap: f64,
    ) -> Result<(), ExecutorError> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| ExecutorError::UnknownModelEntry(key.to_string()))?;
        entry
            .model
            .update(outcome, global_gain * entry.gain, step_cap);
        Ok(())
    }

    /// 条目参数快照（日志用）
    pub fn parameters(&self, key: &str) -> Option<Vec<(&'static str, f64)>> {
        self.entries.get(key).map(|e| e.model.parameters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConstantThresholdModel;
    use std::collections::BTreeMap;

    #[test]
    fn test_unknown_entry_is_error() {
        let store = ModelStore::new();
        let inputs = ContinuousState::new();
        assert!(matches!(
            store.predict("missing", &inputs),
            Err(ExecutorError::UnknownModelEntry(_))
        ));
    }

    #[test]
    fn test_entry_gain_multiplies_global_gain() {
        let mut store = ModelStore::new();
        store.insert(
            "brake.release",
            Box::new(ConstantThresholdModel::new("v", 0.0).unwrap()),
            0.0,
        );
        let terminal = ContinuousState::from_pairs(&[("v", 0.4)]);
        let mut residuals = BTreeMap::new();
        residuals.insert("v".to_string(), 0.4);
        let outcome = ObservedOutcome {
            switch_state: None,
            terminal_state: &terminal,
            residuals: &residuals,
        };
        store.update("brake.release", &outcome, 1.0, 1.0).unwrap();
        // 条目增益 0 冻结该条目
        let params = store.parameters("brake.release").unwrap();
        let bias = params.iter().find(|(k, _)| *k == "bias").unwrap().1;
        assert_eq!(bias, 0.0);
    }
}
