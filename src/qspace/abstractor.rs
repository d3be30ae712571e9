//! 定性状态抽象器
//!
//! 连续状态 -> 定性状态：地标区间二分定位 + 相邻采样差分推断趋势。
//! 同时按固定控制周期差分估计各变量的速度与加速度，并维护观测包络
//! （分方向的最大速度/加速度），供模型与外部报告使用。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::ExecutorError;
use crate::qspace::{ContinuousState, LandmarkSet, QualitativeState, QualitativeValue, Trend};

/// 速度估计的 Steady 死区
const TREND_DEADBAND: f64 = 1e-9;

/// 观测包络：各变量按符号分别记录的最大速度/加速度幅值
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObservedEnvelope {
    max_rate_pos: BTreeMap<String, f64>,
    max_rate_neg: BTreeMap<String, f64>,
    max_accel_pos: BTreeMap<String, f64>,
    max_accel_neg: BTreeMap<String, f64>,
}

impl ObservedEnvelope {
    fn note(map: &mut BTreeMap<String, f64>, variable: &str, magnitude: f64) {
        let entry = map.entry(variable.to_string()).or_insert(0.0);
        if magnitude > *entry {
            *entry = magnitude;
        }
    }

    fn note_rate(&mut self, variable: &str, rate: f64) {
        if rate > 0.0 {
            Self::note(&mut self.max_rate_pos, variable, rate);
        } else if rate < 0.0 {
            Self::note(&mut self.max_rate_neg, variable, -rate);
        }
    }

    fn note_accel(&mut self, variable: &str, accel: f64) {
        if accel > 0.0 {
            Self::note(&mut self.max_accel_pos, variable, accel);
        } else if accel < 0.0 {
            Self::note(&mut self.max_accel_neg, variable, -accel);
        }
    }

    /// 正/负方向最大速度幅值
    pub fn max_rate(&self, variable: &str, positive: bool) -> Option<f64> {
        let map = if positive { &self.max_rate_pos } else { &self.max_rate_neg };
        map.get(variable).copied()
    }

    /// 正/负方向最大加速度幅值
    pub fn max_accel(&self, variable: &str, positive: bool) -> Option<f64> {
        let map = if positive { &self.max_accel_pos } else { &self.max_accel_neg };
        map.get(variable).copied()
    }
}

/// 定性状态抽象器
///
/// observe 记录采样并更新差分估计，abstract_state 生成定性状态；
/// 二者对相同输入序列是确定性的。
#[derive(Debug)]
pub struct StateAbstractor {
    landmarks: BTreeMap<String, LandmarkSet>,
    dt: f64,
    prev_value: BTreeMap<String, f64>,
    rates: BTreeMap<String, f64>,
    accels: BTreeMap<String, f64>,
    envelope: ObservedEnvelope,
}

impl StateAbstractor {
    pub fn new(
        landmarks: BTreeMap<String, LandmarkSet>,
        dt: f64,
    ) -> Result<Self, ExecutorError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ExecutorError::ConfigError(format!(
                "control period must be positive, got {dt}"
            )));
        }
        if landmarks.is_empty() {
            return Err(ExecutorError::ConfigError(
                "no tracked variables configured".to_string(),
            ));
        }
        Ok(Self {
            landmarks,
            dt,
            prev_value: BTreeMap::new(),
            rates: BTreeMap::new(),
            accels: BTreeMap::new(),
            envelope: ObservedEnvelope::default(),
        })
    }

    /// 清空回合内采样历史，保留观测包络（跨回合继续积累）
    pub fn restart(&mut self) {
        self.prev_value.clear();
        self.rates.clear();
        self.accels.clear();
    }

    /// 连同观测包络一起清空
    pub fn reset(&mut self) {
        self.restart();
        self.envelope = ObservedEnvelope::default();
    }

    /// 记录当前采样：对每个观测到的变量差分估计速度与加速度
    pub fn observe(&mut self, state: &ContinuousState) {
        for (variable, &value) in state.iter() {
            if let Some(&prev) = self.prev_value.get(variable) {
                let rate = (value - prev) / self.dt;
                if let Some(&prev_rate) = self.rates.get(variable) {
                    let accel = (rate - prev_rate) / self.dt;
                    self.accels.insert(variable.clone(), accel);
                    self.envelope.note_accel(variable, accel);
                }
                self.rates.insert(variable.clone(), rate);
                self.envelope.note_rate(variable, rate);
            }
            self.prev_value.insert(variable.clone(), value);
        }
    }

    /// 由当前采样与已推断的趋势生成定性状态；被跟踪变量缺失视为畸形状态
    pub fn abstract_state(
        &self,
        state: &ContinuousState,
    ) -> Result<QualitativeState, ExecutorError> {
        let mut qstate = QualitativeState::new();
        for (variable, set) in &self.landmarks {
            let value = state.require(variable)?;
            let band = set.locate(value);
            let trend = match self.rates.get(variable) {
                Some(&rate) => Trend::from_rate(rate, TREND_DEADBAND),
                // 首拍尚无前序采样
                None => Trend::Unknown,
            };
            qstate.insert(variable, QualitativeValue::new(band, trend));
        }
        Ok(qstate)
    }

    /// 当前速度估计
    pub fn rate(&self, variable: &str) -> Option<f64> {
        self.rates.get(variable).copied()
    }

    /// 当前加速度估计
    pub fn accel(&self, variable: &str) -> Option<f64> {
        self.accels.get(variable).copied()
    }

    pub fn envelope(&self) -> &ObservedEnvelope {
        &self.envelope
    }
}
