//! 状态类型：连续状态、定性值与定性状态元组
//!
//! ContinuousState 由环境每拍产生，对执行器只读；QualitativeState 是执行器
//! 对「系统处于何处」的工作抽象。匹配规则：Unknown 趋势在任一侧都视为通配。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::ExecutorError;

/// 连续状态：变量名到实数量值的有序映射
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuousState(BTreeMap<String, f64>);

impl ContinuousState {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        let mut state = Self::new();
        for (var, value) in pairs {
            state.set(var, *value);
        }
        state
    }

    pub fn set(&mut self, variable: &str, value: f64) {
        self.0.insert(variable.to_string(), value);
    }

    pub fn get(&self, variable: &str) -> Option<f64> {
        self.0.get(variable).copied()
    }

    /// 取变量值，缺失时报 MissingVariable（被视为畸形状态）
    pub fn require(&self, variable: &str) -> Result<f64, ExecutorError> {
        self.get(variable)
            .ok_or_else(|| ExecutorError::MissingVariable(variable.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 所有量值均为有限实数（NaN/Inf 视为环境故障）
    pub fn is_finite(&self) -> bool {
        self.0.values().all(|v| v.is_finite())
    }
}

/// 地标相对区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    /// 低于最小地标
    Below,
    /// 位于第 i 与第 i+1 个地标之间（含下界）
    Between(usize),
    /// 不低于最大地标
    Above,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Below => write!(f, "<L0"),
            Band::Between(i) => write!(f, "L{}..L{}", i, i + 1),
            Band::Above => write!(f, ">=Lmax"),
        }
    }
}

/// 变化趋势标签；首拍无前序采样时为 Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Increasing,
    Steady,
    Decreasing,
    Unknown,
}

impl Trend {
    /// 由速度估计得到趋势；deadband 内视为 Steady
    pub fn from_rate(rate: f64, deadband: f64) -> Self {
        if rate > deadband {
            Trend::Increasing
        } else if rate < -deadband {
            Trend::Decreasing
        } else {
            Trend::Steady
        }
    }

    /// 趋势兼容性：Unknown 在任一侧都通配
    pub fn compatible(self, other: Trend) -> bool {
        self == Trend::Unknown || other == Trend::Unknown || self == other
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Trend::Increasing => "inc",
            Trend::Steady => "std",
            Trend::Decreasing => "dec",
            Trend::Unknown => "any",
        };
        write!(f, "{tag}")
    }
}

/// 单变量定性值：地标区间 + 趋势标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualitativeValue {
    pub band: Band,
    pub trend: Trend,
}

impl QualitativeValue {
    pub fn new(band: Band, trend: Trend) -> Self {
        Self { band, trend }
    }

    /// 以 self 为期望模式匹配观测值（Unknown 趋势通配）
    pub fn matches(&self, observed: &QualitativeValue) -> bool {
        self.band == observed.band && self.trend.compatible(observed.trend)
    }
}

impl fmt::Display for QualitativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.band, self.trend)
    }
}

/// 定性状态：每个被跟踪变量一个定性值
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitativeState(BTreeMap<String, QualitativeValue>);

impl QualitativeState {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, variable: &str, value: QualitativeValue) {
        self.0.insert(variable.to_string(), value);
    }

    pub fn get(&self, variable: &str) -> Option<&QualitativeValue> {
        self.0.get(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QualitativeValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 以 self 为期望模式匹配观测状态：变量集一致、区间一致、趋势兼容
    pub fn matches(&self, observed: &QualitativeState) -> bool {
        self.0.len() == observed.0.len()
            && self.0.iter().all(|(var, expected)| {
                observed.0.get(var).is_some_and(|got| expected.matches(got))
            })
    }

    /// 放宽匹配：只比较地标区间，忽略趋势标签
    pub fn matches_bands(&self, observed: &QualitativeState) -> bool {
        self.0.len() == observed.0.len()
            && self.0.iter().all(|(var, expected)| {
                observed.0.get(var).is_some_and(|got| expected.band == got.band)
            })
    }
}

impl fmt::Display for QualitativeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (var, value) in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{var}=[{value}]")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qv(band: Band, trend: Trend) -> QualitativeValue {
        QualitativeValue::new(band, trend)
    }

    #[test]
    fn test_continuous_state_require() {
        let state = ContinuousState::from_pairs(&[("x", -10.0), ("v", 0.0)]);
        assert_eq!(state.require("x").unwrap(), -10.0);
        assert!(matches!(
            state.require("y"),
            Err(ExecutorError::MissingVariable(_))
        ));
    }

    #[test]
    fn test_continuous_state_finite_check() {
        let mut state = ContinuousState::from_pairs(&[("x", 1.0)]);
        assert!(state.is_finite());
        state.set("x", f64::NAN);
        assert!(!state.is_finite());
    }

    #[test]
    fn test_trend_from_rate() {
        assert_eq!(Trend::from_rate(0.5, 1e-9), Trend::Increasing);
        assert_eq!(Trend::from_rate(-0.5, 1e-9), Trend::Decreasing);
        assert_eq!(Trend::from_rate(0.0, 1e-9), Trend::Steady);
    }

    #[test]
    fn test_unknown_trend_is_wildcard() {
        let expected = qv(Band::Below, Trend::Unknown);
        assert!(expected.matches(&qv(Band::Below, Trend::Increasing)));
        assert!(expected.matches(&qv(Band::Below, Trend::Steady)));
        assert!(!expected.matches(&qv(Band::Above, Trend::Increasing)));

        let strict = qv(Band::Below, Trend::Steady);
        assert!(strict.matches(&qv(Band::Below, Trend::Unknown)));
        assert!(!strict.matches(&qv(Band::Below, Trend::Increasing)));
    }

    #[test]
    fn test_state_matching_strict_and_relaxed() {
        let mut expected = QualitativeState::new();
        expected.insert("x", qv(Band::Below, Trend::Unknown));
        expected.insert("v", qv(Band::Above, Trend::Decreasing));

        let mut observed = QualitativeState::new();
        observed.insert("x", qv(Band::Below, Trend::Increasing));
        observed.insert("v", qv(Band::Above, Trend::Increasing));

        // v 趋势不兼容，严格匹配失败；放宽后按区间匹配成功
        assert!(!expected.matches(&observed));
        assert!(expected.matches_bands(&observed));
    }

    #[test]
    fn test_state_matching_rejects_variable_set_mismatch() {
        let mut expected = QualitativeState::new();
        expected.insert("x", qv(Band::Below, Trend::Unknown));

        let mut observed = QualitativeState::new();
        observed.insert("x", qv(Band::Below, Trend::Steady));
        observed.insert("v", qv(Band::Above, Trend::Steady));

        assert!(!expected.matches(&observed));
        assert!(!expected.matches_bands(&observed));
    }
}
