//! 常量阈值模型
//!
//! 阈值 = base + bias。bias 按回合末目标变量的带符号残差做有界修正，
//! 适用于触发点本身就是固定地标（如速度过零）的转移。

use crate::core::ExecutorError;
use crate::model::traits::{clamp_step, CriticalPointModel, ObservedOutcome};
use crate::qspace::ContinuousState;

#[derive(Debug, Clone)]
pub struct ConstantThresholdModel {
    /// 残差来源变量
    variable: String,
    base: f64,
    /// 跨回合累积的加性修正
    bias: f64,
}

impl ConstantThresholdModel {
    pub fn new(variable: &str, base: f64) -> Result<Self, ExecutorError> {
        if !base.is_finite() {
            return Err(ExecutorError::ConfigError(format!(
                "constant threshold must be finite, got {base}"
            )));
        }
        Ok(Self {
            variable: variable.to_string(),
            base,
            bias: 0.0,
        })
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

impl CriticalPointModel for ConstantThresholdModel {
    fn predict(&self, _inputs: &ContinuousState) -> Result<f64, ExecutorError> {
        Ok(self.base + self.bias)
    }

    fn update(&mut self, outcome: &ObservedOutcome<'_>, gain: f64, step_cap: f64) {
        let Some(&residual) = outcome.residuals.get(&self.variable) else {
            return;
        };
        self.bias += clamp_step(gain * residual, step_cap);
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("base", self.base), ("bias", self.bias)]
    }
}
