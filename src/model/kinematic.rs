//! 动力学停距模型与到达时间估计
//!
//! 停距模型：以当前速度 v 与减速度估计 a 预测制动触发位置
//! T = goal -/+ v^2 / (2a)（按运动方向取号）。自由系数 a 是对实际可达
//! 减速度幅值的估计，按回合末观测到的实际制动距离修正。

use crate::core::ExecutorError;
use crate::model::traits::{clamp_step, CriticalPointModel, ObservedOutcome};
use crate::qspace::ContinuousState;

/// 减速度估计下界，防止修正后除零或反号
const MIN_DECEL: f64 = 1e-6;

/// 停距类临界点模型
#[derive(Debug, Clone)]
pub struct KinematicStopModel {
    /// 目标变量（如位置 x）
    goal_variable: String,
    /// 速率变量（如速度 v）
    rate_variable: String,
    /// 目标值
    goal: f64,
    /// 实际减速度幅值的估计（自由系数，跨回合修正）
    decel_estimate: f64,
}

impl KinematicStopModel {
    pub fn new(
        goal_variable: &str,
        rate_variable: &str,
        goal: f64,
        decel_estimate: f64,
    ) -> Result<Self, ExecutorError> {
        if !(decel_estimate.is_finite() && decel_estimate > 0.0) {
            return Err(ExecutorError::ConfigError(format!(
                "decel estimate must be positive, got {decel_estimate}"
            )));
        }
        Ok(Self {
            goal_variable: goal_variable.to_string(),
            rate_variable: rate_variable.to_string(),
            goal,
            decel_estimate,
        })
    }

    pub fn decel_estimate(&self) -> f64 {
        self.decel_estimate
    }
}

impl CriticalPointModel for KinematicStopModel {
    fn predict(&self, inputs: &ContinuousState) -> Result<f64, ExecutorError> {
        let rate = inputs.require(&self.rate_variable)?;
        let stop_distance = rate * rate / (2.0 * self.decel_estimate);
        // 正向接近目标时从下方触发，反向时从上方触发
        if rate >= 0.0 {
            Ok(self.goal - stop_distance)
        } else {
            Ok(self.goal + stop_distance)
        }
    }

    fn update(&mut self, outcome: &ObservedOutcome<'_>, gain: f64, step_cap: f64) {
        let Some(switch) = outcome.switch_state else {
            return;
        };
        let (Some(v_switch), Some(x_switch), Some(x_end)) = (
            switch.get(&self.rate_variable),
            switch.get(&self.goal_variable),
            outcome.terminal_state.get(&self.goal_variable),
        ) else {
            return;
        };
        let braked = (x_end - x_switch).abs();
        if braked < 1e-9 || v_switch.abs() < 1e-9 {
            return;
        }
        // 实际实现的减速度幅值：v_T^2 = 2 * a_real * d_act
        let realized = v_switch * v_switch / (2.0 * braked);
        let step = clamp_step(gain * (realized - self.decel_estimate), step_cap);
        self.decel_estimate = (self.decel_estimate + step).max(MIN_DECEL);
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        vec![("decel_estimate", self.decel_estimate)]
    }
}

/// 梯形速度剖面的到达时间估计
///
/// dist 为待行进距离（无符号），v0 为当前速度（朝目标为正），v_max 为最大
/// 速度幅值，acc/dcc 为朝向/背离目标的加速度幅值。初速背离目标时先算停车点，
/// 再从停车点起步。
pub fn time_to_goal(dist: f64, v0: f64, v_max: f64, acc: f64, dcc: f64) -> f64 {
    if dist <= 0.0 {
        return 0.0;
    }
    if v0 >= 0.0 {
        // v_x^2 = v0^2 + 2 * acc * dist
        let v_reach = (v0 * v0 + 2.0 * acc * dist).sqrt();
        if v_reach <= v_max {
            (v_reach - v0) / acc
        } else {
            // 先加速到 v_max，剩余距离匀速
            let t_accel = (v_max - v0) / acc;
            let s_accel = (v_max * v_max - v0 * v0) / (2.0 * acc);
            t_accel + (dist - s_accel) / v_max
        }
    } else {
        // 先停车再掉头
        let s_stop = v0 * v0 / (2.0 * acc);
        let t_stop = -v0 / acc;
        t_stop + time_to_goal(dist + s_stop, 0.0, v_max, acc, dcc)
    }
}
