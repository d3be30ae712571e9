//! 临界点模型抽象
//!
//! 每个转移对应一个模型条目：predict 由当前连续输入给出触发阈值，
//! update 在回合结束后按观测结果做一次有界修正。不同被控对象在配置期
//! 选择不同的公式变体，执行循环对变体保持多态。

use std::collections::BTreeMap;

use crate::core::ExecutorError;
use crate::qspace::ContinuousState;

/// 回合结束后供模型修正使用的观测结果
#[derive(Debug, Clone, Copy)]
pub struct ObservedOutcome<'a> {
    /// 触发拍的连续状态（策略切换时刻）；转移未触发时为 None
    pub switch_state: Option<&'a ContinuousState>,
    /// 回合末连续状态
    pub terminal_state: &'a ContinuousState,
    /// 各目标变量的带符号残差（终值 - 目标值）
    pub residuals: &'a BTreeMap<String, f64>,
}

/// 临界点模型能力集：预测触发阈值 + 按观测误差修正参数
///
/// 回合内只读（predict），回合间仅由自适应环节单写（update）。
pub trait CriticalPointModel: Send + Sync + std::fmt::Debug {
    /// 由当前连续输入预测触发阈值
    fn predict(&self, inputs: &ContinuousState) -> Result<f64, ExecutorError>;

    /// 回合间的一次有界参数修正；单步调整量按 step_cap 截断
    fn update(&mut self, outcome: &ObservedOutcome<'_>, gain: f64, step_cap: f64);

    /// 当前参数快照（日志与外部报告用）
    fn parameters(&self) -> Vec<(&'static str, f64)>;
}

/// 把参数修正量截断到 [-cap, cap]
pub(crate) fn clamp_step(step: f64, cap: f64) -> f64 {
    step.clamp(-cap.abs(), cap.abs())
}
