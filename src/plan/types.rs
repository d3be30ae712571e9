//! 计划类型定义
//!
//! 定性状态序列、区段控制策略与触发条件。计划在一个回合内不可变；
//! 拓扑固定，只有模型条目的阈值参数跨回合调整。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::ExecutorError;
use crate::qspace::{ContinuousState, QualitativeState};

/// 控制动作：执行机构名到数值输出的映射
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlAction(BTreeMap<String, f64>);

impl ControlAction {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        let mut action = Self::new();
        for (name, value) in pairs {
            action.set(name, *value);
        }
        action
    }

    pub fn set(&mut self, actuator: &str, value: f64) {
        self.0.insert(actuator.to_string(), value);
    }

    pub fn get(&self, actuator: &str) -> Option<f64> {
        self.0.get(actuator).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(hold)");
        }
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{name}={value:.3}")?;
            first = false;
        }
        Ok(())
    }
}

/// 触发比较方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossSense {
    /// 量值自下而上越过阈值
    RisesAbove,
    /// 量值自上而下越过阈值
    FallsBelow,
}

/// 触发条件：某变量越过模型预测的阈值
#[derive(Debug, Clone)]
pub struct TriggerCondition {
    pub variable: String,
    pub sense: CrossSense,
    /// 预测该阈值的模型条目键
    pub model_key: String,
}

impl TriggerCondition {
    /// 带容差的越界判定；容差带避免拍边界上的前/后策略振荡，
    /// 锁存逻辑由执行循环保证一经触发不再回退
    pub fn crossed(&self, value: f64, threshold: f64, band: f64) -> bool {
        match self.sense {
            CrossSense::RisesAbove => value >= threshold - band,
            CrossSense::FallsBelow => value <= threshold + band,
        }
    }
}

/// 区段内控制策略
#[derive(Debug, Clone)]
pub enum ControlPolicy {
    /// 恒定输出（如满偏力）
    Constant(ControlAction),
    /// 线性插值律：output = clamp(gain * (reference - variable), ±bound)
    Linear {
        actuator: String,
        variable: String,
        reference: f64,
        gain: f64,
        bound: f64,
    },
    /// 零输出保持
    Hold,
}

impl ControlPolicy {
    /// 由当前连续状态计算控制动作
    pub fn action(&self, state: &ContinuousState) -> Result<ControlAction, ExecutorError> {
        match self {
            ControlPolicy::Constant(action) => Ok(action.clone()),
            ControlPolicy::Linear {
                actuator,
                variable,
                reference,
                gain,
                bound,
            } => {
                let value = state.require(variable)?;
                let output = (gain * (reference - value)).clamp(-bound.abs(), bound.abs());
                Ok(ControlAction::from_pairs(&[(actuator.as_str(), output)]))
            }
            ControlPolicy::Hold => Ok(ControlAction::new()),
        }
    }
}

/// 转移：两个定性状态间的有向边，携带触发条件与前/后策略
#[derive(Debug, Clone)]
pub struct Transition {
    pub id: String,
    pub source: QualitativeState,
    pub target: QualitativeState,
    /// 触发前（接近临界点）施加的策略
    pub pre_policy: ControlPolicy,
    /// 触发后（进入下一区段前）施加的策略
    pub post_policy: ControlPolicy,
    pub trigger: TriggerCondition,
}

/// 计划指针解析结果
#[derive(Debug)]
pub enum PlanLookup<'a> {
    /// 仍在计划内，返回当前活动转移
    Active(&'a Transition),
    /// 指针已越过最后一个转移
    Complete,
    /// 观测状态与活动转移的源/目标都不匹配
    Violation,
}

/// 计划：从初始定性状态到目标定性状态的转移序列
///
/// 不变式：相邻转移链式衔接，target(i) == source(i+1)，构造时校验。
#[derive(Debug, Clone)]
pub struct Plan {
    name: String,
    transitions: Vec<Transition>,
    /// 目标变量及其目标值（成功判定与残差计算用）
    goals: BTreeMap<String, f64>,
}

impl Plan {
    pub fn new(
        name: &str,
        transitions: Vec<Transition>,
        goals: BTreeMap<String, f64>,
    ) -> Result<Self, ExecutorError> {
        if transitions.is_empty() {
            return Err(ExecutorError::InvalidPlan(
                "plan has no transitions".to_string(),
            ));
        }
        if goals.is_empty() {
            return Err(ExecutorError::InvalidPlan(
                "plan has no goal variables".to_string(),
            ));
        }
        for pair in transitions.windows(2) {
            if pair[0].target != pair[1].source {
                return Err(ExecutorError::InvalidPlan(format!(
                    "transitions '{}' and '{}' do not chain: target {} != source {}",
                    pair[0].id, pair[1].id, pair[0].target, pair[1].source
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            transitions,
            goals,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn goals(&self) -> &BTreeMap<String, f64> {
        &self.goals
    }

    /// 按计划指针解析当前转移；观测状态匹配活动转移的源或目标
    /// （目标 = 转移进行中）都视为仍在计划上
    pub fn resolve(&self, index: usize, observed: &QualitativeState) -> PlanLookup<'_> {
        let Some(transition) = self.transitions.get(index) else {
            return PlanLookup::Complete;
        };
        if transition.source.matches(observed) || transition.target.matches(observed) {
            PlanLookup::Active(transition)
        } else {
            PlanLookup::Violation
        }
    }

    /// 放宽趋势标签后，在 from.. 的剩余转移中重新匹配源状态。
    /// 指针只前进不后退（回合内单调推进）。
    pub fn rematch_relaxed(&self, from: usize, observed: &QualitativeState) -> Option<usize> {
        (from..self.transitions.len())
            .find(|&i| self.transitions[i].source.matches_bands(observed))
    }

    /// 各目标变量的带符号残差（终值 - 目标值）
    pub fn residuals(&self, terminal: &ContinuousState) -> BTreeMap<String, f64> {
        self.goals
            .iter()
            .filter_map(|(var, goal)| terminal.get(var).map(|v| (var.clone(), v - goal)))
            .collect()
    }

    /// 目标贴近谓词：所有目标变量残差幅值均不超过容差
    pub fn goal_reached(&self, terminal: &ContinuousState, tolerance: f64) -> bool {
        self.goals.iter().all(|(var, goal)| {
            terminal
                .get(var)
                .is_some_and(|v| (v - goal).abs() <= tolerance)
        })
    }
}
