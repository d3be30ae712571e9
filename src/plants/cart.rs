//! 一维小车被控对象（演示与收敛测试用）
//!
//! 半隐式欧拉积分：v += F/m * dt; x += v * dt。执行器核心之外的示例胶水，
//! 同时提供配套的小车计划工厂（加速 -> 制动 -> 释放）。

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::ExecutorError;
use crate::env::Environment;
use crate::model::{ConstantThresholdModel, KinematicStopModel, ModelStore};
use crate::plan::{
    ControlAction, ControlPolicy, CrossSense, LoadedPlan, Plan, Transition, TriggerCondition,
};
use crate::qspace::{Band, ContinuousState, LandmarkSet, QualitativeState, QualitativeValue, Trend};

/// 一维小车仿真器
#[derive(Debug, Clone)]
pub struct CartPlant {
    mass: f64,
    x0: f64,
    dt: f64,
    x: f64,
    v: f64,
}

impl CartPlant {
    pub fn new(mass: f64, x0: f64, dt: f64) -> Self {
        Self {
            mass,
            x0,
            dt,
            x: x0,
            v: 0.0,
        }
    }

    fn state(&self) -> ContinuousState {
        ContinuousState::from_pairs(&[("x", self.x), ("v", self.v)])
    }
}

#[async_trait]
impl Environment for CartPlant {
    async fn reset(&mut self) -> Result<ContinuousState, ExecutorError> {
        self.x = self.x0;
        self.v = 0.0;
        Ok(self.state())
    }

    async fn step(
        &mut self,
        action: &ControlAction,
    ) -> Result<(ContinuousState, bool), ExecutorError> {
        let force = action.get("F").unwrap_or(0.0);
        let accel = force / self.mass;
        self.v += accel * self.dt;
        self.x += self.v * self.dt;
        // 终止判定交给执行器（计划完成或拍数上限）
        Ok((self.state(), false))
    }
}

fn qstate(pairs: &[(&str, Band, Trend)]) -> QualitativeState {
    let mut state = QualitativeState::new();
    for (var, band, trend) in pairs {
        state.insert(var, QualitativeValue::new(*band, *trend));
    }
    state
}

/// 小车计划工厂：目标是把小车从负半轴停到原点
///
/// - accelerate：满偏正推力，停距模型预测制动触发位置
/// - brake：满偏反推力，速度过零（常量阈值，条目增益 0 即冻结）后释放
///
/// 初始减速度估计故意偏低（8 对真实 10），使跨回合修正可观测。
pub fn cart_plan(force_bound: f64, decel_estimate: f64) -> Result<LoadedPlan, ExecutorError> {
    let mut landmarks = BTreeMap::new();
    landmarks.insert("x".to_string(), LandmarkSet::new("x", vec![0.0])?);
    landmarks.insert("v".to_string(), LandmarkSet::new("v", vec![0.0])?);

    // 加速与制动区段小车都在 x<0、v>=0；区分两区段的是 v 的趋势
    let approaching = qstate(&[
        ("x", Band::Below, Trend::Unknown),
        ("v", Band::Above, Trend::Unknown),
    ]);
    let braking = qstate(&[
        ("x", Band::Below, Trend::Unknown),
        ("v", Band::Above, Trend::Decreasing),
    ]);
    // 终态：原点附近停住；v=0 按半开区间约定落在 Above
    let stopped = qstate(&[
        ("x", Band::Above, Trend::Unknown),
        ("v", Band::Above, Trend::Unknown),
    ]);

    let transitions = vec![
        Transition {
            id: "accelerate".to_string(),
            source: approaching,
            target: braking.clone(),
            pre_policy: ControlPolicy::Constant(ControlAction::from_pairs(&[(
                "F",
                force_bound,
            )])),
            post_policy: ControlPolicy::Constant(ControlAction::from_pairs(&[(
                "F",
                -force_bound,
            )])),
            trigger: TriggerCondition {
                variable: "x".to_string(),
                sense: CrossSense::RisesAbove,
                model_key: "accelerate.stop".to_string(),
            },
        },
        Transition {
            id: "brake".to_string(),
            source: braking,
            target: stopped,
            pre_policy: ControlPolicy::Constant(ControlAction::from_pairs(&[(
                "F",
                -force_bound,
            )])),
            post_policy: ControlPolicy::Hold,
            trigger: TriggerCondition {
                variable: "v".to_string(),
                sense: CrossSense::FallsBelow,
                model_key: "brake.release".to_string(),
            },
        },
    ];

    let mut goals = BTreeMap::new();
    goals.insert("x".to_string(), 0.0);
    goals.insert("v".to_string(), 0.0);

    let mut models = ModelStore::new();
    models.insert(
        "accelerate.stop",
        Box::new(KinematicStopModel::new("x", "v", 0.0, decel_estimate)?),
        1.0,
    );
    models.insert(
        "brake.release",
        Box::new(ConstantThresholdModel::new("v", 0.0)?),
        0.0,
    );

    Ok(LoadedPlan {
        plan: Plan::new("cart", transitions, goals)?,
        landmarks,
        models,
    })
}
