//! 计划偏离恢复与超时集成测试
//!
//! 场景一：脚本化环境注入传感器跳变，跳过一个预期定性状态；执行器应通过
//! 放宽趋势的重匹配恢复，或在有限次重试后确定性地报 FAILED，绝不在未解析
//! 状态上静默前进。
//! 场景二：拍数上限低于自然完成拍数时，恰在第 max_ticks + 1 拍报 TIMED_OUT，
//! 轨迹长度等于 max_ticks。

use std::collections::BTreeMap;

use quex::config::{AdaptationSection, ExecutorSection};
use quex::core::{RecoveryEngine, RunStatus};
use quex::env::ScriptedEnvironment;
use quex::executor::{run_episode, EpisodeSession, ExecutorEvent};
use quex::model::{ConstantThresholdModel, ModelStore};
use quex::plan::{
    ControlAction, ControlPolicy, CrossSense, LoadedPlan, Plan, Transition, TriggerCondition,
};
use quex::plants::{cart_plan, CartPlant};
use quex::qspace::{
    Band, ContinuousState, LandmarkSet, QualitativeState, QualitativeValue, StateAbstractor, Trend,
};

fn qstate(band: Band, trend: Trend) -> QualitativeState {
    let mut s = QualitativeState::new();
    s.insert("x", QualitativeValue::new(band, trend));
    s
}

fn push(u: f64) -> ControlPolicy {
    ControlPolicy::Constant(ControlAction::from_pairs(&[("u", u)]))
}

/// 三段爬升计划：x 依次越过 10、20、30
fn climb_plan() -> LoadedPlan {
    let transitions = vec![
        Transition {
            id: "lift".to_string(),
            source: qstate(Band::Between(0), Trend::Unknown),
            target: qstate(Band::Between(1), Trend::Increasing),
            pre_policy: push(1.0),
            post_policy: push(1.0),
            trigger: TriggerCondition {
                variable: "x".to_string(),
                sense: CrossSense::RisesAbove,
                model_key: "lift.at".to_string(),
            },
        },
        Transition {
            id: "soar".to_string(),
            source: qstate(Band::Between(1), Trend::Increasing),
            target: qstate(Band::Above, Trend::Steady),
            pre_policy: push(1.0),
            post_policy: push(1.0),
            trigger: TriggerCondition {
                variable: "x".to_string(),
                sense: CrossSense::RisesAbove,
                model_key: "soar.at".to_string(),
            },
        },
        Transition {
            id: "cruise".to_string(),
            source: qstate(Band::Above, Trend::Steady),
            target: qstate(Band::Above, Trend::Steady),
            pre_policy: push(1.0),
            post_policy: ControlPolicy::Hold,
            trigger: TriggerCondition {
                variable: "x".to_string(),
                sense: CrossSense::RisesAbove,
                model_key: "cruise.at".to_string(),
            },
        },
    ];

    let mut goals = BTreeMap::new();
    goals.insert("x".to_string(), 33.0);

    let mut models = ModelStore::new();
    models.insert(
        "lift.at",
        Box::new(ConstantThresholdModel::new("x", 10.0).unwrap()),
        1.0,
    );
    models.insert(
        "soar.at",
        Box::new(ConstantThresholdModel::new("x", 20.0).unwrap()),
        1.0,
    );
    models.insert(
        "cruise.at",
        Box::new(ConstantThresholdModel::new("x", 30.0).unwrap()),
        1.0,
    );

    let mut landmarks = BTreeMap::new();
    landmarks.insert(
        "x".to_string(),
        LandmarkSet::new("x", vec![0.0, 10.0, 20.0]).unwrap(),
    );

    LoadedPlan {
        plan: Plan::new("climb", transitions, goals).unwrap(),
        landmarks,
        models,
    }
}

fn frames(values: &[f64]) -> Vec<ContinuousState> {
    values
        .iter()
        .map(|&x| ContinuousState::from_pairs(&[("x", x)]))
        .collect()
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ExecutorEvent>) -> Vec<ExecutorEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

#[tokio::test]
async fn test_sensor_jump_recovers_by_relaxed_rematch() {
    let loaded = climb_plan();
    let recovery = RecoveryEngine::new();
    let config = ExecutorSection {
        goal_tolerance: 5.0,
        ..ExecutorSection::default()
    };
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut abstractor = StateAbstractor::new(loaded.landmarks, config.tick_period()).unwrap();
    let session = EpisodeSession::new(&loaded.plan, &loaded.models, &recovery, &config)
        .with_event_tx(&tx);

    // 第 4 拍从 9 跳到 25：跳过了 between-1 区段
    let mut env =
        ScriptedEnvironment::new(frames(&[5.0, 7.0, 9.0, 25.0, 27.0, 29.0, 31.0, 33.0, 33.0, 33.0]));

    let (result, trace) = run_episode(&session, &mut env, &mut abstractor)
        .await
        .unwrap();

    assert_eq!(result.outcome, RunStatus::Succeeded);
    assert!(!result.fault);
    // 跳变被放宽重匹配吸收，计划指针直接跳到 cruise
    assert!(trace.switch_ticks().contains_key("cruise"));
    assert!(!trace.switch_ticks().contains_key("lift"));

    let events = drain(&mut rx);
    let surprises = events
        .iter()
        .filter(|e| matches!(e, ExecutorEvent::Surprise { .. }))
        .count();
    assert!(surprises >= 1, "expected at least one surprise event");
    assert!(
        events.iter().any(|e| matches!(
            e,
            ExecutorEvent::Recovery { action, .. } if action == "RelaxAndRematch"
        )),
        "expected a relaxed-rematch recovery event"
    );
}

#[tokio::test]
async fn test_unresolvable_jump_fails_deterministically() {
    let loaded = climb_plan();
    let recovery = RecoveryEngine::new();
    let config = ExecutorSection {
        violation_retries: 3,
        ..ExecutorSection::default()
    };
    let mut abstractor = StateAbstractor::new(loaded.landmarks, config.tick_period()).unwrap();
    let session = EpisodeSession::new(&loaded.plan, &loaded.models, &recovery, &config);

    // 跳到任何转移都不覆盖的负半轴，且持续停留
    let mut env = ScriptedEnvironment::new(frames(&[
        5.0, 7.0, 9.0, -5.0, -6.0, -7.0, -8.0, -9.0, -10.0, -11.0,
    ]));

    let (result, trace) = run_episode(&session, &mut env, &mut abstractor)
        .await
        .unwrap();

    assert_eq!(result.outcome, RunStatus::Failed);
    assert!(!result.fault);
    let reason = result.reason.unwrap();
    assert!(
        reason.contains("plan violation"),
        "unexpected reason: {reason}"
    );
    // 3 拍正常 + 容忍窗口内的滑行拍，之后确定性失败
    assert_eq!(trace.len(), 6);
    assert!(trace.switch_ticks().is_empty());
}

#[tokio::test]
async fn test_timeout_fires_exactly_after_budget() {
    // 拍数上限低于小车自然完成拍数（约 190 拍）
    let exec_cfg = ExecutorSection {
        max_ticks: 150,
        ..ExecutorSection::default()
    };
    let loaded = cart_plan(10.0, 8.0).unwrap();
    let recovery = RecoveryEngine::new();
    let mut abstractor = StateAbstractor::new(loaded.landmarks, exec_cfg.tick_period()).unwrap();
    let session = EpisodeSession::new(&loaded.plan, &loaded.models, &recovery, &exec_cfg);
    let mut env = CartPlant::new(1.0, -10.0, exec_cfg.tick_period());

    let (result, trace) = run_episode(&session, &mut env, &mut abstractor)
        .await
        .unwrap();

    assert_eq!(result.outcome, RunStatus::TimedOut);
    assert_eq!(trace.len(), 150);
    assert_eq!(result.ticks, 150);
    assert!(!result.fault);
    // 150 拍内已完成加速 -> 制动切换，但尚未停住
    assert!(trace.switch_ticks().contains_key("accelerate"));
}

#[tokio::test]
async fn test_environment_fault_skips_adaptation() {
    use quex::adaptation::AdaptationEngine;

    let loaded = climb_plan();
    let recovery = RecoveryEngine::new();
    let config = ExecutorSection::default();
    let mut abstractor =
        StateAbstractor::new(loaded.landmarks.clone(), config.tick_period()).unwrap();
    let session = EpisodeSession::new(&loaded.plan, &loaded.models, &recovery, &config);
    let mut env = ScriptedEnvironment::new(frames(&[5.0, 7.0, 9.0, 11.0])).with_fault_at(2);

    let (result, trace) = run_episode(&session, &mut env, &mut abstractor)
        .await
        .unwrap();
    assert_eq!(result.outcome, RunStatus::Failed);
    assert!(result.fault);

    // 畸形轨迹不做自适应
    let mut models = climb_plan().models;
    let mut engine = AdaptationEngine::new(AdaptationSection::default());
    assert!(engine
        .adapt(&trace, &result, &loaded.plan, &mut models)
        .is_err());
}
