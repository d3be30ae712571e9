//! 计划加载器
//!
//! 从 TOML 文档加载静态配置：每变量地标、目标值、转移图与初始模型条目参数。
//! 所有校验（地标有序性、链式衔接、模型键引用）都在加载期完成，
//! 校验失败时回合不会开始。

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::ExecutorError;
use crate::model::{ConstantThresholdModel, KinematicStopModel, ModelStore};
use crate::plan::types::{
    ControlAction, ControlPolicy, CrossSense, Plan, Transition, TriggerCondition,
};
use crate::qspace::{Band, LandmarkSet, QualitativeState, QualitativeValue, Trend};

fn default_entry_gain() -> f64 {
    1.0
}

/// 计划文档顶层
#[derive(Debug, Deserialize)]
struct PlanDoc {
    plan: PlanMetaDoc,
    landmarks: BTreeMap<String, Vec<f64>>,
    goals: BTreeMap<String, f64>,
    #[serde(default)]
    transitions: Vec<TransitionDoc>,
    #[serde(default)]
    models: Vec<ModelDoc>,
}

#[derive(Debug, Deserialize)]
struct PlanMetaDoc {
    name: String,
}

/// 转移节点；source/target 为「变量 -> "区间[:趋势]"」映射
#[derive(Debug, Deserialize)]
struct TransitionDoc {
    id: String,
    source: BTreeMap<String, String>,
    target: BTreeMap<String, String>,
    trigger: TriggerDoc,
    pre: PolicyDoc,
    post: PolicyDoc,
}

#[derive(Debug, Deserialize)]
struct TriggerDoc {
    variable: String,
    sense: CrossSense,
    model: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum PolicyDoc {
    Constant {
        outputs: BTreeMap<String, f64>,
    },
    Linear {
        actuator: String,
        variable: String,
        reference: f64,
        gain: f64,
        bound: f64,
    },
    Hold {},
}

#[derive(Debug, Deserialize)]
struct ModelDoc {
    key: String,
    #[serde(default = "default_entry_gain")]
    gain: f64,
    #[serde(flatten)]
    spec: ModelSpecDoc,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum ModelSpecDoc {
    KinematicStop {
        goal_variable: String,
        rate_variable: String,
        goal: f64,
        decel_estimate: f64,
    },
    Constant {
        variable: String,
        base: f64,
    },
}

/// 加载结果：计划 + 地标集合 + 初始模型条目
#[derive(Debug)]
pub struct LoadedPlan {
    pub plan: Plan,
    pub landmarks: BTreeMap<String, LandmarkSet>,
    pub models: ModelStore,
}

/// 解析 "below" / "between-i" / "above"，可带 ":increasing|steady|decreasing|any"
fn parse_qvalue(
    variable: &str,
    text: &str,
    landmark_count: usize,
) -> Result<QualitativeValue, ExecutorError> {
    let (band_text, trend_text) = match text.split_once(':') {
        Some((b, t)) => (b.trim(), Some(t.trim())),
        None => (text.trim(), None),
    };

    let band = if band_text == "below" {
        Band::Below
    } else if band_text == "above" {
        Band::Above
    } else if let Some(index_text) = band_text.strip_prefix("between-") {
        let index: usize = index_text.parse().map_err(|_| {
            ExecutorError::InvalidPlan(format!(
                "variable '{variable}': bad band '{band_text}'"
            ))
        })?;
        if index + 1 >= landmark_count {
            return Err(ExecutorError::InvalidPlan(format!(
                "variable '{variable}': band 'between-{index}' needs landmark {}",
                index + 1
            )));
        }
        Band::Between(index)
    } else {
        return Err(ExecutorError::InvalidPlan(format!(
            "variable '{variable}': bad band '{band_text}'"
        )));
    };

    let trend = match trend_text {
        None | Some("any") => Trend::Unknown,
        Some("increasing") => Trend::Increasing,
        Some("steady") => Trend::Steady,
        Some("decreasing") => Trend::Decreasing,
        Some(other) => {
            return Err(ExecutorError::InvalidPlan(format!(
                "variable '{variable}': bad trend '{other}'"
            )))
        }
    };

    Ok(QualitativeValue::new(band, trend))
}

fn parse_state(
    doc: &BTreeMap<String, String>,
    landmarks: &BTreeMap<String, LandmarkSet>,
) -> Result<QualitativeState, ExecutorError> {
    let mut state = QualitativeState::new();
    for (variable, text) in doc {
        let set = landmarks.get(variable).ok_or_else(|| {
            ExecutorError::InvalidPlan(format!(
                "state references variable '{variable}' without landmarks"
            ))
        })?;
        state.insert(variable, parse_qvalue(variable, text, set.len())?);
    }
    Ok(state)
}

fn build_policy(doc: PolicyDoc) -> ControlPolicy {
    match doc {
        PolicyDoc::Constant { outputs } => {
            let mut action = ControlAction::new();
            for (actuator, value) in outputs {
                action.set(&actuator, value);
            }
            ControlPolicy::Constant(action)
        }
        PolicyDoc::Linear {
            actuator,
            variable,
            reference,
            gain,
            bound,
        } => ControlPolicy::Linear {
            actuator,
            variable,
            reference,
            gain,
            bound,
        },
        PolicyDoc::Hold {} => ControlPolicy::Hold,
    }
}

/// 解析计划文档文本
pub fn parse_plan_doc(text: &str) -> Result<LoadedPlan, ExecutorError> {
    let doc: PlanDoc = toml::from_str(text)
        .map_err(|e| ExecutorError::InvalidPlan(format!("parse error: {e}")))?;

    let mut landmarks = BTreeMap::new();
    for (variable, values) in doc.landmarks {
        let set = LandmarkSet::new(&variable, values)?;
        landmarks.insert(variable, set);
    }

    let mut models = ModelStore::new();
    for model_doc in doc.models {
        let model: Box<dyn crate::model::CriticalPointModel> = match model_doc.spec {
            ModelSpecDoc::KinematicStop {
                goal_variable,
                rate_variable,
                goal,
                decel_estimate,
            } => Box::new(KinematicStopModel::new(
                &goal_variable,
                &rate_variable,
                goal,
                decel_estimate,
            )?),
            ModelSpecDoc::Constant { variable, base } => {
                Box::new(ConstantThresholdModel::new(&variable, base)?)
            }
        };
        models.insert(&model_doc.key, model, model_doc.gain);
    }

    let mut transitions = Vec::with_capacity(doc.transitions.len());
    for t in doc.transitions {
        if !models.contains(&t.trigger.model) {
            return Err(ExecutorError::InvalidPlan(format!(
                "transition '{}' references unknown model entry '{}'",
                t.id, t.trigger.model
            )));
        }
        transitions.push(Transition {
            source: parse_state(&t.source, &landmarks)?,
            target: parse_state(&t.target, &landmarks)?,
            pre_policy: build_policy(t.pre),
            post_policy: build_policy(t.post),
            trigger: TriggerCondition {
                variable: t.trigger.variable,
                sense: t.trigger.sense,
                model_key: t.trigger.model,
            },
            id: t.id,
        });
    }

    let plan = Plan::new(&doc.plan.name, transitions, doc.goals)?;
    tracing::info!(
        "Loaded plan '{}': {} transitions, {} tracked variables",
        plan.name(),
        plan.len(),
        landmarks.len()
    );

    Ok(LoadedPlan {
        plan,
        landmarks,
        models,
    })
}

/// 从文件加载计划文档
pub fn load_plan_file(path: impl AsRef<Path>) -> Result<LoadedPlan, ExecutorError> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        ExecutorError::ConfigError(format!(
            "cannot read plan file {}: {e}",
            path.as_ref().display()
        ))
    })?;
    parse_plan_doc(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CART_DOC: &str = r#"
[plan]
name = "cart"

[landmarks]
x = [0.0]
v = [0.0]

[goals]
x = 0.0
v = 0.0

[[transitions]]
id = "accelerate"
source = { x = "below", v = "above" }
target = { x = "below", v = "above:decreasing" }

[transitions.trigger]
variable = "x"
sense = "rises-above"
model = "accelerate.stop"

[transitions.pre]
kind = "constant"
outputs = { F = 10.0 }

[transitions.post]
kind = "constant"
outputs = { F = -10.0 }

[[transitions]]
id = "brake"
source = { x = "below", v = "above:decreasing" }
target = { x = "above", v = "above" }

[transitions.trigger]
variable = "v"
sense = "falls-below"
model = "brake.release"

[transitions.pre]
kind = "constant"
outputs = { F = -10.0 }

[transitions.post]
kind = "hold"

[[models]]
key = "accelerate.stop"
kind = "kinematic-stop"
goal_variable = "x"
rate_variable = "v"
goal = 0.0
decel_estimate = 8.0

[[models]]
key = "brake.release"
kind = "constant"
variable = "v"
base = 0.0
gain = 0.0
"#;

    #[test]
    fn test_parse_cart_doc() {
        let loaded = parse_plan_doc(CART_DOC).unwrap();
        assert_eq!(loaded.plan.name(), "cart");
        assert_eq!(loaded.plan.len(), 2);
        assert!(loaded.models.contains("accelerate.stop"));
        assert!(loaded.models.contains("brake.release"));
        assert_eq!(loaded.landmarks["x"].values(), &[0.0]);
        let params = loaded.models.parameters("accelerate.stop").unwrap();
        assert_eq!(params[0], ("decel_estimate", 8.0));
    }

    #[test]
    fn test_rejects_unordered_landmarks() {
        let doc = CART_DOC.replace("x = [0.0]", "x = [5.0, 5.0]");
        assert!(matches!(
            parse_plan_doc(&doc),
            Err(ExecutorError::InvalidLandmarkSet { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_model_reference() {
        let doc = CART_DOC.replace("model = \"brake.release\"", "model = \"missing.key\"");
        match parse_plan_doc(&doc) {
            Err(ExecutorError::InvalidPlan(msg)) => assert!(msg.contains("missing.key")),
            other => panic!("Expected InvalidPlan, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_broken_chain() {
        let doc = CART_DOC.replace(
            "source = { x = \"below\", v = \"above:decreasing\" }",
            "source = { x = \"above\", v = \"above:decreasing\" }",
        );
        assert!(matches!(
            parse_plan_doc(&doc),
            Err(ExecutorError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_rejects_band_out_of_range() {
        let doc = CART_DOC.replace(
            "source = { x = \"below\", v = \"above\" }",
            "source = { x = \"between-0\", v = \"above\" }",
        );
        // x 只有一个地标，between-0 需要两个
        assert!(matches!(
            parse_plan_doc(&doc),
            Err(ExecutorError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_load_plan_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CART_DOC.as_bytes()).unwrap();
        let loaded = load_plan_file(file.path()).unwrap();
        assert_eq!(loaded.plan.len(), 2);
        assert!(load_plan_file("/nonexistent/plan.toml").is_err());
    }
}
