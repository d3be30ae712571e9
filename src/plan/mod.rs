//! 定性计划：状态序列、控制策略与 TOML 加载
//!
//! 计划在一个回合内不可变；拓扑固定，阈值由模型条目跨回合自适应。

pub mod loader;
pub mod types;

pub use loader::{load_plan_file, parse_plan_doc, LoadedPlan};
pub use types::{
    ControlAction, ControlPolicy, CrossSense, Plan, PlanLookup, Transition, TriggerCondition,
};
