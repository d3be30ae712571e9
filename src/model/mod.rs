//! 临界点模型：预测定性转移触发阈值的可调参公式
//!
//! - **traits**: 模型能力集抽象（predict / update）
//! - **kinematic**: 停距模型与到达时间估计
//! - **constant**: 常量阈值 + 加性偏置模型
//! - **store**: 按转移键保存条目，单写窗口在回合之间

pub mod constant;
pub mod kinematic;
pub mod store;
pub mod traits;

pub use constant::ConstantThresholdModel;
pub use kinematic::{time_to_goal, KinematicStopModel};
pub use store::{ModelEntry, ModelStore};
pub use traits::{CriticalPointModel, ObservedOutcome};
