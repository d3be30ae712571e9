//! 回合间自适应：单次参数修正引擎与多回合运动循环

pub mod campaign;
pub mod engine;

pub use campaign::{CampaignLoop, EpisodeSummary};
pub use engine::{AdaptationEngine, AdaptationReport};
