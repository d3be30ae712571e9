//! Quex - 定性计划反应执行器
//!
//! 模块划分：
//! - **adaptation**: 回合间参数自适应与多回合运动
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、恢复动作与回合状态机
//! - **env**: 环境协作者抽象与脚本化测试环境
//! - **executor**: 反应式主循环、事件与回合轨迹
//! - **model**: 临界点模型（停距 / 常量阈值）与条目存储
//! - **plan**: 定性计划表示与 TOML 加载
//! - **plants**: 演示用被控对象（一维小车）
//! - **qspace**: 地标、定性值与状态抽象器

pub mod adaptation;
pub mod config;
pub mod core;
pub mod env;
pub mod executor;
pub mod model;
pub mod observability;
pub mod plan;
pub mod plants;
pub mod qspace;

pub use adaptation::{AdaptationEngine, CampaignLoop};
pub use executor::{run_episode, EpisodeResult, EpisodeSession};
