//! 反应式执行器：主循环、事件与回合轨迹

pub mod events;
pub mod loop_;
pub mod trace;

pub use events::ExecutorEvent;
pub use loop_::{run_episode, EpisodeResult, EpisodeSession};
pub use trace::{EpisodeTrace, TraceRecord};
