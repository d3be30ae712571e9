//! 核心层：错误与恢复、回合状态机

pub mod error;
pub mod recovery;
pub mod state;

pub use error::{ExecutorError, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use state::{EpisodeSnapshot, RunStatus};
