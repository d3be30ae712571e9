//! 脚本化环境（测试用，无需真实被控对象）
//!
//! 无视动作、按预置序列回放连续状态，用于注入传感器跳变、
//! 畸形状态等执行循环必须正确处理的情形。

use async_trait::async_trait;

use crate::core::ExecutorError;
use crate::env::Environment;
use crate::plan::ControlAction;
use crate::qspace::ContinuousState;

/// 脚本化环境：reset 返回首帧，step 依次回放其余帧
#[derive(Debug, Clone)]
pub struct ScriptedEnvironment {
    frames: Vec<ContinuousState>,
    cursor: usize,
    /// 到达该步时返回 EnvironmentFault（模拟协作者失联）
    fail_at: Option<usize>,
}

impl ScriptedEnvironment {
    pub fn new(frames: Vec<ContinuousState>) -> Self {
        Self {
            frames,
            cursor: 0,
            fail_at: None,
        }
    }

    /// 第 n 次 step 时注入环境故障
    pub fn with_fault_at(mut self, step_index: usize) -> Self {
        self.fail_at = Some(step_index);
        self
    }
}

#[async_trait]
impl Environment for ScriptedEnvironment {
    async fn reset(&mut self) -> Result<ContinuousState, ExecutorError> {
        self.cursor = 0;
        self.frames
            .first()
            .cloned()
            .ok_or_else(|| ExecutorError::EnvironmentFault("script is empty".to_string()))
    }

    async fn step(
        &mut self,
        _action: &ControlAction,
    ) -> Result<(ContinuousState, bool), ExecutorError> {
        self.cursor += 1;
        if self.fail_at == Some(self.cursor) {
            return Err(ExecutorError::EnvironmentFault(
                "scripted collaborator stopped responding".to_string(),
            ));
        }
        match self.frames.get(self.cursor) {
            Some(frame) => {
                let done = self.cursor + 1 == self.frames.len();
                Ok((frame.clone(), done))
            }
            None => Err(ExecutorError::EnvironmentFault(
                "script exhausted".to_string(),
            )),
        }
    }
}
