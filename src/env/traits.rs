//! 环境协作者抽象
//!
//! 执行器对任何暴露 reset/step 能力集的协作者（仿真器或真实被控对象）
//! 保持多态，从不窥视其内部。step 的 await 是执行循环唯一的挂起点。

use async_trait::async_trait;

use crate::core::ExecutorError;
use crate::plan::ControlAction;
use crate::qspace::ContinuousState;

#[async_trait]
pub trait Environment: Send {
    /// 复位到初始状态，返回首个连续状态
    async fn reset(&mut self) -> Result<ContinuousState, ExecutorError>;

    /// 施加一个控制动作，返回下一连续状态与环境侧终止标志
    async fn step(
        &mut self,
        action: &ControlAction,
    ) -> Result<(ContinuousState, bool), ExecutorError>;
}
