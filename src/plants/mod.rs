//! 演示用被控对象（执行器核心之外的示例胶水）

pub mod cart;

pub use cart::{cart_plan, CartPlant};
