//! 工作流：任务 DAG 的类型、构建、规划与执行

pub mod builder;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod templates;
pub mod types;

pub use builder::TaskBuilder;
pub use executor::{RetryPolicy, WorkflowExecutor};
pub use graph::WorkflowGraph;
pub use planner::{PlanningConstraints, PlanningContext, TaskPlanner};
pub use templates::WorkflowTemplate;
pub use types::*;
