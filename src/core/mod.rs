//! 核心决策层：错误类型、会话状态、决策类型、固定回复、决策引擎、回复组装与构建器

pub mod builder;
pub mod decision;
pub mod engine;
pub mod error;
pub mod reply;
pub mod responses;
pub mod state;

pub use builder::{create_engine_builder, EngineBuilder};
pub use decision::{DecisionAction, DecisionContext, DecisionResult, WorkflowExecution};
pub use engine::DecisionEngine;
pub use error::AgentError;
pub use reply::AgentReply;
pub use state::{
    AgentMode, AgentState, ContextualAwareness, ConversationStage, EmotionalState,
    PerformanceMetrics, PurchaseStage,
};
