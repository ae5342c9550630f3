//! 记忆模块
//!
//! - **profile**: 客户档案与派生洞察
//! - **conversation**: 会话记忆（短期 / 长期）与对话轮次
//! - **store**: 引擎持有的记忆存储
//! - **persistence**: 可选 JSON 快照

pub mod conversation;
pub mod persistence;
pub mod profile;
pub mod store;

pub use conversation::{ConversationMemory, ConversationTurn, LongTermPattern, Role, ShortTermEntry};
pub use persistence::{MemorySnapshot, SnapshotFile};
pub use profile::{
    CommunicationStyle, CustomerProfile, DecisionTimeline, Insights, Interaction,
    InteractionKind, Level, Persona, Preferences, PurchaseRecord, TechSavviness,
};
pub use store::{MemoryStore, DEFAULT_SHORT_TERM_CAPACITY};
