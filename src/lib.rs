//! Jad - 手机导购智能体核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 决策引擎、会话状态、决策类型、回复组装
//! - **intent**: 意图识别（关键词分类器）
//! - **memory**: 客户档案、会话记忆与快照持久化
//! - **observability**: 日志初始化
//! - **tools**: 工具注册表、执行器与内置导购工具
//! - **workflow**: 任务 DAG、模板、规划器与执行器
//! - **api**: HTTP 接口（feature `server`）

#[cfg(feature = "server")]
pub mod api;
pub mod config;
pub mod core;
pub mod intent;
pub mod memory;
pub mod observability;
pub mod tools;
pub mod workflow;

pub use crate::core::{create_engine_builder, DecisionEngine, EngineBuilder};
