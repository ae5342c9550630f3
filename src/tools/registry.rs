//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / category / execute），由 ToolRegistry 按名注册与查找。
//! `execute_tool` 从不返回 Err：未注册的工具名、工具返回的错误以及工具内部 panic
//! 都转为 `success: false` 的 ToolResult。

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;

/// 工具类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Database,
    Api,
    Action,
    Calculation,
    Communication,
}

/// 工具成功时的输出
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub data: Value,
    pub metadata: Option<Value>,
}

impl ToolOutput {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// 工具调用的结构化结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: None,
        }
    }
}

impl From<ToolOutput> for ToolResult {
    fn from(output: ToolOutput) -> Self {
        Self {
            success: true,
            data: Some(output.data),
            error: None,
            metadata: output.metadata,
        }
    }
}

impl From<Result<ToolOutput, AgentError>> for ToolResult {
    fn from(result: Result<ToolOutput, AgentError>) -> Self {
        match result {
            Ok(output) => output.into(),
            // 工具自身返回的错误原样透出，不带前缀
            Err(AgentError::ToolExecutionFailed(msg)) => Self::failure(msg),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// 工具定义（对外列出）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    /// 参数 JSON Schema，仅作说明，调用前不校验
    pub parameters: Value,
}

/// 工具 trait：名称、描述、类别、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn category(&self) -> ToolCategory;

    /// 默认返回空对象，表示参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名工具会被替换
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 已注册的工具名（字典序）
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 工具定义列表（按名称字典序）
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| self.tools.get(&name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                category: tool.category(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// 调用工具；panic 被捕获为 ToolPanicked
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput, AgentError> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolPanicked(name.to_string())),
        }
    }

    pub async fn execute_tool(&self, name: &str, args: Value) -> ToolResult {
        self.execute(name, args).await.into()
    }
}
