//! Agent 错误类型
//!
//! 引擎内部用 Result 传递；对外的 make_decision / execute_workflow / execute_tool 从不返回 Err，
//! 而是把 AgentError 降级为兜底回复或结构化失败结果。

use thiserror::Error;

use crate::workflow::WorkflowError;

/// 引擎与工具边界上可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// 工具 future 内部 panic，已被捕获
    #[error("Tool '{0}' panicked during execution")]
    ToolPanicked(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Config error: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_error_is_transparent() {
        let err: AgentError = WorkflowError::WorkflowNotFound("wf_1".to_string()).into();
        assert_eq!(err.to_string(), "Workflow wf_1 not found");
    }

    #[test]
    fn test_tool_not_found_message() {
        let err = AgentError::ToolNotFound("teleport".to_string());
        assert_eq!(err.to_string(), "Tool 'teleport' not found");
    }
}
