//! 决策输入与输出类型

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::ConversationTurn;
use crate::workflow::{Workflow, WorkflowId};

/// 引擎内部出错时的固定回复
pub const FALLBACK_RESPONSE: &str = "I'm having trouble processing that right now. Could you please rephrase your question? I'm here to help you find the perfect phone! 📱";
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
pub const FALLBACK_REASONING: &str = "Fallback response due to decision engine error";

/// 一次决策的输入
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DecisionContext {
    pub session_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub user_input: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default)]
    pub environment: Value,
}

impl DecisionContext {
    pub fn new(session_id: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_input: user_input.into(),
            ..Default::default()
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }
}

/// 决策动作（五种之一）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DecisionAction {
    DirectResponse {
        response: String,
    },
    ExecuteWorkflow {
        workflow_id: WorkflowId,
    },
    UseTool {
        tool_name: String,
        tool_parameters: Value,
    },
    /// 保留的动作种类，当前策略不会产生
    GatherInfo {
        #[serde(default)]
        follow_up_questions: Vec<String>,
    },
    Clarify {
        response: String,
        follow_up_questions: Vec<String>,
    },
}

impl DecisionAction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectResponse { .. } => "direct_response",
            Self::ExecuteWorkflow { .. } => "execute_workflow",
            Self::UseTool { .. } => "use_tool",
            Self::GatherInfo { .. } => "gather_info",
            Self::Clarify { .. } => "clarify",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    #[serde(flatten)]
    pub action: DecisionAction,
    /// 0-1
    pub confidence: f64,
    pub reasoning: String,
}

impl DecisionResult {
    pub fn new(action: DecisionAction, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            action,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
        }
    }

    pub fn fallback() -> Self {
        Self::new(
            DecisionAction::DirectResponse {
                response: FALLBACK_RESPONSE.to_string(),
            },
            FALLBACK_CONFIDENCE,
            FALLBACK_REASONING,
        )
    }

    pub fn workflow_id(&self) -> Option<&str> {
        match &self.action {
            DecisionAction::ExecuteWorkflow { workflow_id } => Some(workflow_id),
            _ => None,
        }
    }
}

/// execute_workflow 的结果
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Workflow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecution {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_is_flattened_with_tag() {
        let decision = DecisionResult::new(
            DecisionAction::ExecuteWorkflow {
                workflow_id: "wf_1".into(),
            },
            0.72,
            "multi-step",
        );
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["action"], "execute_workflow");
        assert_eq!(value["workflow_id"], "wf_1");
        assert_eq!(value["confidence"], json!(0.72));
    }

    #[test]
    fn test_fallback_shape() {
        let decision = DecisionResult::fallback();
        assert_eq!(decision.action.kind(), "direct_response");
        assert_eq!(decision.confidence, 0.3);
        assert_eq!(decision.reasoning, FALLBACK_REASONING);
    }

    #[test]
    fn test_confidence_clamped() {
        let decision = DecisionResult::new(
            DecisionAction::DirectResponse {
                response: String::new(),
            },
            1.7,
            "",
        );
        assert_eq!(decision.confidence, 1.0);
    }
}
