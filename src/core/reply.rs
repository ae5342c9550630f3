//! 面向用户的回复组装
//!
//! 决策之后：workflow 决策立即执行一轮；按动作种类拼出回复文本，再按置信度加语气修饰。
//! 交互式命令行与 HTTP 接口共用这一层。

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::decision::{DecisionAction, DecisionContext, DecisionResult};
use crate::core::engine::DecisionEngine;
use crate::core::state::AgentMode;
use crate::memory::ConversationTurn;

const ENTHUSIASM_MARKERS: &[&str] = &["!", "✨", "🎉", "🌟", "😊", "👍", "🔥", "💫"];

/// 一次对话请求的完整回复
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentReply {
    pub message: String,
    pub decision: DecisionResult,
    pub agent_mode: Option<AgentMode>,
    pub decision_time_ms: u64,
    /// workflow_result / workflow_error / tool_execution
    pub additional_data: Map<String, Value>,
}

impl DecisionEngine {
    /// 决策并生成回复；助手回复会写回会话记录
    pub async fn respond(&self, ctx: &DecisionContext) -> AgentReply {
        let start = Instant::now();
        let decision = self.make_decision(ctx).await;
        let decision_time_ms = start.elapsed().as_millis() as u64;

        let mut additional_data = Map::new();
        let message = match &decision.action {
            DecisionAction::DirectResponse { response } => response.clone(),
            DecisionAction::ExecuteWorkflow { workflow_id } => {
                let execution = self.execute_workflow(workflow_id).await;
                if execution.success {
                    additional_data.insert("workflow_result".into(), json!(execution.result));
                    "Great! I've analyzed everything and here's what I found for you! 🎉".to_string()
                } else {
                    // 单轮未跑完也算进行中，把当前快照一并带回
                    if let Some(workflow) = &execution.result {
                        additional_data.insert("workflow_result".into(), json!(workflow));
                    }
                    if let Some(error) = &execution.error {
                        additional_data.insert("workflow_error".into(), json!(error));
                    }
                    "I'm working on that for you! Let me gather some more information... 🔍".to_string()
                }
            }
            DecisionAction::UseTool {
                tool_name,
                tool_parameters,
            } => {
                additional_data.insert(
                    "tool_execution".into(),
                    json!({ "tool": tool_name, "parameters": tool_parameters }),
                );
                "Let me look that up for you right away! 🔍".to_string()
            }
            DecisionAction::Clarify {
                response,
                follow_up_questions,
            } => with_questions(response, follow_up_questions),
            DecisionAction::GatherInfo { .. } => {
                "Let me gather some information to give you the most accurate answer! 📊".to_string()
            }
        };
        let message = with_personality(message, decision.confidence);

        self.memory()
            .update_conversation(&ctx.session_id, vec![ConversationTurn::assistant(&message)])
            .await;
        let agent_mode = self
            .get_agent_state(&ctx.session_id)
            .await
            .map(|state| state.current_mode);

        AgentReply {
            message,
            decision,
            agent_mode,
            decision_time_ms,
            additional_data,
        }
    }
}

/// 澄清回复后附编号追问
pub fn with_questions(response: &str, questions: &[String]) -> String {
    if questions.is_empty() {
        return response.to_string();
    }
    let mut text = format!(
        "{response}\n\nHere are a few questions to help me understand better:\n"
    );
    for (i, question) in questions.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, question));
    }
    text
}

/// 高置信度补 ✨，低置信度加前缀；没有任何语气标记时补 😊
pub fn with_personality(mut response: String, confidence: f64) -> String {
    if confidence > 0.8 {
        if !response.contains('!') && !response.contains('🎉') {
            response.push_str(" ✨");
        }
    } else if confidence < 0.5 && !response.contains('🤔') && !response.contains("thinking") {
        response = format!("Let me think about this carefully... {response}");
    }

    if !ENTHUSIASM_MARKERS.iter().any(|m| response.contains(m)) {
        response.push_str(" 😊");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_questions_are_numbered() {
        let text = with_questions("Tell me more.", &["A?".to_string(), "B?".to_string()]);
        assert!(text.ends_with("\n1. A?\n2. B?"));
        assert_eq!(with_questions("Tell me more.", &[]), "Tell me more.");
    }

    #[test]
    fn test_personality_by_confidence() {
        assert_eq!(with_personality("Sure".to_string(), 0.9), "Sure ✨");
        assert_eq!(
            with_personality("Sure".to_string(), 0.3),
            "Let me think about this carefully... Sure 😊"
        );
        assert_eq!(with_personality("Sure!".to_string(), 0.6), "Sure!");
    }
}
