//! 会话级 Agent 状态
//!
//! 每个会话一份，首次使用时惰性创建，只由 DecisionEngine 在决策与执行工作流时修改。

use serde::{Deserialize, Serialize};

use crate::intent::{EmotionalContext, Intent};
use crate::memory::Persona;
use crate::workflow::WorkflowId;

/// 处理模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Listening,
    Thinking,
    Planning,
    Executing,
    Responding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStage {
    Browsing,
    Researching,
    ReadyToBuy,
    Comparing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    Greeting,
    Discovery,
    Recommendation,
    Comparison,
    Closing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    Excited,
    Confused,
    Frustrated,
    Satisfied,
}

/// 对当前会话的情境判断
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextualAwareness {
    pub customer_persona: Option<Persona>,
    pub purchase_intent: PurchaseStage,
    pub conversation_stage: ConversationStage,
    pub emotional_state: Option<EmotionalState>,
}

impl Default for ContextualAwareness {
    fn default() -> Self {
        Self {
            customer_persona: None,
            purchase_intent: PurchaseStage::Browsing,
            conversation_stage: ConversationStage::Greeting,
            emotional_state: None,
        }
    }
}

impl ContextualAwareness {
    /// 根据本轮意图与情绪更新阶段判断；不改变阶段的意图保留原值
    pub fn observe(&mut self, intent: Intent, emotion: EmotionalContext, persona: Option<Persona>) {
        match intent {
            Intent::Greeting => self.conversation_stage = ConversationStage::Greeting,
            Intent::Recommendation => {
                self.conversation_stage = ConversationStage::Recommendation;
                self.purchase_intent = PurchaseStage::Researching;
            }
            Intent::Comparison => {
                self.conversation_stage = ConversationStage::Comparison;
                self.purchase_intent = PurchaseStage::Comparing;
            }
            Intent::PurchaseIntent => {
                self.conversation_stage = ConversationStage::Closing;
                self.purchase_intent = PurchaseStage::ReadyToBuy;
            }
            Intent::ProductInquiry | Intent::PriceInquiry => {
                self.conversation_stage = ConversationStage::Discovery;
                self.purchase_intent = PurchaseStage::Researching;
            }
            Intent::TechnicalSupport | Intent::GeneralInquiry => {}
        }

        self.emotional_state = match emotion {
            EmotionalContext::Frustrated => Some(EmotionalState::Frustrated),
            EmotionalContext::Excited => Some(EmotionalState::Excited),
            EmotionalContext::Urgent | EmotionalContext::Neutral => self.emotional_state,
        };

        if persona.is_some() {
            self.customer_persona = persona;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// 最近一次决策耗时
    pub response_time_ms: u64,
    /// 平滑后的准确度估计
    pub accuracy: f64,
    pub customer_satisfaction: f64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            response_time_ms: 0,
            accuracy: 0.8,
            customer_satisfaction: 0.8,
        }
    }
}

impl PerformanceMetrics {
    /// 准确度 = (上次准确度 + 本次置信度) / 2
    pub fn record(&mut self, response_time_ms: u64, confidence: f64) {
        self.response_time_ms = response_time_ms;
        self.accuracy = (self.accuracy + confidence) / 2.0;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub session_id: String,
    pub current_mode: AgentMode,
    pub active_workflows: Vec<WorkflowId>,
    pub contextual_awareness: ContextualAwareness,
    pub performance_metrics: PerformanceMetrics,
}

impl AgentState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            current_mode: AgentMode::Listening,
            active_workflows: Vec::new(),
            contextual_awareness: ContextualAwareness::default(),
            performance_metrics: PerformanceMetrics::default(),
        }
    }

    pub fn track_workflow(&mut self, workflow_id: &str) {
        if !self.active_workflows.iter().any(|id| id == workflow_id) {
            self.active_workflows.push(workflow_id.to_string());
        }
    }

    pub fn untrack_workflow(&mut self, workflow_id: &str) -> bool {
        let before = self.active_workflows.len();
        self.active_workflows.retain(|id| id != workflow_id);
        before != self.active_workflows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_defaults() {
        let state = AgentState::new("s1");
        assert_eq!(state.current_mode, AgentMode::Listening);
        assert_eq!(state.performance_metrics.accuracy, 0.8);
        assert_eq!(
            state.contextual_awareness.conversation_stage,
            ConversationStage::Greeting
        );
    }

    #[test]
    fn test_accuracy_is_running_average() {
        let mut metrics = PerformanceMetrics::default();
        metrics.record(12, 0.4);
        assert!((metrics.accuracy - 0.6).abs() < 1e-9);
        assert_eq!(metrics.response_time_ms, 12);
    }

    #[test]
    fn test_observe_keeps_stage_for_support_questions() {
        let mut awareness = ContextualAwareness::default();
        awareness.observe(Intent::Comparison, EmotionalContext::Excited, None);
        awareness.observe(Intent::TechnicalSupport, EmotionalContext::Neutral, None);
        assert_eq!(awareness.conversation_stage, ConversationStage::Comparison);
        assert_eq!(awareness.purchase_intent, PurchaseStage::Comparing);
        assert_eq!(awareness.emotional_state, Some(EmotionalState::Excited));
    }

    #[test]
    fn test_workflow_tracking_is_deduplicated() {
        let mut state = AgentState::new("s1");
        state.track_workflow("wf_1");
        state.track_workflow("wf_1");
        assert_eq!(state.active_workflows.len(), 1);
        assert!(state.untrack_workflow("wf_1"));
        assert!(!state.untrack_workflow("wf_1"));
    }
}
