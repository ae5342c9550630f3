//! 决策引擎
//!
//! 对外入口：识别意图 -> 选择动作（直接回复 / 规划工作流 / 单次工具调用 / 澄清）-> 更新会话状态与记忆。
//! 公共方法从不返回 Err：决策出错降级为兜底回复，工作流执行出错返回结构化失败结果。

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, EngineSection, PlannerSection};
use crate::core::decision::{DecisionAction, DecisionContext, DecisionResult, WorkflowExecution};
use crate::core::responses::{clarifying_questions, direct_response, CLARIFY_RESPONSE};
use crate::core::state::{AgentMode, AgentState};
use crate::core::AgentError;
use crate::intent::{ClassificationContext, Intent, IntentAnalysis, IntentClassifier};
use crate::memory::{ConversationTurn, CustomerProfile, InteractionKind, MemoryStore};
use crate::tools::{ToolDefinition, ToolExecutor, ToolResult};
use crate::workflow::{
    PlanningConstraints, PlanningContext, TaskPlanner, Workflow, WorkflowError, WorkflowExecutor,
    WorkflowId, WorkflowStatus,
};

const WORKFLOW_CONFIDENCE_SCALE: f64 = 0.9;
const TOOL_CONFIDENCE_SCALE: f64 = 0.8;
const FALLBACK_CONFIDENCE_SCALE: f64 = 0.6;
const CLARIFY_CONFIDENCE: f64 = 0.7;
const DECISION_MEMORY_IMPORTANCE: u8 = 8;
const RELEVANT_MEMORY_LIMIT: usize = 5;

pub struct DecisionEngine {
    config: EngineSection,
    planner_config: PlannerSection,
    classifier: Arc<dyn IntentClassifier>,
    memory: Arc<MemoryStore>,
    planner: Arc<TaskPlanner>,
    tools: Arc<ToolExecutor>,
    executor: WorkflowExecutor,
    agent_states: RwLock<HashMap<String, AgentState>>,
    cancel_tokens: RwLock<HashMap<WorkflowId, CancellationToken>>,
}

impl DecisionEngine {
    /// 由 [`EngineBuilder`](crate::core::EngineBuilder) 组装
    pub(crate) fn from_parts(
        config: AppConfig,
        classifier: Arc<dyn IntentClassifier>,
        memory: Arc<MemoryStore>,
        planner: Arc<TaskPlanner>,
        tools: Arc<ToolExecutor>,
        executor: WorkflowExecutor,
    ) -> Self {
        Self {
            config: config.engine,
            planner_config: config.planner,
            classifier,
            memory,
            planner,
            tools,
            executor,
            agent_states: RwLock::new(HashMap::new()),
            cancel_tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn planner(&self) -> &Arc<TaskPlanner> {
        &self.planner
    }

    pub fn max_follow_up_questions(&self) -> usize {
        self.config.max_follow_up_questions
    }

    /// 做一次决策；任何内部错误或 panic 都降级为兜底回复，模式最终总会回到 listening
    pub async fn make_decision(&self, ctx: &DecisionContext) -> DecisionResult {
        let start = Instant::now();
        self.set_mode(&ctx.session_id, AgentMode::Thinking).await;

        let result = match AssertUnwindSafe(self.decide(ctx, start)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(session_id = %ctx.session_id, error = %e, "decision failed, using fallback");
                DecisionResult::fallback()
            }
            Err(_) => {
                warn!(session_id = %ctx.session_id, "decision panicked, using fallback");
                DecisionResult::fallback()
            }
        };

        self.set_mode(&ctx.session_id, AgentMode::Listening).await;
        result
    }

    async fn decide(&self, ctx: &DecisionContext, start: Instant) -> Result<DecisionResult, AgentError> {
        let session_id = ctx.session_id.as_str();
        let profile = match &ctx.customer_id {
            Some(id) => self.memory.get_customer_profile(id).await,
            None => None,
        };
        let memory = self.memory.get_conversation_memory(session_id).await;
        let relevant = self
            .memory
            .relevant_memories(session_id, &ctx.user_input, RELEVANT_MEMORY_LIMIT)
            .await;
        debug!(session_id, relevant = relevant.len(), "relevant memories loaded");

        let classification = ClassificationContext {
            profile: profile.clone(),
            memory: Some(memory),
        };
        let analysis = self.classifier.classify(&ctx.user_input, &classification);
        debug!(
            session_id,
            intent = %analysis.primary,
            confidence = analysis.confidence,
            "intent classified"
        );

        let decision = self.select_action(ctx, &analysis, profile.as_ref()).await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        {
            let mut states = self.agent_states.write().await;
            let state = states
                .entry(session_id.to_string())
                .or_insert_with(|| AgentState::new(session_id));
            state.performance_metrics.record(elapsed_ms, decision.confidence);
            state.contextual_awareness.observe(
                analysis.primary,
                analysis.emotional_context,
                profile.as_ref().map(|p| p.insights.persona),
            );
            if let Some(workflow_id) = decision.workflow_id() {
                state.track_workflow(workflow_id);
            }
        }

        self.remember_decision(ctx, &analysis, &decision).await;

        info!(
            session_id,
            action = decision.action.kind(),
            confidence = decision.confidence,
            elapsed_ms,
            "decision made"
        );
        Ok(decision)
    }

    /// 按优先级选择动作：问候直答 -> 推荐/对比规划 -> 价格/商品单次工具 -> 低置信澄清 -> 兜底直答
    async fn select_action(
        &self,
        ctx: &DecisionContext,
        analysis: &IntentAnalysis,
        profile: Option<&CustomerProfile>,
    ) -> Result<DecisionResult, AgentError> {
        let confidence = analysis.confidence;
        let name = profile.and_then(|p| p.first_name.as_deref());

        match analysis.primary {
            Intent::Greeting if confidence > self.config.direct_response_threshold => {
                return Ok(DecisionResult::new(
                    DecisionAction::DirectResponse {
                        response: direct_response(analysis.primary, analysis.emotional_context, name),
                    },
                    confidence,
                    format!("High confidence {} intent with direct response", analysis.primary),
                ));
            }
            Intent::Recommendation | Intent::Comparison
                if confidence > self.config.workflow_threshold =>
            {
                let workflow = self.plan(ctx, analysis, profile).await?;
                return Ok(DecisionResult::new(
                    DecisionAction::ExecuteWorkflow {
                        workflow_id: workflow.id,
                    },
                    confidence * WORKFLOW_CONFIDENCE_SCALE,
                    format!("Complex {} request requires multi-step workflow", analysis.primary),
                ));
            }
            Intent::PriceInquiry | Intent::ProductInquiry
                if confidence > self.config.tool_threshold =>
            {
                let tool_name = if analysis.primary == Intent::PriceInquiry {
                    "price_comparison"
                } else {
                    "phone_database_search"
                };
                let preferences = profile
                    .and_then(|p| serde_json::to_value(&p.preferences).ok())
                    .unwrap_or_else(|| json!({}));
                return Ok(DecisionResult::new(
                    DecisionAction::UseTool {
                        tool_name: tool_name.to_string(),
                        tool_parameters: json!({
                            "query": ctx.user_input,
                            "customer_context": preferences,
                        }),
                    },
                    confidence * TOOL_CONFIDENCE_SCALE,
                    format!("Direct tool usage for {}", analysis.primary),
                ));
            }
            _ => {}
        }

        if confidence < self.config.clarify_threshold {
            return Ok(DecisionResult::new(
                DecisionAction::Clarify {
                    response: CLARIFY_RESPONSE.to_string(),
                    follow_up_questions: clarifying_questions(
                        &ctx.user_input,
                        self.config.max_follow_up_questions,
                    ),
                },
                CLARIFY_CONFIDENCE,
                "Low confidence requires clarification",
            ));
        }

        Ok(DecisionResult::new(
            DecisionAction::DirectResponse {
                response: direct_response(analysis.primary, analysis.emotional_context, name),
            },
            confidence * FALLBACK_CONFIDENCE_SCALE,
            "Fallback to direct response",
        ))
    }

    async fn plan(
        &self,
        ctx: &DecisionContext,
        analysis: &IntentAnalysis,
        profile: Option<&CustomerProfile>,
    ) -> Result<Workflow, AgentError> {
        self.set_mode(&ctx.session_id, AgentMode::Planning).await;

        let mut planning = PlanningContext::new(&ctx.session_id, &ctx.user_input);
        planning.customer_id = ctx.customer_id.clone();
        planning.customer_profile = profile.map(|p| {
            json!({
                "preferences": p.preferences,
                "insights": p.insights,
            })
        });
        planning.current_phone = ctx
            .environment
            .get("current_phone")
            .and_then(Value::as_str)
            .map(str::to_string);
        planning.available_tools = self.tools.tool_names();
        planning.constraints = PlanningConstraints {
            max_tasks: self.planner_config.max_tasks,
            max_duration_minutes: self.planner_config.max_duration_minutes,
            budget: None,
        };

        let workflow = self.planner.plan_workflow(&planning).await?;
        debug!(
            workflow_id = %workflow.id,
            intent = %analysis.primary,
            tasks = workflow.total_steps,
            "workflow planned for decision"
        );
        self.cancel_tokens
            .write()
            .await
            .insert(workflow.id.clone(), CancellationToken::new());
        Ok(workflow)
    }

    /// 决策上下文写入短期记忆，同时更新当前意图、对话记录与客户互动
    async fn remember_decision(
        &self,
        ctx: &DecisionContext,
        analysis: &IntentAnalysis,
        decision: &DecisionResult,
    ) {
        let session_id = ctx.session_id.as_str();
        self.memory
            .set_current_intent(session_id, analysis.primary.as_str(), ctx.customer_id.as_deref())
            .await;
        self.memory
            .add_to_short_term(
                session_id,
                "decision_context",
                json!({
                    "input": ctx.user_input,
                    "intent": analysis.primary.as_str(),
                    "decision": decision.action.kind(),
                    "confidence": decision.confidence,
                    "reasoning": decision.reasoning,
                }),
                DECISION_MEMORY_IMPORTANCE,
            )
            .await;
        self.memory
            .update_conversation(session_id, vec![ConversationTurn::user(&ctx.user_input)])
            .await;

        if let Some(customer_id) = &ctx.customer_id {
            let kind = if analysis.primary == Intent::Comparison {
                InteractionKind::Comparison
            } else {
                InteractionKind::Chat
            };
            self.memory
                .record_interaction(
                    customer_id,
                    kind,
                    json!({ "session_id": session_id, "intent": analysis.primary.as_str() }),
                    Some(decision.action.kind().to_string()),
                )
                .await;
        }
    }

    /// 执行一轮 ready 任务（单波次）
    pub async fn execute_workflow(&self, workflow_id: &str) -> WorkflowExecution {
        self.drive(workflow_id, false).await
    }

    /// 连续执行多轮，直到无可执行任务、工作流结束、达到波次上限或超出时长预算
    pub async fn run_workflow_to_completion(&self, workflow_id: &str) -> WorkflowExecution {
        self.drive(workflow_id, true).await
    }

    async fn drive(&self, workflow_id: &str, to_completion: bool) -> WorkflowExecution {
        let Some(workflow) = self.planner.get_workflow(workflow_id).await else {
            return WorkflowExecution::failed(format!("Workflow {workflow_id} not found"));
        };
        let session_id = workflow.session_id.clone();
        let token = self.cancel_token(workflow_id).await;

        self.set_mode(&session_id, AgentMode::Executing).await;
        let run = async {
            if to_completion {
                self.executor.run_to_completion(workflow_id, &token).await
            } else {
                self.executor.run_wave(workflow_id, &token).await
            }
        };
        let outcome = AssertUnwindSafe(run).catch_unwind().await;
        self.set_mode(&session_id, AgentMode::Listening).await;

        match outcome {
            Err(_) => {
                warn!(workflow_id, "workflow execution panicked");
                WorkflowExecution::failed(format!("Workflow {workflow_id} execution panicked"))
            }
            Ok(Ok(workflow)) => {
                if workflow.status.is_terminal() {
                    self.retire_workflow(workflow_id).await;
                }
                info!(
                    workflow_id,
                    status = ?workflow.status,
                    completed = workflow.current_step,
                    total = workflow.total_steps,
                    "workflow executed"
                );
                WorkflowExecution {
                    success: workflow.status == WorkflowStatus::Completed,
                    result: Some(workflow),
                    error: None,
                }
            }
            Ok(Err(e)) => {
                warn!(workflow_id, error = %e, "workflow execution failed");
                WorkflowExecution::failed(e.to_string())
            }
        }
    }

    async fn cancel_token(&self, workflow_id: &str) -> CancellationToken {
        self.cancel_tokens
            .write()
            .await
            .entry(workflow_id.to_string())
            .or_default()
            .clone()
    }

    /// 工作流结束：从所有会话的活动列表移除并丢弃取消令牌
    async fn retire_workflow(&self, workflow_id: &str) {
        for state in self.agent_states.write().await.values_mut() {
            state.untrack_workflow(workflow_id);
        }
        self.cancel_tokens.write().await.remove(workflow_id);
    }

    /// 取消工作流；工作流不存在时返回 false
    pub async fn cancel_workflow(&self, workflow_id: &str) -> bool {
        if let Err(e) = self.planner.cancel_workflow(workflow_id).await {
            match e {
                WorkflowError::WorkflowNotFound(_) => debug!(workflow_id, "cancel: workflow not found"),
                other => warn!(workflow_id, error = %other, "cancel failed"),
            }
            return false;
        }
        if let Some(token) = self.cancel_tokens.read().await.get(workflow_id) {
            token.cancel();
        }
        self.retire_workflow(workflow_id).await;
        true
    }

    pub async fn get_agent_state(&self, session_id: &str) -> Option<AgentState> {
        self.agent_states.read().await.get(session_id).cloned()
    }

    pub async fn get_active_workflows(&self, session_id: &str) -> Vec<Workflow> {
        let ids = match self.agent_states.read().await.get(session_id) {
            Some(state) => state.active_workflows.clone(),
            None => return Vec::new(),
        };
        let mut workflows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(workflow) = self.planner.get_workflow(&id).await {
                workflows.push(workflow);
            }
        }
        workflows
    }

    /// 执行 use_tool 决策中的单个工具
    pub async fn execute_tool(&self, tool_name: &str, params: Value) -> ToolResult {
        self.tools.execute_tool(tool_name, params).await
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.registry().definitions()
    }

    async fn set_mode(&self, session_id: &str, mode: AgentMode) {
        let mut states = self.agent_states.write().await;
        states
            .entry(session_id.to_string())
            .or_insert_with(|| AgentState::new(session_id))
            .current_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineBuilder;
    use crate::intent::{EmotionalContext, Urgency};
    use crate::workflow::RetryPolicy;

    /// 固定返回给定意图的分类器
    struct FixedClassifier(Intent, f64);

    impl IntentClassifier for FixedClassifier {
        fn classify(&self, _input: &str, _ctx: &ClassificationContext) -> IntentAnalysis {
            IntentAnalysis {
                primary: self.0,
                confidence: self.1,
                secondary: Vec::new(),
                emotional_context: EmotionalContext::Neutral,
                urgency: Urgency::Low,
            }
        }
    }

    struct PanickingClassifier;

    impl IntentClassifier for PanickingClassifier {
        fn classify(&self, _input: &str, _ctx: &ClassificationContext) -> IntentAnalysis {
            panic!("classifier exploded");
        }
    }

    fn engine_with(classifier: Arc<dyn IntentClassifier>) -> DecisionEngine {
        EngineBuilder::new(AppConfig::default())
            .with_classifier(classifier)
            .with_retry_policy(RetryPolicy::immediate())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_high_confidence_greeting_is_direct() {
        let engine = engine_with(Arc::new(FixedClassifier(Intent::Greeting, 0.9)));
        let result = engine.make_decision(&DecisionContext::new("s1", "hi")).await;
        assert_eq!(result.action.kind(), "direct_response");
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_price_inquiry_uses_price_tool() {
        let engine = engine_with(Arc::new(FixedClassifier(Intent::PriceInquiry, 0.6)));
        let result = engine
            .make_decision(&DecisionContext::new("s1", "price of pixel 8"))
            .await;
        match &result.action {
            DecisionAction::UseTool {
                tool_name,
                tool_parameters,
            } => {
                assert_eq!(tool_name, "price_comparison");
                assert_eq!(tool_parameters["query"], "price of pixel 8");
                assert_eq!(tool_parameters["customer_context"], json!({}));
            }
            other => panic!("unexpected action {other:?}"),
        }
        assert!((result.confidence - 0.48).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_mid_confidence_falls_back_to_direct() {
        let engine = engine_with(Arc::new(FixedClassifier(Intent::TechnicalSupport, 0.6)));
        let result = engine.make_decision(&DecisionContext::new("s1", "help")).await;
        assert_eq!(result.action.kind(), "direct_response");
        assert_eq!(result.reasoning, "Fallback to direct response");
        assert!((result.confidence - 0.36).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_panic_becomes_fallback_and_mode_resets() {
        let engine = engine_with(Arc::new(PanickingClassifier));
        let result = engine.make_decision(&DecisionContext::new("s1", "boom")).await;
        assert_eq!(result, DecisionResult::fallback());

        let state = engine.get_agent_state("s1").await.unwrap();
        assert_eq!(state.current_mode, AgentMode::Listening);
    }

    #[tokio::test]
    async fn test_decision_records_short_term_memory() {
        let engine = engine_with(Arc::new(FixedClassifier(Intent::Greeting, 0.2)));
        engine.make_decision(&DecisionContext::new("s1", "hello")).await;

        let memory = engine.memory().get_conversation_memory("s1").await;
        let entry = &memory.short_term[0];
        assert_eq!(entry.key, "decision_context");
        assert_eq!(entry.importance, 8);
        assert_eq!(entry.value["decision"], "clarify");
        assert_eq!(memory.current_intent, "greeting");
    }

    #[tokio::test]
    async fn test_workflow_decision_tracks_and_retires() {
        let engine = engine_with(Arc::new(FixedClassifier(Intent::Comparison, 0.8)));
        let result = engine
            .make_decision(&DecisionContext::new("s1", "compare the price of two phones"))
            .await;
        let workflow_id = result.workflow_id().unwrap().to_string();
        assert_eq!(engine.get_active_workflows("s1").await.len(), 1);

        let execution = engine.run_workflow_to_completion(&workflow_id).await;
        assert!(execution.success, "{:?}", execution.error);
        assert!(engine.get_active_workflows("s1").await.is_empty());
    }
}
