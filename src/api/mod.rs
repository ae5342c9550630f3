//! HTTP 接口（feature `server`）
//!
//! POST /api/agent 做一次完整对话；其余路由查询会话状态、推进 / 取消工作流、列出工具。

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::{AgentReply, DecisionContext, DecisionEngine, WorkflowExecution};
use crate::memory::{ConversationTurn, Role};
use crate::tools::ToolDefinition;
use crate::workflow::Workflow;

type ApiError = (StatusCode, String);

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub context: RequestContext,
}

/// 前端附带的上下文：识别到的机型、聊天记录、填写的偏好
#[derive(Debug, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub recognized_phone: Option<Value>,
    #[serde(default)]
    pub chat_history: Vec<ChatHistoryEntry>,
    #[serde(default)]
    pub customer_preferences: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatHistoryEntry {
    /// user | ai | system
    pub sender_type: String,
    pub message_text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AgentRequest {
    fn into_decision_context(self) -> DecisionContext {
        let current_phone = self
            .context
            .recognized_phone
            .as_ref()
            .and_then(|p| p.get("display_name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let conversation_history = self
            .context
            .chat_history
            .into_iter()
            .map(|entry| ConversationTurn {
                role: if entry.sender_type == "user" {
                    Role::User
                } else {
                    Role::Assistant
                },
                content: entry.message_text,
                timestamp: entry.timestamp.unwrap_or_else(Utc::now),
            })
            .collect();

        DecisionContext {
            session_id: self.session_id,
            customer_id: self.customer_id,
            user_input: self.message,
            conversation_history,
            environment: json!({
                "recognized_phone": self.context.recognized_phone,
                "current_phone": current_phone,
                "customer_preferences": self.context.customer_preferences,
                "platform": "web",
                "timestamp": Utc::now(),
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteParams {
    /// true 时连续执行直到结束，否则只跑一轮
    #[serde(default)]
    pub to_completion: bool,
}

pub fn router(engine: Arc<DecisionEngine>) -> Router {
    Router::new()
        .route("/api/agent", post(api_agent))
        .route("/api/agent/state/:session_id", get(api_agent_state))
        .route("/api/agent/workflows/:session_id", get(api_active_workflows))
        .route("/api/workflows/:id/execute", post(api_workflow_execute))
        .route("/api/workflows/:id", delete(api_workflow_cancel))
        .route("/api/tools", get(api_tools_list))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(engine)
}

async fn api_agent(
    State(engine): State<Arc<DecisionEngine>>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentReply>, ApiError> {
    if req.message.trim().is_empty() || req.session_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "message and session_id are required".to_string(),
        ));
    }
    let ctx = req.into_decision_context();
    Ok(Json(engine.respond(&ctx).await))
}

async fn api_agent_state(
    State(engine): State<Arc<DecisionEngine>>,
    Path(session_id): Path<String>,
) -> Json<Value> {
    let agent_state = engine.get_agent_state(&session_id).await;
    let active_workflows = engine.get_active_workflows(&session_id).await;
    Json(json!({
        "agent_state": agent_state,
        "active_workflows": active_workflows,
        "status": "healthy",
    }))
}

async fn api_active_workflows(
    State(engine): State<Arc<DecisionEngine>>,
    Path(session_id): Path<String>,
) -> Json<Vec<Workflow>> {
    Json(engine.get_active_workflows(&session_id).await)
}

async fn api_workflow_execute(
    State(engine): State<Arc<DecisionEngine>>,
    Path(id): Path<String>,
    Query(params): Query<ExecuteParams>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    if engine.planner().get_workflow(&id).await.is_none() {
        return Err((StatusCode::NOT_FOUND, format!("Workflow {id} not found")));
    }
    let execution = if params.to_completion {
        engine.run_workflow_to_completion(&id).await
    } else {
        engine.execute_workflow(&id).await
    };
    Ok(Json(execution))
}

async fn api_workflow_cancel(
    State(engine): State<Arc<DecisionEngine>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if engine.cancel_workflow(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Workflow {id} not found")))
    }
}

async fn api_tools_list(State(engine): State<Arc<DecisionEngine>>) -> Json<Vec<ToolDefinition>> {
    Json(engine.tool_definitions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::core::EngineBuilder;
    use crate::workflow::RetryPolicy;

    fn app() -> (Router, Arc<DecisionEngine>) {
        let engine = Arc::new(
            EngineBuilder::new(AppConfig::default())
                .with_retry_policy(RetryPolicy::immediate())
                .build()
                .unwrap(),
        );
        (router(engine.clone()), engine)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_agent_requires_message() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/api/agent", json!({ "message": " ", "session_id": "s1" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_agent_clarify_lists_questions() {
        let (app, engine) = app();
        let response = app
            .oneshot(post_json(
                "/api/agent",
                json!({ "message": "hello, I want a gaming phone", "session_id": "s1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["decision"]["action"], "clarify");
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("\n1. Are you looking for a phone optimized for gaming performance?"));
        assert_eq!(body["agent_mode"], "listening");

        let history = engine.memory().conversation_history("s1", 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_agent_workflow_runs_one_wave() {
        let (app, engine) = app();
        let response = app
            .oneshot(post_json(
                "/api/agent",
                json!({
                    "message": "can you recommend or suggest the best phone, which phone should I get",
                    "session_id": "s1"
                }),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["decision"]["action"], "execute_workflow");

        let workflow = &body["additional_data"]["workflow_result"];
        assert_eq!(workflow["tasks"][0]["status"], "completed");
        assert_eq!(workflow["tasks"][1]["status"], "pending");
        assert_eq!(engine.get_active_workflows("s1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_workflow_is_404() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::delete("/api/workflows/wf_missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert!(names.contains(&"phone_database_search"));
        assert!(names.contains(&"send_notification"));
    }
}
