//! 任务规划器
//!
//! 根据意图文本选择任务模板、按约束截断、校验依赖图，然后登记为 Workflow。
//! 规划器同时持有工作流表，执行器通过它读取可执行任务并回写任务状态。

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::workflow::graph::WorkflowGraph;
use crate::workflow::templates::WorkflowTemplate;
use crate::workflow::types::*;

/// 规划约束
#[derive(Debug, Clone)]
pub struct PlanningConstraints {
    pub max_tasks: usize,
    /// 整体时长预算（分钟）
    pub max_duration_minutes: u64,
    pub budget: Option<f64>,
}

impl Default for PlanningConstraints {
    fn default() -> Self {
        Self {
            max_tasks: 5,
            max_duration_minutes: 10,
            budget: None,
        }
    }
}

/// 规划输入
#[derive(Debug, Clone)]
pub struct PlanningContext {
    pub user_intent: String,
    pub session_id: String,
    pub customer_id: Option<String>,
    /// 用户查询的机型描述
    pub phone_query: Option<String>,
    /// 升级路径模板使用的当前机型
    pub current_phone: Option<String>,
    /// 客户偏好与洞察（序列化后的档案片段）
    pub customer_profile: Option<Value>,
    pub available_tools: Vec<String>,
    pub constraints: PlanningConstraints,
}

impl PlanningContext {
    pub fn new(session_id: impl Into<String>, user_intent: impl Into<String>) -> Self {
        let user_intent = user_intent.into();
        Self {
            phone_query: Some(user_intent.clone()),
            user_intent,
            session_id: session_id.into(),
            customer_id: None,
            current_phone: None,
            customer_profile: None,
            available_tools: Vec::new(),
            constraints: PlanningConstraints::default(),
        }
    }

    /// 写入 Workflow.context 的会话上下文
    pub fn current_context(&self) -> Value {
        json!({
            "session_id": self.session_id,
            "customer_id": self.customer_id,
            "phone_query": self.phone_query,
            "current_phone": self.current_phone,
        })
    }
}

/// 任务规划器（持有所有工作流，进程内有效）
#[derive(Default)]
pub struct TaskPlanner {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl TaskPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 规划并登记新的工作流，返回其快照
    pub async fn plan_workflow(&self, ctx: &PlanningContext) -> Result<Workflow, WorkflowError> {
        let mut workflow = Workflow {
            id: new_workflow_id(),
            name: workflow_name(&ctx.user_intent),
            description: ctx.user_intent.clone(),
            customer_id: ctx.customer_id.clone(),
            session_id: if ctx.session_id.is_empty() {
                "unknown".to_string()
            } else {
                ctx.session_id.clone()
            },
            status: WorkflowStatus::Planning,
            current_step: 0,
            total_steps: 0,
            tasks: Vec::new(),
            dependency_graph: BTreeMap::new(),
            context: ctx.current_context(),
            goal: ctx.user_intent.clone(),
            success_criteria: success_criteria(&ctx.user_intent),
            max_duration_minutes: ctx.constraints.max_duration_minutes,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        let tasks = self.generate_task_plan(ctx)?;
        workflow.total_steps = tasks.len();
        workflow.dependency_graph = tasks
            .iter()
            .map(|t| (t.id.clone(), t.dependencies.clone()))
            .collect();
        workflow.tasks = tasks;
        workflow.status = WorkflowStatus::Created;

        tracing::info!(
            workflow_id = %workflow.id,
            session_id = %workflow.session_id,
            tasks = workflow.total_steps,
            "workflow planned"
        );

        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    /// 生成任务计划：选模板 -> 截断到 max_tasks -> 剪掉依赖悬空的任务 -> 检查环
    pub fn generate_task_plan(&self, ctx: &PlanningContext) -> Result<Vec<Task>, WorkflowError> {
        let template = WorkflowTemplate::select(&ctx.user_intent);
        let mut tasks = template.tasks(ctx);
        tasks.truncate(ctx.constraints.max_tasks.max(1));

        if !ctx.available_tools.is_empty() {
            for task in &tasks {
                if !ctx.available_tools.contains(&task.tool) {
                    tracing::warn!(task_id = %task.id, tool = %task.tool, "task bound to unavailable tool");
                }
            }
        }

        let (tasks, pruned) = WorkflowGraph::prune_unresolved(tasks);
        if !pruned.is_empty() {
            tracing::warn!(?pruned, template = template.name(), "pruned tasks with unresolved dependencies");
        }

        WorkflowGraph::new(&tasks).topological_order()?;
        Ok(tasks)
    }

    /// 当前可执行任务（Pending 且依赖全部 Completed），工作流不存在时为空
    pub async fn get_next_executable_tasks(&self, workflow_id: &str) -> Vec<Task> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .map(|w| WorkflowGraph::ready_tasks(&w.tasks))
            .unwrap_or_default()
    }

    pub async fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.workflows.read().await.get(workflow_id).cloned()
    }

    pub async fn all_workflows(&self) -> Vec<Workflow> {
        self.workflows.read().await.values().cloned().collect()
    }

    /// 更新任务状态并重算工作流状态。
    /// 首次进入 InProgress 时记录 started_at，首次进入终态时记录 completed_at。
    pub async fn update_task_status(
        &self,
        workflow_id: &str,
        task_id: &str,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<WorkflowStatus, WorkflowError> {
        self.transition(workflow_id, task_id, |_| true, status, result, error)
            .await
            .map(|(_, workflow_status)| workflow_status)
    }

    /// 仅当任务仍为 Pending 时置为 InProgress；已被取消或已开始的任务返回 false
    pub async fn start_task(&self, workflow_id: &str, task_id: &str) -> Result<bool, WorkflowError> {
        let (applied, _) = self
            .transition(
                workflow_id,
                task_id,
                |current| current == TaskStatus::Pending,
                TaskStatus::InProgress,
                None,
                None,
            )
            .await?;
        Ok(applied)
    }

    /// 仅当任务仍为 InProgress 时写入终态；任务在执行期间被取消时丢弃结果，返回 None
    pub async fn finish_task(
        &self,
        workflow_id: &str,
        task_id: &str,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<Option<WorkflowStatus>, WorkflowError> {
        let (applied, workflow_status) = self
            .transition(
                workflow_id,
                task_id,
                |current| current == TaskStatus::InProgress,
                status,
                result,
                error,
            )
            .await?;
        if !applied {
            tracing::debug!(workflow_id, task_id, "task no longer in progress, result discarded");
        }
        Ok(applied.then_some(workflow_status))
    }

    pub async fn task_status(&self, workflow_id: &str, task_id: &str) -> Result<TaskStatus, WorkflowError> {
        let workflows = self.workflows.read().await;
        workflows
            .get(workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))?
            .task(task_id)
            .map(|t| t.status)
            .ok_or_else(|| task_not_found(workflow_id, task_id))
    }

    /// 在同一把写锁内检查当前状态并迁移，返回 (是否迁移, 工作流状态)
    async fn transition<F>(
        &self,
        workflow_id: &str,
        task_id: &str,
        guard: F,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(bool, WorkflowStatus), WorkflowError>
    where
        F: FnOnce(TaskStatus) -> bool,
    {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))?;
        let task = workflow
            .task_mut(task_id)
            .ok_or_else(|| task_not_found(workflow_id, task_id))?;
        if !guard(task.status) {
            return Ok((false, workflow.status));
        }

        task.status = status;
        if result.is_some() {
            task.result = result;
        }
        if error.is_some() {
            task.error = error;
        }

        let now = Utc::now();
        if status == TaskStatus::InProgress {
            task.started_at.get_or_insert(now);
        }
        if status.is_terminal() {
            task.completed_at.get_or_insert(now);
        }

        workflow.recompute_status();
        Ok((true, workflow.status))
    }

    /// 记录一次失败重试，返回新的 retry_count
    pub async fn record_retry(
        &self,
        workflow_id: &str,
        task_id: &str,
        error: &str,
    ) -> Result<u32, WorkflowError> {
        let mut workflows = self.workflows.write().await;
        let task = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))?
            .task_mut(task_id)
            .ok_or_else(|| task_not_found(workflow_id, task_id))?;
        task.retry_count += 1;
        task.error = Some(error.to_string());
        Ok(task.retry_count)
    }

    /// 取消工作流：状态置为 Failed，未结束的任务置为 Cancelled，已完成任务不变
    pub async fn cancel_workflow(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))?;

        let now = Utc::now();
        workflow.status = WorkflowStatus::Failed;
        workflow.completed_at.get_or_insert(now);
        for task in &mut workflow.tasks {
            if matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress) {
                task.status = TaskStatus::Cancelled;
                task.completed_at.get_or_insert(now);
            }
        }
        tracing::info!(workflow_id, "workflow cancelled");
        Ok(())
    }
}

fn task_not_found(workflow_id: &str, task_id: &str) -> WorkflowError {
    WorkflowError::TaskNotFound {
        workflow_id: workflow_id.to_string(),
        task_id: task_id.to_string(),
    }
}

fn new_workflow_id() -> WorkflowId {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("workflow_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// 取意图前三个词，首字母大写，追加 " Workflow"
fn workflow_name(intent: &str) -> String {
    let words: Vec<String> = intent
        .to_lowercase()
        .split_whitespace()
        .take(3)
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    format!("{} Workflow", words.join(" ")).trim_start().to_string()
}

fn success_criteria(intent: &str) -> Vec<String> {
    let intent = intent.to_lowercase();
    let mut criteria = vec!["User query addressed successfully".to_string()];
    let extra = [
        ("recommend", "Personalized recommendations provided"),
        ("compare", "Comprehensive comparison completed"),
        ("analyze", "Detailed analysis delivered"),
        ("price", "Pricing information gathered"),
    ];
    for (keyword, criterion) in extra {
        if intent.contains(keyword) {
            criteria.push(criterion.to_string());
        }
    }
    criteria
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_workflow_name_uses_first_three_words() {
        assert_eq!(
            workflow_name("recommend me a gaming phone"),
            "Recommend Me A Workflow"
        );
        assert_eq!(workflow_name("price"), "Price Workflow");
    }

    #[test]
    fn test_success_criteria_per_keyword() {
        let criteria = success_criteria("Recommend and compare by price");
        assert_eq!(criteria.len(), 4);
        assert_eq!(criteria[0], "User query addressed successfully");
    }

    #[tokio::test]
    async fn test_plan_workflow_registers_created_workflow() {
        let planner = TaskPlanner::new();
        let ctx = PlanningContext::new("s1", "recommend a camera phone");
        let workflow = planner.plan_workflow(&ctx).await.unwrap();

        assert!(workflow.id.starts_with("workflow_"));
        assert_eq!(workflow.status, WorkflowStatus::Created);
        assert_eq!(workflow.total_steps, 4);
        assert_eq!(workflow.dependency_graph.len(), 4);
        assert_eq!(
            workflow.dependency_graph.get("task_3"),
            Some(&vec!["task_1".to_string(), "task_2".to_string()])
        );
        assert!(planner.get_workflow(&workflow.id).await.is_some());
    }

    #[tokio::test]
    async fn test_workflow_ids_are_unique() {
        let planner = TaskPlanner::new();
        let ctx = PlanningContext::new("s1", "analyze this phone");
        let a = planner.plan_workflow(&ctx).await.unwrap();
        let b = planner.plan_workflow(&ctx).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(planner.all_workflows().await.len(), 2);
    }

    #[test]
    fn test_truncated_plans_never_have_dangling_dependencies() {
        let planner = TaskPlanner::new();
        let intents = [
            "recommend a phone",
            "price of the pixel",
            "analyze the galaxy",
            "buy an iphone",
            "upgrade my phone",
            "hello there",
        ];
        for intent in intents {
            for max_tasks in 0..=5 {
                let mut ctx = PlanningContext::new("s1", intent);
                ctx.constraints.max_tasks = max_tasks;
                let tasks = planner.generate_task_plan(&ctx).unwrap();
                let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
                assert!(!tasks.is_empty());
                assert!(tasks.len() <= max_tasks.max(1));
                for task in &tasks {
                    assert!(task.dependencies.iter().all(|d| ids.contains(d.as_str())));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_update_task_status_stamps_timestamps_once() {
        let planner = TaskPlanner::new();
        let wf = planner
            .plan_workflow(&PlanningContext::new("s1", "price check"))
            .await
            .unwrap();

        let status = planner
            .update_task_status(&wf.id, "task_1", TaskStatus::InProgress, None, None)
            .await
            .unwrap();
        assert_eq!(status, WorkflowStatus::Executing);

        let started = planner.get_workflow(&wf.id).await.unwrap().tasks[0].started_at;
        planner
            .update_task_status(&wf.id, "task_1", TaskStatus::InProgress, None, None)
            .await
            .unwrap();
        let again = planner.get_workflow(&wf.id).await.unwrap().tasks[0].started_at;
        assert_eq!(started, again);

        planner
            .update_task_status(&wf.id, "task_1", TaskStatus::Completed, Some(json!([])), None)
            .await
            .unwrap();
        let task = planner.get_workflow(&wf.id).await.unwrap().tasks[0].clone();
        assert!(task.completed_at.is_some());
        assert_eq!(task.result, Some(json!([])));
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_an_error() {
        let planner = TaskPlanner::new();
        let wf = planner
            .plan_workflow(&PlanningContext::new("s1", "hello"))
            .await
            .unwrap();
        let err = planner
            .update_task_status(&wf.id, "task_99", TaskStatus::Completed, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::TaskNotFound { .. }));

        let err = planner
            .update_task_status("nope", "task_1", TaskStatus::Completed, None, None)
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::WorkflowNotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn test_cancel_keeps_completed_tasks() {
        let planner = TaskPlanner::new();
        let wf = planner
            .plan_workflow(&PlanningContext::new("s1", "analyze the pixel"))
            .await
            .unwrap();
        planner
            .update_task_status(&wf.id, "task_1", TaskStatus::Completed, None, None)
            .await
            .unwrap();

        planner.cancel_workflow(&wf.id).await.unwrap();

        let wf = planner.get_workflow(&wf.id).await.unwrap();
        assert_eq!(wf.status, WorkflowStatus::Failed);
        assert_eq!(wf.tasks[0].status, TaskStatus::Completed);
        assert_eq!(wf.tasks[1].status, TaskStatus::Cancelled);
        assert_eq!(wf.tasks[2].status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_result_discarded_after_cancel() {
        let planner = TaskPlanner::new();
        let wf = planner
            .plan_workflow(&PlanningContext::new("s1", "price check"))
            .await
            .unwrap();

        assert!(planner.start_task(&wf.id, "task_1").await.unwrap());
        assert!(!planner.start_task(&wf.id, "task_1").await.unwrap());

        planner.cancel_workflow(&wf.id).await.unwrap();
        let applied = planner
            .finish_task(&wf.id, "task_1", TaskStatus::Completed, Some(json!({})), None)
            .await
            .unwrap();
        assert!(applied.is_none());
        assert_eq!(
            planner.task_status(&wf.id, "task_1").await.unwrap(),
            TaskStatus::Cancelled
        );
        assert!(!planner.start_task(&wf.id, "task_2").await.unwrap());
    }
}
