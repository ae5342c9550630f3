//! 工作流类型定义
//!
//! 定义工作流、任务、状态与错误等核心数据类型。状态重算规则集中在 [`Workflow::recompute_status`]。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type WorkflowId = String;
pub type TaskId = String;

/// 工作流状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// 已创建，等待执行
    Created,
    /// 正在生成任务计划
    Planning,
    /// 至少一个任务执行过
    Executing,
    /// 所有任务完成
    Completed,
    /// 有任务失败或已取消
    Failed,
    /// 已暂停
    Paused,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 等待依赖满足
    Pending,
    /// 正在执行
    InProgress,
    /// 已完成
    Completed,
    /// 失败（重试耗尽）
    Failed,
    /// 已取消
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// 工作流中的任务节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// 任务类型标签，如 data_gathering、database_search
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    /// 1-10，越大越重要
    pub priority: u8,
    /// 依赖的任务 ID，必须属于同一工作流
    pub dependencies: Vec<TaskId>,
    pub status: TaskStatus,
    /// 绑定的工具名
    pub tool: String,
    pub parameters: Value,
    pub retry_count: u32,
    pub max_retries: u32,
    /// 预估耗时（分钟）
    pub estimated_duration: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// 工作流定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: String,
    pub customer_id: Option<String>,
    pub session_id: String,
    pub status: WorkflowStatus,
    /// 已完成任务数
    pub current_step: usize,
    pub total_steps: usize,
    /// 按计划顺序排列的任务
    pub tasks: Vec<Task>,
    /// 任务 ID -> 依赖 ID 列表（由 tasks 派生）
    pub dependency_graph: BTreeMap<TaskId, Vec<TaskId>>,
    pub context: Value,
    pub goal: String,
    pub success_criteria: Vec<String>,
    /// 整体时长预算（分钟）
    pub max_duration_minutes: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// 根据任务状态重算工作流状态：
    /// 有失败且无进行中 -> Failed；全部完成 -> Completed；有进行中 -> Executing；否则保持不变
    pub fn recompute_status(&mut self) {
        let completed = self.count(TaskStatus::Completed);
        let failed = self.count(TaskStatus::Failed);
        let in_progress = self.count(TaskStatus::InProgress);
        let now = Utc::now();

        if failed > 0 && in_progress == 0 {
            self.status = WorkflowStatus::Failed;
            self.completed_at.get_or_insert(now);
        } else if completed == self.tasks.len() {
            self.status = WorkflowStatus::Completed;
            self.completed_at.get_or_insert(now);
        } else if in_progress > 0 {
            self.status = WorkflowStatus::Executing;
            self.started_at.get_or_insert(now);
        }

        self.current_step = completed;
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}

/// 工作流错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Workflow {0} not found")]
    WorkflowNotFound(WorkflowId),
    #[error("Task {task_id} not found in workflow {workflow_id}")]
    TaskNotFound {
        workflow_id: WorkflowId,
        task_id: TaskId,
    },
    #[error("Cyclic dependency detected")]
    CyclicDependency,
}
