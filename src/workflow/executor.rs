//! 工作流执行器
//!
//! `run_wave` 执行一轮：取当前可执行任务，按计划顺序逐个调用工具并回写状态，
//! 本轮中新变为可执行的任务留到下一轮。`run_to_completion` 循环执行多轮，
//! 直到没有可执行任务、工作流结束、达到最大轮数、超过时长预算或被取消。
//!
//! 工具失败时在 retry_count < max_retries 的范围内指数退避重试，
//! 退避等待可被取消令牌打断。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::AgentError;
use crate::tools::ToolExecutor;
use crate::workflow::planner::TaskPlanner;
use crate::workflow::types::*;

/// 重试退避策略：第 n 次重试前等待 base · 2^n，上限 max
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            max: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// 不等待，测试用
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base.saturating_mul(factor).min(self.max)
    }
}

pub struct WorkflowExecutor {
    planner: Arc<TaskPlanner>,
    tools: Arc<ToolExecutor>,
    retry: RetryPolicy,
    max_waves: usize,
}

impl WorkflowExecutor {
    pub fn new(planner: Arc<TaskPlanner>, tools: Arc<ToolExecutor>) -> Self {
        Self {
            planner,
            tools,
            retry: RetryPolicy::default(),
            max_waves: 16,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_waves(mut self, max_waves: usize) -> Self {
        self.max_waves = max_waves.max(1);
        self
    }

    /// 执行一轮，返回执行后的工作流快照
    pub async fn run_wave(
        &self,
        workflow_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Workflow, WorkflowError> {
        self.wave(workflow_id, cancel, None).await?;
        self.snapshot(workflow_id).await
    }

    /// 循环执行多轮，返回最终快照
    pub async fn run_to_completion(
        &self,
        workflow_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Workflow, WorkflowError> {
        let workflow = self.snapshot(workflow_id).await?;
        let budget = Duration::from_secs(workflow.max_duration_minutes.saturating_mul(60));
        // 预算超出 Instant 可表示范围时不设截止时间
        let deadline = Instant::now().checked_add(budget);

        for wave in 0..self.max_waves {
            if cancel.is_cancelled() {
                debug!(workflow_id, wave, "workflow run cancelled");
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(workflow_id, wave, "workflow duration budget exhausted");
                break;
            }
            let executed = self.wave(workflow_id, cancel, deadline).await?;
            let status = self.snapshot(workflow_id).await?.status;
            if executed == 0 || status.is_terminal() {
                break;
            }
            if wave + 1 == self.max_waves {
                warn!(workflow_id, max_waves = self.max_waves, "workflow wave limit reached");
            }
        }

        self.snapshot(workflow_id).await
    }

    /// 执行当前 ready 集合，返回实际启动的任务数
    async fn wave(
        &self,
        workflow_id: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<usize, WorkflowError> {
        // 工作流不存在时在这里报错，而不是返回空 ready 集合
        self.snapshot(workflow_id).await?;
        let ready = self.planner.get_next_executable_tasks(workflow_id).await;
        let mut executed = 0;

        for task in ready {
            if cancel.is_cancelled() {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            // 期间可能已被取消
            if !self.planner.start_task(workflow_id, &task.id).await? {
                continue;
            }
            executed += 1;
            self.run_task(workflow_id, &task, cancel).await?;
        }
        Ok(executed)
    }

    async fn run_task(
        &self,
        workflow_id: &str,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        let mut retries = task.retry_count;
        loop {
            debug!(workflow_id, task_id = %task.id, tool = %task.tool, "running task");
            match self.tools.execute(&task.tool, task.parameters.clone()).await {
                Ok(output) => {
                    self.planner
                        .finish_task(workflow_id, &task.id, TaskStatus::Completed, Some(output.data), None)
                        .await?;
                    return Ok(());
                }
                Err(e) => {
                    let message = failure_message(e);
                    if retries >= task.max_retries {
                        info!(workflow_id, task_id = %task.id, error = %message, "task failed");
                        self.planner
                            .finish_task(workflow_id, &task.id, TaskStatus::Failed, None, Some(message))
                            .await?;
                        return Ok(());
                    }

                    let delay = self.retry.delay_for(retries);
                    retries = self.planner.record_retry(workflow_id, &task.id, &message).await?;
                    warn!(
                        workflow_id,
                        task_id = %task.id,
                        attempt = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "task failed, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    if self.planner.task_status(workflow_id, &task.id).await? != TaskStatus::InProgress {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn snapshot(&self, workflow_id: &str) -> Result<Workflow, WorkflowError> {
        self.planner
            .get_workflow(workflow_id)
            .await
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))
    }
}

/// 工具自身的错误信息原样记录，其余错误用 Display
fn failure_message(error: AgentError) -> String {
    match error {
        AgentError::ToolExecutionFailed(message) => message,
        other => other.to_string(),
    }
}
