//! 任务构建器
//!
//! 提供流畅的 API 来构建任务模板中的 Task

use chrono::Utc;
use serde_json::Value;

use crate::workflow::types::*;

/// 任务构建器
pub struct TaskBuilder {
    id: TaskId,
    task_type: String,
    tool: String,
    description: String,
    priority: u8,
    dependencies: Vec<TaskId>,
    parameters: Value,
    max_retries: u32,
    estimated_duration: u32,
}

impl TaskBuilder {
    /// 创建新的任务构建器（默认优先级 5、不重试、预估 1 分钟）
    pub fn new(id: impl Into<TaskId>, task_type: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            tool: tool.into(),
            description: String::new(),
            priority: 5,
            dependencies: Vec::new(),
            parameters: Value::Object(Default::default()),
            max_retries: 0,
            estimated_duration: 1,
        }
    }

    /// 设置描述
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// 设置优先级（限定在 1-10）
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    /// 设置 AND 依赖（所有前置任务完成后才可执行）
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 预估耗时（分钟）
    pub fn estimated_minutes(mut self, minutes: u32) -> Self {
        self.estimated_duration = minutes;
        self
    }

    /// 构建任务，初始状态为 Pending
    pub fn build(self) -> Task {
        Task {
            id: self.id,
            task_type: self.task_type,
            description: self.description,
            priority: self.priority,
            dependencies: self.dependencies,
            status: TaskStatus::Pending,
            tool: self.tool,
            parameters: self.parameters,
            retry_count: 0,
            max_retries: self.max_retries,
            estimated_duration: self.estimated_duration,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_task_with_dependencies() {
        let task = TaskBuilder::new("task_2", "database_search", "phone_database_search")
            .description("Search phone database")
            .priority(8)
            .depends_on(["task_1"])
            .max_retries(3)
            .estimated_minutes(2)
            .build();

        assert_eq!(task.id, "task_2");
        assert_eq!(task.dependencies, vec!["task_1".to_string()]);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.max_retries, 3);
        assert!(task.parameters.is_object());
    }

    #[test]
    fn test_priority_is_clamped() {
        let task = TaskBuilder::new("t", "x", "echo").priority(42).build();
        assert_eq!(task.priority, 10);
        let task = TaskBuilder::new("t", "x", "echo").priority(0).build();
        assert_eq!(task.priority, 1);
    }
}
