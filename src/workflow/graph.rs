//! 工作流依赖图
//!
//! 使用邻接表和入度表校验任务 DAG（悬空依赖、环），并计算当前可执行的任务集合

use std::collections::{HashMap, HashSet, VecDeque};

use crate::workflow::types::*;

/// 工作流依赖图
pub struct WorkflowGraph {
    /// 按计划顺序的任务 ID
    order: Vec<TaskId>,
    /// 邻接表：任务 ID -> 依赖该任务的任务列表
    pub adjacency: HashMap<TaskId, Vec<TaskId>>,
    /// 入度表：任务 ID -> 可解析的依赖数
    pub in_degree: HashMap<TaskId, usize>,
    /// (任务, 不存在于本工作流的依赖)
    pub dangling: Vec<(TaskId, TaskId)>,
}

impl WorkflowGraph {
    /// 创建依赖图
    pub fn new(tasks: &[Task]) -> Self {
        let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        let mut adjacency: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut in_degree: HashMap<TaskId, usize> = HashMap::new();
        let mut dangling = Vec::new();

        for task in tasks {
            in_degree.insert(task.id.clone(), 0);
            adjacency.entry(task.id.clone()).or_default();
        }

        for task in tasks {
            for dep_id in &task.dependencies {
                if ids.contains(dep_id.as_str()) {
                    adjacency.entry(dep_id.clone()).or_default().push(task.id.clone());
                    *in_degree.entry(task.id.clone()).or_insert(0) += 1;
                } else {
                    dangling.push((task.id.clone(), dep_id.clone()));
                }
            }
        }

        Self {
            order: tasks.iter().map(|t| t.id.clone()).collect(),
            adjacency,
            in_degree,
            dangling,
        }
    }

    /// Kahn 拓扑排序；存在环时返回 CyclicDependency
    pub fn topological_order(&self) -> Result<Vec<TaskId>, WorkflowError> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<TaskId> = self
            .order
            .iter()
            .filter(|id| in_degree.get(*id) == Some(&0))
            .cloned()
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(id) = queue.pop_front() {
            if let Some(dependents) = self.adjacency.get(&id) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent.clone());
                        }
                    }
                }
            }
            sorted.push(id);
        }

        if sorted.len() == self.order.len() {
            Ok(sorted)
        } else {
            Err(WorkflowError::CyclicDependency)
        }
    }

    /// 可执行任务：Pending 且所有依赖都存在并已 Completed，保持计划顺序。
    /// 悬空依赖永远不满足，这样的任务不会被调度。
    pub fn ready_tasks(tasks: &[Task]) -> Vec<Task> {
        let status: HashMap<&str, TaskStatus> =
            tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();

        tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
            .filter(|task| {
                task.dependencies
                    .iter()
                    .all(|dep| status.get(dep.as_str()) == Some(&TaskStatus::Completed))
            })
            .cloned()
            .collect()
    }

    /// 移除依赖无法在本列表内解析的任务（传递地：被移除任务的下游也会被移除）。
    /// 返回 (保留的任务, 被移除的任务 ID)
    pub fn prune_unresolved(tasks: Vec<Task>) -> (Vec<Task>, Vec<TaskId>) {
        let mut kept = tasks;
        let mut removed = Vec::new();

        loop {
            let ids: HashSet<TaskId> = kept.iter().map(|t| t.id.clone()).collect();
            let (resolved, orphaned): (Vec<Task>, Vec<Task>) = kept
                .into_iter()
                .partition(|t| t.dependencies.iter().all(|d| ids.contains(d)));
            kept = resolved;
            if orphaned.is_empty() {
                break;
            }
            removed.extend(orphaned.into_iter().map(|t| t.id));
        }

        (kept, removed)
    }
}
