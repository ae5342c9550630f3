//! 引擎构建器：统一的 DecisionEngine 初始化逻辑
//!
//! REPL、HTTP 服务与测试都经由这里组装记忆存储、商品目录、工具表、规划器与执行器，
//! 保证各入口使用同一套工具和阈值。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{AgentError, DecisionEngine};
use crate::intent::{IntentClassifier, KeywordIntentClassifier};
use crate::memory::{MemoryStore, SnapshotFile};
use crate::tools::{
    register_builtin_tools, HttpCatalog, InMemoryCatalog, PhoneCatalog, Tool, ToolExecutor,
    ToolRegistry,
};
use crate::workflow::{RetryPolicy, TaskPlanner, WorkflowExecutor};

pub struct EngineBuilder {
    config: AppConfig,
    catalog: Option<Arc<dyn PhoneCatalog>>,
    classifier: Option<Arc<dyn IntentClassifier>>,
    memory: Option<Arc<MemoryStore>>,
    extra_tools: Vec<Arc<dyn Tool>>,
    retry: Option<RetryPolicy>,
}

impl EngineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            catalog: None,
            classifier: None,
            memory: None,
            extra_tools: Vec::new(),
            retry: None,
        }
    }

    /// 替换商品目录（默认：配置了 catalog_endpoint 用 HTTP，否则用内置目录）
    pub fn with_catalog(mut self, catalog: Arc<dyn PhoneCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// 追加工具；与内置工具同名时覆盖内置实现
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.extra_tools.push(Arc::new(tool));
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn build_memory(&self) -> Arc<MemoryStore> {
        let capacity = self.config.memory.short_term_capacity;
        match &self.config.memory.snapshot_path {
            Some(path) => Arc::new(MemoryStore::with_snapshot(capacity, SnapshotFile::new(path))),
            None => Arc::new(MemoryStore::new(capacity)),
        }
    }

    fn build_catalog(&self) -> Result<Arc<dyn PhoneCatalog>, AgentError> {
        let tools = &self.config.tools;
        Ok(match &tools.catalog_endpoint {
            Some(endpoint) => {
                tracing::info!(endpoint = %endpoint, "Using HTTP phone catalog");
                Arc::new(HttpCatalog::new(endpoint, tools.catalog_timeout_secs)?)
            }
            None => Arc::new(InMemoryCatalog::seeded()),
        })
    }

    pub fn build(self) -> Result<DecisionEngine, AgentError> {
        let memory = match &self.memory {
            Some(memory) => memory.clone(),
            None => self.build_memory(),
        };
        let catalog = match &self.catalog {
            Some(catalog) => catalog.clone(),
            None => self.build_catalog()?,
        };

        let mut registry = ToolRegistry::new();
        register_builtin_tools(
            &mut registry,
            catalog,
            memory.clone(),
            self.config.tools.default_retailers.clone(),
        );
        for tool in self.extra_tools {
            registry.register_arc(tool);
        }
        let tools = Arc::new(ToolExecutor::new(
            Arc::new(registry),
            self.config.tools.tool_timeout_secs,
        ));

        let executor_cfg = &self.config.executor;
        let retry = self.retry.unwrap_or_else(|| {
            RetryPolicy::new(
                Duration::from_millis(executor_cfg.retry_base_delay_ms),
                Duration::from_millis(executor_cfg.retry_max_delay_ms),
            )
        });
        let planner = Arc::new(TaskPlanner::new());
        let executor = WorkflowExecutor::new(planner.clone(), tools.clone())
            .with_retry_policy(retry)
            .with_max_waves(executor_cfg.max_waves);

        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(KeywordIntentClassifier::new()));

        Ok(DecisionEngine::from_parts(
            self.config,
            classifier,
            memory,
            planner,
            tools,
            executor,
        ))
    }
}

/// 便捷函数：从默认路径加载配置并创建 EngineBuilder
pub fn create_engine_builder(config_path: Option<PathBuf>) -> EngineBuilder {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    EngineBuilder::new(config)
}
