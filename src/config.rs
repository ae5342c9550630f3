//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `JAD__*` 覆盖（双下划线表示嵌套，如 `JAD__PLANNER__MAX_TASKS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub executor: ExecutorSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub memory: MemorySection,
    #[serde(default)]
    pub server: ServerSection,
}

/// [engine] 段：决策分支的置信度阈值
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// 高于此值的问候类意图直接回复
    #[serde(default = "default_direct_response_threshold")]
    pub direct_response_threshold: f64,
    /// 推荐 / 对比意图高于此值时规划工作流
    #[serde(default = "default_workflow_threshold")]
    pub workflow_threshold: f64,
    /// 价格 / 商品咨询高于此值时单次调用工具
    #[serde(default = "default_tool_threshold")]
    pub tool_threshold: f64,
    /// 低于此值时追问澄清
    #[serde(default = "default_clarify_threshold")]
    pub clarify_threshold: f64,
    #[serde(default = "default_max_follow_up_questions")]
    pub max_follow_up_questions: usize,
}

fn default_direct_response_threshold() -> f64 {
    0.8
}

fn default_workflow_threshold() -> f64 {
    0.6
}

fn default_tool_threshold() -> f64 {
    0.5
}

fn default_clarify_threshold() -> f64 {
    0.5
}

fn default_max_follow_up_questions() -> usize {
    3
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            direct_response_threshold: default_direct_response_threshold(),
            workflow_threshold: default_workflow_threshold(),
            tool_threshold: default_tool_threshold(),
            clarify_threshold: default_clarify_threshold(),
            max_follow_up_questions: default_max_follow_up_questions(),
        }
    }
}

/// [planner] 段：规划约束
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
    /// 工作流整体时长预算（分钟），run-to-completion 模式下作为截止时间
    #[serde(default = "default_max_duration_minutes")]
    pub max_duration_minutes: u64,
}

fn default_max_tasks() -> usize {
    5
}

fn default_max_duration_minutes() -> u64 {
    10
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_tasks: default_max_tasks(),
            max_duration_minutes: default_max_duration_minutes(),
        }
    }
}

/// [executor] 段：波次上限与重试退避
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_max_waves")]
    pub max_waves: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_max_waves() -> usize {
    16
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    5_000
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_waves: default_max_waves(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// [tools] 段：工具超时、商品库端点、默认比价零售商
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 商品库搜索服务的根地址；未设置时使用内置目录
    pub catalog_endpoint: Option<String>,
    #[serde(default = "default_catalog_timeout_secs")]
    pub catalog_timeout_secs: u64,
    #[serde(default = "default_retailers")]
    pub default_retailers: Vec<String>,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_catalog_timeout_secs() -> u64 {
    10
}

fn default_retailers() -> Vec<String> {
    vec![
        "Best Buy".into(),
        "Amazon".into(),
        "Apple Store".into(),
        "Carrier Direct".into(),
    ]
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            catalog_endpoint: None,
            catalog_timeout_secs: default_catalog_timeout_secs(),
            default_retailers: default_retailers(),
        }
    }
}

/// [memory] 段：短期记忆容量与快照文件
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_short_term_capacity")]
    pub short_term_capacity: usize,
    /// 设置后，客户档案与会话记忆会镜像到该 JSON 文件
    pub snapshot_path: Option<PathBuf>,
}

fn default_short_term_capacity() -> usize {
    20
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            short_term_capacity: default_short_term_capacity(),
            snapshot_path: None,
        }
    }
}

/// [server] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 JAD__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 JAD__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("JAD")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.planner.max_tasks, 5);
        assert_eq!(cfg.planner.max_duration_minutes, 10);
        assert_eq!(cfg.memory.short_term_capacity, 20);
        assert_eq!(cfg.tools.default_retailers.len(), 4);
        assert!(cfg.tools.catalog_endpoint.is_none());
        assert!((cfg.engine.workflow_threshold - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jad.toml");
        std::fs::write(
            &path,
            "[planner]\nmax_tasks = 3\n\n[tools]\ncatalog_endpoint = \"http://localhost:9000\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.planner.max_tasks, 3);
        assert_eq!(cfg.planner.max_duration_minutes, 10);
        assert_eq!(
            cfg.tools.catalog_endpoint.as_deref(),
            Some("http://localhost:9000")
        );
    }
}
