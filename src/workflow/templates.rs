//! 任务模板
//!
//! 按意图文本中的关键词选择固定的任务 DAG。匹配按声明顺序进行，先命中者生效。

use serde_json::{json, Value};

use crate::workflow::planner::PlanningContext;
use crate::workflow::{Task, TaskBuilder};

/// 预置的工作流模板
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowTemplate {
    /// 偏好收集 -> 商品检索 -> 生成推荐 -> 评论与价格补充
    Recommendation,
    /// 机型识别 -> 多零售商比价
    PriceComparison,
    /// 机型识别 -> {评论分析, 价格分析}（两者仅依赖识别任务）
    Analysis,
    /// 最终推荐 -> 购买渠道 -> 购买指引通知
    PurchaseJourney,
    /// 当前机型分析 -> 升级推荐
    UpgradePath,
    /// 单任务检索
    InformationGathering,
}

const TEMPLATE_KEYWORDS: &[(WorkflowTemplate, &[&str])] = &[
    (
        WorkflowTemplate::Recommendation,
        &["recommend", "suggest", "find phone"],
    ),
    (WorkflowTemplate::PriceComparison, &["price", "compare cost"]),
    (
        WorkflowTemplate::Analysis,
        &["analyze", "review", "pros and cons"],
    ),
    (
        WorkflowTemplate::PurchaseJourney,
        &["buy", "purchase", "order"],
    ),
    (
        WorkflowTemplate::UpgradePath,
        &["upgrade", "switch", "new phone"],
    ),
];

impl WorkflowTemplate {
    /// 根据意图文本选择模板（大小写不敏感）
    pub fn select(intent: &str) -> Self {
        let intent = intent.to_lowercase();
        TEMPLATE_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| intent.contains(k)))
            .map(|(template, _)| *template)
            .unwrap_or(Self::InformationGathering)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Recommendation => "recommendation",
            Self::PriceComparison => "price_comparison",
            Self::Analysis => "analysis",
            Self::PurchaseJourney => "purchase_journey",
            Self::UpgradePath => "upgrade_path",
            Self::InformationGathering => "information_gathering",
        }
    }

    /// 生成模板任务列表（未截断）。空对象参数是占位，执行器按原样传给工具。
    pub fn tasks(self, ctx: &PlanningContext) -> Vec<Task> {
        match self {
            Self::Recommendation => recommendation_tasks(ctx),
            Self::PriceComparison => price_comparison_tasks(ctx),
            Self::Analysis => analysis_tasks(ctx),
            Self::PurchaseJourney => purchase_journey_tasks(ctx),
            Self::UpgradePath => upgrade_path_tasks(ctx),
            Self::InformationGathering => information_gathering_tasks(ctx),
        }
    }
}

fn task_id(n: usize) -> String {
    format!("task_{n}")
}

fn placeholder() -> Value {
    json!({})
}

fn recommendation_tasks(ctx: &PlanningContext) -> Vec<Task> {
    let recommendation_params = match &ctx.customer_profile {
        Some(profile) => json!({ "customer_profile": profile }),
        None => placeholder(),
    };

    vec![
        TaskBuilder::new(task_id(1), "data_gathering", "customer_profile_analysis")
            .description("Gather customer preferences and requirements")
            .priority(9)
            .parameters(json!({
                "customer_id": ctx.customer_id,
                "session_context": ctx.current_context(),
            }))
            .max_retries(2)
            .estimated_minutes(1)
            .build(),
        TaskBuilder::new(task_id(2), "database_search", "phone_database_search")
            .description("Search phone database based on requirements")
            .priority(8)
            .depends_on([task_id(1)])
            .parameters(placeholder())
            .max_retries(3)
            .estimated_minutes(2)
            .build(),
        TaskBuilder::new(task_id(3), "recommendation", "generate_recommendations")
            .description("Generate personalized recommendations")
            .priority(9)
            .depends_on([task_id(1), task_id(2)])
            .parameters(recommendation_params)
            .max_retries(2)
            .estimated_minutes(3)
            .build(),
        TaskBuilder::new(task_id(4), "enhancement", "review_analysis")
            .description("Add review analysis and pricing info")
            .priority(6)
            .depends_on([task_id(3)])
            .parameters(placeholder())
            .max_retries(2)
            .estimated_minutes(2)
            .build(),
    ]
}

fn price_comparison_tasks(ctx: &PlanningContext) -> Vec<Task> {
    vec![
        TaskBuilder::new(task_id(1), "phone_identification", "phone_database_search")
            .description("Identify phones to compare prices for")
            .priority(8)
            .parameters(json!({
                "query": ctx.phone_query.as_deref().unwrap_or("latest phones"),
            }))
            .max_retries(2)
            .estimated_minutes(2)
            .build(),
        TaskBuilder::new(task_id(2), "price_comparison", "price_comparison")
            .description("Compare prices across retailers")
            .priority(9)
            .depends_on([task_id(1)])
            .parameters(placeholder())
            .max_retries(3)
            .estimated_minutes(3)
            .build(),
    ]
}

fn analysis_tasks(ctx: &PlanningContext) -> Vec<Task> {
    vec![
        TaskBuilder::new(task_id(1), "phone_identification", "phone_database_search")
            .description("Identify phone to analyze")
            .priority(8)
            .parameters(json!({ "query": ctx.phone_query }))
            .max_retries(2)
            .estimated_minutes(1)
            .build(),
        TaskBuilder::new(task_id(2), "review_analysis", "review_analysis")
            .description("Analyze customer reviews and sentiment")
            .priority(7)
            .depends_on([task_id(1)])
            .parameters(json!({ "sentiment_analysis": true }))
            .max_retries(2)
            .estimated_minutes(4)
            .build(),
        TaskBuilder::new(task_id(3), "price_analysis", "price_comparison")
            .description("Analyze pricing and value proposition")
            .priority(6)
            .depends_on([task_id(1)])
            .parameters(placeholder())
            .max_retries(2)
            .estimated_minutes(2)
            .build(),
    ]
}

fn purchase_journey_tasks(ctx: &PlanningContext) -> Vec<Task> {
    vec![
        TaskBuilder::new(task_id(1), "final_recommendation", "generate_recommendations")
            .description("Confirm final phone choice")
            .priority(9)
            .parameters(json!({
                "customer_profile": ctx.customer_profile,
                "final_selection": true,
            }))
            .max_retries(2)
            .estimated_minutes(2)
            .build(),
        TaskBuilder::new(task_id(2), "retailer_search", "price_comparison")
            .description("Find best purchase options")
            .priority(8)
            .depends_on([task_id(1)])
            .parameters(placeholder())
            .max_retries(3)
            .estimated_minutes(3)
            .build(),
        TaskBuilder::new(task_id(3), "purchase_assistance", "send_notification")
            .description("Provide purchase guidance and next steps")
            .priority(7)
            .depends_on([task_id(2)])
            .parameters(json!({
                "type": "purchase_guidance",
                "customer_id": ctx.customer_id,
            }))
            .max_retries(2)
            .estimated_minutes(1)
            .build(),
    ]
}

fn upgrade_path_tasks(ctx: &PlanningContext) -> Vec<Task> {
    vec![
        TaskBuilder::new(task_id(1), "current_phone_analysis", "phone_database_search")
            .description("Analyze current phone capabilities")
            .priority(8)
            .parameters(json!({
                "query": ctx.current_phone.as_deref().unwrap_or("analyze upgrade"),
            }))
            .max_retries(2)
            .estimated_minutes(2)
            .build(),
        TaskBuilder::new(task_id(2), "upgrade_recommendations", "generate_recommendations")
            .description("Generate upgrade recommendations")
            .priority(9)
            .depends_on([task_id(1)])
            .parameters(json!({ "upgrade_analysis": true }))
            .max_retries(2)
            .estimated_minutes(3)
            .build(),
    ]
}

fn information_gathering_tasks(ctx: &PlanningContext) -> Vec<Task> {
    vec![
        TaskBuilder::new(task_id(1), "general_search", "phone_database_search")
            .description("Search for relevant phone information")
            .priority(7)
            .parameters(json!({ "query": ctx.user_intent }))
            .max_retries(2)
            .estimated_minutes(2)
            .build(),
    ]
}
