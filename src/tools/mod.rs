pub mod catalog;
pub mod customer_profile;
pub mod executor;
pub mod notification;
pub mod phone_search;
pub mod price_comparison;
pub mod recommendation;
pub mod registry;
pub mod review_analysis;
pub mod schema;

use std::sync::Arc;

pub use catalog::{CatalogPage, HttpCatalog, InMemoryCatalog, Phone, PhoneCatalog, PhoneQuery, PriceRange};
pub use customer_profile::CustomerProfileTool;
pub use executor::ToolExecutor;
pub use notification::NotificationTool;
pub use phone_search::PhoneSearchTool;
pub use price_comparison::PriceComparisonTool;
pub use recommendation::RecommendationTool;
pub use registry::{Tool, ToolCategory, ToolDefinition, ToolOutput, ToolRegistry, ToolResult};
pub use review_analysis::ReviewAnalysisTool;
pub use schema::parameters_schema;

use crate::memory::MemoryStore;

/// 注册内置工具（五个目录 / 比价 / 评论 / 推荐 / 通知工具，加客户档案分析）
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    catalog: Arc<dyn PhoneCatalog>,
    memory: Arc<MemoryStore>,
    default_retailers: Vec<String>,
) {
    registry.register(PhoneSearchTool::new(catalog.clone()));
    registry.register(PriceComparisonTool::new(default_retailers));
    registry.register(ReviewAnalysisTool);
    registry.register(RecommendationTool::new(catalog));
    registry.register(NotificationTool);
    registry.register(CustomerProfileTool::new(memory));
}
