//! 手机库检索工具：phone_database_search

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::catalog::{PhoneCatalog, PhoneQuery};
use crate::tools::schema::parameters_schema;
use crate::tools::{Tool, ToolCategory, ToolOutput};

pub struct PhoneSearchTool {
    catalog: Arc<dyn PhoneCatalog>,
}

impl PhoneSearchTool {
    pub fn new(catalog: Arc<dyn PhoneCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for PhoneSearchTool {
    fn name(&self) -> &str {
        "phone_database_search"
    }

    fn description(&self) -> &str {
        "Search and filter mobile phones in the database"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Database
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<PhoneQuery>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        // 不认识的字段（如 customer_context）直接忽略
        let query: PhoneQuery = serde_json::from_value(args.clone())
            .map_err(|e| format!("Invalid parameters: {e}"))?;
        let page = self
            .catalog
            .search(&query)
            .await
            .map_err(|e| e.to_string())?;

        let phones = serde_json::to_value(&page.phones).map_err(|e| e.to_string())?;
        Ok(ToolOutput::new(phones).with_metadata(json!({
            "total": page.total,
            "filters_applied": args,
        })))
    }
}
