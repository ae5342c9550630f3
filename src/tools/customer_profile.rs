//! 客户档案分析工具：customer_profile_analysis
//!
//! 推荐模板的第一步。读取记忆存储中的档案；没有客户 ID 或档案不存在时返回匿名默认偏好。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::memory::{Insights, MemoryStore, Preferences};
use crate::tools::schema::parameters_schema;
use crate::tools::{Tool, ToolCategory, ToolOutput};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CustomerProfileParams {
    /// Customer ID
    pub customer_id: Option<String>,
    /// Session context captured at planning time
    pub session_context: Option<Value>,
}

pub struct CustomerProfileTool {
    memory: Arc<MemoryStore>,
}

impl CustomerProfileTool {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for CustomerProfileTool {
    fn name(&self) -> &str {
        "customer_profile_analysis"
    }

    fn description(&self) -> &str {
        "Gather customer preferences, requirements and derived insights"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Database
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<CustomerProfileParams>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let params: CustomerProfileParams =
            serde_json::from_value(args).map_err(|e| format!("Invalid parameters: {e}"))?;

        let profile = match params.customer_id.as_deref() {
            Some(id) => self.memory.get_customer_profile(id).await,
            None => None,
        };

        let data = match profile {
            Some(profile) => json!({
                "customer_id": profile.id,
                "anonymous": false,
                "preferences": profile.preferences,
                "insights": profile.insights,
                "purchase_count": profile.purchase_history.len(),
                "session_context": params.session_context,
            }),
            None => json!({
                "customer_id": params.customer_id,
                "anonymous": true,
                "preferences": Preferences::default(),
                "insights": Insights::default(),
                "purchase_count": 0,
                "session_context": params.session_context,
            }),
        };
        Ok(ToolOutput::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_without_profile() {
        let tool = CustomerProfileTool::new(Arc::new(MemoryStore::default()));
        let output = tool
            .execute(json!({"customer_id": null, "session_context": {}}))
            .await
            .unwrap();
        assert_eq!(output.data["anonymous"], true);
    }

    #[tokio::test]
    async fn test_reads_stored_profile() {
        let memory = Arc::new(MemoryStore::default());
        memory
            .update_customer_profile("c1", |p| p.preferences.primary_use = Some("gaming".into()))
            .await;
        let tool = CustomerProfileTool::new(memory);

        let output = tool.execute(json!({"customer_id": "c1"})).await.unwrap();
        assert_eq!(output.data["anonymous"], false);
        assert_eq!(output.data["preferences"]["primary_use"], "gaming");
    }
}
