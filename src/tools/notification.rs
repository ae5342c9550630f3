//! 通知工具：send_notification
//!
//! 不做真实投递，只记录日志并返回一份合成回执。

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::tools::schema::parameters_schema;
use crate::tools::{Tool, ToolCategory, ToolOutput};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NotificationParams {
    /// Customer ID
    pub customer_id: Option<String>,
    /// Notification type (email / sms / push, or a purpose tag such as purchase_guidance)
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Message content
    pub message: Option<String>,
    /// Subject line (for email)
    pub subject: Option<String>,
}

pub struct NotificationTool;

#[async_trait]
impl Tool for NotificationTool {
    fn name(&self) -> &str {
        "send_notification"
    }

    fn description(&self) -> &str {
        "Send notifications to customers (email, SMS, push)"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Communication
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<NotificationParams>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, String> {
        let params: NotificationParams =
            serde_json::from_value(args).map_err(|e| format!("Invalid parameters: {e}"))?;
        let now = Utc::now();

        info!(
            customer_id = params.customer_id.as_deref().unwrap_or("anonymous"),
            kind = params.kind.as_deref().unwrap_or("email"),
            subject = params.subject.as_deref().unwrap_or_default(),
            message = params.message.as_deref().unwrap_or_default(),
            "Sending notification"
        );

        Ok(ToolOutput::new(json!({
            "notification_id": format!("notif_{}", now.timestamp_millis()),
            "status": "sent",
            "delivered_at": now.to_rfc3339(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receipt() {
        let output = NotificationTool
            .execute(json!({"type": "purchase_guidance", "customer_id": null}))
            .await
            .unwrap();
        assert_eq!(output.data["status"], "sent");
        assert!(output.data["notification_id"]
            .as_str()
            .unwrap()
            .starts_with("notif_"));
    }
}
