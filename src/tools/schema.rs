//! 工具参数 JSON Schema 生成（schemars）

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 由参数结构体生成 JSON Schema，供 ToolDefinition 展示
pub fn parameters_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}
