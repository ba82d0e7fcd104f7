//! 调度请求的线上形状与 JSON Schema（schemars 生成）

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 查询请求：{agentId, userId, query, toolParams?}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub agent_id: String,
    pub user_id: String,
    /// 自然语言查询
    pub query: String,
    /// 透传给 Agent 的附加参数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_params: Option<Value>,
}

/// 工具执行请求：{toolId, action, params, userId}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    pub tool_id: String,
    /// 动作名，必须在该 Tool 的动作目录内
    pub action: String,
    #[serde(default)]
    pub params: Value,
    pub user_id: String,
}

pub fn query_request_schema() -> Value {
    serde_json::to_value(schema_for!(QueryRequest)).unwrap_or(Value::Null)
}

pub fn tool_request_schema() -> Value {
    serde_json::to_value(schema_for!(ToolRequest)).unwrap_or(Value::Null)
}

/// 两种请求的 Schema，按名称组织（CLI schema 命令输出）
pub fn request_schemas_json() -> String {
    let schemas = serde_json::json!({
        "query": query_request_schema(),
        "executeTool": tool_request_schema(),
    });
    serde_json::to_string_pretty(&schemas).unwrap_or_else(|_| String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_are_camel_case() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"agentId":"a1","userId":"u1","query":"hi","toolParams":{"limit":2}}"#).unwrap();
        assert_eq!(req.agent_id, "a1");
        assert_eq!(req.tool_params.unwrap()["limit"], 2);

        let req: ToolRequest = serde_json::from_str(r#"{"toolId":"t1","action":"info","userId":"u1"}"#).unwrap();
        assert!(req.params.is_null());
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = query_request_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"agentId"));
        assert!(required.contains(&"query"));
        assert!(!required.contains(&"toolParams"));
        assert!(request_schemas_json().contains("executeTool"));
    }
}
