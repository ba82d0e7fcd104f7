//! Tool 契约与动作校验
//!
//! 每个 Tool 声明动作目录（名称、描述、参数 schema）。execute(action, params) 的顺序固定：
//! 1. 未知动作 -> ActionNotFound
//! 2. 缺少必填参数 -> MissingParameter；类型不符 -> InvalidParameter；缺省的可选参数补上默认值
//! 3. info 由契约层直接回答，其余交给具体 Tool 的 invoke
//!
//! 前两步不触达任何外部协作方，因此校验失败不会留下部分副作用。

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::{DockError, DockResult};

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }

    fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

/// 单个参数的声明
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// 动作声明：名称、描述、参数表
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// 每个 Tool 都有的 info 动作
    pub fn info() -> Self {
        Self::new("info", "Get information about this tool")
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// 按 schema 校验并补默认值
    ///
    /// 必填参数显式给出 null 算作已提供，由类型检查拒绝（InvalidParameter）；
    /// 可选参数给 null 等同于未提供，取默认值。
    pub fn validate(&self, params: &Value) -> DockResult<ActionParams> {
        let mut values = match params {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(DockError::InvalidParameter {
                    action: self.name.clone(),
                    parameter: "params".into(),
                    expected: "object".into(),
                })
            }
        };
        for spec in &self.parameters {
            if !spec.required && values.get(&spec.name).is_some_and(Value::is_null) {
                values.remove(&spec.name);
            }
            match values.get(&spec.name) {
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(DockError::InvalidParameter {
                        action: self.name.clone(),
                        parameter: spec.name.clone(),
                        expected: spec.kind.to_string(),
                    });
                }
                Some(_) => {}
                None if spec.required => {
                    return Err(DockError::MissingParameter {
                        action: self.name.clone(),
                        parameter: spec.name.clone(),
                    });
                }
                None => {
                    if let Some(default) = &spec.default {
                        values.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(ActionParams {
            action: self.name.clone(),
            values,
        })
    }

    /// 参数的 JSON Schema（写进 prompt 的 Available tools 段落）
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                let mut prop = json!({ "type": p.kind.json_type(), "description": p.description });
                if let Some(default) = &p.default {
                    prop["default"] = default.clone();
                }
                (p.name.clone(), prop)
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({ "type": "object", "properties": properties, "required": required })
    }
}

/// 通过校验的参数；取值方法在类型不符时返回 InvalidParameter
#[derive(Debug, Clone, PartialEq)]
pub struct ActionParams {
    action: String,
    values: Map<String, Value>,
}

impl ActionParams {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    fn invalid(&self, key: &str, expected: &str) -> DockError {
        DockError::InvalidParameter {
            action: self.action.clone(),
            parameter: key.to_string(),
            expected: expected.to_string(),
        }
    }

    fn missing(&self, key: &str) -> DockError {
        DockError::MissingParameter {
            action: self.action.clone(),
            parameter: key.to_string(),
        }
    }

    pub fn str(&self, key: &str) -> DockResult<&str> {
        self.opt_str(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn opt_str(&self, key: &str) -> DockResult<Option<&str>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| self.invalid(key, "string")),
        }
    }

    pub fn u64(&self, key: &str) -> DockResult<u64> {
        self.opt_u64(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn opt_u64(&self, key: &str) -> DockResult<Option<u64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| self.invalid(key, "non-negative integer")),
        }
    }

    pub fn opt_i64(&self, key: &str) -> DockResult<Option<i64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| self.invalid(key, "integer")),
        }
    }

    pub fn opt_str_list(&self, key: &str) -> DockResult<Option<Vec<String>>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(String::from).ok_or_else(|| self.invalid(key, "array of strings")))
                .collect::<DockResult<Vec<_>>>()
                .map(Some),
            Some(_) => Err(self.invalid(key, "array of strings")),
        }
    }
}

/// 与 Provider 无关的统一输出结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data }
    }

    /// 把可序列化的 Provider 结果放进 data
    pub fn from_serialize<T: Serialize>(data: &T) -> DockResult<Self> {
        serde_json::to_value(data)
            .map(Self::ok)
            .map_err(|e| DockError::DispatchFailure(format!("failed to serialize tool output: {e}")))
    }
}

/// Tool trait：声明动作目录；invoke 只会收到已通过校验的动作与参数
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn actions(&self) -> &[ActionSpec];

    /// 执行具体动作（info 之外）；动作名保证在目录内
    async fn invoke(&self, action: &str, params: ActionParams) -> DockResult<ToolOutput>;

    /// 注销时释放资源；未持有资源时也必须可安全调用
    fn cleanup(&self) {
        tracing::info!("Cleaning up tool: {}", self.name());
    }

    async fn execute(&self, action: &str, params: &Value) -> DockResult<ToolOutput> {
        tracing::info!("Executing action {} on tool {}", action, self.name());
        let spec = self
            .actions()
            .iter()
            .find(|a| a.name == action)
            .ok_or_else(|| DockError::ActionNotFound {
                tool: self.name().to_string(),
                action: action.to_string(),
            })?;
        let params = spec.validate(params)?;
        if action == "info" {
            return Ok(info_output(self.name(), self.description(), self.actions()));
        }
        self.invoke(action, params).await
    }
}

/// info 动作的输出：名称、描述与动作列表
pub fn info_output(name: &str, description: &str, actions: &[ActionSpec]) -> ToolOutput {
    ToolOutput::ok(json!({
        "name": name,
        "description": description,
        "actions": actions
            .iter()
            .map(|a| json!({ "name": a.name, "description": a.description }))
            .collect::<Vec<_>>(),
    }))
}

/// 外部协作方错误：记录后包上操作上下文（如 "Failed to create Jira issue"）
pub fn provider_error(context: &'static str) -> impl FnOnce(DockError) -> DockError {
    move |e| {
        tracing::error!("{}: {}", context, e);
        DockError::external(context, e)
    }
}

/// 目录内但 invoke 未处理的动作
pub fn unimplemented_action(tool: &str, action: &str) -> DockError {
    DockError::ActionNotFound {
        tool: tool.to_string(),
        action: action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_issue() -> ActionSpec {
        ActionSpec::new("createIssue", "Create a new issue")
            .param(ParamSpec::required("summary", ParamType::String, "Issue summary"))
            .param(ParamSpec::required("issueType", ParamType::String, "Issue type name"))
            .param(ParamSpec::optional("maxResults", ParamType::Number, "Limit").with_default(json!(20)))
    }

    #[test]
    fn test_missing_required_parameter() {
        let err = create_issue().validate(&json!({"summary": "x"})).unwrap_err();
        assert!(matches!(
            err,
            DockError::MissingParameter { ref action, ref parameter } if action == "createIssue" && parameter == "issueType"
        ));
    }

    #[test]
    fn test_type_mismatch_and_null() {
        let err = create_issue()
            .validate(&json!({"summary": 42, "issueType": "Bug"}))
            .unwrap_err();
        assert!(matches!(err, DockError::InvalidParameter { ref parameter, .. } if parameter == "summary"));

        // 显式 null 的必填参数是类型错误而不是缺失
        let err = create_issue()
            .validate(&json!({"summary": "x", "issueType": null}))
            .unwrap_err();
        assert!(matches!(
            err,
            DockError::InvalidParameter { ref parameter, ref expected, .. } if parameter == "issueType" && expected == "string"
        ));

        let params = create_issue()
            .validate(&json!({"summary": "x", "issueType": "Bug", "maxResults": null}))
            .unwrap();
        assert_eq!(params.u64("maxResults").unwrap(), 20);

        assert!(create_issue().validate(&json!("nope")).is_err());
    }

    #[test]
    fn test_defaults_applied_and_extras_kept() {
        let params = create_issue()
            .validate(&json!({"summary": "x", "issueType": "Bug", "labels": ["a"]}))
            .unwrap();
        assert_eq!(params.u64("maxResults").unwrap(), 20);
        assert_eq!(params.str("summary").unwrap(), "x");
        assert_eq!(params.opt_str_list("labels").unwrap(), Some(vec!["a".to_string()]));
        assert!(params.opt_str("priority").unwrap().is_none());
    }

    #[test]
    fn test_parameters_schema() {
        let schema = create_issue().parameters_schema();
        assert_eq!(schema["properties"]["summary"]["type"], "string");
        assert_eq!(schema["properties"]["maxResults"]["default"], 20);
        assert_eq!(schema["required"], json!(["summary", "issueType"]));
    }
}
