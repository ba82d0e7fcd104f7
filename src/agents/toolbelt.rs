//! Agent 持有的工具集合与 [TOOL_ACTION:tool:action:params] 标记执行
//!
//! 允许列表来自描述符的 tools 字段；空列表表示接受任意 Tool。
//! 标记参数是一段 JSON（可省略，等价于 {}），每个标记独立执行，失败只记在自己的结果里。

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::tools::Tool;

static MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn marker_re() -> &'static Regex {
    MARKER_RE.get_or_init(|| Regex::new(r"\[TOOL_ACTION:([^:\]\s]+):([^:\]\s]+):").unwrap())
}

/// 从回复文本中解析出的一次工具调用
#[derive(Debug, Clone, PartialEq)]
pub struct ToolActionMarker {
    pub tool: String,
    pub action: String,
    pub params: Value,
}

impl ToolActionMarker {
    /// toolResults 中的键
    pub fn key(&self) -> String {
        format!("{}.{}", self.tool, self.action)
    }
}

/// 按出现顺序解析全部标记；参数不是合法 JSON 的标记被跳过
pub fn parse_markers(text: &str) -> Vec<ToolActionMarker> {
    let mut markers = Vec::new();
    for caps in marker_re().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let tool = caps[1].to_string();
        let action = caps[2].to_string();
        let rest = text[whole.end()..].trim_start();

        let params = if rest.starts_with(']') {
            Value::Object(Map::new())
        } else {
            let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) if rest[stream.byte_offset()..].trim_start().starts_with(']') => value,
                _ => {
                    tracing::warn!("Skipping malformed TOOL_ACTION marker for {}.{}", tool, action);
                    continue;
                }
            }
        };
        markers.push(ToolActionMarker { tool, action, params });
    }
    markers
}

pub struct ToolBelt {
    allowed: Vec<String>,
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolBelt {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed,
            tools: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn accepts(&self, tool_id: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|id| id == tool_id)
    }

    /// 挂上 Tool；不在允许列表内时忽略并返回 false
    pub fn attach(&self, tool_id: &str, tool: Arc<dyn Tool>) -> bool {
        if !self.accepts(tool_id) {
            return false;
        }
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tool_id.to_string(), tool);
        true
    }

    pub fn detach(&self, tool_id: &str) -> bool {
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tool_id)
            .is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// 按 id 或名称（大小写不敏感）查找
    pub fn get(&self, key: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.get(key).cloned().or_else(|| {
            tools
                .values()
                .find(|t| t.name().eq_ignore_ascii_case(key))
                .cloned()
        })
    }

    /// prompt 中 Available tools 段落
    pub fn context(&self) -> String {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        if tools.is_empty() {
            return "No tools available.".to_string();
        }
        let mut out = String::new();
        for (id, tool) in tools.iter() {
            out.push_str(&format!("- {} (id: {}): {}\n", tool.name(), id, tool.description()));
            for action in tool.actions() {
                out.push_str(&format!(
                    "  - {}: {} {}\n",
                    action.name,
                    action.description,
                    action.parameters_schema()
                ));
            }
        }
        out
    }

    /// 依次执行回复中的标记，结果以 tool.action 为键
    pub async fn run_markers(&self, text: &str) -> Map<String, Value> {
        let mut results = Map::new();
        for marker in parse_markers(text) {
            let key = marker.key();
            let outcome = match self.get(&marker.tool) {
                None => json!({ "success": false, "error": format!("Tool {} is not attached", marker.tool) }),
                Some(tool) => match tool.execute(&marker.action, &marker.params).await {
                    Ok(output) => json!(output),
                    Err(e) => {
                        tracing::warn!("Tool action {} failed: {}", key, e);
                        json!({ "success": false, "error": e.to_string() })
                    }
                },
            };
            results.insert(key, outcome);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::GenericTool;

    #[test]
    fn test_parse_markers_with_and_without_params() {
        let text = r#"Sure. [TOOL_ACTION:jira:getIssue:{"issueKey": "OPS-1"}] and [TOOL_ACTION:slack:getChannels:] done"#;
        let markers = parse_markers(text);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].key(), "jira.getIssue");
        assert_eq!(markers[0].params["issueKey"], "OPS-1");
        assert_eq!(markers[1].params, json!({}));
    }

    #[test]
    fn test_parse_skips_malformed_params() {
        let markers = parse_markers("[TOOL_ACTION:jira:getIssue:issueKey=OPS-1] [TOOL_ACTION:jira:info:]");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].action, "info");
    }

    #[test]
    fn test_allow_list_and_lookup_by_name() {
        let belt = ToolBelt::new(vec!["t1".into()]);
        assert!(!belt.attach("t2", Arc::new(GenericTool::new("Other", "other"))));
        assert!(belt.attach("t1", Arc::new(GenericTool::new("Notifier", "notify"))));
        assert!(belt.get("notifier").is_some());
        assert!(belt.get("t1").is_some());
        assert_eq!(belt.ids(), vec!["t1".to_string()]);
        assert!(belt.context().contains("Notifier (id: t1)"));
        assert!(belt.detach("t1"));
        assert_eq!(belt.context(), "No tools available.");
    }

    #[tokio::test]
    async fn test_run_markers_records_each_outcome() {
        let belt = ToolBelt::new(Vec::new());
        belt.attach("t1", Arc::new(GenericTool::new("Notifier", "notify")));
        let results = belt
            .run_markers("[TOOL_ACTION:t1:info:] [TOOL_ACTION:t1:invoke:{}] [TOOL_ACTION:missing:info:]")
            .await;
        assert_eq!(results["t1.info"]["success"], true);
        assert_eq!(results["t1.invoke"]["success"], false);
        assert!(results["missing.info"]["error"].as_str().unwrap().contains("not attached"));
    }
}
