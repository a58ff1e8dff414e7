//! Planner：能力调用意图解析
//!
//! 调用引擎得到回复或 JSON 能力调用；parse_engine_output 从文本中提取 JSON
//! 并解析为 CapabilityCall 或直接回复，同时保留 JSON 前的思考文本供前端展示。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;

/// 引擎返回的能力调用（简化 JSON：{"tool": "search_restaurants", "args": {"query": "..."}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCall {
    pub tool: String,
    pub args: serde_json::Value,
}

/// Planner 输出
#[derive(Debug, Clone)]
pub enum PlannerOutput {
    /// 直接回复用户
    Response(String),
    /// 需要执行能力，附带 JSON 前的思考文本（可为空）
    CapabilityCall {
        call: CapabilityCall,
        thought: String,
    },
}

/// 清理思考文本：去掉模型口头禅，保留简短可读的一句话
fn clean_thought(raw: &str) -> String {
    let mut thought = raw.trim().trim_end_matches("```json").trim().to_string();
    for (from, to) in [
        ("I'll use", "Using"),
        ("I need to use", "Using"),
        ("I will use", "Using"),
    ] {
        thought = thought.replace(from, to);
    }
    thought
}

/// 解析引擎输出：若含有效 JSON 且 tool 非空则为 CapabilityCall，否则为 Response
pub fn parse_engine_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();

    // 尝试提取 JSON 块（```json ... ``` 或纯 JSON）
    let (json_str, prefix) = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let json = rest
            .find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim());
        (json, &trimmed[..start])
    } else if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            (&trimmed[start..=end], &trimmed[..start])
        } else {
            (trimmed, "")
        }
    } else {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    };

    let parsed: CapabilityCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParse(format!("{}: {}", e, json_str)))?;

    if parsed.tool.is_empty() {
        Ok(PlannerOutput::Response(trimmed.to_string()))
    } else {
        Ok(PlannerOutput::CapabilityCall {
            call: parsed,
            thought: clean_thought(prefix),
        })
    }
}

/// Planner：持有引擎客户端与 system prompt，plan 时拼 system + messages 后调用引擎
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn base_system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn plan(&self, messages: &[Message]) -> Result<String, AgentError> {
        let mut full_messages = vec![Message::system(self.system_prompt.clone())];
        full_messages.extend(messages.to_vec());
        self.llm
            .complete(&full_messages)
            .await
            .map_err(AgentError::Engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_response() {
        let out = parse_engine_output("Here are some great restaurants nearby.").unwrap();
        match out {
            PlannerOutput::Response(text) => assert!(text.contains("restaurants")),
            _ => panic!("Expected Response"),
        }
    }

    #[test]
    fn test_parse_capability_call() {
        let out = parse_engine_output(
            r#"Step 1: I need to find popular places. {"tool": "search_restaurants", "args": {"query": "popular"}}"#,
        )
        .unwrap();
        match out {
            PlannerOutput::CapabilityCall { call, thought } => {
                assert_eq!(call.tool, "search_restaurants");
                assert_eq!(call.args["query"], "popular");
                assert!(thought.starts_with("Step 1"));
            }
            _ => panic!("Expected CapabilityCall"),
        }
    }

    #[test]
    fn test_parse_code_fence() {
        let out = parse_engine_output(
            "```json\n{\"tool\": \"get_order_details\", \"args\": {\"order_id\": \"o1\"}}\n```",
        )
        .unwrap();
        match out {
            PlannerOutput::CapabilityCall { call, .. } => {
                assert_eq!(call.tool, "get_order_details");
            }
            _ => panic!("Expected CapabilityCall"),
        }
    }

    #[test]
    fn test_parse_invalid_json_is_error() {
        let out = parse_engine_output(r#"{"tool": "search_restaurants", "args": "#);
        assert!(out.is_err());
    }

    #[test]
    fn test_empty_tool_falls_back_to_response() {
        let out = parse_engine_output(r#"{"tool": "", "args": {}}"#).unwrap();
        assert!(matches!(out, PlannerOutput::Response(_)));
    }

    #[test]
    fn test_thought_cleanup() {
        let out = parse_engine_output(
            r#"I'll use the menu tool. {"tool": "get_restaurant_menu", "args": {"restaurant_id": "r1"}}"#,
        )
        .unwrap();
        match out {
            PlannerOutput::CapabilityCall { thought, .. } => {
                assert!(thought.starts_with("Using"));
            }
            _ => panic!("Expected CapabilityCall"),
        }
    }
}
