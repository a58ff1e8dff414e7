//! 回合事件：编排器到客户端的流式事件联合体
//!
//! 每个事件序列化为一行 NDJSON 帧；字段名与前端渲染约定保持一致
//! （thinking/message/error 用 data 字段承载文本）。

use serde::Serialize;
use serde_json::Value;

use crate::agent::cards::StructuredCard;

/// 单个回合事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 正在分析请求（活性保证：回合开始即发出）
    Thinking { data: String },
    /// 一步推理内容（步号 + 思考文本 + 时间戳）
    ReasoningStep {
        step: usize,
        thought: String,
        timestamp: String,
    },
    /// 引擎决定调用某能力
    AgentAction {
        tool_name: String,
        step: usize,
        input: Value,
    },
    /// 能力开始执行
    ToolStart { tool_name: String, input: Value },
    /// 能力执行完成（output 为能力原始输出）
    ToolEnd { tool_name: String, output: Value },
    /// 能力执行失败（叙述通道，不中止回合）
    ToolError { tool_name: String, message: String },
    /// 结构化 UI 卡片（结构化通道专属）
    StructuredData { data: StructuredCard },
    /// 最终回复
    Message { data: String },
    /// 引擎级错误（回合提前结束，但仍会收到 done）
    Error { data: String },
    /// 回合结束标记，永远是最后一个事件
    Done { conversation_id: String },
}
