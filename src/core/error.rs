//! Agent 错误类型
//!
//! 仅引擎级失败会以错误形态向上传播（转为 error 事件后结束回合）；
//! 能力级失败统一以 {error, message} 形态的 JSON 数据流转，不抛异常。

use thiserror::Error;

/// 回合执行过程中可能出现的错误（引擎调用、输出解析、能力执行）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 推理引擎调用失败（网络、鉴权、上游 5xx 等）
    #[error("Engine error: {0}")]
    Engine(String),

    /// 引擎输出不是合法的能力调用 JSON（可注入纠正提示重试）
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}
