//! 推理引擎客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（文本对话）、
//! complete_with_image（多模态单轮分析，供图片校验与文档分析能力使用）。

use async_trait::async_trait;

use crate::memory::Message;

/// 推理引擎客户端 trait：文本完成与带图完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 文本完成：给定完整消息序列，返回模型输出
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 多模态完成：单条 prompt + base64 图片，返回模型输出。
    /// 默认不支持，具体后端可覆盖。
    async fn complete_with_image(
        &self,
        _prompt: &str,
        _image_base64: &str,
    ) -> Result<String, String> {
        Err("Image input is not supported by this engine".to_string())
    }
}
