//! Mock 推理引擎（用于测试，无需 API）
//!
//! 支持脚本化输出：预先压入一串回复，complete 按序弹出；脚本耗尽后回显
//! 最后一条 User 消息。complete_with_image 同样从脚本取值。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// Mock 客户端：按脚本回放，或回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient {
    scripted: Mutex<VecDeque<Result<String, String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 压入一条脚本输出（按压入顺序回放）
    pub fn push_output(&self, output: impl Into<String>) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Ok(output.into()));
    }

    /// 压入一条脚本错误（模拟引擎故障）
    pub fn push_error(&self, message: impl Into<String>) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Err(message.into()));
    }

    fn next_scripted(&self) -> Option<Result<String, String>> {
        self.scripted.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Some(scripted) = self.next_scripted() {
            return scripted;
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        _image_base64: &str,
    ) -> Result<String, String> {
        if let Some(scripted) = self.next_scripted() {
            return scripted;
        }
        Ok(format!("Echo from Mock (image): {}", prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_outputs_in_order() {
        let mock = MockLlmClient::new();
        mock.push_output("first");
        mock.push_output("second");
        assert_eq!(mock.complete(&[]).await.unwrap(), "first");
        assert_eq!(mock.complete(&[]).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_echo_after_script_exhausted() {
        let mock = MockLlmClient::new();
        let messages = vec![Message::user("hello")];
        let out = mock.complete(&messages).await.unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let mock = MockLlmClient::new();
        mock.push_error("upstream down");
        assert!(mock.complete(&[]).await.is_err());
    }
}
