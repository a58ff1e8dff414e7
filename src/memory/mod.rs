//! 短期对话记忆
//!
//! 每个会话保留最近 N 轮（user/assistant 对），超出时按插入顺序淘汰最旧消息
//! （FIFO，非 LRU）。ConversationMemoryStore 按 conversation_id 隔离，
//! 供编排器拼引擎上下文与历史接口读取。

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// 消息角色（与引擎 API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 单个会话的短期记忆：最近 N 轮对话（每轮含 user + assistant，故实际保留约 max_turns*2 条）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 超出 max_turns*2 时丢弃最旧的消息，保留最近部分
    fn prune(&mut self) {
        let keep = self.max_turns * 2;
        if self.messages.len() > keep {
            self.messages.drain(..self.messages.len() - keep);
        }
    }
}

/// 按会话隔离的记忆仓库：conversation_id -> ConversationMemory
pub struct ConversationMemoryStore {
    window: usize,
    memories: Mutex<HashMap<String, ConversationMemory>>,
}

impl ConversationMemoryStore {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            memories: Mutex::new(HashMap::new()),
        }
    }

    /// 空 id 归入 "default" 会话，与缺省会话请求一致
    fn normalize(conversation_id: &str) -> &str {
        if conversation_id.is_empty() {
            "default"
        } else {
            conversation_id
        }
    }

    pub fn add_user_message(&self, conversation_id: &str, text: impl Into<String>) {
        let mut memories = self.memories.lock().unwrap();
        memories
            .entry(Self::normalize(conversation_id).to_string())
            .or_insert_with(|| ConversationMemory::new(self.window))
            .push(Message::user(text));
    }

    pub fn add_assistant_message(&self, conversation_id: &str, text: impl Into<String>) {
        let mut memories = self.memories.lock().unwrap();
        memories
            .entry(Self::normalize(conversation_id).to_string())
            .or_insert_with(|| ConversationMemory::new(self.window))
            .push(Message::assistant(text));
    }

    /// 当前会话的消息快照（拼引擎上下文 / 历史接口用）
    pub fn history(&self, conversation_id: &str) -> Vec<Message> {
        let memories = self.memories.lock().unwrap();
        memories
            .get(Self::normalize(conversation_id))
            .map(|m| m.messages().to_vec())
            .unwrap_or_default()
    }

    /// 清除指定会话；返回是否存在
    pub fn clear(&self, conversation_id: &str) -> bool {
        let mut memories = self.memories.lock().unwrap();
        memories.remove(Self::normalize(conversation_id)).is_some()
    }
}
