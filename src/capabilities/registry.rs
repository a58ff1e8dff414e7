//! 能力注册表

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::TurnContext;

/// 能力 trait：名称、描述（供引擎理解）、参数 schema、异步执行
///
/// invoke 返回 Err(String) 表示能力内部失败，由执行器统一转为
/// {error, message} 输出；正常输出为任意 JSON 映射。
#[async_trait]
pub trait Capability: Send + Sync {
    /// 能力名称（引擎 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 能力描述（供引擎选择）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供引擎生成正确的参数格式）
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行能力；ctx 携带会话 id、本回合图片与坐标
    async fn invoke(&self, args: Value, ctx: &TurnContext) -> Result<Value, String>;
}

/// 能力注册表：按名称存储 Arc<dyn Capability>
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: impl Capability + 'static) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, Arc::new(capability));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的能力段落
    pub fn descriptions(&self) -> Vec<(String, String)> {
        let mut list: Vec<(String, String)> = self
            .capabilities
            .iter()
            .map(|(name, cap)| (name.clone(), cap.description().to_string()))
            .collect();
        list.sort();
        list
    }

    /// 生成能力 schema JSON（注入 system prompt，保证与实际注册能力一致）
    pub fn to_schema_json(&self) -> String {
        let mut names: Vec<&String> = self.capabilities.keys().collect();
        names.sort();
        let capabilities: Vec<Value> = names
            .iter()
            .map(|name| {
                let cap = &self.capabilities[*name];
                serde_json::json!({
                    "name": name,
                    "description": cap.description(),
                    "parameters": cap.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&capabilities).unwrap_or_else(|_| "[]".to_string())
    }
}
