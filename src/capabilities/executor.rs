//! 能力执行器
//!
//! 持有 CapabilityRegistry 与全局超时，invoke(name, args, ctx) 在超时内调用
//! 能力并保证永远返回一个 JSON 映射：未知能力 / 超时 / 失败统一转为
//! {error, message} 形态；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::time::timeout;

use crate::agent::TurnContext;
use crate::capabilities::CapabilityRegistry;

/// 能力执行器：对每次调用施加超时，失败收敛为 {error, message} 数据
pub struct CapabilityExecutor {
    registry: CapabilityRegistry,
    timeout: Duration,
}

impl CapabilityExecutor {
    pub fn new(registry: CapabilityRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定能力；输出永远是 JSON 映射，错误形态为 {error, message}
    pub async fn invoke(&self, name: &str, args: Value, ctx: &TurnContext) -> Value {
        let start = Instant::now();
        let args_preview = args_preview(&args);

        let Some(capability) = self.registry.get(name) else {
            tracing::warn!(capability = name, "unknown capability requested");
            return json!({
                "error": "Unknown capability",
                "message": format!("No capability registered with name: {}", name),
            });
        };

        let result = timeout(self.timeout, capability.invoke(args, ctx)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = json!({
            "event": "capability_audit",
            "capability": name,
            "conversation_id": ctx.conversation_id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "capability");

        match result {
            Ok(Ok(output)) => output,
            Ok(Err(message)) => json!({
                "error": "Capability failed",
                "message": message,
            }),
            Err(_) => json!({
                "error": "Capability timeout",
                "message": format!("Capability '{}' did not complete in time", name),
            }),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.registry.descriptions()
    }

    pub fn to_schema_json(&self) -> String {
        self.registry.to_schema_json()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capability;
    use async_trait::async_trait;

    struct SlowCapability;

    #[async_trait]
    impl Capability for SlowCapability {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps forever"
        }
        async fn invoke(&self, _args: Value, _ctx: &TurnContext) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!({}))
        }
    }

    struct FailingCapability;

    #[async_trait]
    impl Capability for FailingCapability {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        async fn invoke(&self, _args: Value, _ctx: &TurnContext) -> Result<Value, String> {
            Err("boom".to_string())
        }
    }

    #[tokio::test]
    async fn test_unknown_capability_is_error_shaped() {
        let executor = CapabilityExecutor::new(CapabilityRegistry::new(), 1);
        let ctx = TurnContext::new("c1");
        let out = executor.invoke("nope", json!({}), &ctx).await;
        assert_eq!(out["error"], "Unknown capability");
        assert!(out["message"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_error_shaped() {
        let mut registry = CapabilityRegistry::new();
        registry.register(SlowCapability);
        let executor = CapabilityExecutor::new(registry, 1);
        let ctx = TurnContext::new("c1");
        let out = executor.invoke("slow", json!({}), &ctx).await;
        assert_eq!(out["error"], "Capability timeout");
    }

    #[tokio::test]
    async fn test_failure_is_error_shaped() {
        let mut registry = CapabilityRegistry::new();
        registry.register(FailingCapability);
        let executor = CapabilityExecutor::new(registry, 1);
        let ctx = TurnContext::new("c1");
        let out = executor.invoke("failing", json!({}), &ctx).await;
        assert_eq!(out["error"], "Capability failed");
        assert_eq!(out["message"], "boom");
    }
}
