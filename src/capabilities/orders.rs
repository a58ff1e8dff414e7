//! 订单类能力：订单详情、发起退款、退款查询
//!
//! 正常输出为 {type, data} 形态（提取器规则 1 直接透传给前端），
//! 找不到 / 库错误返回 {error, message}。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::TurnContext;
use crate::capabilities::Capability;
use crate::store::{OrderStore, RefundRecord};

fn order_id_arg(args: &Value) -> String {
    args.get("order_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// 查询订单详情
pub struct GetOrderDetailsCapability {
    store: Arc<dyn OrderStore>,
}

impl GetOrderDetailsCapability {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Capability for GetOrderDetailsCapability {
    fn name(&self) -> &str {
        "get_order_details"
    }

    fn description(&self) -> &str {
        "Retrieve details about a specific order by its ID. Args: {\"order_id\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": {"type": "string", "description": "The ID of the order to retrieve"}
            },
            "required": ["order_id"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &TurnContext) -> Result<Value, String> {
        let order_id = order_id_arg(&args);
        if order_id.is_empty() {
            return Err("Missing order_id".to_string());
        }
        match self.store.get_order(&order_id) {
            Ok(Some(order)) => Ok(json!({
                "type": "order_details",
                "data": {
                    "order_id": order.order_id,
                    "status": order.status,
                    "timestamp": chrono::Local::now().to_rfc3339(),
                    "items": order.items,
                    "total_price": order.total_price,
                }
            })),
            Ok(None) => Ok(json!({
                "error": "Order not found",
                "message": format!("No order found with ID: {}", order_id),
            })),
            Err(e) => Err(format!("Error retrieving order: {}", e)),
        }
    }
}

/// 退款状态模拟关键词：命中则 Rejected
const REJECTION_KEYWORDS: [&str; 7] = [
    "insufficient evidence",
    "no image",
    "cannot verify",
    "unclear image",
    "blurry",
    "fake",
    "fraudulent",
];

/// 命中则 Processing（2 天处理期）
const PENDING_KEYWORDS: [&str; 3] = ["needs review", "partially visible", "unclear if"];

/// 发起退款：校验订单存在，按证据文本派生状态并落库
pub struct InitiateRefundCapability {
    store: Arc<dyn OrderStore>,
}

impl InitiateRefundCapability {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// 根据 reason / validation_details 中的关键词派生退款状态与处理天数
    fn derive_status(reason: &str, validation_details: &str) -> (&'static str, u32) {
        let haystack = format!("{} {}", reason.to_lowercase(), validation_details.to_lowercase());
        for keyword in REJECTION_KEYWORDS {
            if haystack.contains(keyword) {
                return ("Rejected", 0);
            }
        }
        for keyword in PENDING_KEYWORDS {
            if haystack.contains(keyword) {
                return ("Processing", 2);
            }
        }
        ("Approved", 0)
    }
}

#[async_trait]
impl Capability for InitiateRefundCapability {
    fn name(&self) -> &str {
        "initiate_refund"
    }

    fn description(&self) -> &str {
        "Initiate a refund for an order after evidence validation. Args: {\"order_id\": \"...\", \"reason\": \"...\", \"validation_details\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": {"type": "string"},
                "reason": {"type": "string", "description": "Main reason for the refund request"},
                "validation_details": {"type": "string", "description": "Evidence assessment from the refund workflow decision"}
            },
            "required": ["order_id", "reason"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &TurnContext) -> Result<Value, String> {
        let order_id = order_id_arg(&args);
        if order_id.is_empty() {
            return Err("Missing order_id".to_string());
        }
        let reason = args
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let validation_details = args
            .get("validation_details")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let order = match self.store.get_order(&order_id) {
            Ok(Some(order)) => order,
            Ok(None) => {
                return Ok(json!({
                    "error": "Order not found",
                    "message": format!("No order found with ID: {}", order_id),
                }))
            }
            Err(e) => return Err(format!("Error processing refund: {}", e)),
        };

        let detailed_reason = if validation_details.is_empty() {
            reason.clone()
        } else {
            format!("{}\n\nEvidence assessment: {}", reason, validation_details)
        };

        let (status, estimated_days) = Self::derive_status(&reason, &validation_details);
        let now = chrono::Local::now();
        let refund = RefundRecord {
            refund_id: format!("RF{}", now.timestamp()),
            order_id: order.order_id.clone(),
            status: status.to_string(),
            amount: order.total_price,
            reason: detailed_reason,
            timestamp: now.to_rfc3339(),
            estimated_days,
        };
        self.store
            .create_refund(&refund)
            .map_err(|e| format!("Error processing refund: {}", e))?;
        tracing::info!(%order_id, status, "refund initiated");

        Ok(json!({
            "type": "refund_status",
            "data": refund,
        }))
    }
}

/// 查询退款状态
pub struct GetRefundStatusCapability {
    store: Arc<dyn OrderStore>,
}

impl GetRefundStatusCapability {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Capability for GetRefundStatusCapability {
    fn name(&self) -> &str {
        "get_refund_status"
    }

    fn description(&self) -> &str {
        "Look up the refund status for an order. Args: {\"order_id\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": {"type": "string"}
            },
            "required": ["order_id"]
        })
    }

    async fn invoke(&self, args: Value, _ctx: &TurnContext) -> Result<Value, String> {
        let order_id = order_id_arg(&args);
        if order_id.is_empty() {
            return Err("Missing order_id".to_string());
        }
        match self.store.get_refund(&order_id) {
            Ok(Some(refund)) => Ok(json!({
                "type": "refund_status",
                "data": refund,
            })),
            Ok(None) => Ok(json!({
                "error": "Refund not found",
                "message": format!("No refund found for order ID: {}", order_id),
            })),
            Err(e) => Err(format!("Error looking up refund: {}", e)),
        }
    }
}
