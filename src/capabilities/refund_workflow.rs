//! 退款工作流管理能力
//!
//! 单个能力聚合 create / update / get / decide / criteria 五个动作，
//! conversation_id 取自回合上下文而非引擎参数。WorkflowError 以
//! {error, message} 形态回流，不中止回合。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::TurnContext;
use crate::capabilities::Capability;
use crate::workflow::{verification_criteria, RefundWorkflowStore, WorkflowError};

pub struct ManageRefundWorkflowCapability {
    workflow: Arc<RefundWorkflowStore>,
}

impl ManageRefundWorkflowCapability {
    pub fn new(workflow: Arc<RefundWorkflowStore>) -> Self {
        Self { workflow }
    }
}

fn workflow_error(err: WorkflowError) -> Value {
    let label = match err {
        WorkflowError::WorkflowNotFound(_) => "Workflow not found",
        WorkflowError::InvalidField(_) => "Invalid field",
        WorkflowError::EmptyConversationId => "Invalid conversation",
    };
    json!({
        "error": label,
        "message": err.to_string(),
    })
}

#[async_trait]
impl Capability for ManageRefundWorkflowCapability {
    fn name(&self) -> &str {
        "manage_refund_workflow"
    }

    fn description(&self) -> &str {
        "Track the multi-step refund process for this conversation. Args: {\"action\": \"create|update|get|decide|criteria\", ...}. \
         create needs order_id; update needs field and value; decide needs validation_score, recommendation and decision_notes; \
         criteria needs reason_type."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["create", "update", "get", "decide", "criteria"]},
                "order_id": {"type": "string"},
                "field": {"type": "string", "description": "Workflow field to update (reason, has_image, ...)"},
                "value": {"description": "New value for the field"},
                "validation_score": {"type": "integer", "minimum": 0, "maximum": 100},
                "recommendation": {"type": "string", "enum": ["approve", "reject", "manual_review"]},
                "decision_notes": {"type": "string"},
                "reason_type": {"type": "string"}
            },
            "required": ["action"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &TurnContext) -> Result<Value, String> {
        let action = args
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let conversation_id = ctx.conversation_id.as_str();

        let out = match action {
            "create" => {
                let order_id = args
                    .get("order_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                match self.workflow.create(conversation_id, order_id) {
                    Ok(state) => {
                        let next_required = if state.order_id.is_empty() {
                            "order_id"
                        } else {
                            "reason"
                        };
                        json!({
                            "status": "created",
                            "workflow_id": conversation_id,
                            "order_id": state.order_id,
                            "current_stage": state.stage.as_str(),
                            "next_required": next_required,
                        })
                    }
                    Err(e) => workflow_error(e),
                }
            }
            "update" => {
                let field = args
                    .get("field")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let value = args.get("value").cloned().unwrap_or(Value::Null);
                match self.workflow.update(conversation_id, field, value) {
                    Ok(state) => json!({
                        "status": "updated",
                        "field": field,
                        "workflow": state,
                    }),
                    Err(e) => workflow_error(e),
                }
            }
            "get" => match self.workflow.get(conversation_id) {
                Ok(state) => state,
                Err(e) => workflow_error(e),
            },
            "decide" => {
                let validation_score = args
                    .get("validation_score")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                let recommendation = args
                    .get("recommendation")
                    .and_then(|v| v.as_str())
                    .unwrap_or("manual_review");
                let decision_notes = args
                    .get("decision_notes")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                match self
                    .workflow
                    .decide(conversation_id, validation_score, recommendation, decision_notes)
                {
                    Ok(record) => json!({
                        "order_id": record.order_id,
                        "validation_details": record.validation_details,
                        "refund_status": record.refund_status,
                        "recommendation": record.recommendation,
                        "validation_score": record.validation_score,
                        "ready_for_refund_tool": true,
                    }),
                    Err(e) => workflow_error(e),
                }
            }
            "criteria" => {
                let reason_type = args
                    .get("reason_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("other");
                verification_criteria(reason_type)
            }
            other => json!({
                "error": "Invalid action",
                "message": format!("Unknown workflow action: '{}'", other),
            }),
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability() -> (ManageRefundWorkflowCapability, TurnContext) {
        let workflow = Arc::new(RefundWorkflowStore::new());
        (
            ManageRefundWorkflowCapability::new(workflow),
            TurnContext::new("c1"),
        )
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (cap, ctx) = capability();
        let out = cap
            .invoke(json!({"action": "create", "order_id": "o1"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["status"], "created");
        assert_eq!(out["workflow_id"], "c1");
        assert_eq!(out["current_stage"], "collection");

        let out = cap.invoke(json!({"action": "get"}), &ctx).await.unwrap();
        assert_eq!(out["current_stage"], "collection");
        assert_eq!(out["next_required"], "reason");
        assert_eq!(out["is_complete"], false);
    }

    #[tokio::test]
    async fn test_update_before_create_is_error_shaped() {
        let (cap, ctx) = capability();
        let out = cap
            .invoke(
                json!({"action": "update", "field": "reason", "value": "cold food"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(out["error"], "Workflow not found");
    }

    #[tokio::test]
    async fn test_full_flow_to_decision() {
        let (cap, ctx) = capability();
        cap.invoke(json!({"action": "create", "order_id": "o1"}), &ctx)
            .await
            .unwrap();
        cap.invoke(
            json!({"action": "update", "field": "reason", "value": "items damaged"}),
            &ctx,
        )
        .await
        .unwrap();
        let out = cap
            .invoke(
                json!({"action": "update", "field": "has_image", "value": true}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(out["workflow"]["stage"], "validation");

        let out = cap
            .invoke(
                json!({
                    "action": "decide",
                    "validation_score": 85,
                    "recommendation": "approve",
                    "decision_notes": "clear damage visible"
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(out["refund_status"], "Approved");
        assert_eq!(out["ready_for_refund_tool"], true);
        assert!(out["validation_details"]
            .as_str()
            .unwrap()
            .contains("Decision: APPROVE"));
    }

    #[tokio::test]
    async fn test_invalid_action() {
        let (cap, ctx) = capability();
        let out = cap.invoke(json!({"action": "destroy"}), &ctx).await.unwrap();
        assert_eq!(out["error"], "Invalid action");
    }

    #[tokio::test]
    async fn test_criteria_action() {
        let (cap, ctx) = capability();
        let out = cap
            .invoke(json!({"action": "criteria", "reason_type": "damaged"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["criteria"]["auto_approval_threshold"], 80);
    }
}
