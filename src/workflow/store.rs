//! 退款工作流仓库
//!
//! Mutex<HashMap> 按 conversation_id 隔离；create / update / get / decide 四个操作。
//! update 对 reason 触发分类派生，对 has_image=true 触发阶段自动前进；
//! get 每次读取时重新派生 next_required，从不缓存。

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::workflow::state::{ReasonCategory, RefundStage, RefundWorkflowState, WorkflowError};

/// 最终决策记录：供 initiate_refund 消费
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub order_id: String,
    pub refund_status: &'static str,
    pub recommendation: String,
    pub validation_score: i64,
    pub validation_details: String,
}

/// 进程级工作流仓库
#[derive(Default)]
pub struct RefundWorkflowStore {
    states: Mutex<HashMap<String, RefundWorkflowState>>,
}

impl RefundWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初始化工作流：stage=collection，所有可选字段为空
    pub fn create(
        &self,
        conversation_id: &str,
        order_id: &str,
    ) -> Result<RefundWorkflowState, WorkflowError> {
        if conversation_id.is_empty() {
            return Err(WorkflowError::EmptyConversationId);
        }
        let state = RefundWorkflowState::new(order_id);
        let mut states = self.states.lock().unwrap();
        states.insert(conversation_id.to_string(), state.clone());
        tracing::info!(
            conversation_id,
            order_id,
            "created refund workflow"
        );
        Ok(state)
    }

    /// 更新单个字段。副作用：
    /// - reason 重新派生 reason_category
    /// - has_image=true 且 order_id、reason 均已具备时，collection → validation
    /// - stage 只接受前进方向的显式赋值，逆向赋值保持原状
    pub fn update(
        &self,
        conversation_id: &str,
        field: &str,
        value: Value,
    ) -> Result<RefundWorkflowState, WorkflowError> {
        let mut states = self.states.lock().unwrap();
        let state = states
            .get_mut(conversation_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(conversation_id.to_string()))?;

        match field {
            "order_id" => {
                state.order_id = value.as_str().unwrap_or_default().to_string();
            }
            "reason" => {
                let reason = value.as_str().unwrap_or_default().to_string();
                state.reason_category = Some(ReasonCategory::from_reason(&reason));
                state.reason = Some(reason);
            }
            "reason_category" => {
                state.reason_category = value
                    .as_str()
                    .map(|s| ReasonCategory::from_reason(s));
            }
            "has_image" => {
                let has_image = value.as_bool().unwrap_or(false);
                state.has_image = has_image;
                if has_image
                    && state.stage == RefundStage::Collection
                    && !state.order_id.is_empty()
                    && state.reason.is_some()
                {
                    state.stage = RefundStage::Validation;
                }
            }
            "image_verification_result" => {
                state.image_verification_result = Some(value);
            }
            "validation_score" => {
                state.validation_score = value.as_i64();
            }
            "recommendation" => {
                state.recommendation = value.as_str().map(String::from);
            }
            "decision_notes" => {
                state.decision_notes = value.as_str().map(String::from);
            }
            "issues_detected" => {
                state.issues_detected = value
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();
            }
            "stage" => {
                if let Some(target) = value.as_str().and_then(RefundStage::parse) {
                    if target > state.stage {
                        state.stage = target;
                    }
                }
            }
            other => return Err(WorkflowError::InvalidField(other.to_string())),
        }

        Ok(state.clone())
    }

    /// 读取状态与派生的 next_required（每次读取重新计算）
    pub fn get(&self, conversation_id: &str) -> Result<Value, WorkflowError> {
        let states = self.states.lock().unwrap();
        let state = states
            .get(conversation_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(conversation_id.to_string()))?;

        let next_required = match state.stage {
            RefundStage::Collection => {
                if state.order_id.is_empty() {
                    Some("order_id")
                } else if state.reason.is_none() {
                    Some("reason")
                } else if !state.has_image
                    && state.reason_category != Some(ReasonCategory::LateDelivery)
                {
                    Some("image")
                } else {
                    Some("proceed_to_validation")
                }
            }
            RefundStage::Validation => {
                if state.image_verification_result.is_none() {
                    Some("verify_image")
                } else {
                    Some("make_decision")
                }
            }
            RefundStage::Decision => None,
        };

        Ok(json!({
            "workflow_id": conversation_id,
            "current_state": state,
            "current_stage": state.stage.as_str(),
            "next_required": next_required,
            "is_complete": state.is_complete(),
        }))
    }

    /// 最终决策：进入终态 decision，派生 refund_status 标签并拼接校验摘要文本
    pub fn decide(
        &self,
        conversation_id: &str,
        validation_score: i64,
        recommendation: &str,
        decision_notes: &str,
    ) -> Result<DecisionRecord, WorkflowError> {
        let mut states = self.states.lock().unwrap();
        let state = states
            .get_mut(conversation_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(conversation_id.to_string()))?;

        state.stage = RefundStage::Decision;
        state.validation_score = Some(validation_score);
        state.recommendation = Some(recommendation.to_string());
        state.decision_notes = Some(decision_notes.to_string());

        let refund_status = if recommendation == "approve" && validation_score >= 70 {
            "Approved"
        } else if recommendation == "reject" {
            "Rejected"
        } else {
            // 人工复核缺省
            "Processing"
        };

        let mut validation_details = format!(
            "Decision: {}\nConfidence Score: {}/100\nEvidence Assessment: {}\n",
            recommendation.to_uppercase(),
            validation_score,
            decision_notes
        );

        if let Some(ref result) = state.image_verification_result {
            // 兼容 {type, data} 包装与裸对象两种形态
            let inner = result.get("data").unwrap_or(result);
            let status = inner
                .get("verification_status")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            let issues = inner
                .get("detected_issues")
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "None".to_string());
            let notes = inner
                .get("verification_notes")
                .and_then(|v| v.as_str())
                .unwrap_or("N/A");
            validation_details.push_str(&format!(
                "Image Verification: {}\nDetected Issues: {}\nVerification Notes: {}",
                status, issues, notes
            ));
        }

        Ok(DecisionRecord {
            order_id: state.order_id.clone(),
            refund_status,
            recommendation: recommendation.to_string(),
            validation_score,
            validation_details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_conversation_id() {
        let store = RefundWorkflowStore::new();
        assert_eq!(
            store.create("", "o1").unwrap_err(),
            WorkflowError::EmptyConversationId
        );
        let state = store.create("c1", "o1").unwrap();
        assert_eq!(state.stage, RefundStage::Collection);
        assert!(state.reason.is_none());
    }

    #[test]
    fn test_update_unknown_workflow() {
        let store = RefundWorkflowStore::new();
        let err = store.update("nope", "reason", json!("cold food")).unwrap_err();
        assert!(matches!(err, WorkflowError::WorkflowNotFound(_)));
    }

    #[test]
    fn test_update_invalid_field() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        let err = store.update("c1", "favorite_color", json!("blue")).unwrap_err();
        assert_eq!(err, WorkflowError::InvalidField("favorite_color".to_string()));
    }

    #[test]
    fn test_reason_derives_category() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        let state = store
            .update("c1", "reason", json!("Items were DAMAGED in transit"))
            .unwrap();
        assert_eq!(state.reason_category, Some(ReasonCategory::Damaged));
    }

    #[test]
    fn test_has_image_without_reason_keeps_collection() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        let state = store.update("c1", "has_image", json!(true)).unwrap();
        assert_eq!(state.stage, RefundStage::Collection);
    }

    #[test]
    fn test_has_image_after_reason_advances_to_validation() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        store.update("c1", "reason", json!("food was cold")).unwrap();
        let state = store.update("c1", "has_image", json!(true)).unwrap();
        assert_eq!(state.stage, RefundStage::Validation);
    }

    #[test]
    fn test_stage_never_regresses() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        store.decide("c1", 80, "approve", "clear evidence").unwrap();
        let state = store.update("c1", "stage", json!("collection")).unwrap();
        assert_eq!(state.stage, RefundStage::Decision);
        // 其它字段更新同样不回退阶段
        let state = store.update("c1", "reason", json!("cold")).unwrap();
        assert_eq!(state.stage, RefundStage::Decision);
    }

    #[test]
    fn test_next_required_progression() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "").unwrap();
        assert_eq!(store.get("c1").unwrap()["next_required"], "order_id");

        store.update("c1", "order_id", json!("o1")).unwrap();
        assert_eq!(store.get("c1").unwrap()["next_required"], "reason");

        store.update("c1", "reason", json!("food was cold")).unwrap();
        assert_eq!(store.get("c1").unwrap()["next_required"], "image");

        store.update("c1", "has_image", json!(true)).unwrap();
        // 进入 validation，还没有校验结果
        assert_eq!(store.get("c1").unwrap()["next_required"], "verify_image");

        store
            .update(
                "c1",
                "image_verification_result",
                json!({"verification_status": "verified"}),
            )
            .unwrap();
        assert_eq!(store.get("c1").unwrap()["next_required"], "make_decision");
    }

    #[test]
    fn test_late_delivery_skips_image() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        store.update("c1", "reason", json!("order arrived very late")).unwrap();
        assert_eq!(
            store.get("c1").unwrap()["next_required"],
            "proceed_to_validation"
        );
    }

    #[test]
    fn test_decision_matrix() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        let rec = store.decide("c1", 85, "approve", "clear damage").unwrap();
        assert_eq!(rec.refund_status, "Approved");

        store.create("c2", "o2").unwrap();
        let rec = store.decide("c2", 45, "manual_review", "unclear").unwrap();
        assert_eq!(rec.refund_status, "Processing");

        store.create("c3", "o3").unwrap();
        let rec = store.decide("c3", 95, "reject", "fraudulent").unwrap();
        assert_eq!(rec.refund_status, "Rejected");

        // approve 但分数不足 70 也走人工复核
        store.create("c4", "o4").unwrap();
        let rec = store.decide("c4", 60, "approve", "weak evidence").unwrap();
        assert_eq!(rec.refund_status, "Processing");
    }

    #[test]
    fn test_decision_includes_image_verification_summary() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        store
            .update(
                "c1",
                "image_verification_result",
                json!({
                    "type": "image_verification_result",
                    "data": {
                        "verification_status": "verified",
                        "detected_issues": ["crushed packaging"],
                        "verification_notes": "damage clearly visible"
                    }
                }),
            )
            .unwrap();
        let rec = store.decide("c1", 85, "approve", "matches claim").unwrap();
        assert!(rec.validation_details.contains("Decision: APPROVE"));
        assert!(rec.validation_details.contains("Image Verification: verified"));
        assert!(rec.validation_details.contains("crushed packaging"));
    }

    #[test]
    fn test_workflows_isolated_by_conversation() {
        let store = RefundWorkflowStore::new();
        store.create("c1", "o1").unwrap();
        store.create("c2", "o2").unwrap();
        store.update("c1", "reason", json!("cold")).unwrap();
        let c2 = store.get("c2").unwrap();
        assert!(c2["current_state"]["reason"].is_null());
    }
}
