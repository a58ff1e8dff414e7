//! 工作流状态类型：阶段、退款原因分类、单会话状态

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 工作流阶段：只允许 collection → validation → decision 前进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStage {
    Collection,
    Validation,
    Decision,
}

impl RefundStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStage::Collection => "collection",
            RefundStage::Validation => "validation",
            RefundStage::Decision => "decision",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "collection" => Some(RefundStage::Collection),
            "validation" => Some(RefundStage::Validation),
            "decision" => Some(RefundStage::Decision),
            _ => None,
        }
    }
}

/// 退款原因分类（由 reason 文本关键词派生）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCategory {
    MissingItems,
    Damaged,
    ColdFood,
    QualityIssues,
    WrongItems,
    LateDelivery,
    Other,
}

impl ReasonCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCategory::MissingItems => "missing_items",
            ReasonCategory::Damaged => "damaged",
            ReasonCategory::ColdFood => "cold_food",
            ReasonCategory::QualityIssues => "quality_issues",
            ReasonCategory::WrongItems => "wrong_items",
            ReasonCategory::LateDelivery => "late_delivery",
            ReasonCategory::Other => "other",
        }
    }

    /// 关键词子串匹配，按固定优先级，全部小写后比较
    pub fn from_reason(reason: &str) -> Self {
        let lower = reason.to_lowercase();
        if lower.contains("missing") || lower.contains("incomplete") {
            ReasonCategory::MissingItems
        } else if lower.contains("damaged") || lower.contains("spill") {
            ReasonCategory::Damaged
        } else if lower.contains("cold") || lower.contains("temperature") {
            ReasonCategory::ColdFood
        } else if lower.contains("quality") || lower.contains("stale") || lower.contains("spoil") {
            ReasonCategory::QualityIssues
        } else if lower.contains("wrong") {
            ReasonCategory::WrongItems
        } else if lower.contains("late") {
            ReasonCategory::LateDelivery
        } else {
            ReasonCategory::Other
        }
    }
}

/// 单个会话的退款工作流状态
#[derive(Debug, Clone, Serialize)]
pub struct RefundWorkflowState {
    pub order_id: String,
    pub stage: RefundStage,
    pub reason: Option<String>,
    pub reason_category: Option<ReasonCategory>,
    pub has_image: bool,
    pub image_verification_result: Option<serde_json::Value>,
    pub validation_score: Option<i64>,
    pub recommendation: Option<String>,
    pub decision_notes: Option<String>,
    pub issues_detected: Vec<String>,
}

impl RefundWorkflowState {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            stage: RefundStage::Collection,
            reason: None,
            reason_category: None,
            has_image: false,
            image_verification_result: None,
            validation_score: None,
            recommendation: None,
            decision_notes: None,
            issues_detected: Vec::new(),
        }
    }

    /// 终态：decision 阶段且已有 recommendation
    pub fn is_complete(&self) -> bool {
        self.stage == RefundStage::Decision && self.recommendation.is_some()
    }
}

/// 工作流操作错误（以 {error, message} 形态回流给引擎，不中止回合）
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("conversation_id must not be empty")]
    EmptyConversationId,

    #[error("No refund workflow found for conversation ID: {0}")]
    WorkflowNotFound(String),

    #[error("Field '{0}' is not a valid workflow field")]
    InvalidField(String),
}
