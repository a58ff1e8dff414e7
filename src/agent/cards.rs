//! 结构化卡片提取
//!
//! 将能力的松散 JSON 输出归一为一小组 UI 可渲染卡片。分类是严格有序的
//! 规则列表（首个命中即止），前端按卡片 type 渲染，规则顺序不可调整。
//! 纯函数：无 I/O，内部任何异常都收敛为空列表。

use serde::Serialize;
use serde_json::{json, Map, Value};

/// 卡片类型（与前端渲染约定一一对应）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Restaurant,
    FoodItem,
    OrderDetails,
    RefundStatus,
    ImageVerificationResult,
    RefundWorkflowState,
    DocumentAnalysisResult,
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Restaurant => "restaurant",
            CardKind::FoodItem => "food_item",
            CardKind::OrderDetails => "order_details",
            CardKind::RefundStatus => "refund_status",
            CardKind::ImageVerificationResult => "image_verification_result",
            CardKind::RefundWorkflowState => "refund_workflow_state",
            CardKind::DocumentAnalysisResult => "document_analysis_result",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "restaurant" => Some(CardKind::Restaurant),
            "food_item" => Some(CardKind::FoodItem),
            "order_details" => Some(CardKind::OrderDetails),
            "refund_status" => Some(CardKind::RefundStatus),
            "image_verification_result" => Some(CardKind::ImageVerificationResult),
            "refund_workflow_state" => Some(CardKind::RefundWorkflowState),
            "document_analysis_result" => Some(CardKind::DocumentAnalysisResult),
            _ => None,
        }
    }
}

/// 结构化卡片：线上序列化为 {"type": ..., "data": ...}，与前端约定一致
#[derive(Debug, Clone, Serialize)]
pub struct StructuredCard {
    #[serde(rename = "type")]
    pub kind: CardKind,
    #[serde(rename = "data")]
    pub payload: Value,
}

impl StructuredCard {
    pub fn new(kind: CardKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// 菜单提取上限：每个分类最多 3 个菜品，整份菜单最多 10 个
const MENU_ITEMS_PER_CATEGORY: usize = 3;
const MENU_ITEMS_TOTAL: usize = 10;
/// results 列表最多处理 10 项，featured_items 最多 5 项
const RESULTS_LIMIT: usize = 10;
const FEATURED_LIMIT: usize = 5;

/// 将菜品对象与餐厅上下文合并（餐厅名 / id，可选分类名）
fn merge_food_item(item: &Map<String, Value>, rest_name: &Value, rest_id: &Value, category: Option<&str>) -> Value {
    let mut data = item.clone();
    data.insert("restaurant_name".to_string(), rest_name.clone());
    data.insert("restaurant_id".to_string(), rest_id.clone());
    if let Some(cat) = category {
        data.insert("category".to_string(), json!(cat));
    }
    Value::Object(data)
}

/// 从能力输出提取有序卡片列表。capability 为产生该输出的能力名（影响规则 8/9）。
///
/// 规则按优先级排列，首个命中即返回；全部不命中返回空列表。
pub fn extract_cards(output: &Value, capability: Option<&str>) -> Vec<StructuredCard> {
    let Some(obj) = output.as_object() else {
        return Vec::new();
    };

    // 规则 1：已是 {type, data} 形态，原样透传
    if let (Some(kind_str), Some(data)) = (
        obj.get("type").and_then(|v| v.as_str()),
        obj.get("data"),
    ) {
        if let Some(kind) = CardKind::parse(kind_str) {
            if !data.is_null() {
                return vec![StructuredCard::new(kind, data.clone())];
            }
        }
        return Vec::new();
    }

    let rest_name = obj
        .get("restaurant_name")
        .cloned()
        .unwrap_or_else(|| json!("Restaurant"));
    let rest_id = obj
        .get("restaurant_id")
        .cloned()
        .unwrap_or_else(|| json!("unknown"));

    // 规则 2：带 restaurant_info 子对象（菜单接口响应）
    if let Some(info) = obj.get("restaurant_info") {
        let mut cards = vec![StructuredCard::new(CardKind::Restaurant, info.clone())];
        if let Some(featured) = obj.get("featured_items").and_then(|v| v.as_array()) {
            for item in featured.iter().take(FEATURED_LIMIT) {
                if let Some(item_obj) = item.as_object() {
                    cards.push(StructuredCard::new(
                        CardKind::FoodItem,
                        merge_food_item(item_obj, &rest_name, &rest_id, None),
                    ));
                }
            }
        }
        return cards;
    }

    // 规则 3：results 列表，逐项透传或按字段推断类型
    if let Some(results) = obj.get("results").and_then(|v| v.as_array()) {
        let mut cards = Vec::new();
        for item in results.iter().take(RESULTS_LIMIT) {
            let Some(item_obj) = item.as_object() else {
                continue;
            };
            if let (Some(kind_str), Some(data)) = (
                item_obj.get("type").and_then(|v| v.as_str()),
                item_obj.get("data"),
            ) {
                if let Some(kind) = CardKind::parse(kind_str) {
                    if !data.is_null() {
                        cards.push(StructuredCard::new(kind, data.clone()));
                    }
                }
            } else if item_obj.contains_key("price") || item_obj.contains_key("description") {
                cards.push(StructuredCard::new(CardKind::FoodItem, item.clone()));
            } else if item_obj.contains_key("rating") || item_obj.contains_key("cuisines") {
                cards.push(StructuredCard::new(CardKind::Restaurant, item.clone()));
            }
        }
        return cards;
    }

    // 规则 4：menu 分类列表，先出一张餐厅摘要卡，再按分类限量出菜品卡
    if let Some(menu) = obj.get("menu").and_then(|v| v.as_array()) {
        let mut cards = vec![StructuredCard::new(
            CardKind::Restaurant,
            json!({
                "name": rest_name,
                "id": rest_id,
                "cuisines": obj.get("cuisines").cloned().unwrap_or_else(|| json!([])),
                "rating": obj.get("rating").cloned().unwrap_or_else(|| json!("N/A")),
            }),
        )];
        let mut item_count = 0;
        'menu: for category in menu {
            let Some(items) = category.get("items").and_then(|v| v.as_array()) else {
                continue;
            };
            let category_name = category
                .get("category")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            for item in items.iter().take(MENU_ITEMS_PER_CATEGORY) {
                if item_count >= MENU_ITEMS_TOTAL {
                    break 'menu;
                }
                if let Some(item_obj) = item.as_object() {
                    cards.push(StructuredCard::new(
                        CardKind::FoodItem,
                        merge_food_item(item_obj, &rest_name, &rest_id, Some(category_name)),
                    ));
                    item_count += 1;
                }
            }
        }
        return cards;
    }

    // 规则 5：订单形态（未显式标注 type）
    if (obj.contains_key("order_id") && obj.contains_key("items"))
        || (obj.contains_key("status") && obj.contains_key("order_id"))
    {
        return vec![StructuredCard::new(CardKind::OrderDetails, output.clone())];
    }

    // 规则 6：退款状态形态
    if obj.contains_key("refund_status")
        || (obj.contains_key("refund") && obj.contains_key("status"))
    {
        return vec![StructuredCard::new(CardKind::RefundStatus, output.clone())];
    }

    // 规则 7：图片校验结果形态
    if obj.contains_key("verification_score") || obj.contains_key("verification_status") {
        return vec![StructuredCard::new(
            CardKind::ImageVerificationResult,
            output.clone(),
        )];
    }

    // 规则 8：退款工作流管理能力的输出
    if capability == Some("manage_refund_workflow")
        && ((obj.contains_key("status") && obj.contains_key("workflow_id"))
            || obj.contains_key("current_stage"))
    {
        return vec![StructuredCard::new(
            CardKind::RefundWorkflowState,
            output.clone(),
        )];
    }

    // 规则 9：文档分析能力或带 document_type 的输出
    if capability == Some("analyze_document") || obj.contains_key("document_type") {
        return vec![StructuredCard::new(
            CardKind::DocumentAnalysisResult,
            output.clone(),
        )];
    }

    Vec::new()
}
