//! 多模态能力：退款图片校验与文档分析
//!
//! 图片来自回合上下文（用户本回合上传），引擎返回的 JSON 经三级解析：
//! 代码块提取 → 整体解析 → 正则逐字段兜底；全部失败时落到
//! manual_review 的中性结果，绝不因解析失败让回合出错。

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::agent::TurnContext;
use crate::capabilities::Capability;
use crate::llm::LlmClient;

/// 从引擎输出里提取 JSON 对象：优先 ``` 代码块，其次整体解析
fn parse_json_block(text: &str) -> Option<Value> {
    let fence = Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").ok()?;
    if let Some(caps) = fence.captures(text) {
        if let Ok(value) = serde_json::from_str::<Value>(caps[1].trim()) {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        if value.is_object() {
            return Some(value);
        }
    }
    // 退而求其次：截取首尾花括号之间的片段
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(|v| v.is_object())
}

/// 正则逐字段兜底：引擎输出不是合法 JSON 时尽量抢救关键字段
fn scavenge_verification_fields(text: &str) -> Value {
    let mut result = json!({
        "verification_score": 50,
        "verification_status": "inconclusive",
        "detected_issues": [],
        "matches_order_items": false,
        "verification_notes": "Unable to extract structured verification data from analysis",
        "flagged_issues": ["Structured data extraction failed"],
        "recommendation": "manual_review",
    });
    if let Ok(re) = Regex::new(r#""verification_score":\s*(\d+)"#) {
        if let Some(caps) = re.captures(text) {
            if let Ok(score) = caps[1].parse::<i64>() {
                result["verification_score"] = json!(score);
            }
        }
    }
    if let Ok(re) = Regex::new(r#""verification_status":\s*"(\w+)""#) {
        if let Some(caps) = re.captures(text) {
            result["verification_status"] = json!(caps[1].to_string());
        }
    }
    if let Ok(re) = Regex::new(r#""recommendation":\s*"(\w+)""#) {
        if let Some(caps) = re.captures(text) {
            result["recommendation"] = json!(caps[1].to_string());
        }
    }
    if let Ok(re) = Regex::new(r#""verification_notes":\s*"([^"]+)""#) {
        if let Some(caps) = re.captures(text) {
            result["verification_notes"] = json!(caps[1].to_string());
        }
    }
    result
}

/// 归一校验结果：补齐缺省字段，截断原始分析文本
fn normalize_verification(parsed: Value, order_id: &str, raw: &str) -> Value {
    let obj = parsed.as_object().cloned().unwrap_or_else(Map::new);
    let get = |key: &str, default: Value| obj.get(key).cloned().unwrap_or(default);
    let raw_preview: String = raw.chars().take(500).collect();
    let raw_preview = if raw.chars().count() > 500 {
        format!("{}...", raw_preview)
    } else {
        raw_preview
    };
    json!({
        "verification_score": get("verification_score", json!(50)),
        "verification_status": get("verification_status", json!("inconclusive")),
        "detected_issues": get("detected_issues", json!([])),
        "matches_order_items": get("matches_order_items", json!(false)),
        "verification_notes": get("verification_notes", json!("Image analysis results inconclusive")),
        "flagged_issues": get("flagged_issues", json!([])),
        "recommendation": get("recommendation", json!("manual_review")),
        "image_analyzed": true,
        "order_id": order_id,
        "raw_analysis": raw_preview,
    })
}

/// 从 order_details 参数（可能是 {type, data} 包装）取订单号与条目名
fn order_summary(order_details: &Value) -> (String, String) {
    let inner = order_details.get("data").unwrap_or(order_details);
    let order_id = inner
        .get("order_id")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let item_names: Vec<&str> = inner
        .get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(|v| v.as_str()))
                .collect()
        })
        .unwrap_or_default();
    (
        order_id.clone(),
        format!("Order #{} containing: {}", order_id, item_names.join(", ")),
    )
}

/// 退款图片校验
pub struct VerifyRefundImageCapability {
    llm: Arc<dyn LlmClient>,
}

impl VerifyRefundImageCapability {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Capability for VerifyRefundImageCapability {
    fn name(&self) -> &str {
        "verify_refund_image"
    }

    fn description(&self) -> &str {
        "Verify the image uploaded in this conversation against order details and the stated refund reason. \
         Args: {\"order_details\": {...}, \"reason\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_details": {"type": "object", "description": "Order details for cross-reference"},
                "reason": {"type": "string", "description": "The stated reason for the refund request"}
            },
            "required": ["reason"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &TurnContext) -> Result<Value, String> {
        let Some(ref image) = ctx.image else {
            return Ok(json!({
                "error": "No image data provided",
                "message": "Image data is required for verification but was not provided",
            }));
        };
        let reason = args
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let order_details = args.get("order_details").cloned().unwrap_or(json!({}));
        let (order_id, summary) = order_summary(&order_details);
        let category = crate::workflow::ReasonCategory::from_reason(&reason);
        tracing::info!(%order_id, %reason, "verifying refund image");

        let prompt = format!(
            r#"Analyze this food image for a refund verification:

REFUND REQUEST DETAILS:
- Order: {summary}
- Customer reason: "{reason}"
- Category: {category}

VERIFICATION TASK:
Examine the image to determine if it provides evidence supporting the customer's refund reason.
Provide your analysis in the following JSON format:

```json
{{
  "verification_score": [0-100 numeric score representing confidence in verification],
  "verification_status": ["verified", "unverified", or "inconclusive"],
  "detected_issues": [array of specific issues detected in the food],
  "matches_order_items": [boolean: true if items in image appear to match order details],
  "verification_notes": [detailed explanation of your analysis],
  "flagged_issues": [array of concerns that would require human verification],
  "recommendation": ["approve", "reject", or "manual_review"]
}}
```

BE HIGHLY SKEPTICAL AND CRITICAL - DEMAND CLEAR EVIDENCE:
- Score above 70 ONLY if evidence CLEARLY AND UNDENIABLY supports the refund reason
- Default to "inconclusive" unless evidence is very strong
- Recommendation should be "manual_review" unless evidence is extremely clear
- Look for inconsistencies between the image and the stated reason
- Be especially critical of subjective claims (temperature, taste) that are hard to verify
- Check if what's visible in the image matches the ordered items

FORMAT RESPONSE AS VALID JSON ONLY."#,
            summary = summary,
            reason = reason,
            category = category.as_str(),
        );

        let data = match self.llm.complete_with_image(&prompt, image).await {
            Ok(analysis) => {
                let parsed = parse_json_block(&analysis)
                    .unwrap_or_else(|| scavenge_verification_fields(&analysis));
                normalize_verification(parsed, &order_id, &analysis)
            }
            Err(e) => {
                tracing::warn!(error = %e, "image analysis failed");
                json!({
                    "verification_score": 30,
                    "verification_status": "error",
                    "detected_issues": [],
                    "matches_order_items": false,
                    "verification_notes": format!("Error during image analysis: {}", e),
                    "flagged_issues": ["Image analysis failed"],
                    "recommendation": "manual_review",
                    "image_analyzed": false,
                    "order_id": order_id,
                })
            }
        };

        Ok(json!({
            "type": "image_verification_result",
            "data": data,
        }))
    }
}

/// 文档分析（处方、化验单、饮食计划等）
pub struct AnalyzeDocumentCapability {
    llm: Arc<dyn LlmClient>,
}

impl AnalyzeDocumentCapability {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Capability for AnalyzeDocumentCapability {
    fn name(&self) -> &str {
        "analyze_document"
    }

    fn description(&self) -> &str {
        "Analyze a document image uploaded in this conversation (prescription, lab report, diet plan) and extract structured information. \
         Args: {\"doc_type\": \"prescription\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "doc_type": {"type": "string", "description": "Type of document (prescription, lab_report, diet_plan, ...)"}
            },
            "required": []
        })
    }

    async fn invoke(&self, args: Value, ctx: &TurnContext) -> Result<Value, String> {
        let Some(ref image) = ctx.image else {
            return Ok(json!({
                "error": "No image data provided",
                "message": "Image data is required for document analysis but was not provided",
            }));
        };
        let doc_type = args
            .get("doc_type")
            .and_then(|v| v.as_str())
            .unwrap_or("prescription")
            .to_string();
        tracing::info!(%doc_type, "analyzing document image");

        let prompt = format!(
            "Analyze this {doc_type} document image carefully and extract the key information in structured form.\n\
             Identify the type of document, key fields, and important information contained within.\n\n\
             IMPORTANT: Format your response as valid JSON with appropriate keys based on the document type.\n\
             Include an \"analysis_confidence\" field with a number between 0-100 indicating your confidence in the accuracy of extraction.\n\
             Also include an \"illegible_parts\" array listing any sections that were unclear or unreadable.\n\n\
             RETURN ONLY THE JSON OBJECT WITHOUT ANY ADDITIONAL TEXT.",
            doc_type = doc_type,
        );

        let data = match self.llm.complete_with_image(&prompt, image).await {
            Ok(analysis) => {
                let mut parsed = parse_json_block(&analysis).unwrap_or_else(|| {
                    let raw_preview: String = analysis.chars().take(500).collect();
                    json!({
                        "error": "Failed to parse document analysis as JSON",
                        "raw_text": raw_preview,
                        "analysis_confidence": 0,
                    })
                });
                if let Some(obj) = parsed.as_object_mut() {
                    obj.insert("document_type".to_string(), json!(doc_type));
                    obj.entry("analysis_confidence".to_string())
                        .or_insert(json!(70));
                }
                parsed
            }
            Err(e) => {
                tracing::warn!(error = %e, "document analysis failed");
                json!({
                    "error": format!("Error analyzing document: {}", e),
                    "document_type": doc_type,
                    "analysis_confidence": 0,
                })
            }
        };

        Ok(json!({
            "type": "document_analysis_result",
            "data": data,
        }))
    }
}
