//! 回合流式输出集成测试
//!
//! 用脚本化 Mock 引擎 + 静态数据源桩跑完整回合，校验事件序列的
//! 确定性收尾（thinking 最先、done 最后）与结构化卡片扇出。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use tiffin::agent::orchestrator::build_system_prompt;
use tiffin::agent::{AgentEvent, ConversationOrchestrator, GeoPoint, TurnRequest};
use tiffin::capabilities::{
    AnalyzeDocumentCapability, CapabilityExecutor, CapabilityRegistry, GetOrderDetailsCapability,
    GetRefundStatusCapability, GetRestaurantMenuCapability, InitiateRefundCapability,
    ManageRefundWorkflowCapability, SearchFoodItemsCapability, SearchRestaurantsCapability,
    VerifyRefundImageCapability,
};
use tiffin::llm::{MockLlmClient, Planner};
use tiffin::memory::ConversationMemoryStore;
use tiffin::provider::FoodProviderClient;
use tiffin::store::{OrderItem, OrderRecord, OrderStore, SqliteOrderStore};
use tiffin::workflow::RefundWorkflowStore;

/// 静态数据源桩
struct StaticProvider;

#[async_trait]
impl FoodProviderClient for StaticProvider {
    async fn list(&self, _lat: f64, _lng: f64, _page_type: &str) -> Value {
        json!({
            "restaurants": [
                {"id": "r1", "name": "Dosa Corner", "rating": 4.3, "cuisines": ["South Indian"]},
                {"id": "r2", "name": "Pizza Hub", "rating": 4.0, "cuisines": ["Pizza"]}
            ]
        })
    }
    async fn search(&self, _query: &str, _lat: f64, _lng: f64) -> Value {
        json!({"restaurants": [{"id": "r1", "name": "Dosa Corner"}]})
    }
    async fn menu(&self, _id: &str, _lat: f64, _lng: f64) -> Value {
        json!({
            "restaurant_name": "Dosa Corner",
            "restaurant_id": "r1",
            "cuisines": ["South Indian"],
            "rating": 4.3,
            "menu": [{"category": "Dosas", "items": [{"name": "Masala Dosa", "price": 80.0}]}]
        })
    }
}

struct Harness {
    orchestrator: Arc<ConversationOrchestrator>,
    memory: Arc<ConversationMemoryStore>,
}

/// 组装带脚本引擎的编排器；订单库预置一条已送达订单 o1
fn build_harness(mock: Arc<MockLlmClient>) -> Harness {
    let orders: Arc<dyn OrderStore> = {
        let store = SqliteOrderStore::open_in_memory().unwrap();
        store
            .put_order(&OrderRecord {
                order_id: "o1".to_string(),
                status: "Delivered".to_string(),
                items: vec![OrderItem {
                    name: "Veg Biryani".to_string(),
                    price: 220.0,
                    quantity: 1,
                }],
                total_price: 220.0,
            })
            .unwrap();
        Arc::new(store)
    };
    let provider: Arc<dyn FoodProviderClient> = Arc::new(StaticProvider);
    let workflow = Arc::new(RefundWorkflowStore::new());

    let mut registry = CapabilityRegistry::new();
    registry.register(SearchRestaurantsCapability::new(provider.clone()));
    registry.register(SearchFoodItemsCapability::new(provider.clone()));
    registry.register(GetRestaurantMenuCapability::new(provider));
    registry.register(GetOrderDetailsCapability::new(orders.clone()));
    registry.register(InitiateRefundCapability::new(orders.clone()));
    registry.register(GetRefundStatusCapability::new(orders));
    registry.register(VerifyRefundImageCapability::new(mock.clone()));
    registry.register(ManageRefundWorkflowCapability::new(workflow));
    registry.register(AnalyzeDocumentCapability::new(mock.clone()));

    let executor = Arc::new(CapabilityExecutor::new(registry, 5));
    let planner = Arc::new(Planner::new(mock, build_system_prompt(&executor)));
    let memory = Arc::new(ConversationMemoryStore::new(10));
    let orchestrator = Arc::new(ConversationOrchestrator::new(
        planner,
        executor,
        memory.clone(),
        20,
    ));
    Harness {
        orchestrator,
        memory,
    }
}

fn turn(message: &str, conversation_id: &str) -> TurnRequest {
    TurnRequest {
        message: message.to_string(),
        conversation_id: conversation_id.to_string(),
        location: GeoPoint::default(),
        image: None,
        image_name: None,
    }
}

async fn collect_events(harness: &Harness, request: TurnRequest) -> Vec<AgentEvent> {
    let mut rx = harness.orchestrator.stream_turn(request);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let done = matches!(event, AgentEvent::Done { .. });
        events.push(event);
        if done {
            break;
        }
    }
    events
}

#[tokio::test]
async fn test_popular_restaurants_turn() {
    let mock = Arc::new(MockLlmClient::new());
    mock.push_output(
        r#"Step 1: I need to find popular restaurants nearby. {"tool": "search_restaurants", "args": {"query": "popular"}}"#,
    );
    mock.push_output("Here are some popular restaurants near you!");
    let harness = build_harness(mock);

    let events = collect_events(&harness, turn("What's popular nearby?", "conv-1")).await;

    // thinking 最先，done 最后且回显会话 id
    assert!(matches!(events.first(), Some(AgentEvent::Thinking { .. })));
    match events.last() {
        Some(AgentEvent::Done { conversation_id }) => assert_eq!(conversation_id, "conv-1"),
        other => panic!("expected done last, got {:?}", other),
    }

    assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolStart { .. })));
    assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolEnd { .. })));
    // 2 家餐厅 → 至少 2 个结构化事件（回合末尾的兼容补发会再加一份）
    let structured = events
        .iter()
        .filter(|e| matches!(e, AgentEvent::StructuredData { .. }))
        .count();
    assert!(structured >= 2, "expected structured cards, got {}", structured);

    let message = events.iter().find_map(|e| match e {
        AgentEvent::Message { data } => Some(data.clone()),
        _ => None,
    });
    assert!(!message.unwrap().is_empty());
}

#[tokio::test]
async fn test_structured_cards_precede_final_message() {
    let mock = Arc::new(MockLlmClient::new());
    mock.push_output(r#"{"tool": "search_restaurants", "args": {"query": "popular"}}"#);
    mock.push_output("Done looking!");
    let harness = build_harness(mock);

    let events = collect_events(&harness, turn("restaurants please", "conv-2")).await;
    let first_structured = events
        .iter()
        .position(|e| matches!(e, AgentEvent::StructuredData { .. }))
        .expect("no structured events");
    let message_pos = events
        .iter()
        .position(|e| matches!(e, AgentEvent::Message { .. }))
        .expect("no message event");
    assert!(first_structured < message_pos);
}

#[tokio::test]
async fn test_engine_failure_still_ends_with_done() {
    let mock = Arc::new(MockLlmClient::new());
    mock.push_error("upstream 500");
    let harness = build_harness(mock);

    let events = collect_events(&harness, turn("hello", "conv-3")).await;
    assert!(matches!(events.first(), Some(AgentEvent::Thinking { .. })));
    assert!(events.iter().any(|e| matches!(e, AgentEvent::Error { .. })));
    assert!(matches!(events.last(), Some(AgentEvent::Done { .. })));
    // 失败回合没有 message
    assert!(!events.iter().any(|e| matches!(e, AgentEvent::Message { .. })));
}

#[tokio::test]
async fn test_capability_error_does_not_abort_turn() {
    let mock = Arc::new(MockLlmClient::new());
    mock.push_output(r#"{"tool": "get_order_details", "args": {"order_id": "missing"}}"#);
    mock.push_output("I could not find that order, please double-check the ID.");
    let harness = build_harness(mock);

    let events = collect_events(&harness, turn("where is my order?", "conv-4")).await;
    assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolError { .. })));
    assert!(events.iter().any(|e| matches!(e, AgentEvent::Message { .. })));
    assert!(matches!(events.last(), Some(AgentEvent::Done { .. })));
}

#[tokio::test]
async fn test_image_refund_flow() {
    let mock = Arc::new(MockLlmClient::new());
    // 规划脚本与图片校验脚本按调用顺序排列
    mock.push_output(r#"{"tool": "manage_refund_workflow", "args": {"action": "create", "order_id": "o1"}}"#);
    mock.push_output(r#"{"tool": "manage_refund_workflow", "args": {"action": "update", "field": "reason", "value": "items damaged in transit"}}"#);
    mock.push_output(r#"{"tool": "manage_refund_workflow", "args": {"action": "update", "field": "has_image", "value": true}}"#);
    mock.push_output(r#"{"tool": "manage_refund_workflow", "args": {"action": "get"}}"#);
    mock.push_output(r#"{"tool": "verify_refund_image", "args": {"reason": "items damaged in transit"}}"#);
    // 这一条被 verify_refund_image 的多模态调用消费
    mock.push_output(
        r#"{"verification_score": 85, "verification_status": "verified", "detected_issues": ["crushed box"], "matches_order_items": true, "verification_notes": "clear damage", "flagged_issues": [], "recommendation": "approve"}"#,
    );
    mock.push_output(r#"{"tool": "manage_refund_workflow", "args": {"action": "decide", "validation_score": 85, "recommendation": "approve", "decision_notes": "image matches claim"}}"#);
    mock.push_output("Your refund has been approved and will be processed shortly.");
    let harness = build_harness(mock);

    let request = TurnRequest {
        message: "I want a refund, my order arrived damaged".to_string(),
        conversation_id: "conv-5".to_string(),
        location: GeoPoint::default(),
        image: Some("aGVsbG8=".to_string()),
        image_name: Some("damaged.jpg".to_string()),
    };
    let events = collect_events(&harness, request).await;

    // 工作流状态卡与图片校验卡都应出现在结构化通道上
    let kinds: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::StructuredData { data } => Some(data.kind.as_str().to_string()),
            _ => None,
        })
        .collect();
    assert!(kinds.iter().any(|k| k == "refund_workflow_state"), "kinds: {:?}", kinds);
    assert!(kinds.iter().any(|k| k == "image_verification_result"), "kinds: {:?}", kinds);

    assert!(matches!(events.last(), Some(AgentEvent::Done { .. })));

    // 图片回合的最终回复写入会话记忆
    let history = harness.memory.history("conv-5");
    assert!(history
        .iter()
        .any(|m| m.content.contains("refund has been approved")));
}

#[tokio::test]
async fn test_memory_recall_turns_share_history() {
    let mock = Arc::new(MockLlmClient::new());
    mock.push_output("Pizza is on the way!");
    let harness = build_harness(mock);
    collect_events(&harness, turn("order me a pizza", "conv-6")).await;

    // 第二回合：用户消息已记入会话记忆
    let history = harness.memory.history("conv-6");
    assert!(history.iter().any(|m| m.content.contains("order me a pizza")));
}
