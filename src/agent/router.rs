//! 事件路由：双队列分拣
//!
//! structured_data 专走结构化队列；tool_end 先经卡片提取，提取出的每张卡
//! 包装为 structured_data 事件入结构化队列（保序扇出），原 tool_end 再入
//! 叙述队列；其余事件只入叙述队列。路由绝不向外抛错：内部失败时退回
//! 叙述队列并记日志，事件不允许悄悄丢失。

use tokio::sync::mpsc::UnboundedSender;

use crate::agent::cards::extract_cards;
use crate::agent::events::AgentEvent;

/// 双队列路由器：持有结构化与叙述两个发送端
pub struct EventRouter {
    structured_tx: UnboundedSender<AgentEvent>,
    narration_tx: UnboundedSender<AgentEvent>,
}

impl EventRouter {
    pub fn new(
        structured_tx: UnboundedSender<AgentEvent>,
        narration_tx: UnboundedSender<AgentEvent>,
    ) -> Self {
        Self {
            structured_tx,
            narration_tx,
        }
    }

    /// 分拣单个事件。发送失败（接收端已放弃消费）只记日志。
    pub fn route(&self, event: AgentEvent) {
        match event {
            AgentEvent::StructuredData { .. } => {
                if let Err(e) = self.structured_tx.send(event) {
                    // 退路：尽力送叙述队列，保证事件不整体丢失
                    tracing::warn!("structured queue closed: {}", e);
                    let _ = self.narration_tx.send(e.0);
                }
            }
            AgentEvent::ToolEnd {
                ref tool_name,
                ref output,
            } => {
                for card in extract_cards(output, Some(tool_name.as_str())) {
                    let structured = AgentEvent::StructuredData { data: card };
                    if let Err(e) = self.structured_tx.send(structured) {
                        tracing::warn!("structured queue closed: {}", e);
                        let _ = self.narration_tx.send(e.0);
                    }
                }
                if let Err(e) = self.narration_tx.send(event) {
                    tracing::warn!("narration queue closed, tool_end dropped: {}", e);
                }
            }
            other => {
                if let Err(e) = self.narration_tx.send(other) {
                    tracing::warn!("narration queue closed, event dropped: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::cards::{CardKind, StructuredCard};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn make_router() -> (
        EventRouter,
        mpsc::UnboundedReceiver<AgentEvent>,
        mpsc::UnboundedReceiver<AgentEvent>,
    ) {
        let (structured_tx, structured_rx) = mpsc::unbounded_channel();
        let (narration_tx, narration_rx) = mpsc::unbounded_channel();
        (
            EventRouter::new(structured_tx, narration_tx),
            structured_rx,
            narration_rx,
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn test_tool_end_fans_out_cards() {
        let (router, mut structured_rx, mut narration_rx) = make_router();
        // 两个结果项 → 2 张卡
        router.route(AgentEvent::ToolEnd {
            tool_name: "search_restaurants".to_string(),
            output: json!({
                "results": [
                    {"name": "A", "rating": 4.0},
                    {"name": "B", "cuisines": ["Pizza"]}
                ]
            }),
        });
        let structured = drain(&mut structured_rx);
        let narration = drain(&mut narration_rx);
        assert_eq!(structured.len(), 2);
        assert_eq!(narration.len(), 1);
        assert!(matches!(narration[0], AgentEvent::ToolEnd { .. }));
        assert!(structured
            .iter()
            .all(|e| matches!(e, AgentEvent::StructuredData { .. })));
    }

    #[test]
    fn test_structured_data_goes_only_to_structured_queue() {
        let (router, mut structured_rx, mut narration_rx) = make_router();
        router.route(AgentEvent::StructuredData {
            data: StructuredCard::new(CardKind::Restaurant, json!({"name": "X"})),
        });
        assert_eq!(drain(&mut structured_rx).len(), 1);
        assert!(drain(&mut narration_rx).is_empty());
    }

    #[test]
    fn test_other_events_go_to_narration() {
        let (router, mut structured_rx, mut narration_rx) = make_router();
        router.route(AgentEvent::Thinking {
            data: "Analyzing your request...".to_string(),
        });
        router.route(AgentEvent::ToolError {
            tool_name: "search_restaurants".to_string(),
            message: "upstream down".to_string(),
        });
        assert!(drain(&mut structured_rx).is_empty());
        assert_eq!(drain(&mut narration_rx).len(), 2);
    }

    #[test]
    fn test_tool_end_without_cards_only_narration() {
        let (router, mut structured_rx, mut narration_rx) = make_router();
        router.route(AgentEvent::ToolEnd {
            tool_name: "search_restaurants".to_string(),
            output: json!({"message": "No restaurants found"}),
        });
        assert!(drain(&mut structured_rx).is_empty());
        assert_eq!(drain(&mut narration_rx).len(), 1);
    }

    #[test]
    fn test_closed_structured_queue_falls_back_to_narration() {
        let (structured_tx, structured_rx) = mpsc::unbounded_channel();
        let (narration_tx, mut narration_rx) = mpsc::unbounded_channel();
        drop(structured_rx);
        let router = EventRouter::new(structured_tx, narration_tx);
        router.route(AgentEvent::StructuredData {
            data: StructuredCard::new(CardKind::Restaurant, json!({"name": "X"})),
        });
        // 事件未丢失：落到叙述队列
        assert_eq!(drain(&mut narration_rx).len(), 1);
    }
}
