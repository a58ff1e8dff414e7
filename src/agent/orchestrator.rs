//! 回合编排器
//!
//! 驱动单个用户回合：引擎规划 → 能力执行 → 事件经双队列路由 →
//! 按「结构化优先」多路输出。输出序列的收尾是确定的：
//! message（或 error）→ 兼容通道的结构化卡片 → 恰好一个 done。
//! done 永远是最后一个事件，即使引擎中途失败。

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::agent::cards::extract_cards;
use crate::agent::context::{GeoPoint, TurnContext};
use crate::agent::events::AgentEvent;
use crate::agent::router::EventRouter;
use crate::capabilities::CapabilityExecutor;
use crate::core::AgentError;
use crate::llm::{parse_engine_output, Planner, PlannerOutput};
use crate::memory::{ConversationMemoryStore, Message};

/// 记忆召回触发词：命中则给引擎输入加历史标记
const MEMORY_RECALL_PHRASES: [&str; 8] = [
    "what did i ask",
    "previous",
    "earlier",
    "first question",
    "remember",
    "summarize",
    "conversation",
    "chat history",
];

/// 引擎无回答时的兜底文案
const FALLBACK_ANSWER: &str = "I'm not sure how to respond to that.";

/// 单个用户回合的输入
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub message: String,
    pub conversation_id: String,
    pub location: GeoPoint,
    /// base64 图片（可选）
    pub image: Option<String>,
    /// 图片元数据里的文件名（用于给消息补充说明）
    pub image_name: Option<String>,
}

/// 回合编排器：组合 Planner、能力执行器与会话记忆
#[derive(Clone)]
pub struct ConversationOrchestrator {
    planner: Arc<Planner>,
    executor: Arc<CapabilityExecutor>,
    memory: Arc<ConversationMemoryStore>,
    max_steps: usize,
}

/// 命中记忆召回触发词（大小写不敏感的子串匹配）
fn is_memory_recall(text: &str) -> bool {
    let lower = text.to_lowercase();
    MEMORY_RECALL_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase))
}

fn send(out: &UnboundedSender<AgentEvent>, event: AgentEvent) {
    // 客户端断开后发送失败是正常情形，引擎侧继续跑完
    let _ = out.send(event);
}

impl ConversationOrchestrator {
    pub fn new(
        planner: Arc<Planner>,
        executor: Arc<CapabilityExecutor>,
        memory: Arc<ConversationMemoryStore>,
        max_steps: usize,
    ) -> Self {
        Self {
            planner,
            executor,
            memory,
            max_steps,
        }
    }

    /// 启动一个回合，返回有序事件流的接收端。
    /// 事件顺序保证：thinking 最先，done 最后；结构化事件相对叙述事件优先。
    pub fn stream_turn(&self, request: TurnRequest) -> UnboundedReceiver<AgentEvent> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_turn(request, out_tx).await;
        });
        out_rx
    }

    async fn run_turn(&self, request: TurnRequest, out: UnboundedSender<AgentEvent>) {
        let conversation_id = request.conversation_id.clone();

        // 图片回合给消息补充说明，引导引擎去分析图片
        let mut message = request.message.clone();
        if request.image.is_some() {
            let name = request
                .image_name
                .clone()
                .unwrap_or_else(|| "uploaded image".to_string());
            message = format!(
                "{}\n\n[Note: I've attached an image of {} for you to analyze]",
                message, name
            );
        }

        // 历史快照取在写入本条消息之前，引擎输入自带当前消息
        let history = self.memory.history(&conversation_id);
        self.memory.add_user_message(&conversation_id, &message);

        let enhanced_input = if is_memory_recall(&message) {
            format!("[CONVERSATION HISTORY QUERY] {}", message)
        } else {
            message
        };

        // 活性保证：任何能力工作开始前先给客户端一个信号
        send(
            &out,
            AgentEvent::Thinking {
                data: "Analyzing your request...".to_string(),
            },
        );

        let (structured_tx, mut structured_rx) = mpsc::unbounded_channel();
        let (narration_tx, mut narration_rx) = mpsc::unbounded_channel();
        let router = EventRouter::new(structured_tx, narration_tx);

        let ctx = TurnContext::new(conversation_id.clone())
            .with_image(request.image.clone())
            .with_location(request.location);
        let planner = Arc::clone(&self.planner);
        let executor = Arc::clone(&self.executor);
        let max_steps = self.max_steps;
        let engine_task = tokio::spawn(async move {
            // router 随任务结束被 drop，两个队列关闭即引擎完成
            drive_engine(planner, executor, router, ctx, enhanced_input, history, max_steps).await
        });

        // 多路输出：每轮先清空结构化队列，再在两个队列上做偏向等待。
        // 同一轮里观察到的结构化事件总是先于未处理的叙述事件发出；
        // 叙述事件最多落后一个等待周期，不会饿死。
        let mut legacy_cards = Vec::new();
        let mut structured_open = true;
        let mut narration_open = true;
        while structured_open || narration_open {
            if structured_open {
                loop {
                    match structured_rx.try_recv() {
                        Ok(event) => send(&out, event),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            structured_open = false;
                            break;
                        }
                    }
                }
            }
            tokio::select! {
                biased;
                maybe = structured_rx.recv(), if structured_open => match maybe {
                    Some(event) => send(&out, event),
                    None => structured_open = false,
                },
                maybe = narration_rx.recv(), if narration_open => match maybe {
                    Some(event) => {
                        // 兼容侧通道：tool_end 的卡片在回合末尾再补发一次
                        if let AgentEvent::ToolEnd { ref tool_name, ref output } = event {
                            legacy_cards.extend(extract_cards(output, Some(tool_name.as_str())));
                        }
                        send(&out, event);
                    }
                    None => narration_open = false,
                },
                else => break,
            }
        }

        // 引擎结果：正常回答发 message，异常转 error 事件；两种情形都以 done 收尾
        match engine_task.await {
            Ok(Ok(answer)) => {
                let answer = if answer.trim().is_empty() {
                    FALLBACK_ANSWER.to_string()
                } else {
                    answer
                };
                if request.image.is_some() {
                    self.memory.add_assistant_message(&conversation_id, &answer);
                }
                send(&out, AgentEvent::Message { data: answer });
                for card in legacy_cards {
                    send(&out, AgentEvent::StructuredData { data: card });
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(%conversation_id, error = %e, "engine failed, ending turn");
                send(
                    &out,
                    AgentEvent::Error {
                        data: format!("Error processing request: {}", e),
                    },
                );
            }
            Err(join_err) => {
                tracing::error!(%conversation_id, error = %join_err, "engine task panicked");
                send(
                    &out,
                    AgentEvent::Error {
                        data: format!("Error processing request: {}", join_err),
                    },
                );
            }
        }

        send(&out, AgentEvent::Done { conversation_id });
    }
}

/// 引擎驱动循环：plan → 能力调用 → 观察写回 → 再 plan，直到给出最终回答。
/// 能力失败是数据（tool_error 事件），只有引擎自身失败才向上返回 Err。
async fn drive_engine(
    planner: Arc<Planner>,
    executor: Arc<CapabilityExecutor>,
    router: EventRouter,
    ctx: TurnContext,
    user_input: String,
    history: Vec<Message>,
    max_steps: usize,
) -> Result<String, AgentError> {
    let mut messages = history;
    messages.push(Message::user(user_input));

    let mut step = 0;
    loop {
        if step >= max_steps {
            tracing::warn!(max_steps, "reached step limit, asking engine to wrap up");
            return Ok(FALLBACK_ANSWER.to_string());
        }

        let output = planner.plan(&messages).await?;

        match parse_engine_output(&output) {
            Ok(PlannerOutput::Response(answer)) => return Ok(answer),
            Ok(PlannerOutput::CapabilityCall { call, thought }) => {
                step += 1;
                if !thought.is_empty() {
                    router.route(AgentEvent::ReasoningStep {
                        step,
                        thought,
                        timestamp: chrono::Local::now().to_rfc3339(),
                    });
                }
                router.route(AgentEvent::AgentAction {
                    tool_name: call.tool.clone(),
                    step,
                    input: call.args.clone(),
                });
                router.route(AgentEvent::ToolStart {
                    tool_name: call.tool.clone(),
                    input: call.args.clone(),
                });

                let output = executor.invoke(&call.tool, call.args, &ctx).await;
                if let Some(error) = output.get("error").and_then(|v| v.as_str()) {
                    let message = output
                        .get("message")
                        .and_then(|v| v.as_str())
                        .unwrap_or(error);
                    router.route(AgentEvent::ToolError {
                        tool_name: call.tool.clone(),
                        message: message.to_string(),
                    });
                } else {
                    router.route(AgentEvent::ToolEnd {
                        tool_name: call.tool.clone(),
                        output: output.clone(),
                    });
                }

                // 调用与观察写回对话，供下一轮 plan 使用
                let observation =
                    serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string());
                messages.push(Message::assistant(format!(
                    "Tool call: {} | Result: {}",
                    call.tool, observation
                )));
                messages.push(Message::user(format!(
                    "Observation from {}: {}",
                    call.tool, observation
                )));
            }
            Err(AgentError::JsonParse(raw)) => {
                // 格式错误给引擎一次纠正机会，步数照常累计防止死循环
                step += 1;
                tracing::debug!(error = %raw, "engine output was not valid JSON, retrying");
                messages.push(Message::user(format!(
                    "Your previous output contained invalid JSON: {}. \
                     To call a capability, output exactly one JSON object of the form \
                     {{\"tool\": \"capability_name\", \"args\": {{...}}}} and nothing else. \
                     To answer the user directly, output plain text without JSON.",
                    raw
                )));
            }
            Err(e) => return Err(e),
        }
    }
}

/// 构建 system prompt：助手角色、能力选择指南、退款流程说明与调用 schema
pub fn build_system_prompt(executor: &CapabilityExecutor) -> String {
    let capability_list: String = executor
        .descriptions()
        .iter()
        .map(|(name, desc)| format!("- {}: {}", name, desc))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a helpful assistant for a food delivery app.

For complex user requests, break down your thinking into multiple steps and use different capabilities sequentially.
Begin each reasoning step with "Step X: I need to [your reasoning in 1-2 sentences]", then output the capability call.

CAPABILITY SELECTION GUIDELINES:
- For restaurants or places to eat, use search_restaurants
- For specific food items or dishes, use search_food_items
- For restaurant menus, use get_restaurant_menu (requires restaurant_id)
- For order details, use get_order_details
- For refund requests, track progress with manage_refund_workflow, verify evidence with verify_refund_image, then call initiate_refund
- For uploaded documents (prescriptions, reports), use analyze_document

REFUND REQUEST HANDLING:
1. COLLECTION: verify the order ID with get_order_details, ask for the refund reason, ask for an image as evidence (not needed for late delivery)
2. VALIDATION: verify the uploaded image against the order and the stated reason with verify_refund_image
3. DECISION: record the outcome with manage_refund_workflow action "decide", then call initiate_refund with the validation details
Reject when no supporting image is provided (except late delivery), when the image does not show the claimed issue, or when the claim contradicts the evidence.

CONVERSATION MEMORY:
You may see prior turns of this conversation. When the user asks about previous messages, refer to that history; never claim the conversation just started. Inputs tagged [CONVERSATION HISTORY QUERY] are explicitly about the history.

CAPABILITY CALL FORMAT:
To call a capability, output exactly one JSON object: {{"tool": "capability_name", "args": {{...}}}}.
To answer the user, output plain conversational markdown without JSON.

Available capabilities:
{capability_list}

## Capability schemas
```json
{schema}
```"#,
        capability_list = capability_list,
        schema = executor.to_schema_json(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_recall_detection() {
        assert!(is_memory_recall("What did I ask you before?"));
        assert!(is_memory_recall("Can you SUMMARIZE our chat?"));
        assert!(!is_memory_recall("Find me a pizza place"));
    }
}
