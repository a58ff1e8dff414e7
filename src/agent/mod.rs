//! 对话编排核心
//!
//! events 定义回合事件联合体；cards 将能力输出归一为 UI 卡片；
//! router 把事件分拣到结构化/叙述双队列；orchestrator 驱动单个回合
//! 并按「结构化优先」顺序多路输出。

pub mod cards;
pub mod context;
pub mod events;
pub mod orchestrator;
pub mod router;

pub use cards::{extract_cards, CardKind, StructuredCard};
pub use context::{GeoPoint, TurnContext};
pub use events::AgentEvent;
pub use orchestrator::{ConversationOrchestrator, TurnRequest};
pub use router::EventRouter;
