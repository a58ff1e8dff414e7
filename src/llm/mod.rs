//! 推理引擎客户端：抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod planner;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use planner::{parse_engine_output, CapabilityCall, Planner, PlannerOutput};
pub use traits::LlmClient;
