//! 退款工作流：collection → validation → decision 状态机
//!
//! 按 conversation_id 隔离的进程内状态，由 manage_refund_workflow 能力驱动；
//! 阶段只进不退，decision 为终态。

pub mod criteria;
pub mod state;
pub mod store;

pub use criteria::verification_criteria;
pub use state::{ReasonCategory, RefundStage, RefundWorkflowState, WorkflowError};
pub use store::RefundWorkflowStore;
