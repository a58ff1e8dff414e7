//! 能力箱
//!
//! 九个具名能力实现 Capability trait（name / description / parameters_schema /
//! invoke），由 CapabilityRegistry 按名注册与查找，CapabilityExecutor 在调用时
//! 加超时并统一把失败转为 {error, message} 形态的 JSON（能力错误是数据，不是异常）。

pub mod executor;
pub mod orders;
pub mod refund_workflow;
pub mod registry;
pub mod search;
pub mod vision;

pub use executor::CapabilityExecutor;
pub use orders::{GetOrderDetailsCapability, GetRefundStatusCapability, InitiateRefundCapability};
pub use refund_workflow::ManageRefundWorkflowCapability;
pub use registry::{Capability, CapabilityRegistry};
pub use search::{GetRestaurantMenuCapability, SearchFoodItemsCapability, SearchRestaurantsCapability};
pub use vision::{AnalyzeDocumentCapability, VerifyRefundImageCapability};
