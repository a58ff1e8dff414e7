//! 订单 / 退款持久化
//!
//! OrderStore trait 定义核心所需的读写契约（查订单、建退款、查退款）；
//! SqliteOrderStore 为 rusqlite 实现，orders 表存订单 JSON 快照，
//! refunds 表存退款记录。

pub mod orders;

pub use orders::{OrderItem, OrderRecord, OrderStore, RefundRecord, SqliteOrderStore, StoreError};
