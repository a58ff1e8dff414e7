//! 订单与退款记录存储（SQLite）

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 订单快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub status: String,
    pub items: Vec<OrderItem>,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

/// 退款记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRecord {
    pub refund_id: String,
    pub order_id: String,
    pub status: String,
    pub amount: f64,
    pub reason: String,
    pub timestamp: String,
    pub estimated_days: u32,
}

/// 订单 / 退款读写契约
pub trait OrderStore: Send + Sync {
    fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>, StoreError>;
    fn put_order(&self, order: &OrderRecord) -> Result<(), StoreError>;
    fn create_refund(&self, refund: &RefundRecord) -> Result<(), StoreError>;
    fn get_refund(&self, order_id: &str) -> Result<Option<RefundRecord>, StoreError>;
}

/// rusqlite 实现：orders 表存 JSON 快照，refunds 表按 order_id 查最近一条
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orders (
                order_id TEXT PRIMARY KEY,
                snapshot TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS refunds (
                refund_id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                status TEXT NOT NULL,
                amount REAL NOT NULL,
                reason TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                estimated_days INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_refunds_order ON refunds(order_id);",
        )?;
        Ok(())
    }
}

impl OrderStore for SqliteOrderStore {
    fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let snapshot: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM orders WHERE order_id = ?1",
                params![order_id],
                |row| row.get(0),
            )
            .optional()?;
        match snapshot {
            Some(json) => {
                let record: OrderRecord = serde_json::from_str(&json)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn put_order(&self, order: &OrderRecord) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(order)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO orders (order_id, snapshot) VALUES (?1, ?2)",
            params![order.order_id, snapshot],
        )?;
        Ok(())
    }

    fn create_refund(&self, refund: &RefundRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO refunds (refund_id, order_id, status, amount, reason, timestamp, estimated_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                refund.refund_id,
                refund.order_id,
                refund.status,
                refund.amount,
                refund.reason,
                refund.timestamp,
                refund.estimated_days,
            ],
        )?;
        Ok(())
    }

    fn get_refund(&self, order_id: &str) -> Result<Option<RefundRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let refund = conn
            .query_row(
                "SELECT refund_id, order_id, status, amount, reason, timestamp, estimated_days
                 FROM refunds WHERE order_id = ?1 ORDER BY timestamp DESC LIMIT 1",
                params![order_id],
                |row| {
                    Ok(RefundRecord {
                        refund_id: row.get(0)?,
                        order_id: row.get(1)?,
                        status: row.get(2)?,
                        amount: row.get(3)?,
                        reason: row.get(4)?,
                        timestamp: row.get(5)?,
                        estimated_days: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(refund)
    }
}

impl OrderRecord {
    /// 订单 JSON 形态（前端 / 能力输出消费）
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
