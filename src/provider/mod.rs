//! 上游餐厅数据源客户端
//!
//! FoodProviderClient trait 定义 list / search / menu 三个接口；失败统一返回
//! {error, message} 形态的 JSON，不抛异常。HttpFoodProvider 为 reqwest 实现，
//! 带各接口独立 TTL 的内存缓存与指数退避重试；响应解析为本系统消费的
//! 扁平餐厅 / 菜单形态。

pub mod client;
pub mod extract;

pub use client::{FoodProviderClient, HttpFoodProvider};
