//! Tiffin - Rust 外卖智能客服后端
//!
//! 模块划分：
//! - **agent**: 对话编排核心（事件、双队列路由、结构化卡片提取、回合驱动）
//! - **capabilities**: 能力箱（餐厅/菜品搜索、订单、退款、图片校验、文档分析）与执行器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: 推理引擎客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 按会话隔离的短期对话记忆
//! - **provider**: 上游餐厅数据源客户端（缓存 + 重试）
//! - **store**: 订单 / 退款持久化（SQLite）
//! - **workflow**: 退款工作流状态机（collection → validation → decision）
//! - **server**: HTTP 入口与 NDJSON 流式响应

pub mod agent;
pub mod capabilities;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod provider;
pub mod server;
pub mod store;
pub mod workflow;
