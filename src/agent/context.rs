//! 回合上下文
//!
//! 显式传入每次能力调用的上下文对象：会话 id、本回合图片、用户坐标。
//! 取代任何全局可变状态共享「当前图片」的做法。

use serde::Deserialize;

/// 用户坐标（缺省为 Bangalore 市中心）
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self {
            latitude: 12.9716,
            longitude: 77.5946,
        }
    }
}

/// 单回合上下文：随每次能力调用显式传递
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub conversation_id: String,
    /// 本回合用户上传的图片（base64），供图片校验 / 文档分析能力读取
    pub image: Option<String>,
    pub location: GeoPoint,
}

impl TurnContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            image: None,
            location: GeoPoint::default(),
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = location;
        self
    }
}
