//! HTTP 入口
//!
//! POST /api/chat/stream 把回合事件以 NDJSON（一行一帧）推送给客户端，
//! 流在 done 帧后结束；另有健康检查、能力列表与会话历史接口。

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::agent::{AgentEvent, ConversationOrchestrator, GeoPoint, TurnRequest};
use crate::capabilities::CapabilityExecutor;
use crate::memory::{ConversationMemoryStore, Message};

/// 共享应用状态
pub struct AppState {
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub executor: Arc<CapabilityExecutor>,
    pub memory: Arc<ConversationMemoryStore>,
}

/// 入站回合请求
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub media: Option<MediaData>,
}

/// 附带媒体（目前仅图片）
#[derive(Debug, Deserialize)]
pub struct MediaData {
    #[serde(rename = "type")]
    pub media_type: String,
    /// base64 编码数据
    pub data: String,
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct HistoryRequest {
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    conversation_id: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct CapabilityInfo {
    name: String,
    description: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat/stream", post(api_chat_stream))
        .route("/api/capabilities", get(api_capabilities))
        .route("/api/conversation/history", post(api_history))
        .route("/api/conversation/:id", delete(api_clear_conversation))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state)
}

/// POST /api/chat/stream：执行一个回合，事件逐行推送（application/x-ndjson）
async fn api_chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, (StatusCode, String)> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let conversation_id = req
        .conversation_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let (image, image_name) = match req.media {
        Some(media) if media.media_type == "image" && !media.data.is_empty() => {
            let name = media
                .metadata
                .as_ref()
                .and_then(|m| m.get("name"))
                .and_then(|v| v.as_str())
                .map(String::from);
            (Some(media.data), name)
        }
        _ => (None, None),
    };

    let request = TurnRequest {
        message,
        conversation_id,
        location: req.location.unwrap_or_default(),
        image,
        image_name,
    };
    let events = state.orchestrator.stream_turn(request);

    let stream = stream::unfold(events, |mut rx: UnboundedReceiver<AgentEvent>| async move {
        let event = rx.recv().await?;
        let line = match serde_json::to_string(&event) {
            Ok(json) => format!("{}\n", json),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize event frame");
                return Some((Ok::<Bytes, std::convert::Infallible>(Bytes::new()), rx));
            }
        };
        Some((Ok(Bytes::from(line)), rx))
    });

    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        "application/x-ndjson; charset=utf-8".parse().unwrap(),
    );
    Ok(response)
}

/// GET /api/capabilities：注册能力列表（调试 / 前端展示）
async fn api_capabilities(State(state): State<Arc<AppState>>) -> Json<Vec<CapabilityInfo>> {
    let list = state
        .executor
        .descriptions()
        .into_iter()
        .map(|(name, description)| CapabilityInfo { name, description })
        .collect();
    Json(list)
}

/// POST /api/conversation/history：读取会话消息
async fn api_history(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HistoryRequest>,
) -> Json<HistoryResponse> {
    let messages = state.memory.history(&req.conversation_id);
    Json(HistoryResponse {
        conversation_id: req.conversation_id,
        messages,
    })
}

/// DELETE /api/conversation/:id：清除会话记忆
async fn api_clear_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.memory.clear(&id) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
