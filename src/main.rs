//! Tiffin 服务入口
//!
//! 启动: cargo run
//! POST http://127.0.0.1:8000/api/chat/stream

use std::sync::Arc;

use tiffin::agent::orchestrator::build_system_prompt;
use tiffin::agent::ConversationOrchestrator;
use tiffin::capabilities::{
    AnalyzeDocumentCapability, CapabilityExecutor, CapabilityRegistry, GetOrderDetailsCapability,
    GetRefundStatusCapability, GetRestaurantMenuCapability, InitiateRefundCapability,
    ManageRefundWorkflowCapability, SearchFoodItemsCapability, SearchRestaurantsCapability,
    VerifyRefundImageCapability,
};
use tiffin::config::load_config;
use tiffin::llm::{LlmClient, OpenAiClient, Planner};
use tiffin::memory::ConversationMemoryStore;
use tiffin::provider::{FoodProviderClient, HttpFoodProvider};
use tiffin::server::{build_router, AppState};
use tiffin::store::{OrderStore, SqliteOrderStore};
use tiffin::workflow::RefundWorkflowStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tiffin::observability::init();

    let cfg = load_config(None).unwrap_or_default();

    let api_key = cfg
        .llm
        .api_key_env
        .as_deref()
        .and_then(|k| std::env::var(k).ok());
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        api_key.as_deref(),
    ));

    let provider: Arc<dyn FoodProviderClient> = Arc::new(HttpFoodProvider::new(&cfg.provider));
    let orders: Arc<dyn OrderStore> = match cfg.store.path {
        Some(ref path) => Arc::new(SqliteOrderStore::open(path)?),
        None => Arc::new(SqliteOrderStore::open_in_memory()?),
    };
    let workflow = Arc::new(RefundWorkflowStore::new());

    let mut registry = CapabilityRegistry::new();
    registry.register(SearchRestaurantsCapability::new(provider.clone()));
    registry.register(SearchFoodItemsCapability::new(provider.clone()));
    registry.register(GetRestaurantMenuCapability::new(provider.clone()));
    registry.register(GetOrderDetailsCapability::new(orders.clone()));
    registry.register(InitiateRefundCapability::new(orders.clone()));
    registry.register(GetRefundStatusCapability::new(orders.clone()));
    registry.register(VerifyRefundImageCapability::new(llm.clone()));
    registry.register(ManageRefundWorkflowCapability::new(workflow.clone()));
    registry.register(AnalyzeDocumentCapability::new(llm.clone()));

    let executor = Arc::new(CapabilityExecutor::new(
        registry,
        cfg.agent.capability_timeout_secs,
    ));
    let planner = Arc::new(Planner::new(llm, build_system_prompt(&executor)));
    let memory = Arc::new(ConversationMemoryStore::new(cfg.agent.memory_window));
    let orchestrator = Arc::new(ConversationOrchestrator::new(
        planner,
        executor.clone(),
        memory.clone(),
        cfg.agent.max_steps,
    ));

    let state = Arc::new(AppState {
        orchestrator,
        executor,
        memory,
    });
    let app = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    tracing::info!("Tiffin agent backend: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
