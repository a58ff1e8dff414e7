//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TIFFIN__*` 覆盖（双下划线表示嵌套，
//! 如 `TIFFIN__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub agent: AgentSection,
}

/// [server] 段：监听端口
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

/// [llm] 段：推理引擎端点（OpenAI 兼容）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名，缺省 OPENAI_API_KEY
    pub api_key_env: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [provider] 段：上游餐厅数据源（请求超时与各接口缓存 TTL）
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_listing_cache_ttl")]
    pub listing_cache_ttl_secs: u64,
    #[serde(default = "default_search_cache_ttl")]
    pub search_cache_ttl_secs: u64,
    #[serde(default = "default_menu_cache_ttl")]
    pub menu_cache_ttl_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            timeout_secs: default_provider_timeout_secs(),
            listing_cache_ttl_secs: default_listing_cache_ttl(),
            search_cache_ttl_secs: default_search_cache_ttl(),
            menu_cache_ttl_secs: default_menu_cache_ttl(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://www.swiggy.com/dapi".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    15
}

fn default_listing_cache_ttl() -> u64 {
    300
}

fn default_search_cache_ttl() -> u64 {
    180
}

fn default_menu_cache_ttl() -> u64 {
    600
}

/// [store] 段：订单 / 退款数据库路径，未设置时用内存库
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
}

/// [agent] 段：回合内最大推理步数、记忆窗口、单次能力调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// 每个会话保留的对话轮数（FIFO 淘汰）
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
    #[serde(default = "default_capability_timeout_secs")]
    pub capability_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            memory_window: default_memory_window(),
            capability_timeout_secs: default_capability_timeout_secs(),
        }
    }
}

fn default_max_steps() -> usize {
    20
}

fn default_memory_window() -> usize {
    10
}

fn default_capability_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            llm: LlmSection::default(),
            provider: ProviderSection::default(),
            store: StoreSection::default(),
            agent: AgentSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TIFFIN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TIFFIN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TIFFIN")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
