//! 餐厅数据源客户端：trait 与 HTTP 实现

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ProviderSection;
use crate::provider::extract::{extract_menu, extract_restaurants};

/// 上游数据源接口：listing / 搜索 / 菜单。失败返回 {error, message} JSON。
#[async_trait]
pub trait FoodProviderClient: Send + Sync {
    /// 按页面类型拉取餐厅列表（COLLECTION / NEW_RESTAURANT / ...）
    async fn list(&self, latitude: f64, longitude: f64, page_type: &str) -> Value;

    /// 按关键字搜索餐厅
    async fn search(&self, query: &str, latitude: f64, longitude: f64) -> Value;

    /// 拉取指定餐厅菜单（扁平化为 {restaurant_name, cuisines, rating, menu} 形态）
    async fn menu(&self, restaurant_id: &str, latitude: f64, longitude: f64) -> Value;
}

const MAX_RETRIES: u32 = 3;
const BACKOFF_FACTOR: f64 = 1.5;

/// reqwest 实现：短 TTL 内存缓存 + 指数退避重试
pub struct HttpFoodProvider {
    client: Client,
    base_url: String,
    listing_ttl: Duration,
    search_ttl: Duration,
    menu_ttl: Duration,
    cache: Mutex<HashMap<String, (Instant, Value)>>,
}

impl HttpFoodProvider {
    pub fn new(cfg: &ProviderSection) -> Self {
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            listing_ttl: Duration::from_secs(cfg.listing_cache_ttl_secs),
            search_ttl: Duration::from_secs(cfg.search_cache_ttl_secs),
            menu_ttl: Duration::from_secs(cfg.menu_cache_ttl_secs),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache_get(&self, key: &str, ttl: Duration) -> Option<Value> {
        let cache = self.cache.lock().unwrap();
        cache.get(key).and_then(|(at, data)| {
            if at.elapsed() < ttl {
                Some(data.clone())
            } else {
                None
            }
        })
    }

    fn cache_put(&self, key: &str, data: Value) {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(key.to_string(), (Instant::now(), data));
    }

    /// 带重试的 GET；HTTP 非 200 / 网络错误 / 非零 statusCode 统一转为 {error, message}
    async fn fetch(&self, url: &str) -> Value {
        let mut attempt = 0u32;
        loop {
            let response = self.client.get(url).send().await;
            match response {
                Ok(resp) if resp.status().is_success() => {
                    let data: Value = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => {
                            return json!({
                                "error": format!("Invalid JSON from provider: {}", e),
                                "message": "Failed to parse provider response",
                            })
                        }
                    };
                    // 业务层错误码
                    let status_code = data.get("statusCode").and_then(|v| v.as_i64()).unwrap_or(0);
                    if status_code != 0 {
                        let message = data
                            .get("statusMessage")
                            .and_then(|v| v.as_str())
                            .unwrap_or("Unknown provider error");
                        return json!({
                            "error": message,
                            "status_code": status_code,
                        });
                    }
                    return data;
                }
                Ok(resp) => {
                    let status = resp.status();
                    if attempt + 1 < MAX_RETRIES {
                        attempt += 1;
                        let wait = BACKOFF_FACTOR.powi(attempt as i32);
                        tracing::debug!(%status, attempt, "provider request failed, retrying in {:.1}s", wait);
                        tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                        continue;
                    }
                    return json!({
                        "error": format!("Provider returned status code {}", status),
                        "message": "Failed to fetch data from provider",
                    });
                }
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES {
                        attempt += 1;
                        let wait = BACKOFF_FACTOR.powi(attempt as i32);
                        tracing::debug!(error = %e, attempt, "provider network error, retrying in {:.1}s", wait);
                        tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                        continue;
                    }
                    return json!({
                        "error": format!("Network error: {}", e),
                        "message": "Failed to connect to provider",
                    });
                }
            }
        }
    }
}

#[async_trait]
impl FoodProviderClient for HttpFoodProvider {
    async fn list(&self, latitude: f64, longitude: f64, page_type: &str) -> Value {
        let cache_key = format!("restaurants:{}:{}:{}", page_type, latitude, longitude);
        if let Some(cached) = self.cache_get(&cache_key, self.listing_ttl) {
            tracing::debug!(%page_type, "using cached restaurant listing");
            return cached;
        }
        let url = format!(
            "{}/restaurants/list/v5?lat={}&lng={}&page_type={}",
            self.base_url, latitude, longitude, page_type
        );
        let data = self.fetch(&url).await;
        if data.get("error").is_some() {
            return data;
        }
        let listing = json!({ "restaurants": extract_restaurants(&data) });
        self.cache_put(&cache_key, listing.clone());
        listing
    }

    async fn search(&self, query: &str, latitude: f64, longitude: f64) -> Value {
        let cache_key = format!("search:{}:{}:{}", query, latitude, longitude);
        if let Some(cached) = self.cache_get(&cache_key, self.search_ttl) {
            tracing::debug!(%query, "using cached search results");
            return cached;
        }
        let url = format!(
            "{}/restaurants/search/v3?lat={}&lng={}&str={}",
            self.base_url, latitude, longitude, query
        );
        let data = self.fetch(&url).await;
        if data.get("error").is_some() {
            return data;
        }
        let listing = json!({ "restaurants": extract_restaurants(&data) });
        self.cache_put(&cache_key, listing.clone());
        listing
    }

    async fn menu(&self, restaurant_id: &str, latitude: f64, longitude: f64) -> Value {
        let cache_key = format!("menu:{}:{}:{}", restaurant_id, latitude, longitude);
        if let Some(cached) = self.cache_get(&cache_key, self.menu_ttl) {
            tracing::debug!(%restaurant_id, "using cached menu");
            return cached;
        }
        let url = format!(
            "{}/menu/pl?page-type=REGULAR_MENU&complete-menu=true&lat={}&lng={}&restaurantId={}",
            self.base_url, latitude, longitude, restaurant_id
        );
        let data = self.fetch(&url).await;
        if data.get("error").is_some() {
            return data;
        }
        let menu = extract_menu(&data, restaurant_id);
        self.cache_put(&cache_key, menu.clone());
        menu
    }
}
