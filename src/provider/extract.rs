//! 上游响应解析
//!
//! 上游返回深度嵌套的卡片结构；这里只取本系统消费的最小形态：
//! 扁平餐厅对象与 {category, items} 菜单分类列表。解析永不 panic，
//! 取不到就跳过。

use serde_json::{json, Value};

const GRID_WIDGET: &str = "type.googleapis.com/swiggy.gandalf.widgets.v2.GridWidget";
const RESTAURANT_CARD: &str = "type.googleapis.com/swiggy.presentation.food.v2.Restaurant";
const ITEM_CATEGORY: &str = "type.googleapis.com/swiggy.presentation.food.v2.ItemCategory";

/// 从餐厅 info 对象提取扁平餐厅数据
fn extract_restaurant_info(info: &Value) -> Option<Value> {
    let delivery_time = info
        .get("deliveryTime")
        .and_then(|v| v.as_i64())
        .or_else(|| {
            info.get("sla")
                .and_then(|sla| sla.get("deliveryTime"))
                .and_then(|v| v.as_i64())
        })
        .map(|mins| format!("{} min", mins))
        .unwrap_or_else(|| "30 min".to_string());

    Some(json!({
        "id": info.get("id").cloned().unwrap_or_else(|| json!("")),
        "name": info.get("name").cloned().unwrap_or_else(|| json!("Unknown Restaurant")),
        "rating": info.get("avgRating").cloned().unwrap_or_else(|| json!("N/A")),
        "cuisines": info.get("cuisines").cloned().unwrap_or_else(|| json!([])),
        "delivery_time": delivery_time,
        "cost_for_two": info.get("costForTwo").cloned().unwrap_or_else(|| json!("")),
        "location": info.get("areaName").cloned().unwrap_or_else(|| json!("")),
        "is_open": info.get("isOpen").cloned().unwrap_or_else(|| json!(true)),
    }))
}

/// 从 listing / 搜索响应提取餐厅列表
pub fn extract_restaurants(data: &Value) -> Vec<Value> {
    let mut restaurants = Vec::new();

    // listing 响应：data.cards[].card.card 为 GridWidget 时取 gridElements 下的餐厅
    if let Some(cards) = data
        .get("data")
        .and_then(|d| d.get("cards"))
        .and_then(|v| v.as_array())
    {
        for card in cards {
            let inner = card.get("card").and_then(|c| c.get("card"));
            let Some(inner) = inner else { continue };
            if inner.get("@type").and_then(|v| v.as_str()) != Some(GRID_WIDGET) {
                continue;
            }
            if let Some(items) = inner
                .get("gridElements")
                .and_then(|g| g.get("infoWithStyle"))
                .and_then(|i| i.get("restaurants"))
                .and_then(|v| v.as_array())
            {
                for item in items {
                    if let Some(info) = item.get("info") {
                        if let Some(rest) = extract_restaurant_info(info) {
                            restaurants.push(rest);
                        }
                    }
                }
            }
        }
    }

    // 搜索响应的替代结构：data.restaurants[].info
    if restaurants.is_empty() {
        if let Some(items) = data
            .get("data")
            .and_then(|d| d.get("restaurants"))
            .and_then(|v| v.as_array())
        {
            for item in items {
                if let Some(info) = item.get("info") {
                    if let Some(rest) = extract_restaurant_info(info) {
                        restaurants.push(rest);
                    }
                }
            }
        }
    }

    restaurants
}

/// 从菜单响应提取 {restaurant_name, restaurant_id, cuisines, rating, menu} 形态
pub fn extract_menu(data: &Value, restaurant_id: &str) -> Value {
    let cards = data
        .get("data")
        .and_then(|d| d.get("cards"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    // 餐厅基本信息卡
    let restaurant_info = cards.iter().find_map(|card| {
        let c = card.get("card")?;
        if c.get("@type").and_then(|v| v.as_str()) == Some(RESTAURANT_CARD) {
            c.get("info").cloned()
        } else {
            None
        }
    });

    // 菜单分类卡（groupedCard.cardGroupMap.REGULAR.cards）
    let mut menu = Vec::new();
    for card in &cards {
        let Some(group_cards) = card
            .get("groupedCard")
            .and_then(|g| g.get("cardGroupMap"))
            .and_then(|m| m.get("REGULAR"))
            .and_then(|r| r.get("cards"))
            .and_then(|v| v.as_array())
        else {
            continue;
        };
        for group_card in group_cards {
            let Some(category) = group_card.get("card").and_then(|c| c.get("card")) else {
                continue;
            };
            if category.get("@type").and_then(|v| v.as_str()) != Some(ITEM_CATEGORY) {
                continue;
            }
            let category_name = category
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Uncategorized");
            let mut items = Vec::new();
            if let Some(item_cards) = category.get("itemCards").and_then(|v| v.as_array()) {
                for item_card in item_cards {
                    let Some(info) = item_card.get("card").and_then(|c| c.get("info")) else {
                        continue;
                    };
                    // 价格单位为 paise，换算为卢比
                    let price = info
                        .get("price")
                        .and_then(|v| v.as_f64())
                        .map(|p| p / 100.0)
                        .unwrap_or(0.0);
                    items.push(json!({
                        "name": info.get("name").cloned().unwrap_or_else(|| json!("Unknown Item")),
                        "description": info.get("description").cloned().unwrap_or_else(|| json!("")),
                        "price": price,
                    }));
                }
            }
            if !items.is_empty() {
                menu.push(json!({
                    "category": category_name,
                    "items": items,
                }));
            }
        }
    }

    let name = restaurant_info
        .as_ref()
        .and_then(|i| i.get("name"))
        .cloned()
        .unwrap_or_else(|| json!("Unknown Restaurant"));
    let cuisines = restaurant_info
        .as_ref()
        .and_then(|i| i.get("cuisines"))
        .cloned()
        .unwrap_or_else(|| json!([]));
    let rating = restaurant_info
        .as_ref()
        .and_then(|i| i.get("avgRating"))
        .cloned()
        .unwrap_or_else(|| json!("N/A"));

    json!({
        "restaurant_name": name,
        "restaurant_id": restaurant_id,
        "cuisines": cuisines,
        "rating": rating,
        "menu": menu,
    })
}
