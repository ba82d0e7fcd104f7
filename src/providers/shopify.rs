//! Shopify Provider：Admin REST API（X-Shopify-Access-Token）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::{DockError, DockResult};
use crate::providers::http::{Auth, HttpProvider};

const DEFAULT_API_VERSION: &str = "2024-01";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShopInfo {
    pub name: String,
    #[serde(default)]
    pub myshopify_domain: String,
    #[serde(default)]
    pub plan_name: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub country_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Variant {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
    #[serde(default)]
    pub inventory_item_id: Option<u64>,
}

impl Variant {
    pub fn is_low_stock(&self, threshold: i64) -> bool {
        self.inventory_quantity.is_some_and(|q| q < threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub inventory_item_id: u64,
    pub location_id: u64,
    #[serde(default)]
    pub available: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub total_price: String,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// 商品查询条件
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductQuery {
    pub limit: u64,
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
}

/// 订单查询条件
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderQuery {
    pub limit: u64,
    pub status: Option<String>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
}

#[async_trait]
pub trait ShopifyApi: Send + Sync {
    async fn shop(&self) -> DockResult<ShopInfo>;

    async fn product_count(&self) -> DockResult<u64>;

    async fn list_products(&self, query: ProductQuery) -> DockResult<Vec<Product>>;

    async fn get_product(&self, id: u64) -> DockResult<Product>;

    async fn list_locations(&self) -> DockResult<Vec<Location>>;

    async fn set_inventory(&self, inventory_item_id: u64, location_id: u64, available: i64) -> DockResult<InventoryLevel>;

    async fn list_orders(&self, query: OrderQuery) -> DockResult<Vec<Order>>;
}

pub struct ShopifyRestClient {
    http: HttpProvider,
}

impl ShopifyRestClient {
    pub fn new(shop_name: &str, access_token: &str, api_version: Option<&str>, timeout_secs: u64) -> DockResult<Self> {
        let shop = shop_name.trim_end_matches(".myshopify.com");
        let base = format!(
            "https://{shop}.myshopify.com/admin/api/{}",
            api_version.unwrap_or(DEFAULT_API_VERSION)
        );
        let auth = Auth::Header {
            name: "X-Shopify-Access-Token".into(),
            value: access_token.to_string(),
        };
        Ok(Self {
            http: HttpProvider::new("Shopify API", base, auth, timeout_secs)?,
        })
    }
}

/// 取出包装字段（Shopify 响应形如 {"products": [...]}）
fn unwrap_field<T: serde::de::DeserializeOwned>(mut resp: Value, field: &str) -> DockResult<T> {
    let value = resp.get_mut(field).map(Value::take).unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| DockError::external(format!("Shopify API {field}"), e))
}

fn push_opt(query: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<String>) {
    if let Some(v) = value {
        query.push((key, v));
    }
}

#[async_trait]
impl ShopifyApi for ShopifyRestClient {
    async fn shop(&self) -> DockResult<ShopInfo> {
        unwrap_field(self.http.get("shop.json", &[]).await?, "shop")
    }

    async fn product_count(&self) -> DockResult<u64> {
        unwrap_field(self.http.get("products/count.json", &[]).await?, "count")
    }

    async fn list_products(&self, query: ProductQuery) -> DockResult<Vec<Product>> {
        let mut params = vec![("limit", query.limit.to_string())];
        push_opt(&mut params, "title", query.title);
        push_opt(&mut params, "vendor", query.vendor);
        push_opt(&mut params, "product_type", query.product_type);
        unwrap_field(self.http.get("products.json", &params).await?, "products")
    }

    async fn get_product(&self, id: u64) -> DockResult<Product> {
        unwrap_field(self.http.get(&format!("products/{id}.json"), &[]).await?, "product")
    }

    async fn list_locations(&self) -> DockResult<Vec<Location>> {
        unwrap_field(self.http.get("locations.json", &[]).await?, "locations")
    }

    async fn set_inventory(&self, inventory_item_id: u64, location_id: u64, available: i64) -> DockResult<InventoryLevel> {
        let body = json!({
            "inventory_item_id": inventory_item_id,
            "location_id": location_id,
            "available": available,
        });
        unwrap_field(self.http.post("inventory_levels/set.json", &body).await?, "inventory_level")
    }

    async fn list_orders(&self, query: OrderQuery) -> DockResult<Vec<Order>> {
        let mut params = vec![("limit", query.limit.to_string())];
        push_opt(&mut params, "status", query.status);
        push_opt(&mut params, "financial_status", query.financial_status);
        push_opt(&mut params, "fulfillment_status", query.fulfillment_status);
        unwrap_field(self.http.get("orders.json", &params).await?, "orders")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_stock_ignores_untracked_variants() {
        let variant: Variant = serde_json::from_value(json!({"id": 1, "title": "Default Title"})).unwrap();
        assert!(!variant.is_low_stock(10));
        let variant: Variant =
            serde_json::from_value(json!({"id": 2, "title": "Red", "inventory_quantity": 3})).unwrap();
        assert!(variant.is_low_stock(10));
    }
}
