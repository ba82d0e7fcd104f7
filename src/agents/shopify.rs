//! Shopify Agent：按商品名改库存、查看商品、列出低库存商品

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::core::{AgentCore, Persona};
use crate::agents::patterns::{group, PatternTable};
use crate::agents::{delegate_tool_belt, Agent, QueryResponse};
use crate::core::{preview, DockError, DockResult, EntityKind};
use crate::descriptor::AgentDescriptor;
use crate::providers::shopify::{OrderQuery, Product, ProductQuery, ShopifyApi, ShopifyRestClient};
use crate::registry::resolver::{require_setting, setting, ProviderContext, ProviderKind};

const ROLE: &str = "a Shopify assistant that helps users manage their online store, products, and orders";

/// 低于该数量视为低库存
const LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
enum ShopifyIntent {
    UpdateInventory { title: String, quantity: String },
    GetProduct { title: String },
    LowInventory,
}

fn intents() -> DockResult<PatternTable<ShopifyIntent>> {
    PatternTable::compile(&[
        (
            r#"update (?:the )?(?:inventory|stock) (?:for|of) (?:product )?["']?([^"']+)["']? to (\d+)"#,
            |c| ShopifyIntent::UpdateInventory {
                title: group(c, 1),
                quantity: group(c, 2),
            },
        ),
        (
            r#"(?:get|show|find|tell me about) (?:the )?(?:product|item) ["']?([^"']+)["']?"#,
            |c| ShopifyIntent::GetProduct { title: group(c, 1) },
        ),
        (
            r"(?:list|show|find|what are) (?:the )?(?:products|items) (?:with )?(?:low|limited) (?:inventory|stock)",
            |_| ShopifyIntent::LowInventory,
        ),
    ])
}

pub struct ShopifyAgent {
    core: AgentCore,
    client: Arc<dyn ShopifyApi>,
    patterns: PatternTable<ShopifyIntent>,
}

impl ShopifyAgent {
    pub fn new(core: AgentCore, client: Arc<dyn ShopifyApi>) -> DockResult<Self> {
        Ok(Self {
            core,
            client,
            patterns: intents()?,
        })
    }

    pub fn persona() -> Persona {
        Persona::provider("Shopify", ROLE)
    }

    /// config.shopName / accessToken（旧字段名 password 亦可），缺省回落到 [providers.shopify]
    pub fn from_descriptor(descriptor: &AgentDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let defaults = &ctx.providers.shopify;
        let config = &descriptor.config;
        let need = |key: &str, value: Option<String>| require_setting(EntityKind::Agent, &descriptor.id, key, value);
        let shop = need("shopName", setting(config, "shopName", defaults.shop_name.as_deref()))?;
        let token = need(
            "accessToken",
            setting(config, "accessToken", None).or_else(|| setting(config, "password", defaults.access_token.as_deref())),
        )?;
        let api_version = setting(config, "apiVersion", defaults.api_version.as_deref());
        let client = ShopifyRestClient::new(&shop, &token, api_version.as_deref(), ctx.providers.http_timeout_secs)?;
        tracing::info!("Shopify agent initialized for shop: {}", shop);
        Self::new(AgentCore::from_descriptor(descriptor, Self::persona(), ctx), Arc::new(client))
    }

    async fn find_by_title(&self, title: &str) -> DockResult<Option<Product>> {
        let products = self
            .client
            .list_products(ProductQuery {
                limit: 1,
                title: Some(title.to_string()),
                ..Default::default()
            })
            .await?;
        Ok(products.into_iter().next())
    }

    async fn update_inventory(&self, title: &str, quantity: i64) -> DockResult<String> {
        let Some(product) = self.find_by_title(title).await? else {
            return Ok(format!("No product found with title \"{title}\"."));
        };
        let Some(item_id) = product.variants.first().and_then(|v| v.inventory_item_id) else {
            return Ok(format!("Product \"{title}\" has no variants to update."));
        };
        let locations = self.client.list_locations().await?;
        let Some(location) = locations.first() else {
            return Ok("No locations found to update inventory.".to_string());
        };
        self.client.set_inventory(item_id, location.id, quantity).await?;
        tracing::info!("Inventory of {} set to {} at location {}", title, quantity, location.id);
        Ok(format!("Updated inventory for \"{title}\" to {quantity} units."))
    }

    async fn describe_product(&self, title: &str) -> DockResult<String> {
        let Some(product) = self.find_by_title(title).await? else {
            return Ok(format!("No product found with title \"{title}\"."));
        };
        let or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };
        let mut response = format!("Product: {}\n\n", product.title);
        response.push_str(&format!("Type: {}\n", or_na(&product.product_type)));
        response.push_str(&format!("Vendor: {}\n", or_na(&product.vendor)));
        response.push_str(&format!("Status: {}\n", product.status));
        if let Some(variant) = product.variants.first() {
            response.push_str(&format!("Price: ${}\n", variant.price));
            response.push_str(&format!("SKU: {}\n", or_na(variant.sku.as_deref().unwrap_or_default())));
            response.push_str(&format!("Inventory: {} units\n", variant.inventory_quantity.unwrap_or(0)));
        }
        Ok(response)
    }

    async fn low_inventory(&self) -> DockResult<String> {
        let products = self
            .client
            .list_products(ProductQuery {
                limit: 250,
                ..Default::default()
            })
            .await?;
        let lines: Vec<String> = products
            .iter()
            .flat_map(|p| {
                p.variants.iter().filter(|v| v.is_low_stock(LOW_STOCK_THRESHOLD)).map(move |v| {
                    let variant = if v.title == "Default Title" {
                        String::new()
                    } else {
                        format!(" ({})", v.title)
                    };
                    format!("- {}{}: {} units\n", p.title, variant, v.inventory_quantity.unwrap_or(0))
                })
            })
            .collect();
        if lines.is_empty() {
            return Ok(format!("No products found with low inventory (below {LOW_STOCK_THRESHOLD} units)."));
        }
        Ok(format!(
            "Products with low inventory (below {LOW_STOCK_THRESHOLD} units):\n\n{}",
            lines.concat()
        ))
    }

    async fn handle(&self, intent: ShopifyIntent) -> DockResult<String> {
        match intent {
            ShopifyIntent::UpdateInventory { title, quantity } => {
                let quantity: i64 = quantity.parse().map_err(|_| DockError::InvalidParameter {
                    action: "updateInventory".into(),
                    parameter: "quantity".into(),
                    expected: "integer".into(),
                })?;
                self.update_inventory(&title, quantity)
                    .await
                    .map_err(|e| DockError::external("Failed to update inventory", e))
            }
            ShopifyIntent::GetProduct { title } => self
                .describe_product(&title)
                .await
                .map_err(|e| DockError::external("Failed to get product", e)),
            ShopifyIntent::LowInventory => self
                .low_inventory()
                .await
                .map_err(|e| DockError::external("Failed to find low inventory products", e)),
        }
    }

    /// 店铺信息、商品概览、最近订单；每段失败只替换该段
    pub async fn context(&self) -> String {
        let mut context = String::from("Shopify Store Information:\n");

        match self.client.shop().await {
            Ok(shop) => {
                context.push_str(&format!("\nShop: {} ({})\n", shop.name, shop.myshopify_domain));
                context.push_str(&format!("Plan: {}\n", shop.plan_name));
                context.push_str(&format!("Currency: {}\n", shop.currency));
                context.push_str(&format!("Country: {}\n", shop.country_name));
            }
            Err(e) => {
                tracing::warn!("Shopify context: shop info unavailable: {}", e);
                context.push_str("\nCouldn't retrieve shop information.\n");
            }
        }

        let sample = ProductQuery {
            limit: 5,
            ..Default::default()
        };
        match tokio::try_join!(self.client.product_count(), self.client.list_products(sample)) {
            Ok((count, products)) => {
                context.push_str(&format!("\nProducts ({count} total):\n"));
                for product in &products {
                    let first = product.variants.first();
                    let price = first.map_or("N/A", |v| v.price.as_str());
                    let stock = first.and_then(|v| v.inventory_quantity).unwrap_or(0);
                    context.push_str(&format!("- {} (${}, Stock: {})\n", product.title, price, stock));
                }
                if count > 5 {
                    context.push_str(&format!("- ... and {} more\n", count - 5));
                }
            }
            Err(e) => {
                tracing::warn!("Shopify context: products unavailable: {}", e);
                context.push_str("\nCouldn't retrieve products.\n");
            }
        }

        let recent = OrderQuery {
            limit: 5,
            status: Some("any".to_string()),
            ..Default::default()
        };
        match self.client.list_orders(recent).await {
            Ok(orders) => {
                context.push_str("\nRecent orders:\n");
                for order in &orders {
                    context.push_str(&format!(
                        "- {}: ${} ({})\n",
                        order.name,
                        order.total_price,
                        order.financial_status.as_deref().unwrap_or("unknown")
                    ));
                }
            }
            Err(e) => {
                tracing::warn!("Shopify context: orders unavailable: {}", e);
                context.push_str("\nCouldn't retrieve orders.\n");
            }
        }
        context
    }
}

#[async_trait]
impl Agent for ShopifyAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Shopify
    }

    async fn process_query(&self, query: &str, tool_params: &Value) -> DockResult<QueryResponse> {
        tracing::info!("Shopify agent {} processing query: {}", self.name(), preview(query, 80));
        if let Some(intent) = self.patterns.recognize(query) {
            return Ok(QueryResponse::direct(self.handle(intent).await?));
        }
        let context = self.context().await;
        self.core.escalate(query, tool_params, &context).await
    }

    delegate_tool_belt!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionOptions, MockLlmClient};
    use crate::providers::shopify::{InventoryLevel, Location, Order, ShopInfo, Variant};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeShop {
        products: Vec<Product>,
        locations: Vec<Location>,
        shop_down: bool,
        inventory_sets: Mutex<Vec<(u64, u64, i64)>>,
    }

    fn variant(title: &str, qty: Option<i64>, item: Option<u64>) -> Variant {
        Variant {
            id: 1,
            title: title.into(),
            price: "19.99".into(),
            inventory_quantity: qty,
            inventory_item_id: item,
            ..Default::default()
        }
    }

    fn product(title: &str, variants: Vec<Variant>) -> Product {
        Product {
            id: 7,
            title: title.into(),
            status: "active".into(),
            variants,
            ..Default::default()
        }
    }

    #[async_trait]
    impl ShopifyApi for FakeShop {
        async fn shop(&self) -> DockResult<ShopInfo> {
            if self.shop_down {
                return Err(DockError::external("Shopify API shop.json", "HTTP 503"));
            }
            Ok(ShopInfo {
                name: "Acme".into(),
                myshopify_domain: "acme.myshopify.com".into(),
                ..Default::default()
            })
        }

        async fn product_count(&self) -> DockResult<u64> {
            Ok(self.products.len() as u64)
        }

        async fn list_products(&self, query: ProductQuery) -> DockResult<Vec<Product>> {
            Ok(self
                .products
                .iter()
                .filter(|p| query.title.as_ref().map_or(true, |t| &p.title == t))
                .take(query.limit as usize)
                .cloned()
                .collect())
        }

        async fn get_product(&self, id: u64) -> DockResult<Product> {
            self.products
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| DockError::external("Shopify API products", "HTTP 404"))
        }

        async fn list_locations(&self) -> DockResult<Vec<Location>> {
            Ok(self.locations.clone())
        }

        async fn set_inventory(&self, item: u64, location: u64, available: i64) -> DockResult<InventoryLevel> {
            self.inventory_sets.lock().unwrap().push((item, location, available));
            Ok(InventoryLevel {
                inventory_item_id: item,
                location_id: location,
                available: Some(available),
                updated_at: None,
            })
        }

        async fn list_orders(&self, _query: OrderQuery) -> DockResult<Vec<Order>> {
            Ok(vec![Order {
                id: 1,
                name: "#1001".into(),
                total_price: "42.00".into(),
                financial_status: Some("paid".into()),
                ..Default::default()
            }])
        }
    }

    fn agent(fake: Arc<FakeShop>, llm: Arc<MockLlmClient>) -> ShopifyAgent {
        let core = AgentCore::new("Shop Bot", ShopifyAgent::persona(), llm, CompletionOptions::default());
        ShopifyAgent::new(core, fake).unwrap()
    }

    #[tokio::test]
    async fn test_update_inventory_uses_first_location() {
        let fake = Arc::new(FakeShop {
            products: vec![product("Blue Mug", vec![variant("Default Title", Some(4), Some(555))])],
            locations: vec![Location { id: 9, name: "Main".into() }, Location { id: 10, name: "Backup".into() }],
            ..Default::default()
        });
        let agent = agent(fake.clone(), Arc::new(MockLlmClient::new()));

        let out = agent
            .process_query("update inventory for \"Blue Mug\" to 25", &Value::Null)
            .await
            .unwrap();
        assert_eq!(out.response, "Updated inventory for \"Blue Mug\" to 25 units.");
        assert_eq!(fake.inventory_sets.lock().unwrap()[0], (555, 9, 25));

        let out = agent
            .process_query("update stock of Red Mug to 3", &Value::Null)
            .await
            .unwrap();
        assert_eq!(out.response, "No product found with title \"Red Mug\".");
    }

    #[tokio::test]
    async fn test_update_inventory_without_locations() {
        let fake = Arc::new(FakeShop {
            products: vec![product("Blue Mug", vec![variant("Default Title", Some(4), Some(555))])],
            ..Default::default()
        });
        let agent = agent(fake.clone(), Arc::new(MockLlmClient::new()));
        let out = agent.process_query("update inventory for Blue Mug to 5", &Value::Null).await.unwrap();
        assert_eq!(out.response, "No locations found to update inventory.");
        assert!(fake.inventory_sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_product_and_low_inventory() {
        let fake = Arc::new(FakeShop {
            products: vec![
                product("Blue Mug", vec![variant("Default Title", Some(4), None)]),
                product("Tee", vec![variant("Large", Some(2), None), variant("Small", Some(40), None)]),
            ],
            ..Default::default()
        });
        let agent = agent(fake, Arc::new(MockLlmClient::new()));

        let out = agent.process_query("show product 'Blue Mug'", &Value::Null).await.unwrap();
        assert_eq!(
            out.response,
            "Product: Blue Mug\n\nType: N/A\nVendor: N/A\nStatus: active\nPrice: $19.99\nSKU: N/A\nInventory: 4 units\n"
        );

        let out = agent.process_query("list products with low inventory", &Value::Null).await.unwrap();
        assert_eq!(
            out.response,
            "Products with low inventory (below 10 units):\n\n- Blue Mug: 4 units\n- Tee (Large): 2 units\n"
        );
    }

    #[tokio::test]
    async fn test_context_sections() {
        let fake = Arc::new(FakeShop {
            products: vec![product("Blue Mug", vec![variant("Default Title", Some(4), None)])],
            shop_down: true,
            ..Default::default()
        });
        let llm = Arc::new(MockLlmClient::with_reply("Sales look steady."));
        let agent = agent(fake, llm.clone());

        agent.process_query("how are sales?", &Value::Null).await.unwrap();
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Couldn't retrieve shop information."));
        assert!(prompt.contains("Products (1 total):\n- Blue Mug ($19.99, Stock: 4)\n"));
        assert!(prompt.contains("- #1001: $42.00 (paid)"));
    }
}
