//! Shopify Tool：商品、库存、订单

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{DockError, DockResult, EntityKind};
use crate::descriptor::ToolDescriptor;
use crate::providers::shopify::{OrderQuery, Product, ProductQuery, ShopifyApi, ShopifyRestClient};
use crate::registry::resolver::{require_setting, setting, ProviderContext};
use crate::tools::contract::{
    provider_error, unimplemented_action, ActionParams, ActionSpec, ParamSpec, ParamType, Tool, ToolOutput,
};
use crate::tools::jira::descriptor_description;

pub struct ShopifyTool {
    name: String,
    description: String,
    client: Arc<dyn ShopifyApi>,
    actions: Vec<ActionSpec>,
}

impl ShopifyTool {
    pub fn new(name: impl Into<String>, client: Arc<dyn ShopifyApi>) -> Self {
        let name = name.into();
        Self {
            description: format!("{name} tool"),
            name,
            client,
            actions: catalogue(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 凭据取 authConfig.shopName / accessToken，缺省回落到 [providers.shopify]
    pub fn from_descriptor(descriptor: &ToolDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let defaults = &ctx.providers.shopify;
        let auth = &descriptor.auth_config;
        let need = |key: &str, value: Option<String>| require_setting(EntityKind::Tool, &descriptor.id, key, value);
        let shop = need("shopName", setting(auth, "shopName", defaults.shop_name.as_deref()))?;
        let token = need("accessToken", setting(auth, "accessToken", defaults.access_token.as_deref()))?;
        let client = ShopifyRestClient::new(&shop, &token, defaults.api_version.as_deref(), ctx.providers.http_timeout_secs)?;
        tracing::info!("Shopify tool initialized for shop: {}", shop);
        Ok(Self::new(descriptor.name.clone(), Arc::new(client)).with_description(descriptor_description(descriptor)))
    }

    async fn get_products(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let query = ProductQuery {
            limit: params.u64("limit")?,
            title: params.opt_str("title")?.map(String::from),
            vendor: params.opt_str("vendor")?.map(String::from),
            product_type: params.opt_str("productType")?.map(String::from),
        };
        let products = self
            .client
            .list_products(query)
            .await
            .map_err(provider_error("Failed to get Shopify products"))?;
        Ok(ToolOutput::ok(json!(products.iter().map(|p| format_product(p, false)).collect::<Vec<_>>())))
    }

    async fn get_product(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let product = self
            .client
            .get_product(params.u64("productId")?)
            .await
            .map_err(provider_error("Failed to get Shopify product"))?;
        Ok(ToolOutput::ok(format_product(&product, true)))
    }

    async fn update_inventory(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let quantity = params.opt_i64("quantity")?.ok_or_else(|| DockError::InvalidParameter {
            action: "updateInventory".into(),
            parameter: "quantity".into(),
            expected: "integer".into(),
        })?;
        let level = self
            .client
            .set_inventory(params.u64("inventoryItemId")?, params.u64("locationId")?, quantity)
            .await
            .map_err(provider_error("Failed to update Shopify inventory"))?;
        Ok(ToolOutput::ok(json!({
            "inventoryItemId": level.inventory_item_id,
            "locationId": level.location_id,
            "available": level.available,
            "updated": level.updated_at,
        })))
    }

    async fn get_orders(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let query = OrderQuery {
            limit: params.u64("limit")?,
            status: params.opt_str("status")?.map(String::from),
            financial_status: params.opt_str("financialStatus")?.map(String::from),
            fulfillment_status: params.opt_str("fulfillmentStatus")?.map(String::from),
        };
        let orders = self
            .client
            .list_orders(query)
            .await
            .map_err(provider_error("Failed to get Shopify orders"))?;
        ToolOutput::from_serialize(&orders)
    }
}

fn format_product(product: &Product, detailed: bool) -> Value {
    let first = product.variants.first();
    let mut out = json!({
        "id": product.id,
        "title": product.title,
        "vendor": product.vendor,
        "productType": product.product_type,
        "status": product.status,
        "price": first.map(|v| &v.price),
        "inventory": first.and_then(|v| v.inventory_quantity),
    });
    if detailed {
        out["variants"] = json!(product.variants);
    }
    out
}

fn catalogue() -> Vec<ActionSpec> {
    use ParamType::*;
    vec![
        ActionSpec::info(),
        ActionSpec::new("getProducts", "Get a list of products")
            .param(ParamSpec::optional("limit", Number, "Maximum number of products to return").with_default(json!(10)))
            .param(ParamSpec::optional("title", String, "Filter by product title"))
            .param(ParamSpec::optional("vendor", String, "Filter by vendor"))
            .param(ParamSpec::optional("productType", String, "Filter by product type")),
        ActionSpec::new("getProduct", "Get a specific product by ID")
            .param(ParamSpec::required("productId", Number, "Product ID")),
        ActionSpec::new("updateInventory", "Update product inventory")
            .param(ParamSpec::required("inventoryItemId", Number, "Inventory item ID"))
            .param(ParamSpec::required("locationId", Number, "Location ID"))
            .param(ParamSpec::required("quantity", Number, "New inventory quantity")),
        ActionSpec::new("getOrders", "Get a list of orders")
            .param(ParamSpec::optional("limit", Number, "Maximum number of orders to return").with_default(json!(10)))
            .param(ParamSpec::optional("status", String, "Filter by order status"))
            .param(ParamSpec::optional("financialStatus", String, "Filter by financial status"))
            .param(ParamSpec::optional("fulfillmentStatus", String, "Filter by fulfillment status")),
    ]
}

#[async_trait]
impl Tool for ShopifyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    async fn invoke(&self, action: &str, params: ActionParams) -> DockResult<ToolOutput> {
        match action {
            "getProducts" => self.get_products(&params).await,
            "getProduct" => self.get_product(&params).await,
            "updateInventory" => self.update_inventory(&params).await,
            "getOrders" => self.get_orders(&params).await,
            other => Err(unimplemented_action(&self.name, other)),
        }
    }
}
