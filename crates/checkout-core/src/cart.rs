//! Catalog and Cart
//!
//! The product catalog and the cart are owned by the storefront; checkout
//! only needs their shapes to seed an order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog product as served by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub available_stock: u32,
    pub slug: String,
    #[serde(default)]
    pub image_url: String,
}

impl Product {
    pub const fn in_stock(&self) -> bool {
        self.available_stock > 0
    }
}

/// Line in the shopping cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: String,
    pub quantity: u32,
}

/// Shopping cart
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a product, merging with an existing line for the same product
    pub fn add(&mut self, product: &Product, quantity: u32) {
        let quantity = quantity.max(1);

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            item.quantity += quantity;
        } else {
            self.items.push(CartItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                price: product.price,
                image: product.image_url.clone(),
                quantity,
            });
        }
    }

    pub fn remove(&mut self, product_id: &str) {
        self.items.retain(|i| i.product_id != product_id);
    }

    /// Set a line's quantity; never drops below 1
    pub fn update_quantity(&mut self, product_id: &str, quantity: u32) {
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity.max(1);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total_amount(&self) -> Decimal {
        self.items
            .iter()
            .map(|i| i.price * Decimal::from(i.quantity))
            .sum()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Order lines for `start_checkout`
    pub fn checkout_items(&self) -> Vec<CheckoutItem> {
        self.items.iter().map(CheckoutItem::from).collect()
    }
}

/// Order line frozen into the checkout aggregate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub name: String,
    #[serde(default)]
    pub image_ref: String,
}

impl CheckoutItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<&CartItem> for CheckoutItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price: item.price,
            name: item.name.clone(),
            image_ref: item.image.clone(),
        }
    }
}
