//! Cart line and remote cart document types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartLineId, ProductId};

/// One purchasable selection in a cart.
///
/// Display data and the unit price are copied from the catalog when the line
/// is added and are never refreshed afterwards, so cart totals always reflect
/// the price at add-time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Line id, unique within a cart (not the product id).
    pub id: CartLineId,
    /// Product this line was created from.
    pub product_id: ProductId,
    /// Product category at add-time.
    pub category: String,
    /// Product name at add-time.
    pub name: String,
    /// Product image URL at add-time.
    pub image: String,
    /// Unit price at add-time.
    pub price: Decimal,
    /// Number of units. Zero or negative only after an explicit quantity update.
    pub quantity: i64,
    /// Selected size.
    pub size: String,
    /// Selected color.
    pub color: String,
}

impl CartLine {
    /// Price of this line (`price * quantity`), saturating at the bounds of
    /// [`Decimal`].
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }

    /// Price of this line, or `None` if it does not fit in a [`Decimal`].
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Remote cart document stored per authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDocument {
    /// Cart lines in display order.
    #[serde(default)]
    pub items: Vec<CartLine>,
}

impl CartDocument {
    /// Create a document holding the given lines.
    #[must_use]
    pub const fn new(items: Vec<CartLine>) -> Self {
        Self { items }
    }

    /// Consume the document and return its lines.
    #[must_use]
    pub fn into_items(self) -> Vec<CartLine> {
        self.items
    }
}
