//! Cart state and the pure reducer over cart actions.
//!
//! [`reduce`] is the only way a [`CartState`] changes. It performs no I/O and
//! always recomputes the aggregate totals from the resulting lines, so the
//! totals can never drift from the items they summarize.

use rust_decimal::Decimal;

use cart_sync_core::{CartLine, CartLineId};

/// A change requested against the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add a line, or add its quantity onto an existing line with the same id.
    AddItem(CartLine),
    /// Remove the line with this id. Absent ids are ignored.
    RemoveItem(CartLineId),
    /// Set a line's quantity. Zero and negative values are stored as given.
    UpdateQuantity {
        /// Line to update.
        id: CartLineId,
        /// New quantity.
        quantity: i64,
    },
    /// Drop every line.
    ClearCart,
    /// Replace all lines. Used when loading or merging a stored cart.
    SetCart(Vec<CartLine>),
}

impl CartAction {
    /// Short action name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddItem(_) => "add_item",
            Self::RemoveItem(_) => "remove_item",
            Self::UpdateQuantity { .. } => "update_quantity",
            Self::ClearCart => "clear_cart",
            Self::SetCart(_) => "set_cart",
        }
    }
}

/// The cart as seen by its consumers.
///
/// `total` and `item_count` are derived from `items` on construction and
/// have no setters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    items: Vec<CartLine>,
    total: Decimal,
    item_count: i64,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a state from its lines, computing the totals.
    ///
    /// Totals saturate instead of overflowing; stored carts whose totals do
    /// not fit are rejected on load (see [`checked_totals`]).
    #[must_use]
    pub fn from_items(items: Vec<CartLine>) -> Self {
        let total = items
            .iter()
            .fold(Decimal::ZERO, |acc, line| acc.saturating_add(line.line_total()));
        let item_count = items
            .iter()
            .fold(0_i64, |acc, line| acc.saturating_add(line.quantity));
        Self {
            items,
            total,
            item_count,
        }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    /// Sum of `price * quantity` over all lines.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub const fn item_count(&self) -> i64 {
        self.item_count
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by id.
    #[must_use]
    pub fn line(&self, id: &CartLineId) -> Option<&CartLine> {
        self.items.iter().find(|line| &line.id == id)
    }

    /// Consume the state and return its lines.
    #[must_use]
    pub fn into_items(self) -> Vec<CartLine> {
        self.items
    }
}

/// Apply an action to a state, producing the next state.
#[must_use]
pub fn reduce(state: CartState, action: CartAction) -> CartState {
    let mut items = state.into_items();

    match action {
        CartAction::AddItem(line) => absorb_line(&mut items, line),
        CartAction::RemoveItem(id) => items.retain(|line| line.id != id),
        CartAction::UpdateQuantity { id, quantity } => {
            if let Some(line) = items.iter_mut().find(|line| line.id == id) {
                line.quantity = quantity;
            }
        }
        CartAction::ClearCart => items.clear(),
        CartAction::SetCart(replacement) => items = replacement,
    }

    CartState::from_items(items)
}

/// Fold one line into a list of lines.
///
/// If a line with the same id is present its quantity grows by the incoming
/// quantity and every other field of the existing line is kept. Otherwise the
/// line is appended. Shared by `AddItem` and guest cart reconciliation.
pub fn absorb_line(items: &mut Vec<CartLine>, line: CartLine) {
    match items.iter_mut().find(|existing| existing.id == line.id) {
        Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
        None => items.push(line),
    }
}

/// Total price and item count of `items`, or `None` if either overflows.
#[must_use]
pub fn checked_totals(items: &[CartLine]) -> Option<(Decimal, i64)> {
    items
        .iter()
        .try_fold((Decimal::ZERO, 0_i64), |(total, count), line| {
            Some((
                total.checked_add(line.checked_line_total()?)?,
                count.checked_add(line.quantity)?,
            ))
        })
}
