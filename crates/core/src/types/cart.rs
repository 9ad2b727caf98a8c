//! The cart: an ordered set of line items, unique by variant.

use serde::{Deserialize, Serialize};

use super::id::VariantId;
use super::line_item::CartLineItem;
use super::price::Price;
use super::quantity::{Quantity, QuantityError};

/// Ordered collection of line items with at most one line per variant.
///
/// Serialized as a bare JSON array. Deserializing merges duplicate variants
/// by summing their quantities, so the uniqueness invariant holds for any
/// input the cart is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLineItem>", into = "Vec<CartLineItem>")]
pub struct Cart {
    lines: Vec<CartLineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from lines, merging duplicate variants.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.merge_line(line);
        }
        cart
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn get(&self, variant_id: VariantId) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| line.variant_id() == variant_id)
    }

    /// Quantity held for a variant, 0 when absent.
    #[must_use]
    pub fn quantity_of(&self, variant_id: VariantId) -> u32 {
        self.get(variant_id).map_or(0, |line| line.quantity().get())
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity().get()))
            .sum()
    }

    /// Sum of line totals, or `None` while any line is still pending.
    #[must_use]
    pub fn subtotal(&self) -> Option<Price> {
        self.lines.iter().map(CartLineItem::line_total).sum()
    }

    /// Add units of a variant, increasing an existing line rather than
    /// appending a second one.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Overflow` if the new total does not fit.
    pub fn add(&mut self, variant_id: VariantId, quantity: Quantity) -> Result<(), QuantityError> {
        match self.get_mut(variant_id) {
            Some(line) => {
                let total = line.quantity().checked_add(quantity)?;
                line.set_quantity(total);
            }
            None => self.lines.push(CartLineItem::pending(variant_id, quantity)),
        }
        Ok(())
    }

    /// Set the absolute quantity of a variant, inserting it if absent.
    pub fn set_quantity(&mut self, variant_id: VariantId, quantity: Quantity) {
        match self.get_mut(variant_id) {
            Some(line) => line.set_quantity(quantity),
            None => self.lines.push(CartLineItem::pending(variant_id, quantity)),
        }
    }

    /// Remove a variant. Returns whether a line was removed.
    pub fn remove(&mut self, variant_id: VariantId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.variant_id() != variant_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn get_mut(&mut self, variant_id: VariantId) -> Option<&mut CartLineItem> {
        self.lines
            .iter_mut()
            .find(|line| line.variant_id() == variant_id)
    }

    fn merge_line(&mut self, line: CartLineItem) {
        match self.get_mut(line.variant_id()) {
            Some(existing) => {
                // Untrusted input: saturate instead of failing the whole cart.
                let total = existing
                    .quantity()
                    .checked_add(line.quantity())
                    .unwrap_or(Quantity::MAX);
                existing.set_quantity(total);
            }
            None => self.lines.push(line),
        }
    }
}

impl From<Vec<CartLineItem>> for Cart {
    fn from(lines: Vec<CartLineItem>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<Cart> for Vec<CartLineItem> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartLineItem;
    type IntoIter = std::slice::Iter<'a, CartLineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
