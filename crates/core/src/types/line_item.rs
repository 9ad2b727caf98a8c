//! Cart line items.
//!
//! A line item is either `Pending` (created client-side, only a variant and a
//! quantity) or `Hydrated` (returned by the cart API with catalog data). Both
//! share one camelCase JSON shape; the hydrated fields decide which variant a
//! stored object becomes. Placeholder values written by older clients
//! (`productId: 0`, empty `name`) are read back as `Pending`, and are kept
//! so the line is written back exactly as it was stored.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};
use super::price::Price;
use super::quantity::Quantity;

/// One selected variant and how many units of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireLineItem", into = "WireLineItem")]
pub enum CartLineItem {
    /// Client-only item that has not been through the cart API yet.
    Pending(PendingLine),
    /// Item carrying catalog data from the cart API.
    Hydrated(HydratedLine),
}

/// Minimal line: what the shopper picked, nothing more.
///
/// Equality ignores any placeholder display fields carried from storage.
#[derive(Debug, Clone)]
pub struct PendingLine {
    pub variant_id: VariantId,
    pub quantity: Quantity,
    placeholders: Option<Box<DisplayFields>>,
}

impl PartialEq for PendingLine {
    fn eq(&self, other: &Self) -> bool {
        self.variant_id == other.variant_id && self.quantity == other.quantity
    }
}

impl Eq for PendingLine {}

/// Line with display data resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydratedLine {
    pub variant_id: VariantId,
    pub quantity: Quantity,
    pub product_id: ProductId,
    pub name: String,
    pub slug: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Price,
    pub sale_unit_price: Option<Price>,
    pub color: Option<String>,
    pub size: Option<String>,
}

impl CartLineItem {
    /// Create a client-side line.
    #[must_use]
    pub const fn pending(variant_id: VariantId, quantity: Quantity) -> Self {
        Self::Pending(PendingLine {
            variant_id,
            quantity,
            placeholders: None,
        })
    }

    #[must_use]
    pub const fn variant_id(&self) -> VariantId {
        match self {
            Self::Pending(line) => line.variant_id,
            Self::Hydrated(line) => line.variant_id,
        }
    }

    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        match self {
            Self::Pending(line) => line.quantity,
            Self::Hydrated(line) => line.quantity,
        }
    }

    /// Replace the quantity, keeping any catalog data.
    pub const fn set_quantity(&mut self, quantity: Quantity) {
        match self {
            Self::Pending(line) => line.quantity = quantity,
            Self::Hydrated(line) => line.quantity = quantity,
        }
    }

    #[must_use]
    pub const fn is_hydrated(&self) -> bool {
        matches!(self, Self::Hydrated(_))
    }

    /// Display name, if the line has been hydrated.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Pending(_) => None,
            Self::Hydrated(line) => Some(&line.name),
        }
    }

    /// Price actually charged per unit: the sale price when there is one.
    #[must_use]
    pub fn effective_unit_price(&self) -> Option<Price> {
        match self {
            Self::Pending(_) => None,
            Self::Hydrated(line) => Some(line.sale_unit_price.unwrap_or(line.unit_price)),
        }
    }

    /// Effective unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.effective_unit_price()
            .map(|unit| unit.times(self.quantity().get()))
    }

    /// Drop catalog data, keeping only what the shopper chose.
    #[must_use]
    pub const fn to_pending(&self) -> PendingLine {
        PendingLine {
            variant_id: self.variant_id(),
            quantity: self.quantity(),
            placeholders: None,
        }
    }
}

impl From<PendingLine> for CartLineItem {
    fn from(line: PendingLine) -> Self {
        Self::Pending(line)
    }
}

impl From<HydratedLine> for CartLineItem {
    fn from(line: HydratedLine) -> Self {
        Self::Hydrated(line)
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLineItem {
    variant_id: VariantId,
    quantity: Quantity,
    #[serde(flatten)]
    display: DisplayFields,
}

/// Catalog fields as they appear on the wire, each optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    product_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sale_unit_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<String>,
}

impl DisplayFields {
    const fn is_empty(&self) -> bool {
        self.product_id.is_none()
            && self.name.is_none()
            && self.slug.is_none()
            && self.image_url.is_none()
            && self.unit_price.is_none()
            && self.sale_unit_price.is_none()
            && self.color.is_none()
            && self.size.is_none()
    }
}

impl From<WireLineItem> for CartLineItem {
    fn from(wire: WireLineItem) -> Self {
        let WireLineItem {
            variant_id,
            quantity,
            display,
        } = wire;

        match display {
            DisplayFields {
                product_id: Some(product_id),
                name: Some(name),
                slug,
                image_url,
                unit_price: Some(unit_price),
                sale_unit_price,
                color,
                size,
            } if product_id.as_i32() != 0 && !name.is_empty() => Self::Hydrated(HydratedLine {
                variant_id,
                quantity,
                product_id,
                name,
                slug,
                image_url,
                unit_price,
                sale_unit_price,
                color,
                size,
            }),
            display => Self::Pending(PendingLine {
                variant_id,
                quantity,
                placeholders: (!display.is_empty()).then(|| Box::new(display)),
            }),
        }
    }
}

impl From<CartLineItem> for WireLineItem {
    fn from(item: CartLineItem) -> Self {
        match item {
            CartLineItem::Pending(line) => Self {
                variant_id: line.variant_id,
                quantity: line.quantity,
                display: line.placeholders.map(|b| *b).unwrap_or_default(),
            },
            CartLineItem::Hydrated(line) => Self {
                variant_id: line.variant_id,
                quantity: line.quantity,
                display: DisplayFields {
                    product_id: Some(line.product_id),
                    name: Some(line.name),
                    slug: line.slug,
                    image_url: line.image_url,
                    unit_price: Some(line.unit_price),
                    sale_unit_price: line.sale_unit_price,
                    color: line.color,
                    size: line.size,
                },
            },
        }
    }
}
