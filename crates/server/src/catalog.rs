//! Product catalog used to validate variants and hydrate cart lines.

use std::collections::HashMap;
use std::path::Path;

use cartsync_core::{CartLineItem, HydratedLine, Price, ProductId, VariantId};
use serde::Deserialize;
use thiserror::Error;

/// Errors loading a catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid catalog {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Catalog data for one purchasable variant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub unit_price: Price,
    #[serde(default)]
    pub sale_unit_price: Option<Price>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

/// Known variants.
///
/// An open catalog accepts any variant and hydrates the ones it knows. A
/// strict catalog rejects variants it does not know.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<VariantId, CatalogEntry>,
    strict: bool,
}

impl Catalog {
    /// Catalog that accepts every variant and hydrates none.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Strict catalog over `entries`.
    #[must_use]
    pub fn strict(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.variant_id, entry))
                .collect(),
            strict: true,
        }
    }

    /// Load a strict catalog from a JSON array of entries.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: display.clone(),
            source,
        })?;
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: display,
                source,
            })?;

        tracing::info!(path = %path.display(), entries = entries.len(), "Catalog loaded");
        Ok(Self::strict(entries))
    }

    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a cart may hold `variant_id`.
    #[must_use]
    pub fn accepts(&self, variant_id: VariantId) -> bool {
        !self.strict || self.entries.contains_key(&variant_id)
    }

    /// Attach catalog data to a line; unknown variants stay pending.
    #[must_use]
    pub fn hydrate(&self, line: &CartLineItem) -> CartLineItem {
        let Some(entry) = self.entries.get(&line.variant_id()) else {
            return CartLineItem::from(line.to_pending());
        };

        CartLineItem::Hydrated(HydratedLine {
            variant_id: entry.variant_id,
            quantity: line.quantity(),
            product_id: entry.product_id,
            name: entry.name.clone(),
            slug: Some(entry.slug.clone()),
            image_url: entry.image_url.clone(),
            unit_price: entry.unit_price,
            sale_unit_price: entry.sale_unit_price,
            color: entry.color.clone(),
            size: entry.size.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use cartsync_core::Quantity;

    use super::*;

    fn socks() -> CatalogEntry {
        CatalogEntry {
            variant_id: VariantId::new(42),
            product_id: ProductId::new(4),
            name: "Wool Socks".to_string(),
            slug: "wool-socks".to_string(),
            image_url: None,
            unit_price: Price::from_cents(1250),
            sale_unit_price: None,
            color: Some("Grey".to_string()),
            size: Some("M".to_string()),
        }
    }

    #[test]
    fn test_open_catalog_accepts_anything() {
        let catalog = Catalog::open();
        assert!(catalog.accepts(VariantId::new(999)));
        assert!(!catalog.is_strict());
    }

    #[test]
    fn test_strict_catalog_rejects_unknown() {
        let catalog = Catalog::strict([socks()]);
        assert!(catalog.accepts(VariantId::new(42)));
        assert!(!catalog.accepts(VariantId::new(999)));
    }

    #[test]
    fn test_hydrate_known_variant() {
        let catalog = Catalog::strict([socks()]);
        let line = CartLineItem::pending(VariantId::new(42), Quantity::new(3).unwrap());

        let hydrated = catalog.hydrate(&line);

        assert!(hydrated.is_hydrated());
        assert_eq!(hydrated.name(), Some("Wool Socks"));
        assert_eq!(hydrated.quantity().get(), 3);
        assert_eq!(hydrated.line_total(), Some(Price::from_cents(3750)));
    }

    #[test]
    fn test_hydrate_unknown_variant_stays_pending() {
        let line = CartLineItem::pending(VariantId::new(7), Quantity::ONE);
        assert_eq!(Catalog::open().hydrate(&line), line);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"variantId":42,"productId":4,"name":"Wool Socks","slug":"wool-socks","unitPrice":"12.50"}}]"#
        )
        .unwrap();

        let catalog = Catalog::load(file.path()).unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(catalog.is_strict());
        assert!(catalog.accepts(VariantId::new(42)));
    }

    #[test]
    fn test_load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Catalog::load(file.path()).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }
}
