//! The product catalog: what can be bought, and the data a payment unlocks.
//!
//! Loaded from a JSON file of the form
//!
//! ```json
//! {
//!   "products": [{ "id": 1, "name": "Daily report", "price": 1000 }],
//!   "protected_data": { "message": "..." }
//! }
//! ```

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Amount;

/// A purchasable product. `price` is in satoshis and always positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub products: Vec<Product>,
    /// Served by the protected route once a payment verifies.
    #[serde(default)]
    pub protected_data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate product id {0}")]
    DuplicateProduct(u64),
}

impl Catalog {
    /// Load and validate a catalog file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn product(&self, id: u64) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for product in &self.products {
            if !seen.insert(product.id) {
                return Err(CatalogError::DuplicateProduct(product.id));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Catalog {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let catalog: Catalog = serde_json::from_str(s)?;
        catalog.validate()?;
        Ok(catalog)
    }
}
