use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::errors::OrderError;

// ============================================================================
// Order Models
// ============================================================================

/// A stored order. `id` and `created_at` are always assigned by the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_name: String,
    pub product_name: String,
    pub quantity: i32,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Compares the caller-supplied fields, ignoring id and timestamp
    /// precision differences between cache and store round trips.
    #[cfg(test)]
    pub fn same_business_fields(&self, other: &Order) -> bool {
        self.customer_name == other.customer_name
            && self.product_name == other.product_name
            && self.quantity == other.quantity
            && self.status == other.status
    }
}

/// Draft order as submitted by a client. Any `id` or `created_at` in the
/// request body is dropped during deserialization.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub customer_name: String,
    pub product_name: String,
    pub quantity: i32,
    pub status: String,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.customer_name.trim().is_empty() {
            return Err(OrderError::Validation("customer_name must not be empty".into()));
        }
        if self.product_name.trim().is_empty() {
            return Err(OrderError::Validation("product_name must not be empty".into()));
        }
        if self.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        Ok(())
    }

    /// Attach what the store assigned on insert.
    pub fn into_order(self, receipt: InsertReceipt) -> Order {
        Order {
            id: receipt.id,
            customer_name: self.customer_name,
            product_name: self.product_name,
            quantity: self.quantity,
            status: self.status,
            created_at: Some(receipt.created_at),
        }
    }
}

/// Values the store assigns to a freshly inserted row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InsertReceipt {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Unit Tests
// ============================================================================
