//! OCR collaborator payload.
//!
//! The vision step is external; this module only accepts its output, pulls
//! the JSON object out of it and checks it before any submission exists.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::OrderType;

/// One market row read off a screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrItem {
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}

/// Structured OCR result: port, side, and ordered item rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrPayload {
    pub port: String,
    pub order_type: String,
    pub items: Vec<OcrItem>,
}

impl OcrPayload {
    /// Extract and deserialize the JSON object embedded in collaborator output.
    ///
    /// Everything before the first `{` and after the last `}` is ignored,
    /// which also drops any markdown code fence around the object.
    pub fn parse_output(raw: &str) -> Result<Self> {
        let (start, end) = match (raw.find('{'), raw.rfind('}')) {
            (Some(s), Some(e)) if s < e => (s, e),
            _ => {
                return Err(Error::InvalidInput(
                    "no JSON object found in OCR output".to_string(),
                ))
            }
        };
        serde_json::from_str(&raw[start..=end])
            .map_err(|e| Error::InvalidInput(format!("failed to parse market data: {e}")))
    }

    /// Reject payloads that must never become a submission.
    /// Returns the parsed order type on success.
    pub fn validate(&self) -> Result<OrderType> {
        let port = self.port.trim();
        if port.is_empty() || port.eq_ignore_ascii_case("unknown") {
            return Err(Error::InvalidInput(
                "could not determine port from screenshot".to_string(),
            ));
        }
        let order_type = self.order_type.parse::<OrderType>().map_err(|_| {
            Error::InvalidInput(
                "could not determine order type (buy/sell) from screenshot".to_string(),
            )
        })?;
        if self.items.is_empty() {
            return Err(Error::InvalidInput("no items found in screenshot".to_string()));
        }
        if self.items.iter().any(|i| i.name.trim().is_empty()) {
            return Err(Error::InvalidInput("item with an empty name".to_string()));
        }
        Ok(order_type)
    }

    /// Distinct raw item names in first-seen order.
    pub fn unique_item_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .map(|i| i.name.as_str())
            .filter(|n| seen.insert(*n))
            .collect()
    }
}
