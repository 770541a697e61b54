//! # tradewind-core
//!
//! Core types, traits, and abstractions for the tradewind trading bot.
//!
//! This crate provides the data model shared by every other tradewind crate:
//! canonical entities and match results, OCR payloads, conversation rows,
//! the error taxonomy, and the collaborator traits that storage and
//! messaging backends implement.

pub mod clock;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod mock;
pub mod models;
pub mod ocr;
pub mod traits;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BusyParty, Error, Result};
pub use models::*;
pub use ocr::{OcrItem, OcrPayload};
pub use traits::*;
