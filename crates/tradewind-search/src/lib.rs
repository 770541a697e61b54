//! # tradewind-search
//!
//! Resolution of noisy, OCR-extracted names against the canonical registry.
//!
//! This crate provides:
//! - [`normalize`]: canonical comparison keys for free text
//! - [`similarity`]: bounded edit-distance similarity in `[0, 1]`
//! - [`resolve`]: tiered resolution (exact name, alias, fuzzy) over a snapshot
//! - [`EntityResolver`]: the same tiers driven against an [`EntityRegistry`]
//!
//! ## Example
//!
//! ```ignore
//! use tradewind_search::EntityResolver;
//!
//! let resolver = EntityResolver::new(registry);
//! let matches = resolver.resolve(EntityKind::Port, "Port Royale", 10).await?;
//! if matches.first().map(|m| m.confidence) == Some(Confidence::Exact) {
//!     // auto-confirm
//! }
//! ```
//!
//! [`EntityRegistry`]: tradewind_core::EntityRegistry

pub mod normalize;
pub mod resolver;
pub mod similarity;

pub use normalize::normalize;
pub use resolver::{fuzzy_rank, resolve, EntityResolver};
pub use similarity::similarity;
