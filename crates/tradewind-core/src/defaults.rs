//! Centralized default constants for tradewind.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration structs fall back to these when an environment variable is
//! unset.

// =============================================================================
// RESOLUTION
// =============================================================================

/// Minimum fuzzy score for the High tier (auto-accepted for items).
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Minimum fuzzy score for the Medium tier. Lower scores are discarded.
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.60;

/// Maximum port candidates offered to the submitter.
pub const PORT_MATCH_LIMIT: usize = 10;

/// Maximum item candidates offered per raw item name.
pub const ITEM_MATCH_LIMIT: usize = 5;

// =============================================================================
// SUBMISSIONS
// =============================================================================

/// Lifetime of an in-flight submission.
pub const SUBMISSION_TTL_SECS: u64 = 300;

/// How often expired submissions are swept.
pub const SUBMISSION_SWEEP_INTERVAL_SECS: u64 = 60;

/// Committed market orders expire after this many days.
pub const MARKET_ORDER_TTL_DAYS: i64 = 7;

/// Where uploaded screenshots are kept while a submission is in flight.
pub const IMAGE_STORAGE_PATH: &str = "./data/images";

// =============================================================================
// PLAYER ORDERS
// =============================================================================

/// Lifetime of a player order when no duration is chosen.
pub const PLAYER_ORDER_TTL_DAYS: i64 = 7;

/// Rows returned by an order search without an explicit limit.
pub const ORDER_SEARCH_LIMIT: usize = 25;

/// How often expired market rows and player orders are swept.
pub const ORDER_SWEEP_INTERVAL_SECS: u64 = 3600;

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// Inactivity window after which a paired conversation is closed.
pub const CONVERSATION_TIMEOUT_SECS: u64 = 1800;

/// How often timed-out conversations are swept.
pub const CONVERSATION_SWEEP_INTERVAL_SECS: u64 = 300;

/// Upper bound for configured TTLs and timeouts (30 days).
pub const MAX_LIFETIME_SECS: u64 = 30 * 24 * 60 * 60;

/// In-game name length bounds (inclusive, after trimming).
pub const DISPLAY_NAME_MIN_LEN: usize = 2;
pub const DISPLAY_NAME_MAX_LEN: usize = 50;

// =============================================================================
// RUNTIME
// =============================================================================

/// Sweeper event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Maximum pooled database connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Discord REST API base URL.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// HTTP timeout for messaging calls.
pub const MESSAGING_TIMEOUT_SECS: u64 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_ordered() {
        assert!(HIGH_CONFIDENCE_THRESHOLD > MEDIUM_CONFIDENCE_THRESHOLD);
        assert!(MEDIUM_CONFIDENCE_THRESHOLD > 0.0);
        assert!(HIGH_CONFIDENCE_THRESHOLD <= 1.0);
    }

    #[test]
    fn test_sweep_intervals_shorter_than_ttls() {
        assert!(SUBMISSION_SWEEP_INTERVAL_SECS < SUBMISSION_TTL_SECS);
        assert!(CONVERSATION_SWEEP_INTERVAL_SECS < CONVERSATION_TIMEOUT_SECS);
    }

    #[test]
    fn test_lifetime_cap_covers_defaults() {
        assert!(SUBMISSION_TTL_SECS <= MAX_LIFETIME_SECS);
        assert!(CONVERSATION_TIMEOUT_SECS <= MAX_LIFETIME_SECS);
        assert!((PLAYER_ORDER_TTL_DAYS as u64) * 86_400 <= MAX_LIFETIME_SECS);
    }
}
