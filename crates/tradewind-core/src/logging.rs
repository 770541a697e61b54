//! Structured logging schema and field name constants for tradewind.
//!
//! All crates use these constants for consistent structured logging fields
//! so log queries can filter by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, failed side effect that was skipped |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points (resolution tier, auto-confirmation) |
//! | TRACE | Per-candidate iteration (fuzzy scores) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "bot", "search", "sessions", "db", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "resolver", "submissions", "pairing", "sweeper", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "resolve", "try_register", "sweep_conversations"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Platform user id of the acting user.
pub const USER_ID: &str = "user_id";

/// Durable conversation id.
pub const CONVERSATION_ID: &str = "conversation_id";

/// Player order id a contact request targets.
pub const ORDER_ID: &str = "order_id";

/// Resolved port id.
pub const PORT_ID: &str = "port_id";

/// Raw (pre-resolution) entity name.
pub const RAW_NAME: &str = "raw_name";

/// Entity kind ("item" or "port").
pub const ENTITY_KIND: &str = "entity_kind";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a resolution or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of entries evicted by a sweep.
pub const EVICTED_COUNT: &str = "evicted_count";

/// Similarity score of a candidate.
pub const SCORE: &str = "score";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether the operation succeeded.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
