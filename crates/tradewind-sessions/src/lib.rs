//! # tradewind-sessions
//!
//! Short-lived per-user state owned by the bot process.
//!
//! - [`SubmissionStore`]: one in-flight market submission per user, walked
//!   through port confirmation and per-unique-item confirmation.
//! - [`PairingRegistry`]: at most one live trade conversation per user, with
//!   atomic two-party registration.
//!
//! Both registries guard their maps with a single async mutex and read time
//! through an injected [`Clock`](tradewind_core::Clock). Neither persists
//! anything; durable conversation rows are handled by the caller.

pub mod pairing;
pub mod submissions;

pub use pairing::{ActiveConversation, PairingRegistry, Participant};
pub use submissions::{
    CommitPlan, NewSubmission, PendingSubmission, SubmissionProgress, SubmissionState,
    SubmissionStore,
};
