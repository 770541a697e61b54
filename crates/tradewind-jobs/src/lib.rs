//! # tradewind-jobs
//!
//! Background maintenance for tradewind's in-memory registries.
//!
//! The [`ExpirySweeper`] runs two periodic passes:
//! - evicting expired pending submissions and deleting their screenshots
//! - closing timed-out trade conversations and notifying both parties
//!
//! ## Example
//!
//! ```ignore
//! use tradewind_jobs::{ExpirySweeper, SweeperConfig};
//!
//! let sweeper = ExpirySweeper::new(submissions, pairings, conversations, messenger,
//!     SweeperConfig::from_env());
//! let handle = sweeper.start();
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod sweeper;

pub use sweeper::{
    ExpirySweeper, SweepReport, SweeperConfig, SweeperEvent, SweeperHandle, INACTIVITY_NOTICE,
};
