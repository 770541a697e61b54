//! Startup recovery of in-memory state from durable rows.

use tracing::{info, warn};

use tradewind_core::{ConversationRepository, Result};
use tradewind_sessions::{ActiveConversation, PairingRegistry};

/// Reload every open conversation into the pairing registry.
///
/// Rows that have already timed out are registered too; the first sweep
/// closes them and notifies both parties. Returns the number loaded.
pub async fn recover_conversations(
    pairings: &PairingRegistry,
    conversations: &dyn ConversationRepository,
) -> Result<usize> {
    let rows = conversations.list_active().await?;
    let now = pairings.now();
    let mut stale = 0;
    for row in &rows {
        let conversation = ActiveConversation::from_record(row);
        if !conversation.is_live(now, pairings.timeout()) {
            stale += 1;
        }
        pairings.register(conversation).await;
    }
    if stale > 0 {
        warn!(stale, "Recovered conversations already past their timeout");
    }
    info!(
        subsystem = "trading",
        op = "recover",
        result_count = rows.len(),
        "Conversations recovered"
    );
    Ok(rows.len())
}
