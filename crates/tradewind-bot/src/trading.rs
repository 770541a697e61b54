//! Trade contact and direct-message relay.
//!
//! A conversation pairs the user who clicked "contact" on a player order
//! with the player who posted it. While it is live every direct message either party
//! sends the bot is forwarded to the other, prefixed with the sender's
//! in-game name.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use tradewind_core::defaults::{DISPLAY_NAME_MAX_LEN, DISPLAY_NAME_MIN_LEN};
use tradewind_core::{
    BusyParty, ConversationRepository, Error, InboundMessage, Messenger, NewConversation,
    PlayerOrderRepository, Result, TradeDirectory,
};
use tradewind_sessions::{ActiveConversation, PairingRegistry, Participant};

/// Reply for direct messages that arrive outside any conversation.
pub const NO_CONVERSATION_HELP: &str = "You're not in an active trade conversation. \
                                        Use `/trade-search` to find orders and contact a trader.";

const UNKNOWN_TRADER: &str = "Unknown trader";

#[derive(Clone)]
pub struct ContactService {
    pairings: PairingRegistry,
    conversations: Arc<dyn ConversationRepository>,
    directory: Arc<dyn TradeDirectory>,
    orders: Arc<dyn PlayerOrderRepository>,
    messenger: Arc<dyn Messenger>,
}

impl ContactService {
    pub fn new(
        pairings: PairingRegistry,
        conversations: Arc<dyn ConversationRepository>,
        directory: Arc<dyn TradeDirectory>,
        orders: Arc<dyn PlayerOrderRepository>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            pairings,
            conversations,
            directory,
            orders,
            messenger,
        }
    }

    pub fn pairings(&self) -> &PairingRegistry {
        &self.pairings
    }

    /// Pair `user_id` with the player who posted `order_id`.
    ///
    /// Exactly one of several concurrent attempts involving the same user
    /// succeeds; the rest get [`Error::Busy`] naming who is occupied.
    #[instrument(skip(self), fields(subsystem = "trading", op = "initiate_contact"))]
    pub async fn initiate_contact(
        &self,
        user_id: &str,
        order_id: i64,
    ) -> Result<ActiveConversation> {
        let initiator_name = self
            .directory
            .get_profile(user_id)
            .await?
            .and_then(|p| p.display_name)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidState(
                    "You need to set your in-game name first with `/set-name`".to_string(),
                )
            })?;

        let order = self
            .orders
            .get_active_order(order_id)
            .await?
            .ok_or_else(|| Error::NotFound("Order not found or has expired".to_string()))?;

        if order.user_id == user_id {
            return Err(Error::InvalidInput(
                "You cannot contact yourself about your own order".to_string(),
            ));
        }

        let counterpart_name = match order.ingame_name.trim() {
            "" => UNKNOWN_TRADER.to_string(),
            name => name.to_string(),
        };

        let conversation = ActiveConversation::new(
            order_id,
            Participant::new(user_id, initiator_name.clone()),
            Participant::new(order.user_id.clone(), counterpart_name.clone()),
            self.pairings.now(),
        );

        if !self.pairings.try_register(conversation.clone()).await {
            let party = if self.pairings.has_active(user_id).await {
                BusyParty::Initiator
            } else {
                BusyParty::Counterpart
            };
            debug!(user_id, order_id, ?party, "Contact refused");
            return Err(Error::Busy(party));
        }

        let row = match self
            .conversations
            .create(NewConversation {
                order_id,
                initiator_id: user_id.to_string(),
                initiator_name: initiator_name.clone(),
                counterpart_id: order.user_id.clone(),
                counterpart_name: counterpart_name.clone(),
            })
            .await
        {
            Ok(row) => row,
            Err(e) => {
                warn!(user_id, order_id, error = %e, "Persisting conversation failed; rolling back pairing");
                self.pairings.remove(&conversation).await;
                return Err(e);
            }
        };
        if !self
            .pairings
            .attach_conversation_id(conversation.key, row.id)
            .await
        {
            // ended (or swept) while the row was being written
            warn!(user_id, order_id, conversation_id = row.id, "Pairing gone before row attached");
            if let Err(e) = self.conversations.close(row.id).await {
                warn!(conversation_id = row.id, error = %e, "Failed to close orphaned row");
            }
            return Err(Error::ConversationNotFound(user_id.to_string()));
        }
        let conversation = ActiveConversation {
            conversation_id: Some(row.id),
            ..conversation
        };

        info!(
            user_id,
            counterpart = %order.user_id,
            order_id,
            conversation_id = row.id,
            "Trade conversation started"
        );

        self.notify(
            user_id,
            &format!(
                "You're now connected with **{counterpart_name}** about order #{order_id}. \
                 Messages you send here will be relayed to them. Use `/trade-end` when you're done."
            ),
        )
        .await;
        self.notify(
            &order.user_id,
            &format!(
                "**{initiator_name}** wants to trade about your order #{order_id}. \
                 Reply here to respond. Use `/trade-end` when you're done."
            ),
        )
        .await;

        Ok(conversation)
    }

    /// End the caller's conversation and tell the other party.
    #[instrument(skip(self), fields(subsystem = "trading", op = "end_conversation"))]
    pub async fn end_conversation(&self, user_id: &str) -> Result<ActiveConversation> {
        let conversation = self
            .pairings
            .get_by_user(user_id)
            .await
            .ok_or_else(|| Error::ConversationNotFound(user_id.to_string()))?;

        if let Some(id) = conversation.conversation_id {
            self.conversations.close(id).await?;
        }
        self.pairings.remove(&conversation).await;

        let ender = conversation
            .participant(user_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| UNKNOWN_TRADER.to_string());
        if let Some(other) = conversation.other_party(user_id) {
            self.notify(
                &other.user_id,
                &format!(
                    "**{ender}** has ended the trade conversation. \
                     Use `/trade-search` to find more trades."
                ),
            )
            .await;
        }
        info!(user_id, conversation_id = ?conversation.conversation_id, "Trade conversation ended");
        Ok(conversation)
    }

    /// Forward a direct message to the sender's conversation partner.
    ///
    /// Returns how many messages were sent. Delivery failures are returned
    /// to the caller so the sender can be told.
    #[instrument(skip(self, message), fields(subsystem = "trading", op = "relay", user_id = %message.sender_id))]
    pub async fn relay(&self, message: &InboundMessage) -> Result<usize> {
        let sender_id = message.sender_id.as_str();
        let conversation = self
            .pairings
            .get_by_user(sender_id)
            .await
            .ok_or_else(|| Error::ConversationNotFound(sender_id.to_string()))?;
        let (sender, recipient) = match (
            conversation.participant(sender_id),
            conversation.other_party(sender_id),
        ) {
            (Some(s), Some(r)) => (s, r),
            _ => return Err(Error::ConversationNotFound(sender_id.to_string())),
        };

        let outgoing = format_relay(&sender.display_name, &message.text, &message.attachments);
        for text in &outgoing {
            self.messenger
                .send_direct_message(&recipient.user_id, text)
                .await?;
        }

        if let Some(touched) = self.pairings.touch(sender_id).await {
            if let Some(id) = touched.conversation_id {
                if let Err(e) = self.conversations.touch(id, touched.last_activity).await {
                    warn!(conversation_id = id, error = %e, "Failed to record activity");
                }
            }
        }
        debug!(sent = outgoing.len(), "Message relayed");
        Ok(outgoing.len())
    }

    /// Set the in-game name shown to trading partners.
    pub async fn set_display_name(&self, user_id: &str, name: &str) -> Result<String> {
        let name = name.trim();
        let len = name.chars().count();
        if !(DISPLAY_NAME_MIN_LEN..=DISPLAY_NAME_MAX_LEN).contains(&len) {
            return Err(Error::InvalidInput(format!(
                "in-game name must be between {DISPLAY_NAME_MIN_LEN} and {DISPLAY_NAME_MAX_LEN} characters"
            )));
        }
        self.directory.set_display_name(user_id, name).await?;
        info!(user_id, name, "Display name set");
        Ok(name.to_string())
    }

    async fn notify(&self, user_id: &str, text: &str) {
        if let Err(e) = self.messenger.send_direct_message(user_id, text).await {
            warn!(user_id, error = %e, "Failed to send trade notification");
        }
    }
}

/// Relay texts for one inbound message: the text line (if any) followed by
/// one message listing the attachment URLs (if any).
pub fn format_relay(sender_name: &str, text: &str, attachments: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(2);
    if !text.trim().is_empty() {
        out.push(format!("**[{sender_name}]**: {text}"));
    }
    if !attachments.is_empty() {
        out.push(format!(
            "**[{sender_name}]** shared:\n{}",
            attachments.join("\n")
        ));
    }
    out
}
