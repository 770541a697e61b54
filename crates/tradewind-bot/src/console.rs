//! Line-oriented operator console.
//!
//! Drives the services from stdin when no chat gateway is attached, one
//! command per line. Each line names the acting user explicitly:
//!
//! ```text
//! name   <user> <in-game name>
//! post   <user> <buy|sell> <price> <quantity> <item>
//! find   [item]
//! orders <user>
//! cancel <user> <order id>
//! contact <user> <order id>
//! say    <user> <text>
//! end    <user>
//! ```

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use tradewind_core::{Error, InboundMessage, OrderType, PlayerOrder};

use crate::orders::{FindOrders, PostOrder};
use crate::trading::NO_CONVERSATION_HELP;
use crate::Bot;

const USAGE: &str = "commands: name, post, find, orders, cancel, contact, say, end";

/// Read commands from stdin until it closes.
pub async fn run(bot: Bot) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Operator console reading stdin");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!(line = %line, "console <-");
        println!("{}", handle_line(&bot, &line).await);
    }
    info!("Operator console closed");
    Ok(())
}

/// Execute one command line and render the reply.
pub async fn handle_line(bot: &Bot, line: &str) -> String {
    match dispatch(bot, line.trim()).await {
        Ok(reply) => reply,
        Err(Error::ConversationNotFound(_)) => NO_CONVERSATION_HELP.to_string(),
        Err(e) if e.is_recoverable() => e.to_string(),
        Err(e) => {
            warn!(error = %e, "Console command failed");
            "Something went wrong, check the logs".to_string()
        }
    }
}

async fn dispatch(bot: &Bot, line: &str) -> tradewind_core::Result<String> {
    let (command, rest) = split_word(line);
    match command {
        "name" => {
            let (user, name) = split_word(rest);
            let name = bot.contacts.set_display_name(user, name).await?;
            Ok(format!("In-game name set to **{name}**"))
        }
        "post" => {
            let (user, rest) = split_word(rest);
            let (side, rest) = split_word(rest);
            let (price, rest) = split_word(rest);
            let (quantity, item) = split_word(rest);
            let order = bot
                .orders
                .post_order(
                    user,
                    PostOrder {
                        order_type: side.parse::<OrderType>().map_err(Error::InvalidInput)?,
                        item: item.to_string(),
                        price: parse_number(price, "price")?,
                        quantity: parse_number(quantity, "quantity")?,
                        duration: None,
                        port: None,
                        notes: None,
                    },
                )
                .await?;
            Ok(format!("Order #{} posted", order.id))
        }
        "find" => {
            let filters = FindOrders {
                item: Some(rest.to_string()).filter(|i| !i.is_empty()),
                ..Default::default()
            };
            let found = bot.orders.search(filters, 10).await?;
            Ok(render_orders(&found, "No player orders found matching your criteria"))
        }
        "orders" => {
            let (user, _) = split_word(rest);
            let mine = bot.orders.my_orders(user).await?;
            Ok(render_orders(&mine, "You have no active trade orders"))
        }
        "cancel" => {
            let (user, id) = split_word(rest);
            let id = parse_number(id, "order id")?;
            bot.orders.cancel(user, id).await?;
            Ok(format!("Order #{id} has been cancelled."))
        }
        "contact" => {
            let (user, id) = split_word(rest);
            let conversation = bot
                .contacts
                .initiate_contact(user, parse_number(id, "order id")?)
                .await?;
            Ok(format!(
                "Connected with **{}**",
                conversation.counterpart.display_name
            ))
        }
        "say" => {
            let (user, text) = split_word(rest);
            let sent = bot
                .contacts
                .relay(&InboundMessage {
                    sender_id: user.to_string(),
                    text: text.to_string(),
                    attachments: Vec::new(),
                })
                .await?;
            Ok(format!("relayed {sent} message(s)"))
        }
        "end" => {
            let (user, _) = split_word(rest);
            bot.contacts.end_conversation(user).await?;
            Ok("Trade conversation ended".to_string())
        }
        _ => Ok(USAGE.to_string()),
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn parse_number(raw: &str, what: &str) -> tradewind_core::Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| Error::InvalidInput(format!("{what} must be a whole number")))
}

fn render_orders(orders: &[PlayerOrder], empty: &str) -> String {
    if orders.is_empty() {
        return empty.to_string();
    }
    orders
        .iter()
        .map(|o| {
            format!(
                "#{} {} {} - {} gold x{} by {}",
                o.id,
                o.order_type.as_str().to_uppercase(),
                o.item_name,
                o.price,
                o.quantity,
                o.ingame_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
