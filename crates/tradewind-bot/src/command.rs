//! Component custom-id encoding for buttons, select menus and modals.
//!
//! Every interactive component the bot sends carries a custom id naming the
//! action and its owner, e.g. `port_select:<user>` or
//! `item_confirm:<user>:<raw item name>`. Contact buttons on search results
//! are `trade_contact_<order id>`.

use std::fmt;

use tradewind_core::{EntityId, Error, Result, UserId};

const PORT_SELECT: &str = "port_select";
const PORT_CREATE: &str = "port_create";
const PORT_CREATE_SUBMIT: &str = "create_port";
const SUBMISSION_CANCEL: &str = "submission_cancel";
const ITEM_CONFIRM: &str = "item_confirm";
const TRADE_CONTACT_PREFIX: &str = "trade_contact_";

/// Select-menu value meaning "create a new canonical entity".
pub const CREATE_NEW_VALUE: &str = "new";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    /// Port picked from the candidate menu.
    PortSelect { user_id: UserId },
    /// "New port" button; opens the creation modal.
    PortCreate { user_id: UserId },
    /// Creation modal submitted.
    PortCreateSubmit { user_id: UserId },
    SubmissionCancel { user_id: UserId },
    /// Item picked (or "new") for one raw OCR name.
    ItemConfirm { user_id: UserId, raw_name: String },
    TradeContact { order_id: i64 },
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Result<Self> {
        if let Some(rest) = custom_id.strip_prefix(TRADE_CONTACT_PREFIX) {
            let order_id = rest
                .parse::<i64>()
                .map_err(|_| Error::InvalidInput(format!("Invalid order id in '{custom_id}'")))?;
            return Ok(Self::TradeContact { order_id });
        }

        let (action, rest) = custom_id
            .split_once(':')
            .ok_or_else(|| Error::InvalidInput(format!("Unknown component '{custom_id}'")))?;

        let owner = |user: &str| -> Result<UserId> {
            if user.is_empty() {
                Err(Error::InvalidInput(format!("Missing user in '{custom_id}'")))
            } else {
                Ok(user.to_string())
            }
        };

        match action {
            PORT_SELECT => Ok(Self::PortSelect { user_id: owner(rest)? }),
            PORT_CREATE => Ok(Self::PortCreate { user_id: owner(rest)? }),
            PORT_CREATE_SUBMIT => Ok(Self::PortCreateSubmit { user_id: owner(rest)? }),
            SUBMISSION_CANCEL => Ok(Self::SubmissionCancel { user_id: owner(rest)? }),
            ITEM_CONFIRM => {
                // Item names may themselves contain ':'.
                let (user, raw_name) = rest.split_once(':').ok_or_else(|| {
                    Error::InvalidInput(format!("Missing item name in '{custom_id}'"))
                })?;
                Ok(Self::ItemConfirm {
                    user_id: owner(user)?,
                    raw_name: raw_name.to_string(),
                })
            }
            _ => Err(Error::InvalidInput(format!("Unknown component '{custom_id}'"))),
        }
    }

    pub fn to_custom_id(&self) -> String {
        self.to_string()
    }

    /// The user a submission component belongs to.
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::PortSelect { user_id }
            | Self::PortCreate { user_id }
            | Self::PortCreateSubmit { user_id }
            | Self::SubmissionCancel { user_id }
            | Self::ItemConfirm { user_id, .. } => Some(user_id),
            Self::TradeContact { .. } => None,
        }
    }

    /// Reject interactions by anyone but the submission's owner.
    pub fn ensure_owner(&self, actor: &str) -> Result<()> {
        match self.owner() {
            Some(owner) if owner != actor => {
                Err(Error::InvalidInput("This isn't your submission".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortSelect { user_id } => write!(f, "{PORT_SELECT}:{user_id}"),
            Self::PortCreate { user_id } => write!(f, "{PORT_CREATE}:{user_id}"),
            Self::PortCreateSubmit { user_id } => write!(f, "{PORT_CREATE_SUBMIT}:{user_id}"),
            Self::SubmissionCancel { user_id } => write!(f, "{SUBMISSION_CANCEL}:{user_id}"),
            Self::ItemConfirm { user_id, raw_name } => {
                write!(f, "{ITEM_CONFIRM}:{user_id}:{raw_name}")
            }
            Self::TradeContact { order_id } => write!(f, "{TRADE_CONTACT_PREFIX}{order_id}"),
        }
    }
}

/// What the user chose for an unresolved item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemChoice {
    Existing(EntityId),
    CreateNew,
}

impl ItemChoice {
    pub fn from_select_value(value: &str) -> Result<Self> {
        if value == CREATE_NEW_VALUE {
            return Ok(Self::CreateNew);
        }
        value
            .parse::<EntityId>()
            .map(Self::Existing)
            .map_err(|_| Error::InvalidInput(format!("Invalid item selection '{value}'")))
    }
}
