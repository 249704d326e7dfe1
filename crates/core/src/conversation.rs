//! Conversation states for tracking a market sale

use serde::{Deserialize, Serialize};

/// State of the sale currently being tracked for a stall
///
/// `Complete` and `Cancelled` are terminal. A session that reaches either is
/// replaced by a fresh `Idle` context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// No sale in progress
    #[default]
    Idle,
    /// Customer asked about a price
    Inquiry,
    /// Seller named a price
    PriceQuote,
    /// Customer is bargaining
    Negotiation,
    /// Customer accepted the price
    Agreement,
    /// Money changed hands
    Payment,
    /// Sale closed and recorded
    Complete,
    /// Sale abandoned
    Cancelled,
}

impl ConversationState {
    /// Whether this state ends a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationState::Complete | ConversationState::Cancelled)
    }

    /// Whether a sale is underway (neither idle nor terminal)
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            ConversationState::Idle | ConversationState::Complete | ConversationState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Inquiry => "inquiry",
            ConversationState::PriceQuote => "price_quote",
            ConversationState::Negotiation => "negotiation",
            ConversationState::Agreement => "agreement",
            ConversationState::Payment => "payment",
            ConversationState::Complete => "complete",
            ConversationState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationState::Idle => write!(f, "Idle"),
            ConversationState::Inquiry => write!(f, "Inquiry"),
            ConversationState::PriceQuote => write!(f, "Price Quote"),
            ConversationState::Negotiation => write!(f, "Negotiation"),
            ConversationState::Agreement => write!(f, "Agreement"),
            ConversationState::Payment => write!(f, "Payment"),
            ConversationState::Complete => write!(f, "Complete"),
            ConversationState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Who spoke an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Seller,
    Customer,
}

impl SpeakerRole {
    pub fn from_is_seller(is_seller: bool) -> Self {
        if is_seller {
            SpeakerRole::Seller
        } else {
            SpeakerRole::Customer
        }
    }

    pub fn is_seller(&self) -> bool {
        matches!(self, SpeakerRole::Seller)
    }
}

impl std::fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeakerRole::Seller => write!(f, "seller"),
            SpeakerRole::Customer => write!(f, "customer"),
        }
    }
}
