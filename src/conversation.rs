//! Conversation state types for the gallery upload flow.

use chrono::{DateTime, Utc};

/// Languages the bot can reply in. Selected by the user as the first
/// step of the conversation; everything before that is sent in English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Mk,
    Sq,
}

impl Language {
    /// Map the numeric menu choice ("1", "2", "3") to a language.
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice {
            "1" => Some(Language::En),
            "2" => Some(Language::Mk),
            "3" => Some(Language::Sq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Mk => "mk",
            Language::Sq => "sq",
        }
    }
}

/// Where a user currently is in the upload flow.
///
/// The flow is strictly linear: there are no backward transitions and no
/// cancel command. A record leaves the final state only by being deleted
/// after both photos are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Init,
    WaitingTitle,
    WaitingDescription,
    WaitingBeforePhoto,
    WaitingAfterPhoto,
}

/// Data accumulated over the flow. Fields are filled strictly in state
/// order: title, description, before photo, after photo.
#[derive(Debug, Clone, Default)]
pub struct ConversationData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub before_photo: Option<Vec<u8>>,
    pub after_photo: Option<Vec<u8>>,
}

/// One per sender, keyed by the sender's WhatsApp id in the store.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub state: ConversationState,
    pub language: Language,
    pub data: ConversationData,
    /// Last mutation time, used by the idle-eviction sweep.
    pub touched_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            state: ConversationState::Init,
            language: Language::En,
            data: ConversationData::default(),
            touched_at: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.touched_at = Utc::now();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// An inbound webhook message, reduced to what the flow cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(String),
    Image { media_id: String },
    /// Stickers, audio, reactions and anything else the flow ignores.
    Unsupported,
}
