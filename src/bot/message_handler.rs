//! Message Handler module for processing incoming WhatsApp messages
//!
//! Implements the conversation state machine: language selection, then
//! title, description, before photo and after photo, ending with both
//! photos published to the gallery repository.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, ConversationState, InboundMessage, Language};
use crate::localization::LocalizationManager;
use crate::publisher::AssetPublisher;
use crate::store::ConversationStore;
use crate::whatsapp::MessageGateway;

/// Drives the upload conversation for every sender.
///
/// All collaborators are injected: storage, the messaging gateway, the
/// asset publisher and the localizer. Notification sends are best-effort;
/// media fetches and publishes propagate their errors to the webhook layer.
#[derive(Clone)]
pub struct MessageHandler {
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn MessageGateway>,
    publisher: Arc<dyn AssetPublisher>,
    localizer: Arc<LocalizationManager>,
}

impl MessageHandler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        gateway: Arc<dyn MessageGateway>,
        publisher: Arc<dyn AssetPublisher>,
        localizer: Arc<LocalizationManager>,
    ) -> Self {
        Self {
            store,
            gateway,
            publisher,
            localizer,
        }
    }

    fn message(&self, key: &str, language: Language) -> String {
        self.localizer.get_message_in_language(key, language.as_str())
    }

    /// Process one inbound message for `sender`.
    ///
    /// Messages of the wrong type for the current state are silently
    /// ignored: state and data stay unchanged and nothing is sent back.
    pub async fn handle_message(&self, sender: &str, message: InboundMessage) -> Result<()> {
        let Some(conversation) = self.store.get(sender).await else {
            // First contact: create the record and greet in English. The
            // message content itself is not processed until the next
            // delivery.
            info!(user_id = %sender, "new user, initializing conversation");
            self.store.put(sender, Conversation::new()).await;
            self.gateway
                .send_text(sender, &self.message("welcome", Language::En))
                .await;
            return Ok(());
        };

        debug!(
            user_id = %sender,
            state = ?conversation.state,
            language = conversation.language.as_str(),
            "processing message"
        );

        match conversation.state {
            ConversationState::Init => {
                self.handle_language_choice(sender, conversation, message)
                    .await
            }
            ConversationState::WaitingTitle => {
                self.handle_title(sender, conversation, message).await
            }
            ConversationState::WaitingDescription => {
                self.handle_description(sender, conversation, message).await
            }
            ConversationState::WaitingBeforePhoto => {
                self.handle_before_photo(sender, conversation, message).await
            }
            ConversationState::WaitingAfterPhoto => {
                self.handle_after_photo(sender, conversation, message).await
            }
        }
    }

    async fn handle_language_choice(
        &self,
        sender: &str,
        mut conversation: Conversation,
        message: InboundMessage,
    ) -> Result<()> {
        let InboundMessage::Text(body) = message else {
            return Ok(());
        };

        match Language::from_choice(body.trim()) {
            Some(language) => {
                conversation.language = language;
                conversation.state = ConversationState::WaitingTitle;
                conversation.touch();
                self.store.put(sender, conversation).await;
                self.gateway
                    .send_text(sender, &self.message("ask-title", language))
                    .await;
            }
            None => {
                self.gateway
                    .send_text(
                        sender,
                        &self.message("invalid-language", conversation.language),
                    )
                    .await;
            }
        }
        Ok(())
    }

    async fn handle_title(
        &self,
        sender: &str,
        mut conversation: Conversation,
        message: InboundMessage,
    ) -> Result<()> {
        let InboundMessage::Text(body) = message else {
            return Ok(());
        };

        conversation.data.title = Some(body);
        conversation.state = ConversationState::WaitingDescription;
        conversation.touch();
        let language = conversation.language;
        self.store.put(sender, conversation).await;
        self.gateway
            .send_text(sender, &self.message("ask-description", language))
            .await;
        Ok(())
    }

    async fn handle_description(
        &self,
        sender: &str,
        mut conversation: Conversation,
        message: InboundMessage,
    ) -> Result<()> {
        let InboundMessage::Text(body) = message else {
            return Ok(());
        };

        conversation.data.description = Some(body);
        conversation.state = ConversationState::WaitingBeforePhoto;
        conversation.touch();
        let language = conversation.language;
        self.store.put(sender, conversation).await;
        self.gateway
            .send_text(sender, &self.message("ask-before-photo", language))
            .await;
        Ok(())
    }

    async fn handle_before_photo(
        &self,
        sender: &str,
        mut conversation: Conversation,
        message: InboundMessage,
    ) -> Result<()> {
        let InboundMessage::Image { media_id } = message else {
            return Ok(());
        };

        let photo = self.gateway.fetch_media(&media_id).await?;
        info!(user_id = %sender, size = photo.len(), "stored before photo");
        conversation.data.before_photo = Some(photo);
        conversation.state = ConversationState::WaitingAfterPhoto;
        conversation.touch();
        let language = conversation.language;
        self.store.put(sender, conversation).await;
        self.gateway
            .send_text(sender, &self.message("ask-after-photo", language))
            .await;
        Ok(())
    }

    async fn handle_after_photo(
        &self,
        sender: &str,
        mut conversation: Conversation,
        message: InboundMessage,
    ) -> Result<()> {
        let InboundMessage::Image { media_id } = message else {
            return Ok(());
        };

        let photo = self.gateway.fetch_media(&media_id).await?;
        conversation.data.after_photo = Some(photo);
        conversation.touch();
        // Persist before publishing: a failed publish leaves the record in
        // WaitingAfterPhoto with both photos stored, so resending the after
        // photo retries the whole publish step.
        self.store.put(sender, conversation.clone()).await;

        let language = conversation.language;
        self.gateway
            .send_text(sender, &self.message("processing", language))
            .await;

        self.publish_pair(sender, &conversation).await?;

        // Deleted exactly once, only after both publishes succeeded.
        self.store.remove(sender).await;
        self.gateway
            .send_text(sender, &self.message("success", language))
            .await;
        info!(user_id = %sender, "conversation completed");
        Ok(())
    }

    async fn publish_pair(&self, sender: &str, conversation: &Conversation) -> Result<()> {
        let data = &conversation.data;
        let (Some(before), Some(after)) = (&data.before_photo, &data.after_photo) else {
            warn!(user_id = %sender, "publish reached without both photos");
            return Err(anyhow!("conversation data incomplete at publish"));
        };
        let title = data.title.as_deref().unwrap_or_default();
        let description = data.description.as_deref().unwrap_or_default();

        let timestamp = Utc::now().timestamp_millis();
        self.publisher
            .publish(before, &format!("before_{timestamp}"), title, description)
            .await?;
        self.publisher
            .publish(after, &format!("after_{timestamp}"), title, description)
            .await?;

        info!(user_id = %sender, timestamp, "published before/after pair");
        Ok(())
    }
}
