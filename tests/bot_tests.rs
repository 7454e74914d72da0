//! # Bot Tests
//!
//! Integration tests for the conversation state machine, driven through
//! mock gateway and publisher collaborators.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use gallery_bot::bot::MessageHandler;
use gallery_bot::conversation::{ConversationState, InboundMessage, Language};
use gallery_bot::localization::LocalizationManager;
use gallery_bot::publisher::{AssetPublisher, PublishError, PublishedAsset};
use gallery_bot::store::{ConversationStore, InMemoryConversationStore};
use gallery_bot::whatsapp::MessageGateway;

/// Records outbound sends and serves media from a fixed map.
#[derive(Default)]
struct MockGateway {
    sent: Mutex<Vec<(String, String)>>,
    media: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl MessageGateway for MockGateway {
    async fn send_text(&self, to: &str, body: &str) {
        self.sent.lock().await.push((to.to_string(), body.to_string()));
    }

    async fn fetch_media(&self, media_id: &str) -> anyhow::Result<Vec<u8>> {
        self.media
            .get(media_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown media id: {media_id}"))
    }
}

#[derive(Debug, Clone)]
struct PublishCall {
    filename: String,
    title: String,
    description: String,
    image: Vec<u8>,
}

/// Records publish calls; optionally fails from the nth call onward.
#[derive(Default)]
struct MockPublisher {
    published: Mutex<Vec<PublishCall>>,
    fail_from_call: Option<usize>,
}

#[async_trait]
impl AssetPublisher for MockPublisher {
    async fn publish(
        &self,
        image: &[u8],
        filename: &str,
        title: &str,
        description: &str,
    ) -> Result<PublishedAsset, PublishError> {
        let mut published = self.published.lock().await;
        if let Some(threshold) = self.fail_from_call {
            if published.len() >= threshold {
                return Err(PublishError::Api("simulated remote failure".to_string()));
            }
        }
        published.push(PublishCall {
            filename: filename.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            image: image.to_vec(),
        });
        Ok(PublishedAsset {
            path: format!("public/gallery/{filename}.jpg"),
            commit_sha: Some("deadbeef".to_string()),
        })
    }
}

struct Harness {
    handler: MessageHandler,
    store: Arc<InMemoryConversationStore>,
    gateway: Arc<MockGateway>,
    publisher: Arc<MockPublisher>,
    localizer: Arc<LocalizationManager>,
}

fn setup() -> Harness {
    setup_with(MockGateway::default(), MockPublisher::default())
}

fn setup_with(gateway: MockGateway, publisher: MockPublisher) -> Harness {
    let store = Arc::new(InMemoryConversationStore::new());
    let gateway = Arc::new(gateway);
    let publisher = Arc::new(publisher);
    let localizer =
        Arc::new(LocalizationManager::new().expect("failed to create localization manager"));
    let handler = MessageHandler::new(
        store.clone(),
        gateway.clone(),
        publisher.clone(),
        localizer.clone(),
    );
    Harness {
        handler,
        store,
        gateway,
        publisher,
        localizer,
    }
}

fn text(body: &str) -> InboundMessage {
    InboundMessage::Text(body.to_string())
}

fn image(media_id: &str) -> InboundMessage {
    InboundMessage::Image {
        media_id: media_id.to_string(),
    }
}

impl Harness {
    fn expected(&self, key: &str, language: Language) -> String {
        self.localizer.get_message_in_language(key, language.as_str())
    }

    async fn sent(&self) -> Vec<(String, String)> {
        self.gateway.sent.lock().await.clone()
    }
}

const SENDER: &str = "38970111222";

#[tokio::test]
async fn test_first_message_creates_record_and_welcomes_in_english() {
    let h = setup();

    h.handler.handle_message(SENDER, text("hi there")).await.unwrap();

    let conversation = h.store.get(SENDER).await.unwrap();
    assert_eq!(conversation.state, ConversationState::Init);
    assert_eq!(conversation.language, Language::En);

    let sent = h.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, SENDER);
    assert_eq!(sent[0].1, h.expected("welcome", Language::En));
}

#[tokio::test]
async fn test_first_message_of_any_type_triggers_welcome() {
    let h = setup();

    h.handler
        .handle_message(SENDER, InboundMessage::Unsupported)
        .await
        .unwrap();

    assert!(h.store.get(SENDER).await.is_some());
    assert_eq!(h.sent().await.len(), 1);
}

#[tokio::test]
async fn test_language_selection_choices() {
    for (choice, language) in [("1", Language::En), ("2", Language::Mk), ("3", Language::Sq)] {
        let h = setup();
        h.handler.handle_message(SENDER, text("hello")).await.unwrap();
        h.handler.handle_message(SENDER, text(choice)).await.unwrap();

        let conversation = h.store.get(SENDER).await.unwrap();
        assert_eq!(conversation.language, language);
        assert_eq!(conversation.state, ConversationState::WaitingTitle);

        let sent = h.sent().await;
        assert_eq!(sent.last().unwrap().1, h.expected("ask-title", language));
    }
}

#[tokio::test]
async fn test_invalid_language_choice_keeps_init_state() {
    let h = setup();
    h.handler.handle_message(SENDER, text("hello")).await.unwrap();
    h.handler.handle_message(SENDER, text("9")).await.unwrap();

    let conversation = h.store.get(SENDER).await.unwrap();
    assert_eq!(conversation.state, ConversationState::Init);
    assert_eq!(conversation.language, Language::En);

    let sent = h.sent().await;
    assert_eq!(
        sent.last().unwrap().1,
        h.expected("invalid-language", Language::En)
    );
}

#[tokio::test]
async fn test_non_text_in_init_is_ignored() {
    let h = setup();
    h.handler.handle_message(SENDER, text("hello")).await.unwrap();
    h.handler.handle_message(SENDER, image("m1")).await.unwrap();

    let conversation = h.store.get(SENDER).await.unwrap();
    assert_eq!(conversation.state, ConversationState::Init);
    // Only the welcome was sent.
    assert_eq!(h.sent().await.len(), 1);
}

#[tokio::test]
async fn test_image_while_waiting_title_is_ignored() {
    let h = setup();
    h.handler.handle_message(SENDER, text("hello")).await.unwrap();
    h.handler.handle_message(SENDER, text("2")).await.unwrap();
    let sends_before = h.sent().await.len();

    h.handler.handle_message(SENDER, image("m1")).await.unwrap();

    let conversation = h.store.get(SENDER).await.unwrap();
    assert_eq!(conversation.state, ConversationState::WaitingTitle);
    assert!(conversation.data.title.is_none());
    assert_eq!(h.sent().await.len(), sends_before);
}

#[tokio::test]
async fn test_happy_path_publishes_pair_and_clears_state() {
    let mut gateway = MockGateway::default();
    gateway.media.insert("before-id".to_string(), vec![1, 2, 3]);
    gateway.media.insert("after-id".to_string(), vec![4, 5, 6]);
    let h = setup_with(gateway, MockPublisher::default());

    h.handler.handle_message(SENDER, text("hello")).await.unwrap();
    h.handler.handle_message(SENDER, text("2")).await.unwrap();
    h.handler.handle_message(SENDER, text("My Title")).await.unwrap();
    h.handler.handle_message(SENDER, text("My Desc")).await.unwrap();
    h.handler.handle_message(SENDER, image("before-id")).await.unwrap();
    h.handler.handle_message(SENDER, image("after-id")).await.unwrap();

    let published = h.publisher.published.lock().await.clone();
    assert_eq!(published.len(), 2);
    assert!(published[0].filename.starts_with("before_"));
    assert!(published[1].filename.starts_with("after_"));
    // Both assets share the same timestamp suffix.
    assert_eq!(
        published[0].filename.trim_start_matches("before_"),
        published[1].filename.trim_start_matches("after_")
    );
    assert_eq!(published[0].title, "My Title");
    assert_eq!(published[0].description, "My Desc");
    assert_eq!(published[0].image, vec![1, 2, 3]);
    assert_eq!(published[1].image, vec![4, 5, 6]);

    // Record removed after completion.
    assert!(h.store.get(SENDER).await.is_none());

    let sent = h.sent().await;
    let bodies: Vec<&str> = sent.iter().map(|(_, body)| body.as_str()).collect();
    assert_eq!(
        bodies,
        vec![
            h.expected("welcome", Language::En),
            h.expected("ask-title", Language::Mk),
            h.expected("ask-description", Language::Mk),
            h.expected("ask-before-photo", Language::Mk),
            h.expected("ask-after-photo", Language::Mk),
            h.expected("processing", Language::Mk),
            h.expected("success", Language::Mk),
        ]
    );
}

#[tokio::test]
async fn test_second_publish_failure_keeps_record_and_first_asset() {
    let mut gateway = MockGateway::default();
    gateway.media.insert("before-id".to_string(), vec![1]);
    gateway.media.insert("after-id".to_string(), vec![2]);
    let publisher = MockPublisher {
        fail_from_call: Some(1),
        ..Default::default()
    };
    let h = setup_with(gateway, publisher);

    h.handler.handle_message(SENDER, text("hello")).await.unwrap();
    h.handler.handle_message(SENDER, text("1")).await.unwrap();
    h.handler.handle_message(SENDER, text("Title")).await.unwrap();
    h.handler.handle_message(SENDER, text("Desc")).await.unwrap();
    h.handler.handle_message(SENDER, image("before-id")).await.unwrap();

    let result = h.handler.handle_message(SENDER, image("after-id")).await;
    assert!(result.is_err());

    // The before asset is already committed (orphaned), the record stays in
    // WaitingAfterPhoto with both photos stored so the publish can be
    // retried by resending the after photo.
    assert_eq!(h.publisher.published.lock().await.len(), 1);
    let conversation = h.store.get(SENDER).await.unwrap();
    assert_eq!(conversation.state, ConversationState::WaitingAfterPhoto);
    assert!(conversation.data.before_photo.is_some());
    assert!(conversation.data.after_photo.is_some());

    // No success message was sent.
    let sent = h.sent().await;
    assert_ne!(sent.last().unwrap().1, h.expected("success", Language::En));
}

#[tokio::test]
async fn test_media_fetch_failure_propagates_without_advancing() {
    let h = setup();
    h.handler.handle_message(SENDER, text("hello")).await.unwrap();
    h.handler.handle_message(SENDER, text("1")).await.unwrap();
    h.handler.handle_message(SENDER, text("Title")).await.unwrap();
    h.handler.handle_message(SENDER, text("Desc")).await.unwrap();

    // No media registered in the mock, so the fetch fails.
    let result = h.handler.handle_message(SENDER, image("missing")).await;
    assert!(result.is_err());

    let conversation = h.store.get(SENDER).await.unwrap();
    assert_eq!(conversation.state, ConversationState::WaitingBeforePhoto);
    assert!(conversation.data.before_photo.is_none());
}

#[tokio::test]
async fn test_abandoned_conversations_accumulate_until_evicted() {
    let h = setup();

    for i in 0..25 {
        let sender = format!("sender-{i}");
        h.handler.handle_message(&sender, text("hi")).await.unwrap();
    }
    assert_eq!(h.store.len().await, 25);

    // The sweep bounds memory: with a zero TTL every idle record goes.
    let evicted = h.store.evict_idle(0).await;
    assert_eq!(evicted, 25);
    assert_eq!(h.store.len().await, 0);
}
