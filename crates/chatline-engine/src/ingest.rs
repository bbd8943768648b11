//! Event ingestion: classify, complete, apply, mirror, publish.
//!
//! Each event source gets one task that handles its events strictly in
//! order. Slow work happens outside the state lock: names and media are
//! resolved before the apply step, persistence runs on the blocking pool
//! after it, and the change is published last.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chatline_media::{MediaRequest, MediaResolver};
use chatline_shared::protocol::{
    ConnectionEvent, ConnectionState, GroupInfoUpdate, InboundEvent, MessageEvent,
    PictureUpdate, PushNameUpdate,
};
use chatline_shared::{ChatId, Message, MessageId, NameKind};

use crate::classifier::{Classified, Classifier, NewMessage, PendingMedia, ReactionSignal};
use crate::error::EngineError;
use crate::events::Change;
use crate::fanout::Broadcaster;
use crate::media::MediaFetch;
use crate::names::NameResolver;
use crate::persist::Persistence;
use crate::state::{ChatMetadata, Insert, ReactionUpdate, StateStore};

/// Media collaborators: where bytes come from and where they go.
pub struct MediaPipeline {
    pub fetch: Arc<dyn MediaFetch>,
    pub resolver: MediaResolver,
}

pub struct Engine {
    classifier: Classifier,
    names: Arc<NameResolver>,
    state: Arc<StateStore>,
    fanout: Arc<Broadcaster>,
    media: Option<MediaPipeline>,
    persistence: Option<Arc<dyn Persistence>>,
    /// Held by a blocking mirror write while it reads and saves a record.
    mirror_order: Arc<Mutex<()>>,
}

impl Engine {
    pub fn new(classifier: Classifier, names: Arc<NameResolver>, fanout: Arc<Broadcaster>) -> Self {
        Self {
            classifier,
            names,
            state: Arc::new(StateStore::new()),
            fanout,
            media: None,
            persistence: None,
            mirror_order: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_media(mut self, media: MediaPipeline) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    pub fn names(&self) -> &Arc<NameResolver> {
        &self.names
    }

    pub fn fanout(&self) -> &Arc<Broadcaster> {
        &self.fanout
    }

    /// Load persisted names, chats and messages. Returns the number of
    /// messages restored; zero when persistence is disabled.
    pub async fn restore(&self) -> Result<usize, EngineError> {
        let Some(persistence) = self.persistence.clone() else {
            return Ok(0);
        };

        let (names, chats, messages) = tokio::task::spawn_blocking(move || {
            Ok::<_, EngineError>((
                persistence.load_names()?,
                persistence.load_chats()?,
                persistence.load_messages()?,
            ))
        })
        .await
        .map_err(|e| EngineError::Task(e.to_string()))??;

        let name_count = names.len();
        self.names.seed(names);
        let restored = self.state.restore(chats, messages);

        info!(
            names = name_count,
            messages = restored,
            chats = self.state.stats().chats,
            "Restored persisted state"
        );
        Ok(restored)
    }

    /// Consume one event source on its own task, in arrival order.
    /// The task ends when the sender side is dropped and returns the number
    /// of events handled.
    pub fn spawn_source(
        self: &Arc<Self>,
        name: String,
        mut rx: mpsc::Receiver<InboundEvent>,
    ) -> JoinHandle<u64> {
        let engine = self.clone();
        tokio::spawn(async move {
            info!(source = %name, "Event source attached");
            let mut handled = 0u64;
            while let Some(event) = rx.recv().await {
                engine.handle_event(event).await;
                handled += 1;
            }
            info!(source = %name, events = handled, "Event source closed");
            handled
        })
    }

    pub async fn handle_event(&self, event: InboundEvent) {
        debug!(kind = event.kind(), "Handling event");
        match event {
            InboundEvent::Message(message) => self.handle_message(message).await,
            InboundEvent::PushName(update) => self.handle_push_name(update).await,
            InboundEvent::GroupInfo(update) => self.handle_group_info(update).await,
            InboundEvent::Picture(update) => self.handle_picture(update).await,
            InboundEvent::Receipt(receipt) => {
                self.fanout.publish(Change::Receipt(receipt));
            }
            InboundEvent::Presence(presence) => {
                self.fanout.publish(Change::Presence(presence));
            }
            InboundEvent::Connection(event) => log_connection(&event),
        }
    }

    /// Insert a message composed outside the event stream (for example an
    /// outgoing message) and announce it like any other.
    pub async fn publish_outgoing(&self, mut message: Message) -> Insert {
        message.from_me = true;
        self.insert_message(message, None).await
    }

    // -----------------------------------------------------------------------
    // Message events
    // -----------------------------------------------------------------------

    async fn handle_message(&self, event: MessageEvent) {
        match self.classifier.classify(&event) {
            Classified::NewMessage(new) => self.handle_new_message(*new).await,

            Classified::Edit(edit) => match self.state.apply_edit(&edit.target, &edit.content) {
                Some(message) => {
                    debug!(id = %message.id, editor = %edit.editor, "Message edited");
                    self.persist_message(&message.id).await;
                    self.fanout.publish(Change::MessageEdited { message });
                }
                None => debug!(id = %edit.target, chat = %edit.chat, "Edit not applied"),
            },

            Classified::Delete(delete) => match self.state.apply_delete(&delete.target) {
                Some(message) => {
                    debug!(id = %message.id, by = %delete.revoked_by, "Message deleted");
                    self.persist_message(&message.id).await;
                    self.persist_chat(&message.chat_id).await;
                    self.fanout.publish(Change::MessageDeleted { message });
                }
                None => debug!(id = %delete.target, chat = %delete.chat, "Delete not applied"),
            },

            Classified::Reaction(reaction) => self.handle_reaction(reaction).await,

            Classified::Unclassified { id, reason } => {
                debug!(id = %id, reason, "Unclassified message dropped");
            }
        }
    }

    async fn handle_new_message(&self, new: NewMessage) {
        let NewMessage {
            message,
            media,
            push_name,
        } = new;

        if let Some(push_name) = push_name {
            self.rename_contact(&message.sender.0, &push_name).await;
        }

        if self.state.get_message(&message.id).is_some() {
            debug!(id = %message.id, "Redelivered message ignored");
            return;
        }

        let media_path = match media {
            Some(pending) => {
                let chat_name = self.chat_name(&message.chat_id).await;
                let sender_name = self.names.resolve(&message.sender.0, NameKind::Contact).await;
                self.store_media(&message, &pending, chat_name, sender_name).await
            }
            None => None,
        };

        self.insert_message(message, media_path).await;
    }

    async fn insert_message(&self, mut message: Message, media_path: Option<String>) -> Insert {
        message.sender_name = self.names.resolve(&message.sender.0, NameKind::Contact).await;
        message.media_path = media_path;
        let chat_name = self.chat_name(&message.chat_id).await;

        let outcome = self.state.apply_new_message(message.clone(), &chat_name);
        if let Insert::Inserted { chat_created } = outcome {
            if chat_created {
                info!(chat = %message.chat_id, name = %chat_name, "Chat created");
            }
            self.persist_message(&message.id).await;
            self.persist_chat(&message.chat_id).await;
            self.fanout.publish(Change::NewMessage {
                message,
                chat_created,
            });
        }
        outcome
    }

    async fn handle_reaction(&self, reaction: ReactionSignal) {
        let sender_name = self.names.resolve(&reaction.sender.0, NameKind::Contact).await;
        let update = ReactionUpdate {
            message_id: reaction.target.clone(),
            sender: reaction.sender,
            sender_name,
            emoji: reaction.emoji,
            timestamp: reaction.timestamp,
        };

        match self.state.apply_reaction(update) {
            Some(message) => {
                self.persist_message(&message.id).await;
                self.fanout.publish(Change::ReactionUpdated { message });
            }
            None => debug!(id = %reaction.target, chat = %reaction.chat, "Reaction not applied"),
        }
    }

    /// Display name of a chat: the store's if the chat exists, otherwise
    /// whatever the name resolver produces.
    async fn chat_name(&self, chat_id: &ChatId) -> String {
        match self.state.get_chat(chat_id) {
            Some(chat) => chat.name,
            None => self.names.resolve(chat_id.as_str(), chat_id.name_kind()).await,
        }
    }

    async fn store_media(
        &self,
        message: &Message,
        pending: &PendingMedia,
        chat_name: String,
        sender_name: String,
    ) -> Option<String> {
        let media = self.media.as_ref()?;

        let bytes = match media.fetch.fetch(pending).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(id = %message.id, kind = ?pending.kind, error = %e, "Media fetch failed, keeping message without media");
                return None;
            }
        };

        let request = MediaRequest {
            chat_name,
            sender_name,
            timestamp: message.timestamp,
            message_id: message.id.clone(),
            mime_type: pending.mime_type.clone(),
            file_name: pending.file_name.clone(),
        };

        match media.resolver.store(&request, &bytes).await {
            Ok(path) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                warn!(id = %message.id, error = %e, "Media store failed, keeping message without media");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Metadata events
    // -----------------------------------------------------------------------

    async fn handle_push_name(&self, update: PushNameUpdate) {
        self.rename_contact(&update.user.0, &update.push_name).await;
    }

    async fn handle_group_info(&self, update: GroupInfoUpdate) {
        let Some(name) = update.name.filter(|n| !n.trim().is_empty()) else {
            return;
        };
        if self.names.observe(update.chat.as_str(), NameKind::Group, &name) {
            self.persist_name(NameKind::Group, update.chat.as_str()).await;
        }
        self.update_chat(&update.chat, ChatMetadata::Name(name)).await;
    }

    async fn handle_picture(&self, update: PictureUpdate) {
        self.update_chat(&update.chat, ChatMetadata::Picture(update.picture))
            .await;
    }

    /// Contact name-change: refresh the cache and the one-to-one chat with
    /// that contact, if there is one.
    async fn rename_contact(&self, user: &str, name: &str) {
        if !self.names.observe(user, NameKind::Contact, name) {
            return;
        }
        debug!(user = %user, name = %name, "Contact renamed");
        self.persist_name(NameKind::Contact, user).await;

        let chat = ChatId::new(user);
        if !chat.is_group() {
            self.update_chat(&chat, ChatMetadata::Name(name.to_string())).await;
        }
    }

    async fn update_chat(&self, chat_id: &ChatId, update: ChatMetadata) {
        if let Some(chat) = self.state.apply_chat_metadata(chat_id, update) {
            self.persist_chat(chat_id).await;
            self.fanout.publish(Change::ChatUpdated { chat });
        }
    }

    // -----------------------------------------------------------------------
    // Write-through
    //
    // Writes run on the blocking pool, so two sources touching the same
    // record may finish out of order. Each write therefore reads the record
    // it saves under `mirror_order`: whichever write runs last saves the
    // newest state.
    // -----------------------------------------------------------------------

    async fn persist_message(&self, id: &MessageId) {
        let id = id.clone();
        self.persist("message", move |p, state| match state.get_message(&id) {
            Some(message) => p.save_message(&message),
            None => Ok(()),
        })
        .await;
    }

    async fn persist_chat(&self, chat_id: &ChatId) {
        let chat_id = chat_id.clone();
        self.persist("chat", move |p, state| match state.get_chat(&chat_id) {
            Some(chat) => p.save_chat(&chat),
            None => Ok(()),
        })
        .await;
    }

    async fn persist_name(&self, kind: NameKind, id: &str) {
        let names = self.names.clone();
        let id = id.to_string();
        self.persist("name", move |p, _| match names.cached(&id, kind) {
            Some(name) => p.save_name(kind, &id, &name),
            None => Ok(()),
        })
        .await;
    }

    async fn persist<F>(&self, what: &'static str, write: F)
    where
        F: FnOnce(&dyn Persistence, &StateStore) -> Result<(), EngineError> + Send + 'static,
    {
        let Some(persistence) = self.persistence.clone() else {
            return;
        };
        let state = self.state.clone();
        let order = self.mirror_order.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _order = order.lock();
            write(persistence.as_ref(), state.as_ref())
        });
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(what, error = %e, "Persistence write failed"),
            Err(e) => warn!(what, error = %EngineError::Task(e.to_string()), "Persistence write failed"),
        }
    }
}

fn log_connection(event: &ConnectionEvent) {
    let reason = event.reason.as_deref().unwrap_or("");
    match event.state {
        ConnectionState::Connected => info!("Event source connected"),
        ConnectionState::Reconnecting => info!(reason, "Event source reconnecting"),
        ConnectionState::Disconnected => warn!(reason, "Event source disconnected"),
        ConnectionState::LoggedOut => warn!(reason, "Event source logged out"),
    }
}
