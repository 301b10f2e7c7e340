//! Chat container: conversations and messages.
//!
//! Owns the conversation slice plus a secondary `messages` collection.
//! Conversation uniqueness per participant pair is enforced only by
//! lookup-before-create; the read-then-create is not atomic against the
//! gateway, so near-simultaneous first messages from both participants can
//! still create duplicate conversations for the same pair.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::json;

use crate::error::{Error, Result};
use crate::gateway::{
    collections::{CONVERSATIONS, MESSAGES},
    from_document, to_fields, Direction, DocumentStore, Gateway, Query,
};
use crate::types::{participant_key, Conversation, Message};

use super::slice::{Slice, SliceState};

/// Intents the dispatch channel routes to this container
#[derive(Debug, Clone)]
pub enum ChatIntent {
    ListConversations {
        user_id: String,
    },
    GetOrCreateConversation {
        user_id: String,
        other_user_id: String,
    },
    ListMessages {
        conversation_id: String,
    },
    SendMessage {
        conversation_id: String,
        sender_id: String,
        receiver_id: String,
        content: String,
    },
    MarkRead {
        conversation_id: String,
        user_id: String,
    },
}

pub struct ChatContainer {
    gateway: Arc<dyn Gateway>,
    slice: Slice<Conversation>,
    messages: Mutex<Vec<Message>>,
}

impl ChatContainer {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            slice: Slice::new(),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the conversation slice
    pub fn state(&self) -> SliceState<Conversation> {
        self.slice.snapshot()
    }

    /// Snapshot of the loaded messages
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_messages(&self, apply: impl FnOnce(&mut Vec<Message>)) {
        apply(&mut self.messages.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub async fn handle(&self, intent: ChatIntent) {
        let result = match intent {
            ChatIntent::ListConversations { user_id } => {
                self.list_conversations(&user_id).await.map(|_| ())
            }
            ChatIntent::GetOrCreateConversation {
                user_id,
                other_user_id,
            } => self
                .get_or_create_conversation(&user_id, &other_user_id)
                .await
                .map(|_| ()),
            ChatIntent::ListMessages { conversation_id } => {
                self.list_messages(&conversation_id).await.map(|_| ())
            }
            ChatIntent::SendMessage {
                conversation_id,
                sender_id,
                receiver_id,
                content,
            } => self
                .send_message(&conversation_id, &sender_id, &receiver_id, &content)
                .await
                .map(|_| ()),
            ChatIntent::MarkRead {
                conversation_id,
                user_id,
            } => self.mark_read(&conversation_id, &user_id).await.map(|_| ()),
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "chat intent rejected");
        }
    }

    /// All conversations the user participates in, most recent first
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.slice.begin();
        let result = self
            .fetch_conversations(
                Query::new()
                    .array_contains("participants", user_id)
                    .order_by("last_message_at", Direction::Desc),
            )
            .await;
        self.slice
            .settle(result, |state, items| state.items = items.clone())
    }

    async fn fetch_conversations(&self, query: Query) -> Result<Vec<Conversation>> {
        let docs = self.gateway.query(CONVERSATIONS, &query).await?;
        docs.iter().map(from_document).collect()
    }

    /// Find the conversation for the participant pair, creating it with
    /// empty last-message fields when absent. Sequentially idempotent;
    /// not atomic under concurrent calls.
    pub async fn get_or_create_conversation(
        &self,
        user_id: &str,
        other_user_id: &str,
    ) -> Result<Conversation> {
        self.slice.begin();
        let result = self.do_get_or_create(user_id, other_user_id).await;
        self.slice.settle(result, |state, conversation| {
            if !state.items.iter().any(|c| c.id == conversation.id) {
                state.items.push(conversation.clone());
            }
            state.current = Some(conversation.clone());
        })
    }

    async fn do_get_or_create(&self, user_id: &str, other_user_id: &str) -> Result<Conversation> {
        let mine = self
            .fetch_conversations(Query::new().array_contains("participants", user_id))
            .await?;
        if let Some(existing) = mine
            .into_iter()
            .find(|c| c.participants.iter().any(|p| p == other_user_id))
        {
            return Ok(existing);
        }

        let mut conversation = Conversation {
            id: String::new(),
            participants: [user_id.to_string(), other_user_id.to_string()],
            participant_key: participant_key(user_id, other_user_id),
            last_message: String::new(),
            last_message_at: None,
            unread_count: 0,
        };
        conversation.id = self
            .gateway
            .insert(CONVERSATIONS, to_fields(&conversation)?)
            .await?;

        tracing::info!(conversation_id = %conversation.id, "conversation created");
        Ok(conversation)
    }

    /// All messages in a conversation, oldest first
    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.slice.begin();
        let result = self.fetch_messages(conversation_id).await;
        let result = self.slice.settle(result, |_, _| {});
        if let Ok(messages) = &result {
            let messages = messages.clone();
            self.with_messages(|stored| *stored = messages);
        }
        result
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let docs = self
            .gateway
            .query(
                MESSAGES,
                &Query::new()
                    .eq("conversation_id", conversation_id)
                    .order_by("sent_at", Direction::Asc),
            )
            .await?;
        docs.iter().map(from_document).collect()
    }

    /// Write the message, then read-modify-write the conversation header:
    /// last-message preview, timestamp, and an incremented unread counter.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message> {
        self.slice.begin();
        let result = self
            .do_send_message(conversation_id, sender_id, receiver_id, content)
            .await;

        let conversation_id = conversation_id.to_string();
        let result = self.slice.settle(result, |state, (_, conversation)| {
            if let Some(existing) = state.items.iter_mut().find(|c| c.id == conversation_id) {
                *existing = conversation.clone();
            }
            if state
                .current
                .as_ref()
                .is_some_and(|c| c.id == conversation_id)
            {
                state.current = Some(conversation.clone());
            }
        });

        result.map(|(message, _)| {
            self.with_messages(|stored| stored.push(message.clone()));
            message
        })
    }

    async fn do_send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<(Message, Conversation)> {
        let mut message = Message {
            id: String::new(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            sent_at: Utc::now(),
            read: false,
        };
        message.id = self.gateway.insert(MESSAGES, to_fields(&message)?).await?;

        // Read-modify-write so consecutive sends accumulate the counter
        let mut conversation = self.read_conversation(conversation_id).await?;
        conversation.last_message = content.to_string();
        conversation.last_message_at = Some(message.sent_at);
        conversation.unread_count += 1;

        self.gateway
            .update(
                CONVERSATIONS,
                conversation_id,
                json!({
                    "last_message": conversation.last_message,
                    "last_message_at": conversation.last_message_at,
                    "unread_count": conversation.unread_count,
                }),
            )
            .await?;

        Ok((message, conversation))
    }

    async fn read_conversation(&self, id: &str) -> Result<Conversation> {
        match self.gateway.get(CONVERSATIONS, id).await? {
            Some(doc) => from_document(&doc),
            None => Err(Error::NotFound(format!("conversation not found: {}", id))),
        }
    }

    /// Flip every unread message addressed to the user in the conversation
    /// (one write per message, no batch atomicity), then zero the
    /// conversation's unread counter. Fulfills with the flipped messages.
    pub async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<Vec<Message>> {
        self.slice.begin();
        let result = self.do_mark_read(conversation_id, user_id).await;

        let conversation_id = conversation_id.to_string();
        let result = self.slice.settle(result, |state, _| {
            if let Some(existing) = state.items.iter_mut().find(|c| c.id == conversation_id) {
                existing.unread_count = 0;
            }
            if let Some(current) = state.current.as_mut() {
                if current.id == conversation_id {
                    current.unread_count = 0;
                }
            }
        });

        if let Ok(flipped) = &result {
            let flipped = flipped.clone();
            self.with_messages(|stored| {
                for message in stored.iter_mut() {
                    if flipped.iter().any(|f| f.id == message.id) {
                        message.read = true;
                    }
                }
            });
        }
        result
    }

    async fn do_mark_read(&self, conversation_id: &str, user_id: &str) -> Result<Vec<Message>> {
        let docs = self
            .gateway
            .query(
                MESSAGES,
                &Query::new()
                    .eq("conversation_id", conversation_id)
                    .eq("receiver_id", user_id)
                    .eq("read", false),
            )
            .await?;
        let mut unread: Vec<Message> = docs
            .iter()
            .map(from_document)
            .collect::<Result<Vec<Message>>>()?;

        for message in unread.iter_mut() {
            self.gateway
                .update(MESSAGES, &message.id, json!({ "read": true }))
                .await?;
            message.read = true;
        }

        self.gateway
            .update(CONVERSATIONS, conversation_id, json!({ "unread_count": 0 }))
            .await?;

        Ok(unread)
    }
}
