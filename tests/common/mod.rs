//! In-memory backend for driving the controller without a server.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chat_inbox::client::{CandidateSource, MessagingApi};
use chat_inbox::error::ApiError;
use chat_inbox::models::{
    AttachmentId, AttachmentRef, Candidate, Conversation, ConversationId, DownloadedFile, Message,
    MessageId, Participant, Partition, Presence, SentMessage, StagedFile, UserId, UserProfile,
};
use chrono::{Duration, TimeZone, Utc};

#[derive(Default)]
struct Store {
    users: HashMap<String, (String, String)>,
    conversations: Vec<StoredConversation>,
    attachments: HashMap<String, Vec<u8>>,
    next_id: u64,
    fail_uploads: bool,
    calls: Vec<String>,
}

struct StoredConversation {
    id: ConversationId,
    members: (UserId, UserId),
    messages: Vec<Message>,
    /// Users who archived this conversation.
    archived_by: Vec<UserId>,
    /// Per-member count of messages not yet read.
    unread: HashMap<UserId, u32>,
}

impl StoredConversation {
    fn has(&self, user: &UserId) -> bool {
        &self.members.0 == user || &self.members.1 == user
    }

    fn other(&self, user: &UserId) -> &UserId {
        if &self.members.0 == user {
            &self.members.1
        } else {
            &self.members.0
        }
    }
}

/// Acts as the backend for one signed-in user.
pub struct FakeBackend {
    me: UserId,
    store: Mutex<Store>,
}

fn not_found(what: &str) -> ApiError {
    ApiError::Application { status: 404, message: format!("{} not found", what) }
}

impl FakeBackend {
    pub fn new(me: &str) -> Self {
        let mut store = Store::default();
        store.users.insert(me.to_string(), ("Me".into(), "Myself".into()));
        FakeBackend { me: UserId::new(me), store: Mutex::new(store) }
    }

    pub fn me(&self) -> &UserId {
        &self.me
    }

    pub fn add_user(&self, id: &str, first: &str, last: &str) {
        let mut store = self.store.lock().unwrap();
        store.users.insert(id.to_string(), (first.to_string(), last.to_string()));
    }

    /// Seeds a conversation between the signed-in user and `other`.
    /// `history` is `(sender, text)` in chronological order.
    pub fn add_conversation(&self, id: &str, other: &str, history: &[(&str, &str)]) {
        let mut store = self.store.lock().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut messages = Vec::new();
        let mut unread = 0;
        for (i, (sender, text)) in history.iter().enumerate() {
            store.next_id += 1;
            messages.push(Message {
                id: MessageId::new(format!("m{}", store.next_id)),
                sender_id: UserId::new(*sender),
                content: text.to_string(),
                created_at: start + Duration::minutes(i as i64),
                attachments: Vec::new(),
            });
            if *sender != self.me.as_str() {
                unread += 1;
            }
        }
        store.conversations.push(StoredConversation {
            id: ConversationId::new(id),
            members: (self.me.clone(), UserId::new(other)),
            messages,
            archived_by: Vec::new(),
            unread: HashMap::from([(self.me.clone(), unread)]),
        });
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.store.lock().unwrap().fail_uploads = fail;
    }

    pub fn history(&self, conversation: &str) -> Vec<Message> {
        let store = self.store.lock().unwrap();
        store
            .conversations
            .iter()
            .find(|c| c.id.as_str() == conversation)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.store.lock().unwrap().calls.clone()
    }

    fn participant(store: &Store, id: &UserId) -> Participant {
        let (first, last) = store.users.get(id.as_str()).cloned().unwrap_or_default();
        Participant {
            id: id.clone(),
            first_name: first,
            last_name: last,
            company: None,
            avatar: None,
            status: Presence::Online,
        }
    }

    fn record(store: &mut Store, call: impl Into<String>) {
        store.calls.push(call.into());
    }
}

#[async_trait]
impl MessagingApi for FakeBackend {
    async fn list_conversations(&self, partition: Partition) -> Result<Vec<Conversation>, ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("list {}", partition));
        let archived = partition == Partition::Archived;
        let mut list: Vec<Conversation> = store
            .conversations
            .iter()
            .filter(|c| c.has(&self.me) && c.archived_by.contains(&self.me) == archived)
            .map(|c| {
                let last = c.messages.last();
                Conversation {
                    id: c.id.clone(),
                    other_user: Self::participant(&store, c.other(&self.me)),
                    last_message: last.map(|m| m.content.clone()).unwrap_or_default(),
                    last_message_at: last.map(|m| m.created_at),
                    unread_count: c.unread.get(&self.me).copied().unwrap_or_default(),
                }
            })
            .collect();
        list.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(list)
    }

    async fn list_messages(&self, conversation: &ConversationId) -> Result<Vec<Message>, ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("messages {}", conversation));
        store
            .conversations
            .iter()
            .find(|c| &c.id == conversation && c.has(&self.me))
            .map(|c| c.messages.clone())
            .ok_or_else(|| not_found("Conversation"))
    }

    async fn send_message(&self, recipient: &UserId, text: &str) -> Result<SentMessage, ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("send {}", recipient));
        if !store.users.contains_key(recipient.as_str()) {
            return Err(ApiError::Application { status: 400, message: "Recipient not found".into() });
        }
        store.next_id += 1;
        let id = MessageId::new(format!("m{}", store.next_id));
        let created_at = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap() + Duration::minutes(store.next_id as i64);
        let message = Message {
            id: id.clone(),
            sender_id: self.me.clone(),
            content: text.to_string(),
            created_at,
            attachments: Vec::new(),
        };
        let me = self.me.clone();
        let position = store.conversations.iter().position(|c| c.has(&me) && c.has(recipient));
        let conversation = match position {
            Some(index) => &mut store.conversations[index],
            None => {
                let id = ConversationId::new(format!("c{}", store.next_id));
                store.conversations.push(StoredConversation {
                    id,
                    members: (me.clone(), recipient.clone()),
                    messages: Vec::new(),
                    archived_by: Vec::new(),
                    unread: HashMap::new(),
                });
                let last = store.conversations.len() - 1;
                &mut store.conversations[last]
            }
        };
        conversation.messages.push(message);
        *conversation.unread.entry(recipient.clone()).or_default() += 1;
        Ok(SentMessage { id, message: Some("Message sent".into()) })
    }

    async fn delete_message(&self, message: &MessageId) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("delete {}", message));
        for conversation in &mut store.conversations {
            if let Some(index) = conversation.messages.iter().position(|m| &m.id == message) {
                if conversation.messages[index].sender_id != self.me {
                    return Err(ApiError::Application {
                        status: 403,
                        message: "You can only delete your own messages".into(),
                    });
                }
                conversation.messages.remove(index);
                return Ok(());
            }
        }
        Err(not_found("Message"))
    }

    async fn mark_read(&self, conversation: &ConversationId) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("mark-read {}", conversation));
        let me = self.me.clone();
        let stored = store
            .conversations
            .iter_mut()
            .find(|c| &c.id == conversation)
            .ok_or_else(|| not_found("Conversation"))?;
        stored.unread.insert(me, 0);
        Ok(())
    }

    async fn archive_conversation(&self, conversation: &ConversationId) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("archive {}", conversation));
        let me = self.me.clone();
        let stored = store
            .conversations
            .iter_mut()
            .find(|c| &c.id == conversation)
            .ok_or_else(|| not_found("Conversation"))?;
        if !stored.archived_by.contains(&me) {
            stored.archived_by.push(me);
        }
        Ok(())
    }

    async fn unarchive_conversation(&self, conversation: &ConversationId) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("unarchive {}", conversation));
        let me = self.me.clone();
        let stored = store
            .conversations
            .iter_mut()
            .find(|c| &c.id == conversation)
            .ok_or_else(|| not_found("Conversation"))?;
        stored.archived_by.retain(|user| user != &me);
        Ok(())
    }

    async fn upload_attachment(&self, message: &MessageId, file: &StagedFile) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("upload {}", message));
        if store.fail_uploads {
            return Err(ApiError::Network("connection reset".into()));
        }
        store.next_id += 1;
        let id = format!("a{}", store.next_id);
        store.attachments.insert(id.clone(), file.bytes.clone());
        let target = store
            .conversations
            .iter_mut()
            .flat_map(|c| c.messages.iter_mut())
            .find(|m| &m.id == message)
            .ok_or_else(|| not_found("Message"))?;
        target.attachments.push(AttachmentRef {
            id: AttachmentId::new(id),
            original_filename: file.filename.clone(),
        });
        Ok(())
    }

    async fn delete_attachment(&self, attachment: &AttachmentId) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("delete-attachment {}", attachment));
        let me = self.me.clone();
        let owner = store
            .conversations
            .iter_mut()
            .flat_map(|c| c.messages.iter_mut())
            .find(|m| m.attachments.iter().any(|a| &a.id == attachment))
            .ok_or_else(|| not_found("Attachment"))?;
        if owner.sender_id != me {
            return Err(ApiError::Application { status: 403, message: "Not your attachment".into() });
        }
        owner.attachments.retain(|a| &a.id != attachment);
        store.attachments.remove(attachment.as_str());
        Ok(())
    }

    async fn download_attachment(&self, attachment: &AttachmentId) -> Result<DownloadedFile, ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("download {}", attachment));
        let bytes = store
            .attachments
            .get(attachment.as_str())
            .cloned()
            .ok_or_else(|| not_found("Attachment"))?;
        Ok(DownloadedFile { filename: None, content_type: None, bytes })
    }

    async fn list_candidates(&self, source: CandidateSource) -> Result<Vec<Candidate>, ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("candidates {:?}", source));
        let mut candidates: Vec<Candidate> = store
            .users
            .iter()
            .filter(|(id, _)| id.as_str() != self.me.as_str())
            .map(|(id, (first, last))| Candidate {
                id: UserId::new(id.as_str()),
                first_name: first.clone(),
                last_name: last.clone(),
                email: None,
            })
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(candidates)
    }

    async fn view_profile(&self, user: &UserId) -> Result<UserProfile, ApiError> {
        let mut store = self.store.lock().unwrap();
        Self::record(&mut store, format!("profile {}", user));
        let (first, last) = store.users.get(user.as_str()).cloned().ok_or_else(|| not_found("User"))?;
        Ok(UserProfile {
            first_name: Some(first),
            last_name: Some(last),
            ..UserProfile::default()
        })
    }
}
