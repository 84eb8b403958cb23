use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join;
use log::{debug, info, warn};

use crate::client::{CandidateSource, MessagingApi};
use crate::error::{ApiError, InboxError};
use crate::models::{
    AttachmentId, AttachmentRef, Candidate, Conversation, ConversationId, Message, MessageId,
    Partition, SentMessage, StagedFile, UserId, UserProfile,
};
use crate::notice::{Notice, NoticeSender};
use crate::search::filter_conversations;
use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_view_profile: bool,
    pub can_start_conversation: bool,
    pub candidate_source: CandidateSource,
}

impl Capabilities {
    pub fn recruiter() -> Self {
        Capabilities {
            can_view_profile: true,
            can_start_conversation: true,
            candidate_source: CandidateSource::Interviews,
        }
    }

    pub fn candidate() -> Self {
        Capabilities {
            can_view_profile: false,
            can_start_conversation: false,
            candidate_source: CandidateSource::Messaging,
        }
    }
}

/// A thread fetch result is applied only while its ticket is current;
/// selecting anything, even the same conversation, invalidates older tickets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadTicket {
    pub conversation: ConversationId,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Archive(ConversationId),
    Unarchive(ConversationId),
}

impl Confirmation {
    pub fn conversation(&self) -> &ConversationId {
        match self {
            Confirmation::Archive(id) | Confirmation::Unarchive(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    Thread(ThreadTicket),
    NewConversation,
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub recipient: UserId,
    pub text: String,
    pub attachment: Option<StagedFile>,
    pub target: SendTarget,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub request: SendRequest,
    pub sent: Result<SentMessage, ApiError>,
    pub upload: Option<Result<(), ApiError>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewConversationDraft {
    pub recipient: Option<UserId>,
    pub text: String,
}

#[derive(Debug)]
pub struct InboxState {
    me: UserId,
    capabilities: Capabilities,
    notices: NoticeSender,
    active: Vec<Conversation>,
    archived: Option<Vec<Conversation>>,
    partition: Partition,
    selected: Option<Conversation>,
    messages: Vec<Message>,
    compose: String,
    staged_file: Option<StagedFile>,
    pending_upload: Option<MessageId>,
    search: String,
    sending: bool,
    confirmation: Option<Confirmation>,
    candidates: Vec<Candidate>,
    draft: Option<NewConversationDraft>,
    profile: Option<UserProfile>,
    generation: u64,
}

impl InboxState {
    pub fn new(me: UserId, capabilities: Capabilities, notices: NoticeSender) -> Self {
        InboxState {
            me,
            capabilities,
            notices,
            active: Vec::new(),
            archived: None,
            partition: Partition::Active,
            selected: None,
            messages: Vec::new(),
            compose: String::new(),
            staged_file: None,
            pending_upload: None,
            search: String::new(),
            sending: false,
            confirmation: None,
            candidates: Vec::new(),
            draft: None,
            profile: None,
            generation: 0,
        }
    }

    pub fn me(&self) -> &UserId {
        &self.me
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn conversations(&self, partition: Partition) -> Option<&[Conversation]> {
        match partition {
            Partition::Active => Some(&self.active),
            Partition::Archived => self.archived.as_deref(),
        }
    }

    pub fn visible_conversations(&self) -> Vec<&Conversation> {
        let list = self.conversations(self.partition).unwrap_or_default();
        filter_conversations(list, &self.search)
    }

    pub fn selected(&self) -> Option<&Conversation> {
        self.selected.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn staged_file(&self) -> Option<&StagedFile> {
        self.staged_file.as_ref()
    }

    pub fn stage_file(&mut self, file: StagedFile) {
        debug!("Staged {:?}", file);
        self.staged_file = Some(file);
    }

    pub fn unstage_file(&mut self) -> Option<StagedFile> {
        self.pending_upload = None;
        self.staged_file.take()
    }

    pub fn pending_upload(&self) -> Option<&MessageId> {
        self.pending_upload.as_ref()
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn can_send(&self) -> bool {
        !self.sending && self.selected.is_some() && !self.compose.trim().is_empty()
    }

    pub fn can_modify(&self, message: &Message) -> bool {
        message.is_from(&self.me)
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn draft(&self) -> Option<&NewConversationDraft> {
        self.draft.as_ref()
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn notify(&self, notice: Notice) {
        self.notices.push(notice);
    }

    fn fail(&self, context: &str, error: &dyn std::fmt::Display) {
        warn!("{}: {}", context, error);
        self.notify(Notice::error(format!("{}: {}", context, error)));
    }

    pub fn apply_conversations(&mut self, partition: Partition, result: Result<Vec<Conversation>, ApiError>) {
        match result {
            Ok(list) => {
                debug!("Loaded {} {} conversations", list.len(), partition);
                if let Some(selected) = &self.selected {
                    if let Some(fresh) = list.iter().find(|c| c.id == selected.id) {
                        self.selected = Some(fresh.clone());
                    }
                }
                match partition {
                    Partition::Active => self.active = list,
                    Partition::Archived => self.archived = Some(list),
                }
            }
            Err(e) => self.fail(&format!("Failed to load {} conversations", partition), &e),
        }
    }

    pub fn toggle_partition(&mut self) -> bool {
        self.partition = self.partition.toggled();
        self.partition == Partition::Archived && self.archived.is_none()
    }

    fn find_conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        let archived = self.archived.as_deref().unwrap_or_default();
        let (first, second) = match self.partition {
            Partition::Active => (self.active.as_slice(), archived),
            Partition::Archived => (archived, self.active.as_slice()),
        };
        first.iter().chain(second).find(|c| &c.id == id)
    }

    pub fn select(&mut self, id: &ConversationId) -> Result<ThreadTicket, InboxError> {
        let conversation = self
            .find_conversation(id)
            .cloned()
            .ok_or_else(|| InboxError::InvalidInput(format!("Unknown conversation {}", id)))?;
        self.generation += 1;
        self.selected = Some(conversation);
        self.messages.clear();
        self.profile = None;
        Ok(ThreadTicket { conversation: id.clone(), generation: self.generation })
    }

    pub fn clear_selection(&mut self) {
        self.generation += 1;
        self.selected = None;
        self.messages.clear();
        self.profile = None;
    }

    pub fn thread_ticket(&self) -> Option<ThreadTicket> {
        self.selected.as_ref().map(|c| ThreadTicket {
            conversation: c.id.clone(),
            generation: self.generation,
        })
    }

    pub fn is_current(&self, ticket: &ThreadTicket) -> bool {
        ticket.generation == self.generation
            && self.selected.as_ref().is_some_and(|c| c.id == ticket.conversation)
    }

    pub fn unread_on_open(&self) -> bool {
        self.selected.as_ref().is_some_and(|c| c.unread_count > 0)
    }

    pub fn apply_messages(&mut self, ticket: &ThreadTicket, result: Result<Vec<Message>, ApiError>) -> bool {
        if !self.is_current(ticket) {
            debug!("Discarding stale messages for conversation {}", ticket.conversation);
            return false;
        }
        match result {
            Ok(messages) => {
                self.messages = messages;
                true
            }
            Err(e) => {
                self.fail("Failed to load messages", &e);
                false
            }
        }
    }

    pub fn begin_send(&mut self) -> Result<SendRequest, InboxError> {
        if self.sending {
            return Err(InboxError::InvalidInput("A message is already being sent".to_string()));
        }
        let ticket = self
            .thread_ticket()
            .ok_or_else(|| InboxError::InvalidInput("No conversation selected".to_string()))?;
        let text = self.compose.trim();
        if text.is_empty() {
            return Err(InboxError::InvalidInput("Message is empty".to_string()));
        }
        let recipient = self
            .selected
            .as_ref()
            .map(|c| c.other_user.id.clone())
            .ok_or_else(|| InboxError::InvalidInput("No conversation selected".to_string()))?;
        let request = SendRequest {
            recipient,
            text: text.to_string(),
            attachment: self.staged_file.clone(),
            target: SendTarget::Thread(ticket),
        };
        self.sending = true;
        Ok(request)
    }

    // Compose and staged file are cleared only if they still hold what was sent.
    pub fn finish_send(&mut self, outcome: &SendOutcome) -> Result<Option<ThreadTicket>, InboxError> {
        self.sending = false;
        let request = &outcome.request;
        let sent = match &outcome.sent {
            Ok(sent) => sent,
            Err(e) => {
                self.fail("Failed to send message", e);
                return Err(e.clone().into());
            }
        };
        info!("Message {} sent to {}", sent.id, request.recipient);

        match &request.target {
            SendTarget::Thread(ticket) => {
                if self.is_current(ticket) && self.compose.trim() == request.text {
                    self.compose.clear();
                }
            }
            SendTarget::NewConversation => {
                if self.draft.as_ref().is_some_and(|d| d.recipient.as_ref() == Some(&request.recipient)) {
                    self.draft = None;
                }
                self.notify(Notice::success("Message sent successfully"));
            }
        }

        let same_file = request.attachment.is_some() && self.staged_file == request.attachment;
        match &outcome.upload {
            Some(Ok(())) => {
                if same_file {
                    self.staged_file = None;
                    self.pending_upload = None;
                }
                self.notify(Notice::success("Attachment uploaded successfully"));
            }
            Some(Err(e)) => {
                if same_file {
                    self.pending_upload = Some(sent.id.clone());
                }
                self.fail("Message sent, but the attachment upload failed", e);
            }
            None => {}
        }

        Ok(match &request.target {
            SendTarget::Thread(ticket) => Some(ticket.clone()),
            SendTarget::NewConversation => None,
        })
    }

    pub fn begin_retry_upload(&mut self) -> Result<(MessageId, StagedFile), InboxError> {
        if self.sending {
            return Err(InboxError::InvalidInput("A message is already being sent".to_string()));
        }
        let (Some(message), Some(file)) = (&self.pending_upload, &self.staged_file) else {
            return Err(InboxError::InvalidInput("No failed upload to retry".to_string()));
        };
        let request = (message.clone(), file.clone());
        self.sending = true;
        Ok(request)
    }

    pub fn finish_retry_upload(&mut self, result: Result<(), ApiError>) -> Result<Option<ThreadTicket>, InboxError> {
        self.sending = false;
        match result {
            Ok(()) => {
                self.staged_file = None;
                self.pending_upload = None;
                self.notify(Notice::success("Attachment uploaded successfully"));
                Ok(self.thread_ticket())
            }
            Err(e) => {
                self.fail("Failed to upload attachment", &e);
                Err(e.into())
            }
        }
    }

    fn own_message(&self, id: &MessageId) -> Result<&Message, InboxError> {
        let message = self
            .messages
            .iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| InboxError::InvalidInput(format!("Message {} is not in the open conversation", id)))?;
        if !self.can_modify(message) {
            return Err(InboxError::InvalidInput("You can only change your own messages".to_string()));
        }
        Ok(message)
    }

    pub fn check_delete_message(&self, id: &MessageId) -> Result<(), InboxError> {
        self.own_message(id).map(|_| ())
    }

    pub fn finish_delete_message(&mut self, result: Result<(), ApiError>) -> Result<Option<ThreadTicket>, InboxError> {
        self.finish_thread_mutation(result, "Message deleted successfully", "Failed to delete message")
    }

    pub fn attachment(&self, id: &AttachmentId) -> Option<(&Message, &AttachmentRef)> {
        self.messages
            .iter()
            .find_map(|m| m.attachments.iter().find(|a| &a.id == id).map(|a| (m, a)))
    }

    pub fn check_delete_attachment(&self, id: &AttachmentId) -> Result<(), InboxError> {
        let (message, _) = self
            .attachment(id)
            .ok_or_else(|| InboxError::InvalidInput(format!("Attachment {} is not in the open conversation", id)))?;
        self.own_message(&message.id).map(|_| ())
    }

    pub fn finish_delete_attachment(&mut self, result: Result<(), ApiError>) -> Result<Option<ThreadTicket>, InboxError> {
        self.finish_thread_mutation(result, "Attachment deleted successfully", "Failed to delete attachment")
    }

    fn finish_thread_mutation(
        &mut self,
        result: Result<(), ApiError>,
        success: &str,
        failure: &str,
    ) -> Result<Option<ThreadTicket>, InboxError> {
        match result {
            Ok(()) => {
                self.notify(Notice::success(success));
                Ok(self.thread_ticket())
            }
            Err(e) => {
                self.fail(failure, &e);
                Err(e.into())
            }
        }
    }

    pub fn listed_filename(&self, id: &AttachmentId) -> Option<String> {
        self.attachment(id)
            .map(|(_, attachment)| attachment.original_filename.trim())
            .filter(|name| !name.is_empty())
            .map(String::from)
    }

    pub fn finish_download<E: std::fmt::Display>(&self, result: Result<PathBuf, E>) -> Result<PathBuf, E> {
        match result {
            Ok(path) => {
                self.notify(Notice::success(format!("Saved {}", path.display())));
                Ok(path)
            }
            Err(e) => {
                self.fail("Failed to download attachment", &e);
                Err(e)
            }
        }
    }

    pub fn request_archive(&mut self, id: &ConversationId) {
        self.confirmation = Some(Confirmation::Archive(id.clone()));
    }

    pub fn request_unarchive(&mut self, id: &ConversationId) {
        self.confirmation = Some(Confirmation::Unarchive(id.clone()));
    }

    pub fn cancel_confirmation(&mut self) {
        self.confirmation = None;
    }

    pub fn begin_confirmation(&self) -> Result<Confirmation, InboxError> {
        self.confirmation
            .clone()
            .ok_or_else(|| InboxError::InvalidInput("Nothing to confirm".to_string()))
    }

    pub fn finish_confirmation(&mut self, confirmation: &Confirmation, result: Result<(), ApiError>) -> Result<(), InboxError> {
        let (done, failed) = match confirmation {
            Confirmation::Archive(_) => ("Conversation archived successfully", "Failed to archive conversation"),
            Confirmation::Unarchive(_) => ("Conversation unarchived successfully", "Failed to unarchive conversation"),
        };
        match result {
            Ok(()) => {
                if self.confirmation.as_ref() == Some(confirmation) {
                    self.confirmation = None;
                }
                info!("{}: {}", done, confirmation.conversation());
                self.notify(Notice::success(done));
                Ok(())
            }
            Err(e) => {
                self.fail(failed, &e);
                Err(e.into())
            }
        }
    }

    pub fn open_new_conversation(&mut self) -> Result<CandidateSource, InboxError> {
        if !self.capabilities.can_start_conversation {
            return Err(InboxError::InvalidInput("Starting conversations is not available".to_string()));
        }
        self.draft = Some(NewConversationDraft::default());
        Ok(self.capabilities.candidate_source)
    }

    pub fn close_new_conversation(&mut self) {
        self.draft = None;
    }

    pub fn apply_candidates(&mut self, result: Result<Vec<Candidate>, ApiError>) {
        match result {
            Ok(candidates) => self.candidates = candidates,
            Err(e) => self.fail("Failed to load candidates", &e),
        }
    }

    pub fn set_draft_recipient(&mut self, recipient: UserId) {
        self.draft.get_or_insert_with(Default::default).recipient = Some(recipient);
    }

    pub fn set_draft_text(&mut self, text: impl Into<String>) {
        self.draft.get_or_insert_with(Default::default).text = text.into();
    }

    pub fn begin_new_conversation(&mut self) -> Result<SendRequest, InboxError> {
        if !self.capabilities.can_start_conversation {
            return Err(InboxError::InvalidInput("Starting conversations is not available".to_string()));
        }
        if self.sending {
            return Err(InboxError::InvalidInput("A message is already being sent".to_string()));
        }
        let draft = self
            .draft
            .as_ref()
            .ok_or_else(|| InboxError::InvalidInput("No new conversation open".to_string()))?;
        let recipient = draft
            .recipient
            .clone()
            .ok_or_else(|| InboxError::InvalidInput("Pick a recipient first".to_string()))?;
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(InboxError::InvalidInput("Message is empty".to_string()));
        }
        let request = SendRequest {
            recipient,
            text: text.to_string(),
            attachment: None,
            target: SendTarget::NewConversation,
        };
        self.sending = true;
        Ok(request)
    }

    pub fn begin_view_profile(&self) -> Result<UserId, InboxError> {
        if !self.capabilities.can_view_profile {
            return Err(InboxError::InvalidInput("Profiles are not available".to_string()));
        }
        self.selected
            .as_ref()
            .map(|c| c.other_user.id.clone())
            .ok_or_else(|| InboxError::InvalidInput("No conversation selected".to_string()))
    }

    pub fn apply_profile(&mut self, result: Result<UserProfile, ApiError>) {
        match result {
            Ok(profile) => self.profile = Some(profile),
            Err(e) => self.fail("Failed to load user profile", &e),
        }
    }

    pub fn close_profile(&mut self) {
        self.profile = None;
    }
}

pub async fn deliver<A: MessagingApi + ?Sized>(api: &A, request: SendRequest) -> SendOutcome {
    let sent = api.send_message(&request.recipient, &request.text).await;
    let upload = match (&sent, &request.attachment) {
        (Ok(sent), Some(file)) => Some(api.upload_attachment(&sent.id, file).await),
        _ => None,
    };
    SendOutcome { request, sent, upload }
}

pub async fn download_to<A: MessagingApi + ?Sized>(
    api: &A,
    dir: &Path,
    id: &AttachmentId,
    listed: Option<String>,
) -> Result<PathBuf, InboxError> {
    let file = api.download_attachment(id).await?;
    let name = listed
        .or(file.filename)
        .unwrap_or_else(|| format!("attachment-{}", id));
    Ok(storage::save_download(dir, &name, &file.bytes).await?)
}

pub async fn run_confirmation<A: MessagingApi + ?Sized>(api: &A, confirmation: &Confirmation) -> Result<(), ApiError> {
    match confirmation {
        Confirmation::Archive(id) => api.archive_conversation(id).await,
        Confirmation::Unarchive(id) => api.unarchive_conversation(id).await,
    }
}

pub struct InboxController<A: ?Sized> {
    api: Arc<A>,
    state: InboxState,
    download_dir: PathBuf,
}

impl<A: MessagingApi + ?Sized> InboxController<A> {
    pub fn new(api: Arc<A>, state: InboxState, download_dir: impl Into<PathBuf>) -> Self {
        InboxController { api, state, download_dir: download_dir.into() }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn state(&self) -> &InboxState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut InboxState {
        &mut self.state
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub async fn refresh_conversations(&mut self) {
        let result = self.api.list_conversations(Partition::Active).await;
        self.state.apply_conversations(Partition::Active, result);
    }

    pub async fn refresh_archived(&mut self) {
        let result = self.api.list_conversations(Partition::Archived).await;
        self.state.apply_conversations(Partition::Archived, result);
    }

    pub async fn refresh_partitions(&mut self) {
        let (active, archived) = join(
            self.api.list_conversations(Partition::Active),
            self.api.list_conversations(Partition::Archived),
        )
        .await;
        self.state.apply_conversations(Partition::Active, active);
        self.state.apply_conversations(Partition::Archived, archived);
    }

    pub async fn refresh_thread(&mut self, ticket: &ThreadTicket) -> bool {
        let result = self.api.list_messages(&ticket.conversation).await;
        self.state.apply_messages(ticket, result)
    }

    pub async fn toggle_partition(&mut self) {
        if self.state.toggle_partition() {
            self.refresh_archived().await;
        }
    }

    pub async fn select_conversation(&mut self, id: &ConversationId) -> Result<(), InboxError> {
        let ticket = self.state.select(id)?;
        let unread = self.state.unread_on_open();
        self.refresh_thread(&ticket).await;
        if unread {
            match self.api.mark_read(&ticket.conversation).await {
                Ok(()) => self.refresh_conversations().await,
                Err(e) => warn!("Failed to mark conversation {} read: {}", ticket.conversation, e),
            }
        }
        Ok(())
    }

    pub async fn stage_file(&mut self, path: impl AsRef<Path>) -> Result<(), InboxError> {
        match storage::read_staged_file(path).await {
            Ok(file) => {
                self.state.stage_file(file);
                Ok(())
            }
            Err(e) => {
                self.state.fail("Failed to read file", &e);
                Err(e.into())
            }
        }
    }

    pub async fn send(&mut self) -> Result<(), InboxError> {
        let request = self.state.begin_send()?;
        let outcome = deliver(self.api.as_ref(), request).await;
        let refresh = self.state.finish_send(&outcome)?;
        if let Some(ticket) = refresh {
            self.refresh_thread(&ticket).await;
        }
        self.refresh_conversations().await;
        Ok(())
    }

    pub async fn retry_upload(&mut self) -> Result<(), InboxError> {
        let (message, file) = self.state.begin_retry_upload()?;
        let result = self.api.upload_attachment(&message, &file).await;
        if let Some(ticket) = self.state.finish_retry_upload(result)? {
            self.refresh_thread(&ticket).await;
        }
        Ok(())
    }

    pub async fn delete_message(&mut self, id: &MessageId) -> Result<(), InboxError> {
        self.state.check_delete_message(id)?;
        let result = self.api.delete_message(id).await;
        if let Some(ticket) = self.state.finish_delete_message(result)? {
            self.refresh_thread(&ticket).await;
        }
        self.refresh_conversations().await;
        Ok(())
    }

    pub async fn delete_attachment(&mut self, id: &AttachmentId) -> Result<(), InboxError> {
        self.state.check_delete_attachment(id)?;
        let result = self.api.delete_attachment(id).await;
        if let Some(ticket) = self.state.finish_delete_attachment(result)? {
            self.refresh_thread(&ticket).await;
        }
        Ok(())
    }

    pub async fn download_attachment(&mut self, id: &AttachmentId) -> Result<PathBuf, InboxError> {
        let listed = self.state.listed_filename(id);
        let result = download_to(self.api.as_ref(), &self.download_dir, id, listed).await;
        self.state.finish_download(result)
    }

    pub fn request_archive(&mut self, id: &ConversationId) {
        self.state.request_archive(id);
    }

    pub fn request_unarchive(&mut self, id: &ConversationId) {
        self.state.request_unarchive(id);
    }

    pub async fn confirm(&mut self) -> Result<(), InboxError> {
        let confirmation = self.state.begin_confirmation()?;
        let result = run_confirmation(self.api.as_ref(), &confirmation).await;
        self.state.finish_confirmation(&confirmation, result)?;
        self.refresh_partitions().await;
        Ok(())
    }

    pub async fn open_new_conversation(&mut self) -> Result<(), InboxError> {
        let source = self.state.open_new_conversation()?;
        let result = self.api.list_candidates(source).await;
        self.state.apply_candidates(result);
        Ok(())
    }

    pub async fn start_conversation(&mut self, recipient: UserId, text: &str) -> Result<(), InboxError> {
        self.state.set_draft_recipient(recipient);
        self.state.set_draft_text(text);
        let request = self.state.begin_new_conversation()?;
        let outcome = deliver(self.api.as_ref(), request).await;
        self.state.finish_send(&outcome)?;
        self.refresh_conversations().await;
        Ok(())
    }

    pub async fn view_profile(&mut self) -> Result<(), InboxError> {
        let user = self.state.begin_view_profile()?;
        let result = self.api.view_profile(&user).await;
        self.state.apply_profile(result);
        Ok(())
    }
}
