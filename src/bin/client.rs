use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use iced::widget::{button, column, container, row, scrollable, text, text_input, Column};
use iced::{alignment, executor, theme, Alignment, Application, Color, Command, Element, Length, Settings, Theme};

use chat_inbox::client::{HttpMessagingClient, MessagingApi};
use chat_inbox::config::Config;
use chat_inbox::controller::{
    deliver, download_to, run_confirmation, Confirmation, InboxState, SendOutcome, SendRequest,
    ThreadTicket,
};
use chat_inbox::error::{ApiError, InboxError};
use chat_inbox::format::{format_timestamp, relative_time};
use chat_inbox::models::{
    AttachmentId, Candidate, Conversation, ConversationId, Message, MessageId, Partition, Presence,
    StagedFile, UserId, UserProfile,
};
use chat_inbox::notice::{notice_channel, Notice, NoticeKind, NoticeReceiver};
use chat_inbox::storage::read_staged_file;

struct Flags {
    api: Arc<dyn MessagingApi>,
    state: InboxState,
    notices: NoticeReceiver,
    download_dir: PathBuf,
}

struct InboxApp {
    api: Arc<dyn MessagingApi>,
    state: InboxState,
    notices: NoticeReceiver,
    download_dir: PathBuf,
    file_path: String,
    status: Option<Notice>,
}

#[derive(Debug, Clone)]
enum AppMessage {
    ConversationsLoaded(Partition, Result<Vec<Conversation>, ApiError>),
    SearchChanged(String),
    TogglePartition,
    Select(ConversationId),
    MessagesLoaded(ThreadTicket, Result<Vec<Message>, ApiError>),
    MarkedRead(ConversationId, Result<(), ApiError>),
    ComposeChanged(String),
    FilePathChanged(String),
    StageFile,
    FileStaged(Result<StagedFile, String>),
    Unstage,
    Send,
    SendFinished(SendOutcome),
    RetryUpload,
    RetryFinished(Result<(), ApiError>),
    DeleteMessage(MessageId),
    MessageDeleted(Result<(), ApiError>),
    DeleteAttachment(AttachmentId),
    AttachmentDeleted(Result<(), ApiError>),
    Download(AttachmentId),
    Downloaded(Result<PathBuf, String>),
    RequestArchive(ConversationId),
    RequestUnarchive(ConversationId),
    Confirm,
    Confirmed(Confirmation, Result<(), ApiError>),
    CancelConfirm,
    NewConversation,
    CandidatesLoaded(Result<Vec<Candidate>, ApiError>),
    PickRecipient(UserId),
    DraftChanged(String),
    SendNew,
    CloseNew,
    ViewProfile,
    ProfileLoaded(Result<UserProfile, ApiError>),
    CloseProfile,
}

impl InboxApp {
    fn load(&self, partition: Partition) -> Command<AppMessage> {
        let api = Arc::clone(&self.api);
        Command::perform(
            async move { api.list_conversations(partition).await },
            move |result| AppMessage::ConversationsLoaded(partition, result),
        )
    }

    fn load_thread(&self, ticket: ThreadTicket) -> Command<AppMessage> {
        let api = Arc::clone(&self.api);
        Command::perform(
            async move {
                let result = api.list_messages(&ticket.conversation).await;
                (ticket, result)
            },
            |(ticket, result)| AppMessage::MessagesLoaded(ticket, result),
        )
    }

    fn after_mutation(&self, ticket: Option<ThreadTicket>) -> Command<AppMessage> {
        let mut commands = vec![self.load(Partition::Active)];
        if let Some(ticket) = ticket {
            commands.push(self.load_thread(ticket));
        }
        Command::batch(commands)
    }

    fn send(&self, request: Result<SendRequest, InboxError>) -> Command<AppMessage> {
        match request {
            Ok(request) => {
                let api = Arc::clone(&self.api);
                Command::perform(async move { deliver(api.as_ref(), request).await }, AppMessage::SendFinished)
            }
            Err(e) => self.refuse(e),
        }
    }

    fn refuse(&self, error: InboxError) -> Command<AppMessage> {
        self.state.notify(Notice::info(error.to_string()));
        Command::none()
    }

    fn sidebar(&self) -> Element<'_, AppMessage> {
        let search = text_input("Search conversations", self.state.search())
            .on_input(AppMessage::SearchChanged)
            .padding(8)
            .style(theme::TextInput::Default);
        let toggle_label = match self.state.partition() {
            Partition::Active => "Show archived",
            Partition::Archived => "Show active",
        };
        let mut header = row![search, button(toggle_label).on_press(AppMessage::TogglePartition).padding(8)]
            .spacing(8)
            .align_items(Alignment::Center);
        if self.state.capabilities().can_start_conversation {
            header = header.push(button("New").on_press(AppMessage::NewConversation).padding(8));
        }

        let now = Utc::now();
        let visible = self.state.visible_conversations();
        let list: Element<'_, AppMessage> = if visible.is_empty() {
            text(format!("No {} conversations", self.state.partition())).size(14).into()
        } else {
            column(
                visible
                    .into_iter()
                    .map(|conversation| {
                        let user = &conversation.other_user;
                        let mut title = format!("{} {}", presence_dot(user.status), user.display_name());
                        if conversation.unread_count > 0 {
                            title.push_str(&format!("  ({})", conversation.unread_count));
                        }
                        let when = conversation
                            .last_message_at
                            .map(|at| relative_time(at, now))
                            .unwrap_or_default();
                        let selected = self.state.selected().is_some_and(|s| s.id == conversation.id);
                        button(
                            column![
                                text(title).size(16),
                                text(user.company.clone().unwrap_or_default()).size(12),
                                row![text(preview(&conversation.last_message)).size(12), text(when).size(11)]
                                    .spacing(8),
                            ]
                            .spacing(2),
                        )
                        .style(if selected { theme::Button::Primary } else { theme::Button::Secondary })
                        .on_press(AppMessage::Select(conversation.id.clone()))
                        .padding(6)
                        .width(Length::Fill)
                        .into()
                    })
                    .collect::<Vec<_>>(),
            )
            .spacing(4)
            .into()
        };

        column![header, scrollable(list).height(Length::Fill)]
            .spacing(10)
            .padding(10)
            .width(Length::Fixed(320.0))
            .into()
    }

    fn thread(&self) -> Element<'_, AppMessage> {
        let Some(conversation) = self.state.selected() else {
            return container(text("Select a conversation to start chatting").size(20))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x()
                .center_y()
                .into();
        };
        let other = &conversation.other_user;
        let archived = self
            .state
            .conversations(Partition::Archived)
            .is_some_and(|list| list.iter().any(|c| c.id == conversation.id));

        let mut header = row![text(other.display_name()).size(24)]
            .spacing(10)
            .align_items(Alignment::Center);
        if self.state.capabilities().can_view_profile {
            header = header.push(button("Profile").on_press(AppMessage::ViewProfile).padding(6));
        }
        header = header.push(if archived {
            button("Unarchive").on_press(AppMessage::RequestUnarchive(conversation.id.clone())).padding(6)
        } else {
            button("Archive").on_press(AppMessage::RequestArchive(conversation.id.clone())).padding(6)
        });

        let messages = column(
            self.state
                .messages()
                .iter()
                .map(|message| self.message_bubble(message))
                .collect::<Vec<_>>(),
        )
        .spacing(10)
        .padding(10)
        .width(Length::Fill);

        let compose = text_input("Type a message...", self.state.compose())
            .on_input(AppMessage::ComposeChanged)
            .on_submit(AppMessage::Send)
            .padding(10)
            .style(theme::TextInput::Default);
        let send = button(if self.state.is_sending() { "Sending..." } else { "Send" })
            .on_press_maybe(self.state.can_send().then_some(AppMessage::Send))
            .padding(10);

        let staging: Element<'_, AppMessage> = match self.state.staged_file() {
            Some(file) => {
                let mut staged = row![text(format!("Attached: {} ({} bytes)", file.filename, file.bytes.len())).size(14)]
                    .spacing(10)
                    .align_items(Alignment::Center);
                if self.state.pending_upload().is_some() {
                    staged = staged.push(button("Retry upload").on_press(AppMessage::RetryUpload).padding(6));
                }
                staged.push(button("Remove").on_press(AppMessage::Unstage).padding(6)).into()
            }
            None => row![
                text_input("File path", &self.file_path)
                    .on_input(AppMessage::FilePathChanged)
                    .padding(8)
                    .style(theme::TextInput::Default),
                button("Attach").on_press(AppMessage::StageFile).padding(8),
            ]
            .spacing(10)
            .into(),
        };

        column![
            header,
            scrollable(messages).height(Length::Fill),
            staging,
            row![compose, send].spacing(10),
        ]
        .spacing(12)
        .padding(12)
        .width(Length::Fill)
        .into()
    }

    fn message_bubble<'a>(&'a self, message: &'a Message) -> Element<'a, AppMessage> {
        let own = self.state.can_modify(message);
        let mut body: Column<'a, AppMessage> = column![
            text(&message.content).size(16),
            text(format_timestamp(message.created_at)).size(11).style(Color::from_rgb(0.5, 0.5, 0.5)),
        ]
        .spacing(4);
        for attachment in &message.attachments {
            let mut line = row![
                text(&attachment.original_filename).size(13),
                button("Download").on_press(AppMessage::Download(attachment.id.clone())).padding(4),
            ]
            .spacing(8)
            .align_items(Alignment::Center);
            if own {
                line = line.push(
                    button("Remove")
                        .style(theme::Button::Destructive)
                        .on_press(AppMessage::DeleteAttachment(attachment.id.clone()))
                        .padding(4),
                );
            }
            body = body.push(line);
        }
        if own {
            body = body.push(
                button("Delete message")
                    .style(theme::Button::Destructive)
                    .on_press(AppMessage::DeleteMessage(message.id.clone()))
                    .padding(4),
            );
        }
        let bubble = container(body).padding(10).max_width(480).style(theme::Container::Box);
        container(bubble)
            .width(Length::Fill)
            .align_x(if own { alignment::Horizontal::Right } else { alignment::Horizontal::Left })
            .into()
    }

    fn overlays(&self) -> Option<Element<'_, AppMessage>> {
        if let Some(confirmation) = self.state.confirmation() {
            let question = match confirmation {
                Confirmation::Archive(_) => "Archive this conversation?",
                Confirmation::Unarchive(_) => "Move this conversation back to your inbox?",
            };
            return Some(
                row![
                    text(question).size(16),
                    button("Confirm").on_press(AppMessage::Confirm).padding(6),
                    button("Cancel").on_press(AppMessage::CancelConfirm).padding(6),
                ]
                .spacing(10)
                .align_items(Alignment::Center)
                .into(),
            );
        }
        if let Some(draft) = self.state.draft() {
            let picker = column(
                self.state
                    .candidates()
                    .iter()
                    .map(|candidate| {
                        let chosen = draft.recipient.as_ref() == Some(&candidate.id);
                        let label = match &candidate.email {
                            Some(email) => format!("{} <{}>", candidate.display_name(), email),
                            None => candidate.display_name(),
                        };
                        button(text(label).size(14))
                            .style(if chosen { theme::Button::Primary } else { theme::Button::Secondary })
                            .on_press(AppMessage::PickRecipient(candidate.id.clone()))
                            .width(Length::Fill)
                            .into()
                    })
                    .collect::<Vec<_>>(),
            )
            .spacing(4);
            let can_send = !self.state.is_sending() && draft.recipient.is_some() && !draft.text.trim().is_empty();
            return Some(
                column![
                    text("New message").size(18),
                    scrollable(picker).height(Length::Fixed(160.0)),
                    text_input("Message", &draft.text)
                        .on_input(AppMessage::DraftChanged)
                        .padding(8)
                        .style(theme::TextInput::Default),
                    row![
                        button("Send").on_press_maybe(can_send.then_some(AppMessage::SendNew)).padding(6),
                        button("Close").on_press(AppMessage::CloseNew).padding(6),
                    ]
                    .spacing(10),
                ]
                .spacing(8)
                .into(),
            );
        }
        if let Some(profile) = self.state.profile() {
            let mut details = column![text(profile.display_name()).size(18)].spacing(4);
            for (label, value) in [
                ("Email", &profile.email),
                ("Role", &profile.role),
                ("Company", &profile.company),
                ("Position", &profile.position),
                ("Location", &profile.location),
                ("Bio", &profile.bio),
            ] {
                if let Some(value) = value {
                    details = details.push(text(format!("{}: {}", label, value)).size(14));
                }
            }
            if !profile.skills.is_empty() {
                details = details.push(text(format!("Skills: {}", profile.skills.join(", "))).size(14));
            }
            return Some(
                column![details, button("Close").on_press(AppMessage::CloseProfile).padding(6)]
                    .spacing(8)
                    .into(),
            );
        }
        None
    }
}

impl Application for InboxApp {
    type Executor = executor::Default;
    type Message = AppMessage;
    type Theme = Theme;
    type Flags = Flags;

    fn new(flags: Flags) -> (Self, Command<AppMessage>) {
        let app = InboxApp {
            api: flags.api,
            state: flags.state,
            notices: flags.notices,
            download_dir: flags.download_dir,
            file_path: String::new(),
            status: None,
        };
        let command = app.load(Partition::Active);
        (app, command)
    }

    fn title(&self) -> String {
        String::from("Messages")
    }

    fn update(&mut self, message: AppMessage) -> Command<AppMessage> {
        let command = match message {
            AppMessage::ConversationsLoaded(partition, result) => {
                self.state.apply_conversations(partition, result);
                Command::none()
            }
            AppMessage::SearchChanged(query) => {
                self.state.set_search(query);
                Command::none()
            }
            AppMessage::TogglePartition => {
                if self.state.toggle_partition() {
                    self.load(Partition::Archived)
                } else {
                    Command::none()
                }
            }
            AppMessage::Select(id) => match self.state.select(&id) {
                Ok(ticket) => {
                    let mut commands = vec![self.load_thread(ticket.clone())];
                    if self.state.unread_on_open() {
                        let api = Arc::clone(&self.api);
                        let conversation = ticket.conversation;
                        commands.push(Command::perform(
                            async move {
                                let result = api.mark_read(&conversation).await;
                                (conversation, result)
                            },
                            |(conversation, result)| AppMessage::MarkedRead(conversation, result),
                        ));
                    }
                    Command::batch(commands)
                }
                Err(e) => self.refuse(e),
            },
            AppMessage::MessagesLoaded(ticket, result) => {
                self.state.apply_messages(&ticket, result);
                Command::none()
            }
            AppMessage::MarkedRead(conversation, result) => match result {
                Ok(()) => self.load(Partition::Active),
                Err(e) => {
                    log::warn!("Failed to mark conversation {} read: {}", conversation, e);
                    Command::none()
                }
            },
            AppMessage::ComposeChanged(text) => {
                self.state.set_compose(text);
                Command::none()
            }
            AppMessage::FilePathChanged(path) => {
                self.file_path = path;
                Command::none()
            }
            AppMessage::StageFile => {
                if self.file_path.trim().is_empty() {
                    return Command::none();
                }
                let path = PathBuf::from(self.file_path.trim());
                Command::perform(
                    async move { read_staged_file(path).await.map_err(|e| e.to_string()) },
                    AppMessage::FileStaged,
                )
            }
            AppMessage::FileStaged(result) => {
                match result {
                    Ok(file) => {
                        self.state.stage_file(file);
                        self.file_path.clear();
                    }
                    Err(e) => self.state.notify(Notice::error(format!("Failed to read file: {}", e))),
                }
                Command::none()
            }
            AppMessage::Unstage => {
                self.state.unstage_file();
                Command::none()
            }
            AppMessage::Send => {
                let request = self.state.begin_send();
                self.send(request)
            }
            AppMessage::SendFinished(outcome) => match self.state.finish_send(&outcome) {
                Ok(ticket) => self.after_mutation(ticket),
                Err(_) => Command::none(),
            },
            AppMessage::RetryUpload => match self.state.begin_retry_upload() {
                Ok((message, file)) => {
                    let api = Arc::clone(&self.api);
                    Command::perform(
                        async move { api.upload_attachment(&message, &file).await },
                        AppMessage::RetryFinished,
                    )
                }
                Err(e) => self.refuse(e),
            },
            AppMessage::RetryFinished(result) => match self.state.finish_retry_upload(result) {
                Ok(ticket) => self.after_mutation(ticket),
                Err(_) => Command::none(),
            },
            AppMessage::DeleteMessage(id) => match self.state.check_delete_message(&id) {
                Ok(()) => {
                    let api = Arc::clone(&self.api);
                    Command::perform(async move { api.delete_message(&id).await }, AppMessage::MessageDeleted)
                }
                Err(e) => self.refuse(e),
            },
            AppMessage::MessageDeleted(result) => match self.state.finish_delete_message(result) {
                Ok(ticket) => self.after_mutation(ticket),
                Err(_) => Command::none(),
            },
            AppMessage::DeleteAttachment(id) => match self.state.check_delete_attachment(&id) {
                Ok(()) => {
                    let api = Arc::clone(&self.api);
                    Command::perform(
                        async move { api.delete_attachment(&id).await },
                        AppMessage::AttachmentDeleted,
                    )
                }
                Err(e) => self.refuse(e),
            },
            AppMessage::AttachmentDeleted(result) => match self.state.finish_delete_attachment(result) {
                Ok(ticket) => ticket.map_or_else(Command::none, |ticket| self.load_thread(ticket)),
                Err(_) => Command::none(),
            },
            AppMessage::Download(id) => {
                let api = Arc::clone(&self.api);
                let dir = self.download_dir.clone();
                let listed = self.state.listed_filename(&id);
                Command::perform(
                    async move {
                        download_to(api.as_ref(), &dir, &id, listed)
                            .await
                            .map_err(|e| e.to_string())
                    },
                    AppMessage::Downloaded,
                )
            }
            AppMessage::Downloaded(result) => {
                let _ = self.state.finish_download(result);
                Command::none()
            }
            AppMessage::RequestArchive(id) => {
                self.state.request_archive(&id);
                Command::none()
            }
            AppMessage::RequestUnarchive(id) => {
                self.state.request_unarchive(&id);
                Command::none()
            }
            AppMessage::Confirm => match self.state.begin_confirmation() {
                Ok(confirmation) => {
                    let api = Arc::clone(&self.api);
                    Command::perform(
                        async move {
                            let result = run_confirmation(api.as_ref(), &confirmation).await;
                            (confirmation, result)
                        },
                        |(confirmation, result)| AppMessage::Confirmed(confirmation, result),
                    )
                }
                Err(e) => self.refuse(e),
            },
            AppMessage::Confirmed(confirmation, result) => {
                match self.state.finish_confirmation(&confirmation, result) {
                    Ok(()) => Command::batch(vec![self.load(Partition::Active), self.load(Partition::Archived)]),
                    Err(_) => Command::none(),
                }
            }
            AppMessage::CancelConfirm => {
                self.state.cancel_confirmation();
                Command::none()
            }
            AppMessage::NewConversation => match self.state.open_new_conversation() {
                Ok(source) => {
                    let api = Arc::clone(&self.api);
                    Command::perform(
                        async move { api.list_candidates(source).await },
                        AppMessage::CandidatesLoaded,
                    )
                }
                Err(e) => self.refuse(e),
            },
            AppMessage::CandidatesLoaded(result) => {
                self.state.apply_candidates(result);
                Command::none()
            }
            AppMessage::PickRecipient(id) => {
                self.state.set_draft_recipient(id);
                Command::none()
            }
            AppMessage::DraftChanged(text) => {
                self.state.set_draft_text(text);
                Command::none()
            }
            AppMessage::SendNew => {
                let request = self.state.begin_new_conversation();
                self.send(request)
            }
            AppMessage::CloseNew => {
                self.state.close_new_conversation();
                Command::none()
            }
            AppMessage::ViewProfile => match self.state.begin_view_profile() {
                Ok(user) => {
                    let api = Arc::clone(&self.api);
                    Command::perform(async move { api.view_profile(&user).await }, AppMessage::ProfileLoaded)
                }
                Err(e) => self.refuse(e),
            },
            AppMessage::ProfileLoaded(result) => {
                self.state.apply_profile(result);
                Command::none()
            }
            AppMessage::CloseProfile => {
                self.state.close_profile();
                Command::none()
            }
        };
        if let Some(latest) = self.notices.drain().pop() {
            self.status = Some(latest);
        }
        command
    }

    fn view(&self) -> Element<'_, AppMessage> {
        let status: Element<'_, AppMessage> = match &self.status {
            Some(notice) => {
                let color = match notice.kind {
                    NoticeKind::Success => Color::from_rgb(0.1, 0.5, 0.2),
                    NoticeKind::Error => Color::from_rgb(0.7, 0.1, 0.1),
                    NoticeKind::Info => Color::from_rgb(0.4, 0.4, 0.4),
                };
                text(&notice.message).size(14).style(color).into()
            }
            None => text("").into(),
        };

        let mut main = column![row![self.sidebar(), self.thread()].height(Length::Fill)].spacing(8);
        if let Some(overlay) = self.overlays() {
            main = main.push(container(overlay).padding(12).style(theme::Container::Box).width(Length::Fill));
        }
        container(main.push(status).padding(8))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

fn presence_dot(status: Presence) -> &'static str {
    match status {
        Presence::Online => "●",
        Presence::Away => "◐",
        Presence::Busy => "⊘",
        Presence::Offline => "○",
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 40;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(LIMIT).collect::<String>())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    let api: Arc<dyn MessagingApi> = Arc::new(HttpMessagingClient::new(&config)?);
    let (notices_tx, notices) = notice_channel(config.notice_capacity);
    let state = InboxState::new(config.user_id.clone(), config.role.capabilities(), notices_tx);

    InboxApp::run(Settings::with_flags(Flags {
        api,
        state,
        notices,
        download_dir: config.download_dir,
    }))?;
    Ok(())
}
