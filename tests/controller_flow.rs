mod common;

use std::sync::Arc;

use chat_inbox::client::MessagingApi;
use chat_inbox::controller::{deliver, Capabilities, Confirmation, InboxController, InboxState};
use chat_inbox::error::{ApiError, InboxError};
use chat_inbox::models::{AttachmentId, ConversationId, MessageId, Partition, StagedFile, UserId};
use chat_inbox::notice::{notice_channel, NoticeKind, NoticeReceiver};
use common::FakeBackend;

fn seeded_backend() -> FakeBackend {
    let backend = FakeBackend::new("me");
    backend.add_user("u42", "Ada", "Lovelace");
    backend.add_user("u7", "Grace", "Hopper");
    backend.add_conversation("c1", "u42", &[("u42", "Hi there"), ("u42", "Are you free Tuesday?")]);
    backend.add_conversation("c2", "u7", &[("me", "Thanks for the call"), ("u7", "Likewise")]);
    backend
}

fn controller(
    backend: FakeBackend,
    capabilities: Capabilities,
    download_dir: &std::path::Path,
) -> (InboxController<FakeBackend>, NoticeReceiver, Arc<FakeBackend>) {
    let api = Arc::new(backend);
    let (tx, rx) = notice_channel(32);
    let state = InboxState::new(api.me().clone(), capabilities, tx);
    (InboxController::new(Arc::clone(&api), state, download_dir), rx, api)
}

fn unread(controller: &InboxController<FakeBackend>, id: &str) -> Option<u32> {
    controller
        .state()
        .conversations(Partition::Active)?
        .iter()
        .find(|c| c.id.as_str() == id)
        .map(|c| c.unread_count)
}

#[tokio::test]
async fn test_opening_conversation_clears_unread() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    assert_eq!(unread(&controller, "c1"), Some(2));

    controller.select_conversation(&ConversationId::new("c1")).await.unwrap();

    assert_eq!(controller.state().messages().len(), 2);
    assert_eq!(unread(&controller, "c1"), Some(0));
    assert_eq!(controller.state().selected().map(|c| c.unread_count), Some(0));
    assert!(api.calls().contains(&"mark-read c1".to_string()));
}

#[tokio::test]
async fn test_opening_read_conversation_skips_mark_read() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeBackend::new("me");
    backend.add_user("u7", "Grace", "Hopper");
    backend.add_conversation("c2", "u7", &[("me", "Thanks for the call")]);
    let (mut controller, _rx, api) = controller(backend, Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;

    controller.select_conversation(&ConversationId::new("c2")).await.unwrap();
    assert!(!api.calls().iter().any(|call| call.starts_with("mark-read")));
}

#[tokio::test]
async fn test_send_with_attachment_binds_to_new_message() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("cv.pdf");
    std::fs::write(&file_path, b"%PDF").unwrap();

    let (mut controller, mut rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c1")).await.unwrap();
    controller.stage_file(&file_path).await.unwrap();
    controller.state_mut().set_compose("Here is my CV");

    controller.send().await.unwrap();

    let calls = api.calls();
    let send = calls.iter().position(|c| c == "send u42").unwrap();
    let upload = calls.iter().position(|c| c.starts_with("upload ")).unwrap();
    assert!(send < upload);

    let last = controller.state().messages().last().unwrap().clone();
    assert_eq!(last.content, "Here is my CV");
    assert_eq!(last.sender_id.as_str(), "me");
    assert_eq!(last.attachments.len(), 1);
    assert_eq!(last.attachments[0].original_filename, "cv.pdf");
    assert_eq!(calls[upload], format!("upload {}", last.id));

    assert_eq!(controller.state().compose(), "");
    assert!(controller.state().staged_file().is_none());
    assert!(!controller.state().is_sending());
    assert_eq!(
        controller.state().selected().map(|c| c.last_message.as_str()),
        Some("Here is my CV")
    );
    assert!(rx.drain().iter().any(|n| n.kind == NoticeKind::Success));
}

#[tokio::test]
async fn test_send_to_unknown_recipient_keeps_compose() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeBackend::new("me");
    backend.add_conversation("c9", "ghost", &[("ghost", "boo")]);
    let (mut controller, mut rx, _api) = controller(backend, Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c9")).await.unwrap();
    controller.state_mut().set_compose("Hello");

    let result = controller.send().await;

    assert!(matches!(result, Err(InboxError::Api(ApiError::Application { status: 400, .. }))));
    assert_eq!(controller.state().compose(), "Hello");
    assert!(!controller.state().is_sending());
    let notices = rx.drain();
    assert!(notices.iter().any(|n| n.kind == NoticeKind::Error && n.message.contains("Recipient not found")));
}

#[tokio::test]
async fn test_failed_upload_can_be_retried() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("notes.txt");
    std::fs::write(&file_path, b"notes").unwrap();

    let (mut controller, mut rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c1")).await.unwrap();
    controller.stage_file(&file_path).await.unwrap();
    controller.state_mut().set_compose("See attached");
    api.fail_uploads(true);

    controller.send().await.unwrap();
    assert_eq!(controller.state().compose(), "");
    assert!(controller.state().staged_file().is_some());
    let pending = controller.state().pending_upload().cloned().unwrap();
    assert!(rx.drain().iter().any(|n| n.kind == NoticeKind::Error));

    api.fail_uploads(false);
    controller.retry_upload().await.unwrap();

    assert!(controller.state().staged_file().is_none());
    let message = controller
        .state()
        .messages()
        .iter()
        .find(|m| m.id == pending)
        .unwrap();
    assert_eq!(message.attachments.len(), 1);
}

#[tokio::test]
async fn test_stale_thread_is_not_shown_after_switching() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _rx, _api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;

    let first = controller.state_mut().select(&ConversationId::new("c1")).unwrap();
    controller.select_conversation(&ConversationId::new("c2")).await.unwrap();
    assert!(!controller.refresh_thread(&first).await);

    assert_eq!(controller.state().selected().map(|c| c.id.as_str()), Some("c2"));
    assert_eq!(controller.state().messages()[0].content, "Thanks for the call");
}

#[tokio::test]
async fn test_send_then_switch_shows_new_conversation_only() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c1")).await.unwrap();
    controller.state_mut().set_compose("Hello ann");
    controller
        .state_mut()
        .stage_file(StagedFile { filename: "a.pdf".into(), bytes: b"A".to_vec() });
    let request = controller.state_mut().begin_send().unwrap();

    controller.select_conversation(&ConversationId::new("c2")).await.unwrap();
    controller.state_mut().set_compose("draft for bob");
    controller.state_mut().unstage_file();
    controller
        .state_mut()
        .stage_file(StagedFile { filename: "b.pdf".into(), bytes: b"B".to_vec() });

    let outcome = deliver(controller.api().as_ref(), request).await;
    let ticket = controller.state_mut().finish_send(&outcome).unwrap().unwrap();
    assert!(!controller.refresh_thread(&ticket).await);
    controller.refresh_conversations().await;

    let state = controller.state();
    assert_eq!(state.selected().map(|c| c.id.as_str()), Some("c2"));
    assert!(state.messages().iter().all(|m| m.content != "Hello ann"));
    assert_eq!(state.messages()[0].content, "Thanks for the call");
    assert_eq!(state.compose(), "draft for bob");
    assert_eq!(state.staged_file().map(|f| f.filename.as_str()), Some("b.pdf"));

    let sent = api.history("c1").last().cloned().unwrap();
    assert_eq!(sent.content, "Hello ann");
    assert_eq!(sent.attachments[0].original_filename, "a.pdf");
}

#[tokio::test]
async fn test_archive_then_unarchive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, mut rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    let history = api.history("c2");
    let id = ConversationId::new("c2");

    controller.request_archive(&id);
    assert_eq!(controller.state().confirmation(), Some(&Confirmation::Archive(id.clone())));
    controller.confirm().await.unwrap();

    assert!(controller.state().confirmation().is_none());
    let active = controller.state().conversations(Partition::Active).unwrap();
    assert!(active.iter().all(|c| c.id != id));
    let archived = controller.state().conversations(Partition::Archived).unwrap();
    assert!(archived.iter().any(|c| c.id == id));

    controller.request_unarchive(&id);
    controller.confirm().await.unwrap();

    let active = controller.state().conversations(Partition::Active).unwrap();
    assert!(active.iter().any(|c| c.id == id));
    assert!(controller.state().conversations(Partition::Archived).unwrap().is_empty());
    assert_eq!(api.history("c2"), history);

    let successes = rx.drain().into_iter().filter(|n| n.kind == NoticeKind::Success).count();
    assert_eq!(successes, 2);
}

#[tokio::test]
async fn test_cancelled_archive_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;

    controller.request_archive(&ConversationId::new("c1"));
    controller.state_mut().cancel_confirmation();
    assert!(controller.confirm().await.is_err());
    assert!(!api.calls().iter().any(|call| call.starts_with("archive")));
}

#[tokio::test]
async fn test_toggle_shows_archived_partition() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded_backend();
    let (mut controller, _rx, api) = controller(backend, Capabilities::candidate(), dir.path());
    api.archive_conversation(&ConversationId::new("c1")).await.unwrap();
    controller.refresh_conversations().await;
    assert_eq!(controller.state().visible_conversations().len(), 1);

    controller.toggle_partition().await;
    let visible = controller.state().visible_conversations();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id.as_str(), "c1");

    controller.state_mut().set_search("grace");
    assert!(controller.state().visible_conversations().is_empty());
}

#[tokio::test]
async fn test_attachment_delete_keeps_message() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("cv.pdf");
    std::fs::write(&file_path, b"%PDF").unwrap();

    let (mut controller, _rx, _api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c2")).await.unwrap();
    controller.stage_file(&file_path).await.unwrap();
    controller.state_mut().set_compose("Attached");
    controller.send().await.unwrap();

    let message = controller.state().messages().last().unwrap().clone();
    let attachment = message.attachments[0].id.clone();
    controller.delete_attachment(&attachment).await.unwrap();

    let after = controller
        .state()
        .messages()
        .iter()
        .find(|m| m.id == message.id)
        .unwrap();
    assert!(after.attachments.is_empty());
    assert_eq!(after.content, "Attached");
}

#[tokio::test]
async fn test_deleting_someone_elses_message_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c1")).await.unwrap();
    let theirs = controller.state().messages()[0].id.clone();

    let result = controller.delete_message(&theirs).await;

    assert!(matches!(result, Err(InboxError::InvalidInput(_))));
    assert!(!api.calls().iter().any(|call| call.starts_with("delete ")));
    assert_eq!(controller.state().messages().len(), 2);
}

#[tokio::test]
async fn test_deleting_own_message() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, mut rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c2")).await.unwrap();
    let mine = controller.state().messages()[0].id.clone();

    controller.delete_message(&mine).await.unwrap();

    assert_eq!(controller.state().messages().len(), 1);
    assert_eq!(api.history("c2").len(), 1);
    assert!(rx.drain().iter().any(|n| n.message == "Message deleted successfully"));
}

#[tokio::test]
async fn test_recruiter_starts_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let backend = seeded_backend();
    backend.add_user("u99", "Katherine", "Johnson");
    let (mut controller, mut rx, api) = controller(backend, Capabilities::recruiter(), dir.path());
    controller.refresh_conversations().await;

    controller.open_new_conversation().await.unwrap();
    assert!(controller.state().candidates().iter().any(|c| c.id.as_str() == "u99"));
    assert!(api.calls().contains(&"candidates Interviews".to_string()));

    controller
        .start_conversation(UserId::new("u99"), "Interested in a chat?")
        .await
        .unwrap();

    assert!(controller.state().draft().is_none());
    let active = controller.state().conversations(Partition::Active).unwrap();
    let started = active.iter().find(|c| c.other_user.id.as_str() == "u99").unwrap();
    assert_eq!(started.last_message, "Interested in a chat?");
    assert!(rx.drain().iter().any(|n| n.message == "Message sent successfully"));
}

#[tokio::test]
async fn test_candidate_cannot_start_conversation_or_view_profile() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c1")).await.unwrap();

    assert!(controller.open_new_conversation().await.is_err());
    assert!(controller.view_profile().await.is_err());
    assert!(!api.calls().iter().any(|c| c.starts_with("candidates") || c.starts_with("profile")));
}

#[tokio::test]
async fn test_recruiter_views_profile() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _rx, _api) = controller(seeded_backend(), Capabilities::recruiter(), dir.path());
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c1")).await.unwrap();

    controller.view_profile().await.unwrap();
    assert_eq!(controller.state().profile().map(|p| p.display_name()).as_deref(), Some("Ada Lovelace"));
}

#[tokio::test]
async fn test_download_saves_under_listed_name() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("cv.pdf");
    std::fs::write(&file_path, b"%PDF-1.4").unwrap();
    let downloads = dir.path().join("downloads");

    let (mut controller, _rx, _api) = controller(seeded_backend(), Capabilities::candidate(), &downloads);
    controller.refresh_conversations().await;
    controller.select_conversation(&ConversationId::new("c2")).await.unwrap();
    controller.stage_file(&file_path).await.unwrap();
    controller.state_mut().set_compose("CV");
    controller.send().await.unwrap();
    let attachment = controller.state().messages().last().unwrap().attachments[0].id.clone();

    let first = controller.download_attachment(&attachment).await.unwrap();
    let second = controller.download_attachment(&attachment).await.unwrap();

    assert_eq!(first, downloads.join("cv.pdf"));
    assert_eq!(second, downloads.join("cv (1).pdf"));
    assert_eq!(std::fs::read(&first).unwrap(), b"%PDF-1.4");
}

#[tokio::test]
async fn test_download_of_missing_attachment_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, mut rx, _api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());

    let result = controller.download_attachment(&AttachmentId::new("nope")).await;

    assert!(result.is_err());
    assert!(rx.drain().iter().any(|n| n.kind == NoticeKind::Error));
}

#[tokio::test]
async fn test_stale_message_id_delete_is_rejected_locally() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _rx, api) = controller(seeded_backend(), Capabilities::candidate(), dir.path());
    controller.refresh_conversations().await;

    let result = controller.delete_message(&MessageId::new("m1")).await;
    assert!(matches!(result, Err(InboxError::InvalidInput(_))));
    assert!(api.calls().iter().all(|c| !c.starts_with("delete")));
}

#[tokio::test]
async fn test_backend_rejects_foreign_delete_and_keeps_message() {
    let api = seeded_backend();
    let theirs = api.history("c1")[0].id.clone();

    let error = api.delete_message(&theirs).await.unwrap_err();

    assert!(matches!(error, ApiError::Application { status: 403, .. }));
    assert!(api.history("c1").iter().any(|m| m.id == theirs));
}
