use std::io::Write;

use anyhow::Result;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::MessagingApi;
use crate::controller::{Confirmation, InboxController, InboxState};
use crate::format::{format_timestamp, relative_time};
use crate::models::{AttachmentId, ConversationId, MessageId, Partition, UserId};
use crate::notice::NoticeReceiver;

const HELP: &str = "\
Commands:
  list                      show conversations in the current partition
  toggle                    switch between active and archived
  search <text>             filter conversations (empty clears)
  open <n|id>               open a conversation by list number or id
  send <text>               send a message in the open conversation
  attach <path>             stage a file for the next message
  detach                    drop the staged file
  retry                     retry a failed attachment upload
  delete <message-id>       delete one of your messages
  rm-attachment <id>        delete an attachment from one of your messages
  download <id>             save an attachment to the download directory
  archive | unarchive       ask to (un)archive the open conversation
  confirm | cancel          answer the pending prompt
  candidates                list people you can start a conversation with
  new <user-id> <text>      start a conversation
  profile                   show the other participant's profile
  refresh                   re-read conversations and the open thread
  help | exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Toggle,
    Search(String),
    Open(String),
    Send(String),
    Attach(String),
    Detach,
    Retry,
    Delete(String),
    RemoveAttachment(String),
    Download(String),
    Archive,
    Unarchive,
    Confirm,
    Cancel,
    Candidates,
    New { recipient: String, text: String },
    Profile,
    Refresh,
    Help,
    Exit,
}

fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let (word, rest) = match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    };
    let required = |name: &str| {
        if rest.is_empty() {
            Err(format!("Usage: {} <argument>", name))
        } else {
            Ok(rest.to_string())
        }
    };
    let command = match word.to_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "toggle" => Command::Toggle,
        "search" => Command::Search(rest.to_string()),
        "open" => Command::Open(required("open")?),
        "send" => Command::Send(required("send")?),
        "attach" => Command::Attach(required("attach")?),
        "detach" => Command::Detach,
        "retry" => Command::Retry,
        "delete" => Command::Delete(required("delete")?),
        "rm-attachment" => Command::RemoveAttachment(required("rm-attachment")?),
        "download" => Command::Download(required("download")?),
        "archive" => Command::Archive,
        "unarchive" => Command::Unarchive,
        "confirm" | "yes" => Command::Confirm,
        "cancel" | "no" => Command::Cancel,
        "candidates" => Command::Candidates,
        "new" => match rest.split_once(char::is_whitespace) {
            Some((recipient, text)) if !text.trim().is_empty() => Command::New {
                recipient: recipient.to_string(),
                text: text.trim().to_string(),
            },
            _ => return Err("Usage: new <user-id> <text>".to_string()),
        },
        "profile" => Command::Profile,
        "refresh" => Command::Refresh,
        "help" | "?" => Command::Help,
        "exit" | "quit" => Command::Exit,
        other => return Err(format!("Unknown command {}; type help", other)),
    };
    Ok(command)
}

fn resolve_conversation(state: &InboxState, arg: &str) -> ConversationId {
    arg.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| state.visible_conversations().get(index).map(|c| c.id.clone()))
        .unwrap_or_else(|| ConversationId::new(arg))
}

fn print_conversations(state: &InboxState) {
    let partition = state.partition();
    if partition == Partition::Archived && state.conversations(partition).is_none() {
        println!("(archived conversations not loaded)");
        return;
    }
    let visible = state.visible_conversations();
    if visible.is_empty() {
        println!("No {} conversations", partition);
        return;
    }
    let now = Utc::now();
    for (i, conversation) in visible.iter().enumerate() {
        let marker = if state.selected().is_some_and(|s| s.id == conversation.id) { '*' } else { ' ' };
        let unread = if conversation.unread_count > 0 {
            format!(" [{}]", conversation.unread_count)
        } else {
            String::new()
        };
        let when = conversation
            .last_message_at
            .map(|at| relative_time(at, now))
            .unwrap_or_default();
        println!(
            "{}{:>3}. {}{} - {} {}",
            marker,
            i + 1,
            conversation.other_user.display_name(),
            unread,
            conversation.last_message,
            when
        );
    }
}

fn print_thread(state: &InboxState) {
    let Some(conversation) = state.selected() else {
        println!("No conversation selected");
        return;
    };
    let other = &conversation.other_user;
    match &other.company {
        Some(company) => println!("== {} ({})", other.display_name(), company),
        None => println!("== {}", other.display_name()),
    }
    for message in state.messages() {
        let who = if state.can_modify(message) { "you".to_string() } else { other.display_name() };
        println!("[{}] {} {}: {}", message.id, format_timestamp(message.created_at), who, message.content);
        for attachment in &message.attachments {
            println!("      attachment {} {}", attachment.id, attachment.original_filename);
        }
    }
    if let Some(file) = state.staged_file() {
        println!("(staged: {}, {} bytes)", file.filename, file.bytes.len());
    }
}

fn print_prompt(state: &InboxState) {
    match state.confirmation() {
        Some(Confirmation::Archive(id)) => println!("Archive conversation {}? (confirm/cancel)", id),
        Some(Confirmation::Unarchive(id)) => println!("Unarchive conversation {}? (confirm/cancel)", id),
        None => {}
    }
}

async fn execute<A: MessagingApi + ?Sized>(controller: &mut InboxController<A>, command: Command) {
    // Failures were already reported as notices.
    let result = match command {
        Command::List => {
            print_conversations(controller.state());
            Ok(())
        }
        Command::Toggle => {
            controller.toggle_partition().await;
            print_conversations(controller.state());
            Ok(())
        }
        Command::Search(query) => {
            controller.state_mut().set_search(query);
            print_conversations(controller.state());
            Ok(())
        }
        Command::Open(arg) => {
            let id = resolve_conversation(controller.state(), &arg);
            let result = controller.select_conversation(&id).await;
            if result.is_ok() {
                print_thread(controller.state());
            }
            result
        }
        Command::Send(text) => {
            controller.state_mut().set_compose(text);
            let result = controller.send().await;
            if result.is_ok() {
                print_thread(controller.state());
            }
            result
        }
        Command::Attach(path) => controller.stage_file(path).await,
        Command::Detach => {
            controller.state_mut().unstage_file();
            Ok(())
        }
        Command::Retry => controller.retry_upload().await,
        Command::Delete(id) => controller.delete_message(&MessageId::new(id)).await,
        Command::RemoveAttachment(id) => controller.delete_attachment(&AttachmentId::new(id)).await,
        Command::Download(id) => controller.download_attachment(&AttachmentId::new(id)).await.map(|_| ()),
        Command::Archive | Command::Unarchive => {
            match controller.state().selected().map(|c| c.id.clone()) {
                Some(id) if command == Command::Archive => controller.request_archive(&id),
                Some(id) => controller.request_unarchive(&id),
                None => println!("No conversation selected"),
            }
            print_prompt(controller.state());
            Ok(())
        }
        Command::Confirm => controller.confirm().await,
        Command::Cancel => {
            controller.state_mut().cancel_confirmation();
            Ok(())
        }
        Command::Candidates => {
            let result = controller.open_new_conversation().await;
            for candidate in controller.state().candidates() {
                println!("  {} {}", candidate.id, candidate.display_name());
            }
            result
        }
        Command::New { recipient, text } => controller.start_conversation(UserId::new(recipient), &text).await,
        Command::Profile => {
            let result = controller.view_profile().await;
            if let Some(profile) = controller.state().profile() {
                println!("{}", profile.display_name());
                for (label, value) in [
                    ("Email", &profile.email),
                    ("Role", &profile.role),
                    ("Company", &profile.company),
                    ("Position", &profile.position),
                    ("Location", &profile.location),
                    ("Bio", &profile.bio),
                ] {
                    if let Some(value) = value {
                        println!("  {}: {}", label, value);
                    }
                }
                if !profile.skills.is_empty() {
                    println!("  Skills: {}", profile.skills.join(", "));
                }
            }
            result
        }
        Command::Refresh => {
            controller.refresh_conversations().await;
            if let Some(ticket) = controller.state().thread_ticket() {
                controller.refresh_thread(&ticket).await;
            }
            Ok(())
        }
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Exit => Ok(()),
    };
    if let Err(e) = result {
        log::debug!("Command failed: {}", e);
    }
}

pub async fn run_console<A: MessagingApi + ?Sized>(
    controller: &mut InboxController<A>,
    notices: &mut NoticeReceiver,
) -> Result<()> {
    controller.refresh_conversations().await;
    print_conversations(controller.state());

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut input = String::new();

    loop {
        for notice in notices.drain() {
            println!("{}", notice);
        }
        print!("> ");
        std::io::stdout().flush()?;

        input.clear();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }
        if input.trim().is_empty() {
            continue;
        }

        match parse_command(&input) {
            Ok(Command::Exit) => {
                println!("Exiting inbox...");
                break;
            }
            Ok(command) => execute(controller, command).await,
            Err(usage) => println!("{}", usage),
        }
    }

    Ok(())
}
