use std::sync::Arc;

use chat_inbox::console::run_console;
use chat_inbox::notice::notice_channel;
use chat_inbox::{Config, HttpMessagingClient, InboxController, InboxState};
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    info!("Using messaging API at {} as {:?}", config.api_url, config.role);

    let api = Arc::new(HttpMessagingClient::new(&config)?);
    let (notices_tx, mut notices) = notice_channel(config.notice_capacity);
    let state = InboxState::new(config.user_id.clone(), config.role.capabilities(), notices_tx);
    let mut controller = InboxController::new(api, state, config.download_dir.clone());

    run_console(&mut controller, &mut notices).await
}
