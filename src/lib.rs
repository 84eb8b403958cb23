pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod models;
pub mod notice;
pub mod search;
pub mod storage;

pub mod console;

pub use client::{CandidateSource, HttpMessagingClient, MessagingApi};
pub use config::{Config, Role};
pub use controller::{Capabilities, InboxController, InboxState};
pub use error::{ApiError, ConfigError, InboxError};
