use std::fmt;

use log::warn;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice { kind: NoticeKind::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice { kind: NoticeKind::Error, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Notice { kind: NoticeKind::Info, message: message.into() }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            NoticeKind::Success => "Success",
            NoticeKind::Error => "Error",
            NoticeKind::Info => "Info",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

pub fn notice_channel(capacity: usize) -> (NoticeSender, NoticeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NoticeSender { tx }, NoticeReceiver { rx })
}

#[derive(Clone, Debug)]
pub struct NoticeSender {
    tx: mpsc::Sender<Notice>,
}

impl NoticeSender {
    /// Queue a notice, dropping it when the queue is full or nobody listens.
    pub fn push(&self, notice: Notice) {
        if let Err(e) = self.tx.try_send(notice) {
            match e {
                mpsc::error::TrySendError::Full(notice) => {
                    warn!("Notice queue full, dropping: {}", notice)
                }
                mpsc::error::TrySendError::Closed(_) => {}
            }
        }
    }
}

#[derive(Debug)]
pub struct NoticeReceiver {
    rx: mpsc::Receiver<Notice>,
}

impl NoticeReceiver {
    pub async fn recv(&mut self) -> Option<Notice> {
        self.rx.recv().await
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.rx.try_recv() {
            notices.push(notice);
        }
        notices
    }
}
