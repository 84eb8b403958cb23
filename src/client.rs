use async_trait::async_trait;
use log::{debug, info};
use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    AttachmentId, Candidate, Conversation, ConversationId, DownloadedFile, Message, MessageId,
    Partition, SentMessage, StagedFile, UserId, UserProfile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Messaging,
    Interviews,
}

#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn list_conversations(&self, partition: Partition) -> Result<Vec<Conversation>, ApiError>;

    async fn list_messages(&self, conversation: &ConversationId) -> Result<Vec<Message>, ApiError>;

    async fn send_message(&self, recipient: &UserId, text: &str) -> Result<SentMessage, ApiError>;

    async fn delete_message(&self, message: &MessageId) -> Result<(), ApiError>;

    async fn mark_read(&self, conversation: &ConversationId) -> Result<(), ApiError>;

    async fn archive_conversation(&self, conversation: &ConversationId) -> Result<(), ApiError>;

    async fn unarchive_conversation(&self, conversation: &ConversationId) -> Result<(), ApiError>;

    /// Must be called after the owning message exists.
    async fn upload_attachment(&self, message: &MessageId, file: &StagedFile) -> Result<(), ApiError>;

    async fn delete_attachment(&self, attachment: &AttachmentId) -> Result<(), ApiError>;

    async fn download_attachment(&self, attachment: &AttachmentId) -> Result<DownloadedFile, ApiError>;

    async fn list_candidates(&self, source: CandidateSource) -> Result<Vec<Candidate>, ApiError>;

    async fn view_profile(&self, user: &UserId) -> Result<UserProfile, ApiError>;
}

#[derive(Deserialize)]
struct ConversationsEnvelope {
    #[serde(default)]
    conversations: Option<Vec<Conversation>>,
}

#[derive(Deserialize)]
struct MessagesEnvelope {
    #[serde(default)]
    messages: Option<Vec<Message>>,
}

#[derive(Deserialize)]
struct CandidatesEnvelope {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    receiver_id: &'a UserId,
    content: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    message_id: MessageId,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone, Debug)]
pub struct HttpMessagingClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpMessagingClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ApiError::Network(format!("invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("HTTP client error: {}", e)))?;
        Ok(Self::with_client(http, config.api_url.clone()))
    }

    pub fn with_client(http: reqwest::Client, base: Url) -> Self {
        HttpMessagingClient { http, base }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Config rejects cannot-be-a-base URLs, so this only fails for those.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!("{} {}", method, url);
        self.http.request(method, url)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let response = check(self.request(Method::GET, segments).send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn execute(&self, method: Method, segments: &[&str]) -> Result<(), ApiError> {
        check(self.request(method, segments).send().await?).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(ErrorBody { error }) => Err(ApiError::Application {
            status: status.as_u16(),
            message: error,
        }),
        Err(_) => Err(ApiError::Network(format!("request failed with status {}", status))),
    }
}

fn disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // RFC 5987: charset'lang'percent-encoded
                let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
                if let Ok(decoded) = percent_decode_str(encoded).decode_utf8() {
                    return Some(decoded.into_owned());
                }
            }
            "filename" if !raw.is_empty() => plain = Some(raw.to_string()),
            _ => {}
        }
    }
    plain
}

#[async_trait]
impl MessagingApi for HttpMessagingClient {
    async fn list_conversations(&self, partition: Partition) -> Result<Vec<Conversation>, ApiError> {
        let segments: &[&str] = match partition {
            Partition::Active => &["messages", "conversations"],
            Partition::Archived => &["messages", "conversations", "archived"],
        };
        let envelope: ConversationsEnvelope = self.fetch_json(segments).await?;
        Ok(envelope.conversations.unwrap_or_default())
    }

    async fn list_messages(&self, conversation: &ConversationId) -> Result<Vec<Message>, ApiError> {
        let envelope: MessagesEnvelope = self.fetch_json(&["messages", conversation.as_str()]).await?;
        Ok(envelope.messages.unwrap_or_default())
    }

    async fn send_message(&self, recipient: &UserId, text: &str) -> Result<SentMessage, ApiError> {
        let response = self
            .request(Method::POST, &["messages", "send"])
            .json(&SendRequest { receiver_id: recipient, content: text })
            .send()
            .await?;
        let sent: SendResponse = check(response).await?.json().await?;
        info!("Sent message {} to {}", sent.message_id, recipient);
        Ok(SentMessage { id: sent.message_id, message: sent.message })
    }

    async fn delete_message(&self, message: &MessageId) -> Result<(), ApiError> {
        self.execute(Method::DELETE, &["messages", message.as_str()]).await
    }

    async fn mark_read(&self, conversation: &ConversationId) -> Result<(), ApiError> {
        self.execute(Method::POST, &["messages", conversation.as_str(), "mark-read"]).await
    }

    async fn archive_conversation(&self, conversation: &ConversationId) -> Result<(), ApiError> {
        self.execute(
            Method::POST,
            &["messages", "conversations", conversation.as_str(), "archive"],
        )
        .await
    }

    async fn unarchive_conversation(&self, conversation: &ConversationId) -> Result<(), ApiError> {
        self.execute(
            Method::POST,
            &["messages", "conversations", conversation.as_str(), "unarchive"],
        )
        .await
    }

    async fn upload_attachment(&self, message: &MessageId, file: &StagedFile) -> Result<(), ApiError> {
        let part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
        let form = Form::new().part("file", part);
        let response = self
            .request(Method::POST, &["messages", message.as_str(), "attachments"])
            .multipart(form)
            .send()
            .await?;
        check(response).await?;
        info!("Uploaded {} to message {}", file.filename, message);
        Ok(())
    }

    async fn delete_attachment(&self, attachment: &AttachmentId) -> Result<(), ApiError> {
        self.execute(Method::DELETE, &["messages", "attachments", attachment.as_str()]).await
    }

    async fn download_attachment(&self, attachment: &AttachmentId) -> Result<DownloadedFile, ApiError> {
        let response = self
            .request(Method::GET, &["messages", "attachments", attachment.as_str()])
            .send()
            .await?;
        let response = check(response).await?;
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value: &HeaderValue| value.to_str().ok())
                .map(String::from)
        };
        let filename = header(CONTENT_DISPOSITION).and_then(|value| disposition_filename(&value));
        let content_type = header(CONTENT_TYPE);
        let bytes = response.bytes().await?.to_vec();
        Ok(DownloadedFile { filename, content_type, bytes })
    }

    async fn list_candidates(&self, source: CandidateSource) -> Result<Vec<Candidate>, ApiError> {
        let segments: &[&str] = match source {
            CandidateSource::Messaging => &["messages", "available-candidates"],
            CandidateSource::Interviews => &["interviews", "candidates"],
        };
        let envelope: CandidatesEnvelope = self.fetch_json(segments).await?;
        Ok(envelope.candidates.unwrap_or_default())
    }

    async fn view_profile(&self, user: &UserId) -> Result<UserProfile, ApiError> {
        self.fetch_json(&["users", user.as_str(), "profile"]).await
    }
}
