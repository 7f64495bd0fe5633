//! Telegram Bot API transport: long-polls `getUpdates` for voice notes and
//! replies with `sendDocument` / `sendMessage`.
//!
//! Transient poll failures (network blips, gateway errors) are retried here
//! with backoff; `next_clip` only returns `Err` for non-recoverable faults
//! such as rejected credentials.

use crate::audio::{AudioClip, ClipFormat};
use crate::error::{BergvoxError, Result};
use crate::transport::{Delivery, IncomingClip, ReplyTarget, Transport};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.telegram.org";
const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_BASE: Duration = Duration::from_millis(500);
const POLL_RETRY_CAP: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    voice: Option<Voice>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Voice {
    file_id: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

/// Map a Bot API rejection to an error. Credential rejections (401/403,
/// plus the 404 Telegram returns for a malformed token) are fatal; anything
/// else is treated as transient and retried by the poll loop.
fn rejection_error(method: &str, error_code: Option<i64>, description: String) -> BergvoxError {
    let message = format!("{} rejected: {}", method, description);
    match error_code {
        Some(401) | Some(403) | Some(404) => BergvoxError::TransportAuth { message },
        _ => BergvoxError::Transport { message },
    }
}

fn is_fatal(error: &BergvoxError) -> bool {
    matches!(error, BergvoxError::TransportAuth { .. })
}

/// Exponential backoff for consecutive failed polls, capped so a long
/// outage never pushes the retry interval past 30s.
fn retry_delay(consecutive_failures: u32) -> Duration {
    let factor = 1u32 << consecutive_failures.min(6);
    POLL_RETRY_BASE.saturating_mul(factor).min(POLL_RETRY_CAP)
}

/// Long-polling Telegram transport.
pub struct TelegramTransport {
    client: reqwest::Client,
    token: String,
    api_base: String,
    offset: i64,
    queued: VecDeque<IncomingClip>,
}

impl TelegramTransport {
    pub fn new(token: String) -> Result<Self> {
        Self::with_base(token, API_BASE.to_string())
    }

    #[cfg(test)]
    fn with_api_base(token: String, api_base: String) -> Result<Self> {
        Self::with_base(token, api_base)
    }

    fn with_base(token: String, api_base: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()
            .map_err(|e| BergvoxError::Transport {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            token,
            api_base,
            offset: 0,
            queued: VecDeque::new(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(params)
            .send()
            .await
            .map_err(|e| BergvoxError::Transport {
                message: format!("{} request failed: {}", method, e),
            })?;
        let body: ApiResponse<T> =
            response.json().await.map_err(|e| BergvoxError::Transport {
                message: format!("{} returned malformed response: {}", method, e),
            })?;
        if !body.ok {
            return Err(rejection_error(
                method,
                body.error_code,
                body.description.unwrap_or_else(|| "no description".into()),
            ));
        }
        body.result.ok_or_else(|| BergvoxError::Transport {
            message: format!("{} returned ok without a result", method),
        })
    }

    async fn download_voice(&self, voice: &Voice) -> Result<AudioClip> {
        let info: FileInfo = self
            .call(
                "getFile",
                &serde_json::json!({ "file_id": voice.file_id }),
            )
            .await?;
        let path = info.file_path.ok_or_else(|| BergvoxError::Transport {
            message: "getFile returned no file_path".into(),
        })?;
        let url = format!("{}/file/bot{}/{}", self.api_base, self.token, path);
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BergvoxError::Transport {
                message: format!("voice download failed: {}", e),
            })?
            .bytes()
            .await
            .map_err(|e| BergvoxError::Transport {
                message: format!("voice download truncated: {}", e),
            })?;

        // Telegram voice notes are OGG/Opus; honor the declared MIME type
        // when present so unsupported uploads are rejected up front.
        match voice.mime_type.as_deref() {
            Some(mime) => AudioClip::from_mime(bytes.to_vec(), mime),
            None => Ok(AudioClip::new(bytes.to_vec(), ClipFormat::OggOpus)),
        }
    }

    async fn poll_updates(&mut self) -> Result<()> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &serde_json::json!({
                    "offset": self.offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        for update in updates {
            if let Some(message) = update.message {
                if let Some(voice) = message.voice {
                    let reply = ReplyTarget(message.chat.id.to_string());
                    match self.download_voice(&voice).await {
                        Ok(clip) => self.queued.push_back(IncomingClip { reply, clip }),
                        Err(e) => {
                            warn!(chat = message.chat.id, error = %e, "failed to fetch voice note");
                        }
                    }
                } else {
                    debug!(chat = message.chat.id, "ignoring non-voice message");
                }
            }
            // Commit the offset only once the update is fully handled, so a
            // poll cancelled mid-download re-fetches the same update.
            self.offset = self.offset.max(update.update_id + 1);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn next_clip(&mut self) -> Result<Option<IncomingClip>> {
        let mut consecutive_failures = 0u32;
        loop {
            if let Some(clip) = self.queued.pop_front() {
                return Ok(Some(clip));
            }
            match self.poll_updates().await {
                Ok(()) => consecutive_failures = 0,
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => {
                    let delay = retry_delay(consecutive_failures);
                    consecutive_failures += 1;
                    warn!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "poll failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn deliver(&self, to: &ReplyTarget, delivery: Delivery) -> Result<()> {
        match delivery {
            Delivery::Text(text) => {
                let _: serde_json::Value = self
                    .call(
                        "sendMessage",
                        &serde_json::json!({ "chat_id": to.0, "text": text }),
                    )
                    .await?;
                Ok(())
            }
            Delivery::Document { filename, bytes } => {
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
                    .map_err(|e| BergvoxError::Transport {
                        message: format!("bad document part: {}", e),
                    })?;
                let form = reqwest::multipart::Form::new()
                    .text("chat_id", to.0.clone())
                    .part("document", part);
                let response = self
                    .client
                    .post(self.api_url("sendDocument"))
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| BergvoxError::Transport {
                        message: format!("sendDocument request failed: {}", e),
                    })?;
                let body: ApiResponse<serde_json::Value> =
                    response.json().await.map_err(|e| BergvoxError::Transport {
                        message: format!("sendDocument returned malformed response: {}", e),
                    })?;
                if !body.ok {
                    return Err(rejection_error(
                        "sendDocument",
                        body.error_code,
                        body.description.unwrap_or_else(|| "no description".into()),
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn api_url_embeds_token_and_method() {
        let transport = TelegramTransport::new("123:abc".into()).unwrap();
        assert_eq!(
            transport.api_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn update_parsing_extracts_voice_metadata() {
        let raw = r#"{
            "update_id": 7,
            "message": {
                "chat": { "id": 42 },
                "voice": { "file_id": "f1", "mime_type": "audio/ogg" }
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.update_id, 7);
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, 42);
        let voice = message.voice.unwrap();
        assert_eq!(voice.file_id, "f1");
        assert_eq!(voice.mime_type.as_deref(), Some("audio/ogg"));
    }

    #[test]
    fn update_parsing_tolerates_text_messages() {
        let raw = r#"{ "update_id": 8, "message": { "chat": { "id": 1 } } }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert!(update.message.unwrap().voice.is_none());
    }

    #[test]
    fn api_response_surfaces_error_descriptions() {
        let raw = r#"{ "ok": false, "error_code": 401, "description": "Unauthorized" }"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(!response.ok);
        assert_eq!(response.error_code, Some(401));
        assert_eq!(response.description.as_deref(), Some("Unauthorized"));
        assert!(response.result.is_none());
    }

    #[test]
    fn credential_rejections_are_fatal_others_transient() {
        let unauthorized = rejection_error("getUpdates", Some(401), "Unauthorized".into());
        assert!(is_fatal(&unauthorized));

        let bad_token = rejection_error("getUpdates", Some(404), "Not Found".into());
        assert!(is_fatal(&bad_token));

        let gateway = rejection_error("getUpdates", Some(502), "Bad Gateway".into());
        assert!(!is_fatal(&gateway));

        let flood = rejection_error("getUpdates", Some(429), "Too Many Requests".into());
        assert!(!is_fatal(&flood));
    }

    #[test]
    fn retry_delay_backs_off_and_caps() {
        assert_eq!(retry_delay(0), Duration::from_millis(500));
        assert_eq!(retry_delay(1), Duration::from_secs(1));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        // Capped: larger failure counts never exceed 30s
        assert_eq!(retry_delay(6), Duration::from_secs(30));
        assert_eq!(retry_delay(60), Duration::from_secs(30));
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                let mut remaining = content_length.saturating_sub(buf.len() - (pos + 4));
                while remaining > 0 {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    remaining = remaining.saturating_sub(n);
                }
                return head;
            }
            if n == 0 {
                return String::from_utf8_lossy(&buf).to_string();
            }
        }
    }

    async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
    }

    #[tokio::test]
    async fn next_clip_retries_transient_poll_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // First getUpdates gets a gateway error; the second delivers one
        // voice note, followed by getFile and the file download.
        tokio::spawn(async move {
            let mut polls = 0u32;
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let head = read_request(&mut stream).await;
                if head.contains("/getUpdates") {
                    polls += 1;
                    if polls == 1 {
                        respond(&mut stream, "502 Bad Gateway", "{}").await;
                    } else {
                        respond(
                            &mut stream,
                            "200 OK",
                            r#"{"ok":true,"result":[{"update_id":1,"message":{"chat":{"id":5},"voice":{"file_id":"f1","mime_type":"audio/ogg"}}}]}"#,
                        )
                        .await;
                    }
                } else if head.contains("/getFile") {
                    respond(
                        &mut stream,
                        "200 OK",
                        r#"{"ok":true,"result":{"file_path":"voice/f1.oga"}}"#,
                    )
                    .await;
                } else if head.contains("/file/bot") {
                    respond(&mut stream, "200 OK", "OggS-voice-bytes").await;
                } else {
                    respond(&mut stream, "404 Not Found", "{}").await;
                }
            }
        });

        let mut transport =
            TelegramTransport::with_api_base("123:abc".into(), format!("http://{}", addr)).unwrap();

        let incoming = tokio::time::timeout(Duration::from_secs(15), transport.next_clip())
            .await
            .expect("poll retry should recover well within the timeout")
            .unwrap()
            .expect("a voice note was queued");

        assert_eq!(incoming.reply, ReplyTarget("5".into()));
        assert_eq!(incoming.clip.format, ClipFormat::OggOpus);
        assert_eq!(incoming.clip.bytes, b"OggS-voice-bytes");
    }
}
