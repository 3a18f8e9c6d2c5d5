//! Board backend HTTP client.

use crate::error::MoimError;
use crate::types::*;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

pub const DEFAULT_OPEN_BASE_URL: &str = "https://open.kakao.com/moim";
pub const DEFAULT_TALK_BASE_URL: &str = "https://talkmoim-api.kakao.com";

const APP_AGENT: &str = "android/11.0.0/ko";
const USER_AGENT: &str = "KT/11.0.0 An/9 ko";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Client for a room's board: notices, shared posts and polls.
///
/// Open chats are served from the open-chat base with a `link_id` query
/// parameter; regular rooms from the talk base.
#[derive(Clone)]
pub struct MoimClient {
    client: Client,
    open_base_url: String,
    talk_base_url: String,
}

impl MoimClient {
    /// Create a client with its own connection pool.
    pub fn new(
        open_base_url: impl Into<String>,
        talk_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MoimError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, open_base_url, talk_base_url))
    }

    /// Create a client over an existing connection pool.
    pub fn with_client(
        client: Client,
        open_base_url: impl Into<String>,
        talk_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            open_base_url: open_base_url.into().trim_end_matches('/').to_string(),
            talk_base_url: talk_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// List the posts on a room's board.
    #[instrument(skip(self, auth))]
    pub async fn list_posts(
        &self,
        auth: &str,
        room_id: &str,
        link_id: Option<&str>,
    ) -> Result<Vec<Post>, MoimError> {
        let url = self.board_url(&format!("/chats/{}/posts", room_id), link_id);
        let response = self.request(Method::GET, &url, auth).send().await?;

        let body = check_response(response).await?;
        let posts = match body {
            Some(value) => serde_json::from_value::<PostsResponse>(value)?.into_posts(),
            None => Vec::new(),
        };
        debug!("Listed {} posts", posts.len());
        Ok(posts)
    }

    /// Share an existing post into the room.
    #[instrument(skip(self, auth))]
    pub async fn share_post(
        &self,
        auth: &str,
        post_id: &str,
        link_id: Option<&str>,
    ) -> Result<(), MoimError> {
        let url = self.board_url(&format!("/posts/{}/share", post_id), link_id);
        let response = self
            .request(Method::POST, &url, auth)
            .body("")
            .send()
            .await?;

        check_response(response).await?;
        debug!("Shared post {}", post_id);
        Ok(())
    }

    /// Create a text notice, returning the new post id when the backend
    /// reports one.
    #[instrument(skip(self, auth, text))]
    pub async fn create_notice(
        &self,
        auth: &str,
        room_id: &str,
        text: &str,
        link_id: Option<&str>,
    ) -> Result<Option<String>, MoimError> {
        let url = self.board_url(&format!("/chats/{}/posts", room_id), link_id);
        let response = self
            .request(Method::POST, &url, auth)
            .header("content-type", FORM_CONTENT_TYPE)
            .body(notice_form(text, link_id)?)
            .send()
            .await?;

        let body = check_response(response).await?;
        Ok(body.as_ref().and_then(post_id_of))
    }

    /// Replace the text of an existing notice.
    #[instrument(skip(self, auth, text))]
    pub async fn update_notice(
        &self,
        auth: &str,
        post_id: &str,
        text: &str,
        link_id: Option<&str>,
    ) -> Result<(), MoimError> {
        let url = self.board_url(&format!("/posts/{}", post_id), link_id);
        let response = self
            .request(Method::PUT, &url, auth)
            .header("content-type", FORM_CONTENT_TYPE)
            .body(notice_form(text, link_id)?)
            .send()
            .await?;

        check_response(response).await?;
        Ok(())
    }

    /// Delete a post.
    #[instrument(skip(self, auth))]
    pub async fn delete_post(
        &self,
        auth: &str,
        post_id: &str,
        link_id: Option<&str>,
    ) -> Result<(), MoimError> {
        let url = self.board_url(&format!("/posts/{}", post_id), link_id);
        let response = self.request(Method::DELETE, &url, auth).send().await?;

        check_response(response).await?;
        Ok(())
    }

    /// Create a poll. Polls exist only on open chats, so a link id is required.
    #[instrument(skip(self, auth, poll), fields(subject = %poll.subject))]
    pub async fn create_poll(
        &self,
        auth: &str,
        room_id: &str,
        link_id: &str,
        poll: &PollSpec,
    ) -> Result<Option<String>, MoimError> {
        let url = self.board_url(&format!("/chats/{}/posts", room_id), Some(link_id));
        let content = poll.to_content(Utc::now())?;
        let body = format!(
            "object_type=POLL&poll_content={}&link_id={}&notice=false",
            encode(&content),
            encode(link_id)
        );

        let response = self
            .request(Method::POST, &url, auth)
            .header("content-type", FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let body = check_response(response).await?;
        Ok(body.as_ref().and_then(post_id_of))
    }

    fn board_url(&self, path: &str, link_id: Option<&str>) -> String {
        match link_id {
            Some(link_id) => format!(
                "{}{}?link_id={}",
                self.open_base_url,
                path,
                encode(link_id)
            ),
            None => format!("{}{}", self.talk_base_url, path),
        }
    }

    fn request(&self, method: Method, url: &str, auth: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", auth)
            .header("A", APP_AGENT)
            .header("C", uuid::Uuid::new_v4().to_string())
            .header("Accept-Language", "ko")
            .header("User-Agent", USER_AGENT)
    }
}

/// Form body shared by notice creation and update.
fn notice_form(text: &str, link_id: Option<&str>) -> Result<String, MoimError> {
    let content = serde_json::to_string(&[ContentSegment {
        text: text.to_string(),
        segment_type: "text".into(),
    }])?;

    let mut body = format!(
        "content={}&object_type=TEXT&notice=true",
        encode(&content)
    );
    if let Some(link_id) = link_id {
        body.push_str(&format!("&link_id={}", encode(link_id)));
    }
    Ok(body)
}

/// Map HTTP and embedded status failures onto `MoimError`.
///
/// A successful response with a non-JSON body is treated as success.
async fn check_response(response: Response) -> Result<Option<Value>, MoimError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        warn!("Board request failed with status {}", status);
        return Err(MoimError::Api {
            status: status.as_u16(),
            message: text,
        });
    }

    let Ok(body) = serde_json::from_str::<Value>(&text) else {
        debug!("Board response was not JSON");
        return Ok(None);
    };

    if let Some(code) = body.get("status").and_then(Value::as_i64) {
        if code < 0 {
            let message = rejection_message(code)
                .map(String::from)
                .or_else(|| {
                    body.get("error_message")
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .unwrap_or_else(|| format!("unknown error (status: {})", code));
            warn!("Board backend rejected request: {} ({})", message, code);
            return Err(MoimError::Rejected {
                status: code,
                message,
            });
        }
    }

    Ok(Some(body))
}

fn rejection_message(status: i64) -> Option<&'static str> {
    match status {
        -401 => Some("authentication failed"),
        -403 => Some("forbidden"),
        -404 => Some("post not found"),
        -805 => Some("only the host or a manager may do this"),
        -4046 => Some("not permitted or already processed"),
        STATUS_NO_PERMISSION => Some("permission denied"),
        _ => None,
    }
}

fn post_id_of(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
