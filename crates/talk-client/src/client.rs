//! Outbound message, reaction and board dispatch.

use crate::attachment;
use crate::error::DispatchError;
use crate::executor::{SubmitError, TaskExecutor, WorkerPool};
use crate::message_id;
use crate::retry::RetryPolicy;
use crate::types::*;
use iris_client::IrisClient;
use moim_client::{MoimClient, MoimError, PollSpec, Post};
use reqwest::{Client, Response};
use serde_json::Value;
use session_cache::{
    Credential, CredentialCache, LinkIdCache, DEFAULT_CREDENTIAL_TTL, DEFAULT_LINK_ID_TTL,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_WRITE_URL: &str = "https://talk-external.kakao.com/talk/write";
pub const DEFAULT_REACTION_BASE_URL: &str = "https://talk-pilsner.kakao.com";

const WRITE_USER_AGENT: &str = "okhttp/4.12.0";
const REACTION_USER_AGENT: &str = "okhttp/4.10.0";
const TALK_AGENT: &str = "android/11.0.0";

/// Callback receiving the outcome of a background send.
pub type Completion = Box<dyn FnOnce(DispatchResult) + Send + 'static>;

/// Endpoints, timeouts and pool sizes for a `DispatchClient`.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub write_url: String,
    pub reaction_base_url: String,
    pub open_base_url: String,
    pub talk_base_url: String,
    /// Bound on each backend call.
    pub send_timeout: Duration,
    /// Bound on each sidecar call (credential fetch, store lookup).
    pub auth_timeout: Duration,
    pub max_idle_per_host: usize,
    pub credential_ttl: Duration,
    pub link_id_ttl: Duration,
    pub workers: usize,
    pub queue_capacity: usize,
    pub poll_retry: RetryPolicy,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            write_url: DEFAULT_WRITE_URL.into(),
            reaction_base_url: DEFAULT_REACTION_BASE_URL.into(),
            open_base_url: moim_client::DEFAULT_OPEN_BASE_URL.into(),
            talk_base_url: moim_client::DEFAULT_TALK_BASE_URL.into(),
            send_timeout: Duration::from_secs(5),
            auth_timeout: Duration::from_secs(3),
            max_idle_per_host: 4,
            credential_ttl: DEFAULT_CREDENTIAL_TTL,
            link_id_ttl: DEFAULT_LINK_ID_TTL,
            workers: 5,
            queue_capacity: 64,
            poll_retry: RetryPolicy::poll(),
        }
    }
}

/// Sends messages, reactions and board posts on behalf of an Iris gateway.
///
/// Owns the credential cache, the link id cache, one pooled HTTP client and
/// the background executor. Cloning is cheap and shares all of them.
#[derive(Clone)]
pub struct DispatchClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    options: DispatchOptions,
    credentials: CredentialCache,
    link_ids: LinkIdCache,
    board: MoimClient,
    executor: Arc<dyn TaskExecutor>,
}

impl DispatchClient {
    /// Create a client backed by a `WorkerPool`. Must be called from within
    /// a tokio runtime.
    pub fn new(options: DispatchOptions) -> Result<Self, DispatchError> {
        let executor = Arc::new(WorkerPool::new(options.workers, options.queue_capacity));
        Self::with_executor(options, executor)
    }

    /// Create a client that runs background sends on `executor`.
    pub fn with_executor(
        options: DispatchOptions,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<Self, DispatchError> {
        let http = Client::builder()
            .timeout(options.send_timeout)
            .pool_max_idle_per_host(options.max_idle_per_host)
            .build()?;

        let credentials = CredentialCache::new(http.clone(), options.credential_ttl)
            .with_fetch_timeout(options.auth_timeout);
        let link_ids = LinkIdCache::new(options.link_id_ttl);
        let board = MoimClient::with_client(
            http.clone(),
            options.open_base_url.clone(),
            options.talk_base_url.clone(),
        );

        info!("Dispatch client initialized (write_url={})", options.write_url);
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                options,
                credentials,
                link_ids,
                board,
                executor,
            }),
        })
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.inner.options
    }

    /// Gateway client for `endpoint` sharing this client's connection pool.
    pub fn gateway(&self, endpoint: &str) -> IrisClient {
        IrisClient::with_client(self.inner.http.clone(), endpoint)
            .with_timeout(self.inner.options.auth_timeout)
    }

    /// Cached credential for `endpoint`.
    pub async fn credential(
        &self,
        endpoint: &str,
        force_refresh: bool,
    ) -> Result<Credential, DispatchError> {
        Ok(self
            .inner
            .credentials
            .get_credential(endpoint, force_refresh)
            .await?)
    }

    /// Cached open-chat link id for `room_id`; `None` for regular rooms and
    /// failed lookups.
    pub async fn link_id(&self, endpoint: &str, room_id: &str) -> Option<String> {
        let gateway = self.gateway(endpoint);
        self.inner.link_ids.get_link_id(room_id, &gateway).await
    }

    /// Send a message and wait for the backend's answer.
    #[instrument(skip(self, message), fields(room_id = %message.room_id))]
    pub async fn send_message(&self, endpoint: &str, message: OutboundMessage) -> DispatchResult {
        match self.write(endpoint, &message).await {
            Ok(result) => {
                if !result.is_success() {
                    warn!("Message rejected (status={:?})", result.status);
                }
                result
            }
            Err(e) => {
                warn!("Message send failed: {}", e);
                DispatchResult::failed(&e)
            }
        }
    }

    /// Queue a message for background sending. Returns once the task is
    /// queued; `on_complete` receives the eventual result.
    pub async fn send_message_async(
        &self,
        endpoint: &str,
        message: OutboundMessage,
        on_complete: Option<Completion>,
    ) -> Result<(), SubmitError> {
        let client = self.clone();
        let endpoint = endpoint.to_string();
        self.submit(Box::pin(async move {
            let result = client.send_message(&endpoint, message).await;
            if let Some(on_complete) = on_complete {
                on_complete(result);
            }
        }))
        .await
    }

    /// React to a logged message.
    #[instrument(skip(self, request), fields(room_id = %request.room_id, log_id = %request.log_id))]
    pub async fn send_reaction(&self, endpoint: &str, request: ReactionRequest) -> DispatchResult {
        match self.post_reaction(endpoint, &request).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Reaction failed: {}", e);
                DispatchResult::failed(&e)
            }
        }
    }

    /// Queue a reaction for background sending.
    pub async fn send_reaction_async(
        &self,
        endpoint: &str,
        request: ReactionRequest,
        on_complete: Option<Completion>,
    ) -> Result<(), SubmitError> {
        let client = self.clone();
        let endpoint = endpoint.to_string();
        self.submit(Box::pin(async move {
            let result = client.send_reaction(&endpoint, request).await;
            if let Some(on_complete) = on_complete {
                on_complete(result);
            }
        }))
        .await
    }

    /// React to a message, resolving the room's link id first.
    pub async fn react(
        &self,
        endpoint: &str,
        room_id: &str,
        log_id: &str,
        reaction: ReactionType,
    ) -> DispatchResult {
        let link_id = self.link_id(endpoint, room_id).await;
        let request = ReactionRequest::new(room_id, log_id, reaction).with_link_id(link_id);
        self.send_reaction(endpoint, request).await
    }

    /// Mention a user, optionally inside a thread.
    ///
    /// A thread send only counts as delivered when the backend echoes the
    /// thread id with thread scope.
    #[instrument(skip(self, mention), fields(user_id = mention.user_id))]
    pub async fn send_mention(
        &self,
        endpoint: &str,
        room_id: &str,
        mention: &Mention,
        thread_id: Option<&str>,
    ) -> DispatchResult {
        let (text, attachment) = match attachment::mention(mention) {
            Ok(rendered) => rendered,
            Err(e) => return DispatchResult::failed(&e),
        };

        let mut message = OutboundMessage::new(room_id, text).with_attachment(attachment);
        if let Some(thread_id) = thread_id {
            message = message.in_thread(thread_id);
        }
        let threaded = matches!(message.validate(), Ok(Some(_)));

        let result = self.send_message(endpoint, message).await;
        if threaded && result.is_success() && !echoes_thread(&result.body) {
            warn!("Backend did not place the mention in the thread");
            return DispatchResult::rejected(result.status, result.body);
        }
        result
    }

    /// Send emoticon `number` from the bundled pack.
    pub async fn send_emoticon(&self, endpoint: &str, room_id: &str, number: u32) -> DispatchResult {
        let attachment = match attachment::emoticon(number) {
            Ok(attachment) => attachment,
            Err(e) => return DispatchResult::failed(&e),
        };
        let message = OutboundMessage::new(room_id, " ")
            .with_type(OutboundMessage::TYPE_EMOTICON)
            .with_attachment(attachment);
        self.send_message(endpoint, message).await
    }

    /// Posts on the room's board.
    pub async fn list_posts(&self, endpoint: &str, room_id: &str) -> Result<Vec<Post>, DispatchError> {
        let link_id = self.link_id(endpoint, room_id).await;
        let link_id = link_id.as_deref();
        let board = &self.inner.board;
        self.with_board_auth(endpoint, &RetryPolicy::none(), move |auth| async move {
            board.list_posts(&auth, room_id, link_id).await
        })
        .await
    }

    /// Share a post into the room.
    pub async fn share_post(
        &self,
        endpoint: &str,
        room_id: &str,
        post_id: &str,
    ) -> Result<(), DispatchError> {
        let link_id = self.link_id(endpoint, room_id).await;
        let link_id = link_id.as_deref();
        let board = &self.inner.board;
        self.with_board_auth(endpoint, &RetryPolicy::none(), move |auth| async move {
            board.share_post(&auth, post_id, link_id).await
        })
        .await
    }

    /// Share the room's current notice, as recorded by the gateway.
    pub async fn share_current_notice(
        &self,
        endpoint: &str,
        room_id: &str,
    ) -> Result<String, DispatchError> {
        let post_id = self
            .gateway(endpoint)
            .current_post_id(room_id)
            .await?
            .ok_or_else(|| DispatchError::invalid("room has no current notice"))?;
        self.share_post(endpoint, room_id, &post_id).await?;
        Ok(post_id)
    }

    /// Create a notice, returning the new post id when reported.
    pub async fn create_notice(
        &self,
        endpoint: &str,
        room_id: &str,
        text: &str,
    ) -> Result<Option<String>, DispatchError> {
        let link_id = self.link_id(endpoint, room_id).await;
        let link_id = link_id.as_deref();
        let board = &self.inner.board;
        self.with_board_auth(endpoint, &RetryPolicy::none(), move |auth| async move {
            board.create_notice(&auth, room_id, text, link_id).await
        })
        .await
    }

    pub async fn update_notice(
        &self,
        endpoint: &str,
        room_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<(), DispatchError> {
        let link_id = self.link_id(endpoint, room_id).await;
        let link_id = link_id.as_deref();
        let board = &self.inner.board;
        self.with_board_auth(endpoint, &RetryPolicy::none(), move |auth| async move {
            board.update_notice(&auth, post_id, text, link_id).await
        })
        .await
    }

    pub async fn delete_post(
        &self,
        endpoint: &str,
        room_id: &str,
        post_id: &str,
    ) -> Result<(), DispatchError> {
        let link_id = self.link_id(endpoint, room_id).await;
        let link_id = link_id.as_deref();
        let board = &self.inner.board;
        self.with_board_auth(endpoint, &RetryPolicy::none(), move |auth| async move {
            board.delete_post(&auth, post_id, link_id).await
        })
        .await
    }

    /// Create a poll on an open chat. A permission rejection is retried
    /// once with a refreshed credential, per `DispatchOptions::poll_retry`.
    pub async fn create_poll(
        &self,
        endpoint: &str,
        room_id: &str,
        poll: &PollSpec,
    ) -> Result<Option<String>, DispatchError> {
        let link_id = self
            .link_id(endpoint, room_id)
            .await
            .ok_or_else(|| DispatchError::invalid("polls are only available in open chats"))?;
        let link_id = link_id.as_str();
        let board = &self.inner.board;
        self.with_board_auth(endpoint, &self.inner.options.poll_retry, move |auth| async move {
            board.create_poll(&auth, room_id, link_id, poll).await
        })
        .await
    }

    /// Stop accepting background sends and wait for queued ones.
    pub async fn shutdown(&self) {
        self.inner.executor.shutdown().await;
    }

    async fn submit(&self, task: crate::executor::Task) -> Result<(), SubmitError> {
        self.inner.executor.submit(task).await.map_err(|e| {
            warn!("Background send rejected: {}", e);
            e
        })
    }

    async fn write(
        &self,
        endpoint: &str,
        message: &OutboundMessage,
    ) -> Result<DispatchResult, DispatchError> {
        let thread_id = message.validate()?;
        let credential = self.credential(endpoint, false).await?;

        let msg_id = message_id::generate(&credential.device_id, message_id::now_ms());
        let payload = WritePayload::new(message, thread_id, msg_id)?;
        debug!(msg_id, ?thread_id, "Sending message");

        let response = self
            .inner
            .http
            .post(&self.inner.options.write_url)
            .timeout(self.inner.options.send_timeout)
            .header("Authorization", credential.bearer())
            .header("Duuid", &credential.device_id)
            .header("User-Agent", WRITE_USER_AGENT)
            .json(&payload)
            .send()
            .await?;

        let text = check_status(response).await?;
        let body: Value = serde_json::from_str(&text)?;
        Ok(DispatchResult::from_body(body))
    }

    async fn post_reaction(
        &self,
        endpoint: &str,
        request: &ReactionRequest,
    ) -> Result<DispatchResult, DispatchError> {
        let payload = request.to_payload(message_id::now_ms())?;
        let credential = self.credential(endpoint, false).await?;

        let url = format!(
            "{}/messaging/chats/{}/bubble/reactions",
            self.inner.options.reaction_base_url.trim_end_matches('/'),
            request.room_id
        );
        debug!(?payload, "Sending reaction");

        let response = self
            .inner
            .http
            .post(&url)
            .timeout(self.inner.options.send_timeout)
            .header("Authorization", credential.session_authorization())
            .header("talk-agent", TALK_AGENT)
            .header("talk-language", "ko")
            .header("User-Agent", REACTION_USER_AGENT)
            .json(&payload)
            .send()
            .await?;

        let text = check_status(response).await?;
        // The reaction endpoint may answer with an empty body.
        Ok(match serde_json::from_str::<Value>(&text) {
            Ok(body) => DispatchResult::from_body(body),
            Err(_) => DispatchResult::from_body(Value::Null),
        })
    }

    /// Run a board operation with the session authorization, retrying once
    /// with a refreshed credential when `policy` matches the rejection.
    async fn with_board_auth<T, F, Fut>(
        &self,
        endpoint: &str,
        policy: &RetryPolicy,
        op: F,
    ) -> Result<T, DispatchError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, MoimError>>,
    {
        let credential = self.credential(endpoint, false).await?;
        let error = match op(credential.session_authorization()).await {
            Ok(value) => return Ok(value),
            Err(e) => DispatchError::from(e),
        };

        if !policy.applies_to(&error) {
            return Err(error);
        }

        warn!(
            "Board request rejected ({}), retrying with a fresh credential",
            error
        );
        tokio::time::sleep(policy.delay).await;
        let credential = self.credential(endpoint, true).await?;
        Ok(op(credential.session_authorization()).await?)
    }
}

/// Return the body of a 2xx response, or an `Api` error.
async fn check_status(response: Response) -> Result<String, DispatchError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(DispatchError::Api {
            status: status.as_u16(),
            message: text,
        });
    }
    Ok(text)
}

fn echoes_thread(body: &Value) -> bool {
    let Some(chat_log) = body.get("chatLog") else {
        return false;
    };
    let thread_present = chat_log.get("threadId").is_some_and(|t| !t.is_null());
    let scope_is_thread = match chat_log.get("scope") {
        Some(Value::Number(n)) => n.as_i64() == Some(i64::from(THREAD_SCOPE)),
        Some(Value::String(s)) => s == "3",
        _ => false,
    };
    thread_present && scope_is_thread
}
