use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, multipart};
use serde::{Serialize, de::DeserializeOwned};
use shared::{
    config::ClientConfig,
    models::{
        ApiRequest, ApiResponse, ConversationCriteria, ConversationKey, ConversationScope,
        ConversationSummary, CreateGroupPayload, DeleteMessagePayload, EmptyCriteria, LoginPayload,
        MemberPayload, MemberRecord, MessageRecord, RegisterPayload, SendGroupPayload,
        SendPrivatePayload, SendReceipt, UploadReceipt, User, UserId,
    },
};
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{ChatError, ChatResult},
    repository::{ChatRepository, ExportKind, routes},
};

const LANG_HEADER: &str = "lang";
const USER_AGENT: &str = "parlor-cli";
const GENERIC_FAILURE: &str = "The server rejected the request";
const LOGIN_IN_USE: &str = "This login is already in use";

/// REST implementation of [`ChatRepository`].
///
/// Wraps every call in the backend envelope and maps failures onto
/// [`ChatError`].
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: Client,
    lang: String,
    page_size: u32,
    system_user_id: UserId,
    current_user: Arc<Mutex<Option<UserId>>>,
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("lang", &self.lang)
            .field("current_user", &self.current_user())
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a gateway from the client configuration.
    ///
    /// # Errors
    /// Returns [`ChatError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| ChatError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Create a gateway around an existing HTTP client.
    #[must_use]
    pub fn with_client(config: &ClientConfig, client: Client) -> Self {
        Self {
            base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
            client,
            lang: config.lang.clone(),
            page_size: config.page_size,
            system_user_id: config.system_user_id,
            current_user: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the user placed in the envelope of authenticated calls.
    pub fn set_current_user(&self, user: Option<UserId>) {
        *self
            .current_user
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// The user placed in the envelope of authenticated calls.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        *self
            .current_user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Envelope for a call made on behalf of the current user.
    fn envelope<P>(&self) -> ApiRequest<P> {
        ApiRequest::new(self.current_user()).page(0, self.page_size)
    }

    /// Envelope for login and registration.
    fn system_envelope<P>(&self) -> ApiRequest<P> {
        ApiRequest::new(Some(self.system_user_id)).simple_loading()
    }

    async fn post<P, T>(&self, route: &str, request: &ApiRequest<P>) -> ChatResult<ApiResponse<T>>
    where
        P: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let url = self.api_url(route);
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .header(LANG_HEADER, &self.lang)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                warn!(route, error = %err, "request failed");
                ChatError::from(err)
            })?;

        let response = Self::check_status(route, response).await?;
        let body: ApiResponse<T> = response.json().await?;
        Self::check_envelope(route, body)
    }

    async fn check_status(route: &str, response: Response) -> ChatResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(route, status = status.as_u16(), "non-success response");

        let server_message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(String::from))
            .filter(|message| !message.trim().is_empty());
        if let Some(message) = server_message {
            return Err(ChatError::Application {
                message,
                code: Some(status.as_u16().to_string()),
            });
        }

        if route == routes::REGISTER
            && matches!(status, StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY)
        {
            return Err(ChatError::Application {
                message: LOGIN_IN_USE.to_string(),
                code: Some(status.as_u16().to_string()),
            });
        }

        Err(ChatError::from_status(status))
    }

    fn check_envelope<T>(route: &str, body: ApiResponse<T>) -> ChatResult<ApiResponse<T>> {
        if !body.has_error {
            return Ok(body);
        }
        let message = body.error_message(GENERIC_FAILURE);
        warn!(route, %message, "application error");
        Err(ChatError::Application {
            message,
            code: body.status.as_ref().and_then(|status| status.code_text()),
        })
    }

    async fn command<P>(&self, route: &str, payload: P) -> ChatResult<()>
    where
        P: Serialize + Send + Sync,
    {
        let request = self.envelope().with_datas(vec![payload]);
        self.post::<P, serde_json::Value>(route, &request).await?;
        Ok(())
    }

    async fn export(&self, route: &str, request: &ApiRequest<ConversationKey>) -> ChatResult<String> {
        let response: ApiResponse<serde_json::Value> = self.post(route, request).await?;
        Ok(Self::export_file_name(&response))
    }

    /// Name of the generated export. Empty when the backend produced none,
    /// which callers report as an application error.
    fn export_file_name(response: &ApiResponse<serde_json::Value>) -> String {
        response
            .file_name
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    /// Download URL of an export, with the file name percent-encoded as a
    /// single path segment.
    fn download_url(&self, kind: ExportKind, file_name: &str) -> ChatResult<Url> {
        let mut url = Url::parse(&self.api_url(kind.route()))
            .map_err(|err| ChatError::Transport(format!("invalid download URL: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| ChatError::Transport("API URL cannot carry a path".to_string()))?
            .push(file_name);
        Ok(url)
    }
}

#[async_trait]
impl ChatRepository for HttpGateway {
    async fn login(&self, login: &str) -> ChatResult<Option<User>> {
        let request = self.system_envelope().with_datas(vec![LoginPayload {
            login: login.to_string(),
        }]);
        let response: ApiResponse<User> = self.post(routes::LOGIN, &request).await?;
        Ok(response.into_items().into_iter().next())
    }

    async fn register(&self, payload: RegisterPayload) -> ChatResult<User> {
        let request = self.system_envelope().with_datas(vec![payload]);
        let response: ApiResponse<User> = self.post(routes::REGISTER, &request).await?;
        response
            .into_items()
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::application("Account creation returned no user"))
    }

    async fn fetch_users(&self) -> ChatResult<Vec<User>> {
        let request = self.envelope().with_data(EmptyCriteria {});
        let response: ApiResponse<User> = self.post(routes::USERS, &request).await?;
        Ok(response.into_items())
    }

    async fn fetch_conversations(&self, user_id: UserId) -> ChatResult<Vec<ConversationSummary>> {
        let request = self.envelope().with_data(ConversationCriteria { user_id });
        let response: ApiResponse<ConversationSummary> =
            self.post(routes::CONVERSATIONS, &request).await?;
        Ok(response.into_items())
    }

    async fn create_group(
        &self,
        title: &str,
        participant_ids: &[UserId],
    ) -> ChatResult<Option<ConversationSummary>> {
        let request = self.envelope().with_datas(vec![CreateGroupPayload {
            title: title.to_string(),
            participant_ids: participant_ids.to_vec(),
        }]);
        let response: ApiResponse<ConversationSummary> =
            self.post(routes::CREATE_GROUP, &request).await?;
        Ok(response.into_items().into_iter().next())
    }

    async fn export_conversation(&self, conversation_id: i64) -> ChatResult<String> {
        let request = self
            .envelope()
            .with_datas(vec![ConversationKey { id: conversation_id }]);
        self.export(routes::EXPORT_ONE, &request).await
    }

    async fn export_all_conversations(&self) -> ChatResult<String> {
        self.export(routes::EXPORT_ALL, &self.envelope()).await
    }

    async fn download_export(&self, kind: ExportKind, file_name: &str) -> ChatResult<Vec<u8>> {
        let url = self.download_url(kind, file_name)?;
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .header(LANG_HEADER, &self.lang)
            .send()
            .await?;
        let response = Self::check_status(kind.route(), response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn send_private_message(&self, payload: SendPrivatePayload) -> ChatResult<SendReceipt> {
        let request = self.envelope().with_datas(vec![payload]);
        let response: ApiResponse<SendReceipt> = self.post(routes::SEND_PRIVATE, &request).await?;
        Ok(response.into_items().into_iter().next().unwrap_or_default())
    }

    async fn send_group_message(&self, payload: SendGroupPayload) -> ChatResult<SendReceipt> {
        let request = self.envelope().with_datas(vec![payload]);
        let response: ApiResponse<SendReceipt> = self.post(routes::SEND_GROUP, &request).await?;
        Ok(response.into_items().into_iter().next().unwrap_or_default())
    }

    async fn fetch_messages(&self, conversation_id: i64) -> ChatResult<Vec<MessageRecord>> {
        let request = self.envelope().with_data(ConversationScope { conversation_id });
        let response: ApiResponse<MessageRecord> = self.post(routes::MESSAGES, &request).await?;
        Ok(response.into_items())
    }

    async fn upload_image(&self, file_name: String, bytes: Vec<u8>) -> ChatResult<String> {
        let url = self.api_url(routes::UPLOAD_IMAGE);
        debug!(%url, %file_name, size = bytes.len(), "POST multipart");
        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(&url)
            .header(LANG_HEADER, &self.lang)
            .multipart(form)
            .send()
            .await?;
        let response = Self::check_status(routes::UPLOAD_IMAGE, response).await?;
        let body: ApiResponse<UploadReceipt> = response.json().await?;
        let body = Self::check_envelope(routes::UPLOAD_IMAGE, body)?;
        body.into_items()
            .into_iter()
            .find_map(|receipt| receipt.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ChatError::application("Image upload returned no URL"))
    }

    async fn delete_message(&self, message_id: i64) -> ChatResult<()> {
        self.command(routes::DELETE_MESSAGE, DeleteMessagePayload { message_id })
            .await
    }

    async fn add_member(&self, conversation_id: i64, user_id: UserId) -> ChatResult<()> {
        self.command(
            routes::ADD_MEMBER,
            MemberPayload {
                conversation_id,
                user_id,
            },
        )
        .await
    }

    async fn remove_member(&self, conversation_id: i64, user_id: UserId) -> ChatResult<()> {
        self.command(
            routes::REMOVE_MEMBER,
            MemberPayload {
                conversation_id,
                user_id,
            },
        )
        .await
    }

    async fn leave_group(&self, conversation_id: i64) -> ChatResult<()> {
        self.command(routes::LEAVE_GROUP, ConversationScope { conversation_id })
            .await
    }

    async fn delete_conversation(&self, conversation_id: i64) -> ChatResult<()> {
        self.command(
            routes::DELETE_CONVERSATION,
            ConversationScope { conversation_id },
        )
        .await
    }

    async fn promote_admin(&self, conversation_id: i64, user_id: UserId) -> ChatResult<()> {
        self.command(
            routes::PROMOTE_ADMIN,
            MemberPayload {
                conversation_id,
                user_id,
            },
        )
        .await
    }

    async fn demote_admin(&self, conversation_id: i64, user_id: UserId) -> ChatResult<()> {
        self.command(
            routes::DEMOTE_ADMIN,
            MemberPayload {
                conversation_id,
                user_id,
            },
        )
        .await
    }

    async fn fetch_members(&self, conversation_id: i64) -> ChatResult<Vec<MemberRecord>> {
        let request = self.envelope().with_data(ConversationScope { conversation_id });
        let response: ApiResponse<MemberRecord> = self.post(routes::MEMBERS, &request).await?;
        Ok(response.into_items())
    }
}
