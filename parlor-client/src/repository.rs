use async_trait::async_trait;
use shared::models::{
    ConversationSummary, MemberRecord, MessageRecord, RegisterPayload, SendGroupPayload,
    SendPrivatePayload, SendReceipt, User, UserId,
};

use crate::error::ChatResult;

/// Backend routes, relative to the configured API URL.
pub mod routes {
    pub const LOGIN: &str = "/user/login";
    pub const REGISTER: &str = "/user/create";
    pub const USERS: &str = "/user/getByCriteria";
    pub const CONVERSATIONS: &str = "/conversation/getByCriteria";
    pub const CREATE_GROUP: &str = "/conversation/create";
    pub const EXPORT_ONE: &str = "/conversation/export";
    pub const EXPORT_ALL: &str = "/conversation/export/all";
    pub const DOWNLOAD: &str = "/conversation/download";
    pub const DOWNLOAD_ZIP: &str = "/conversation/download/zip";
    pub const SEND_PRIVATE: &str = "/message/private/send";
    pub const SEND_GROUP: &str = "/message/group/send";
    pub const MESSAGES: &str = "/message/getByCriteria";
    pub const UPLOAD_IMAGE: &str = "/message/upload-image";
    pub const DELETE_MESSAGE: &str = "/historiqueSuppressionMessage/deleteMessage";
    pub const ADD_MEMBER: &str = "/conversationUser/group/add";
    pub const REMOVE_MEMBER: &str = "/conversationUser/group/remove";
    pub const LEAVE_GROUP: &str = "/conversationUser/group/leave";
    pub const DELETE_CONVERSATION: &str = "/conversationUser/deleteConversation";
    pub const PROMOTE_ADMIN: &str = "/conversationUser/promoveToAdmin";
    pub const DEMOTE_ADMIN: &str = "/conversationUser/demoteFromAdmin";
    pub const MEMBERS: &str = "/conversationUser/getByCriteria";
}

/// Which download route serves an export file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Single conversation, plain text.
    Plain,
    /// Every conversation, zipped.
    Zip,
}

impl ExportKind {
    /// Route prefix of the download endpoint.
    #[must_use]
    pub fn route(self) -> &'static str {
        match self {
            Self::Plain => routes::DOWNLOAD,
            Self::Zip => routes::DOWNLOAD_ZIP,
        }
    }
}

/// Network collaborator of the chat core.
///
/// Every call resolves to a payload or a [`ChatError`](crate::ChatError);
/// nothing here touches the cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Looks up a user by login. `None` when the login is unknown.
    async fn login(&self, login: &str) -> ChatResult<Option<User>>;

    /// Creates an account and returns the stored user.
    async fn register(&self, payload: RegisterPayload) -> ChatResult<User>;

    /// Lists the user directory.
    async fn fetch_users(&self) -> ChatResult<Vec<User>>;

    /// Lists the conversations of `user_id`.
    async fn fetch_conversations(&self, user_id: UserId) -> ChatResult<Vec<ConversationSummary>>;

    /// Creates a group and returns its summary when the backend echoes it.
    async fn create_group(
        &self,
        title: &str,
        participant_ids: &[UserId],
    ) -> ChatResult<Option<ConversationSummary>>;

    /// Exports one conversation and returns the generated file name.
    async fn export_conversation(&self, conversation_id: i64) -> ChatResult<String>;

    /// Exports every conversation and returns the generated archive name.
    async fn export_all_conversations(&self) -> ChatResult<String>;

    /// Downloads a previously exported file.
    async fn download_export(&self, kind: ExportKind, file_name: &str) -> ChatResult<Vec<u8>>;

    /// Sends a private message, creating the conversation on first send.
    async fn send_private_message(&self, payload: SendPrivatePayload) -> ChatResult<SendReceipt>;

    /// Sends a message to a group.
    async fn send_group_message(&self, payload: SendGroupPayload) -> ChatResult<SendReceipt>;

    /// Lists the messages of a conversation, hidden ones included.
    async fn fetch_messages(&self, conversation_id: i64) -> ChatResult<Vec<MessageRecord>>;

    /// Uploads an image and returns its public URL.
    async fn upload_image(&self, file_name: String, bytes: Vec<u8>) -> ChatResult<String>;

    /// Hides a message for the current user.
    async fn delete_message(&self, message_id: i64) -> ChatResult<()>;

    /// Adds `user_id` to a group.
    async fn add_member(&self, conversation_id: i64, user_id: UserId) -> ChatResult<()>;

    /// Removes `user_id` from a group.
    async fn remove_member(&self, conversation_id: i64, user_id: UserId) -> ChatResult<()>;

    /// Leaves a group.
    async fn leave_group(&self, conversation_id: i64) -> ChatResult<()>;

    /// Hides a conversation for the current user.
    async fn delete_conversation(&self, conversation_id: i64) -> ChatResult<()>;

    /// Grants admin rights to `user_id`.
    async fn promote_admin(&self, conversation_id: i64, user_id: UserId) -> ChatResult<()>;

    /// Revokes admin rights from `user_id`.
    async fn demote_admin(&self, conversation_id: i64, user_id: UserId) -> ChatResult<()>;

    /// Lists the membership entries of a conversation.
    async fn fetch_members(&self, conversation_id: i64) -> ChatResult<Vec<MemberRecord>>;
}
