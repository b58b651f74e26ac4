use async_trait::async_trait;
use domain::UserId;
use thiserror::Error;

/// 身份认证错误。握手失败是唯一允许关闭连接的错误。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// 外部身份协作方。
///
/// 消息核心把返回的身份当作不透明且权威的值，
/// 令牌的签发和用户生命周期完全在本系统之外。
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError>;
}
