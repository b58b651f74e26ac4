use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::auth::AuthError;
use crate::bus::BusError;

/// 应用层统一错误。
///
/// 错误分级对应协议行为：授权/校验错误只回给调用方且无副作用，
/// 基础设施错误作为错误事件上报但从不导致连接关闭（握手失败除外）。
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BusError),
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
    #[error("authorization failed")]
    Authorization,
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }

    /// 稳定的错误码，用于出站 error 事件和 HTTP 响应体。
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::Domain(DomainError::InvalidArgument { .. }) => "VALIDATION_ERROR",
            ApplicationError::Domain(DomainError::RoomNotFound)
            | ApplicationError::Domain(DomainError::MessageNotFound) => "NOT_FOUND",
            ApplicationError::Domain(DomainError::NotRoomParticipant)
            | ApplicationError::Authorization => "AUTHORIZATION_ERROR",
            ApplicationError::Domain(_) => "VALIDATION_ERROR",
            ApplicationError::Repository(RepositoryError::NotFound) => "NOT_FOUND",
            ApplicationError::Repository(_) => "INFRASTRUCTURE_ERROR",
            ApplicationError::Broadcast(_) => "INFRASTRUCTURE_ERROR",
            ApplicationError::Authentication(_) => "AUTHENTICATION_ERROR",
            ApplicationError::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
