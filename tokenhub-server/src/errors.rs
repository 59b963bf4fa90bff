use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokenhub_core::listing::ExportError;
use tokenhub_store::{GatewayError, GeneratorError, SettingsError, StoreError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Validation(String),
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("You are not allowed to do that")]
    Forbidden,
    #[error("{0}")]
    Remote(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidCredentials(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Remote(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a failed backend call, keeping `message` as the user facing text
    fn from_gateway(error: GatewayError, message: String) -> Self {
        match error {
            GatewayError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            GatewayError::NotAuthorized(_) => Self::Forbidden,
            GatewayError::Validation(_) => Self::Validation(message),
            GatewayError::Network(_) | GatewayError::Parse(_) => Self::Remote(message),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(value: StoreError) -> Self {
        let message = value.to_string();

        match value {
            StoreError::InvalidCredentials(message) => Self::InvalidCredentials(message),
            StoreError::SignupFailed(_) => Self::BadRequest(message),
            StoreError::NotAuthenticated => Self::NotAuthenticated,
            StoreError::NotPermitted => Self::Forbidden,
            StoreError::Validation(_) => Self::Validation(message),
            StoreError::ProfileFetchFailed(e)
            | StoreError::RequestCreateFailed(e)
            | StoreError::RequestUpdateFailed(e)
            | StoreError::ApprovalFailed(e)
            | StoreError::RejectionFailed(e)
            | StoreError::TransferFailed(e)
            | StoreError::ProfileUpdateFailed(e)
            | StoreError::PasswordUpdateFailed(e)
            | StoreError::Remote(e) => Self::from_gateway(e, message),
        }
    }
}

impl From<SettingsError> for ServerError {
    fn from(value: SettingsError) -> Self {
        let message = value.to_string();

        match value {
            SettingsError::LoadFailed(e) => Self::from_gateway(e, message),
            SettingsError::UpdateFailed { source, .. } => Self::from_gateway(source, message),
            SettingsError::Negative { .. } | SettingsError::TooLarge { .. } => {
                Self::Validation(message)
            }
        }
    }
}

impl From<GeneratorError> for ServerError {
    fn from(value: GeneratorError) -> Self {
        let message = value.to_string();

        match value {
            GeneratorError::Validation(_) => Self::Validation(message),
            GeneratorError::NotConfigured => Self::Unavailable(message),
            GeneratorError::GenerationFailed => Self::Remote(message),
        }
    }
}

impl From<ExportError> for ServerError {
    fn from(value: ExportError) -> Self {
        Self::Unknown(value.to_string())
    }
}

#[cfg(test)]
mod test {
    use tokenhub_core::ValidationError;

    use super::*;

    #[test]
    fn test_store_errors() {
        let error: ServerError =
            StoreError::Validation(ValidationError::BelowMinimumBalance { minimum_balance: 20 })
                .into();

        assert_eq!(error.as_status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            error.to_string(),
            "You must maintain a minimum balance of 20 tokens"
        );

        let error: ServerError = StoreError::TransferFailed(GatewayError::Validation(
            "Insufficient balance".to_string(),
        ))
        .into();

        assert_eq!(error.as_status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.to_string(), "Insufficient balance");

        let error: ServerError =
            StoreError::ApprovalFailed(GatewayError::Network("timed out".to_string())).into();

        assert_eq!(error.as_status_code(), StatusCode::BAD_GATEWAY);

        let error: ServerError = StoreError::NotAuthenticated.into();
        assert_eq!(error.as_status_code(), StatusCode::UNAUTHORIZED);
    }
}
