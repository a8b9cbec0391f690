//! Engine-level error taxonomy surfaced by [`crate::service::record_service::RecordService`].

use crate::auth::challenge::ChallengeKind;
use crate::auth::gate::GateError;
use crate::cart::batch_cart::CartError;
use crate::executor::mutation_executor::ExecutorError;
use crate::model::entry::RecordId;
use crate::repo::local_state_repo::RepoError;
use crate::store::StoreError;
use crate::validate::rules::{CandidateError, ConflictError, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug)]
pub enum EngineError {
    /// Local field or rule failure; nothing was sent.
    Validation(ValidationError),
    /// Local optimistic duplicate or capacity check; nothing was sent.
    Conflict(ConflictError),
    /// Authoritative rejection, store text verbatim.
    ServerRejected { status: u16, message: String },
    /// Invalid PIN or admin credential.
    Auth(String),
    RateLimited,
    /// Transport failure; no state changed.
    Network(String),
    /// Executor called without a matching verified challenge.
    UnauthorizedInvocation { requested: &'static str },
    Cart(CartError),
    /// Gate refusal other than a credential outcome (outstanding, expired,
    /// malformed input, no pending challenge).
    Gate(GateError),
    RecordNotFound(RecordId),
    InvalidResponse(String),
    LocalState(RepoError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict(err) => write!(f, "{err}"),
            Self::ServerRejected { message, .. } => write!(f, "{message}"),
            Self::Auth(message) => write!(f, "{message}"),
            Self::RateLimited => write!(f, "too many attempts, please wait before retrying"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::UnauthorizedInvocation { requested } => {
                write!(f, "unauthorized invocation of `{requested}`")
            }
            Self::Cart(err) => write!(f, "{err}"),
            Self::Gate(err) => write!(f, "{err}"),
            Self::RecordNotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidResponse(message) => write!(f, "invalid store response: {message}"),
            Self::LocalState(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Conflict(err) => Some(err),
            Self::Cart(err) => Some(err),
            Self::Gate(err) => Some(err),
            Self::LocalState(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ConflictError> for EngineError {
    fn from(value: ConflictError) -> Self {
        Self::Conflict(value)
    }
}

impl From<CandidateError> for EngineError {
    fn from(value: CandidateError) -> Self {
        match value {
            CandidateError::Validation(err) => Self::Validation(err),
            CandidateError::Conflict(err) => Self::Conflict(err),
        }
    }
}

impl From<CartError> for EngineError {
    fn from(value: CartError) -> Self {
        Self::Cart(value)
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        Self::LocalState(value)
    }
}

impl From<GateError> for EngineError {
    fn from(value: GateError) -> Self {
        match value {
            GateError::InvalidCredential {
                kind: ChallengeKind::ShortPin,
            } => Self::Auth("Invalid PIN".to_string()),
            GateError::InvalidCredential {
                kind: ChallengeKind::AdminCredential,
            } => Self::Auth("Invalid admin credentials".to_string()),
            GateError::RateLimited => Self::RateLimited,
            GateError::Network(message) => Self::Network(message),
            other => Self::Gate(other),
        }
    }
}

impl From<ExecutorError> for EngineError {
    fn from(value: ExecutorError) -> Self {
        match value {
            ExecutorError::UnauthorizedInvocation { requested, .. } => {
                Self::UnauthorizedInvocation { requested }
            }
            ExecutorError::Network(message) => Self::Network(message),
            ExecutorError::ServerRejected { status, message } => {
                Self::ServerRejected { status, message }
            }
            ExecutorError::AuthRejected { message, .. } => Self::Auth(message),
            ExecutorError::RateLimited => Self::RateLimited,
            ExecutorError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Network(message) => Self::Network(message),
            StoreError::Rejected { status, message } => Self::ServerRejected { status, message },
            StoreError::Unauthorized { message, .. } => Self::Auth(message),
            StoreError::RateLimited => Self::RateLimited,
            StoreError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }
}
