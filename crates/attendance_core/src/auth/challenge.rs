//! Challenge, credential and pending-mutation types.

use crate::cart::batch_cart::{CartSnapshot, StagedId};
use crate::model::entry::{Entry, EntryKind, EntryPatch, StoredRecord};
use crate::undo::snapshot_store::{ComponentId, UndoSnapshot};
use chrono::{DateTime, Local};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use uuid::Uuid;

const PIN_LENGTH: usize = 4;

/// Credential kind required to authorize a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeKind {
    /// Four-digit PIN verified by the record store.
    ShortPin,
    /// Admin username and password, authenticated by the store at call time.
    AdminCredential,
}

impl ChallengeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortPin => "short_pin",
            Self::AdminCredential => "admin_credential",
        }
    }
}

impl Display for ChallengeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Challenge lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeState {
    Idle,
    Pending,
    Verified,
    Rejected,
}

/// Four ASCII digits.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub fn parse(value: &str) -> Result<Self, CredentialFormatError> {
        if value.len() == PIN_LENGTH && value.bytes().all(|byte| byte.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(CredentialFormatError::MalformedPin)
        }
    }

    /// Raw PIN for the wire. Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Pin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pin(****)")
    }
}

/// Admin username and password.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredential {
    username: String,
    password: String,
}

impl AdminCredential {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialFormatError> {
        let username = username.into().trim().to_string();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(CredentialFormatError::MalformedAdminCredential);
        }
        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Raw password for the wire. Never log the result.
    pub fn expose_password(&self) -> &str {
        &self.password
    }
}

impl Debug for AdminCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Local credential format errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFormatError {
    MalformedPin,
    MalformedAdminCredential,
}

impl Display for CredentialFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPin => write!(f, "PIN must be exactly 4 digits"),
            Self::MalformedAdminCredential => {
                write!(f, "admin username and password are required")
            }
        }
    }
}

impl Error for CredentialFormatError {}

/// User-supplied answer to an open challenge.
#[derive(Clone)]
pub enum ChallengeResponse {
    Pin(String),
    Admin { username: String, password: String },
}

impl ChallengeResponse {
    pub fn pin(value: impl Into<String>) -> Self {
        Self::Pin(value.into())
    }

    pub fn admin(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Admin {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn kind(&self) -> ChallengeKind {
        match self {
            Self::Pin(_) => ChallengeKind::ShortPin,
            Self::Admin { .. } => ChallengeKind::AdminCredential,
        }
    }
}

impl Debug for ChallengeResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pin(_) => f.write_str("ChallengeResponse::Pin(****)"),
            Self::Admin { username, .. } => f
                .debug_struct("ChallengeResponse::Admin")
                .field("username", username)
                .field("password", &"****")
                .finish(),
        }
    }
}

/// Credential carried by a verified challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeCredential {
    Pin(Pin),
    Admin(AdminCredential),
}

/// Where a create payload came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateSource {
    Cart { staged_ids: Vec<StagedId> },
    Restore { origin: ComponentId },
}

/// Mutation action with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationAction {
    Create {
        kind: EntryKind,
        entries: Vec<Entry>,
        source: CreateSource,
    },
    Edit {
        record: StoredRecord,
        patch: EntryPatch,
    },
    Delete {
        record: StoredRecord,
        origin: ComponentId,
    },
    ClearAll,
}

impl MutationAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create {
                source: CreateSource::Restore { .. },
                ..
            } => "restore",
            Self::Create { .. } => "create",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "delete",
            Self::ClearAll => "clear_all",
        }
    }
}

/// Mutation bound to a challenge.
///
/// The required challenge kind is derived from the action when the
/// mutation is built and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    action: MutationAction,
    required: ChallengeKind,
}

impl PendingMutation {
    fn new(action: MutationAction) -> Self {
        let required = match &action {
            MutationAction::Create { .. } => ChallengeKind::AdminCredential,
            MutationAction::Edit { .. }
            | MutationAction::Delete { .. }
            | MutationAction::ClearAll => ChallengeKind::ShortPin,
        };
        Self { action, required }
    }

    /// Bulk create of every entry in a cart snapshot.
    pub fn create_from_cart(snapshot: CartSnapshot) -> Self {
        Self::new(MutationAction::Create {
            kind: snapshot.kind,
            entries: snapshot.entries,
            source: CreateSource::Cart {
                staged_ids: snapshot.staged_ids,
            },
        })
    }

    /// Replay of a deleted record through the create path.
    pub fn restore(snapshot: &UndoSnapshot) -> Self {
        Self::new(MutationAction::Create {
            kind: snapshot.record.kind(),
            entries: vec![snapshot.record.entry.clone()],
            source: CreateSource::Restore {
                origin: snapshot.origin.clone(),
            },
        })
    }

    pub fn edit(record: StoredRecord, patch: EntryPatch) -> Self {
        Self::new(MutationAction::Edit { record, patch })
    }

    pub fn delete(record: StoredRecord, origin: ComponentId) -> Self {
        Self::new(MutationAction::Delete { record, origin })
    }

    pub fn clear_all() -> Self {
        Self::new(MutationAction::ClearAll)
    }

    pub fn action(&self) -> &MutationAction {
        &self.action
    }

    pub fn required_challenge_kind(&self) -> ChallengeKind {
        self.required
    }
}

/// Identifier of one challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChallengeId(pub Uuid);

impl Display for ChallengeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Challenge bound to one pending mutation.
///
/// Only [`crate::auth::gate::AuthorizationGate`] creates challenges and
/// moves them to `Verified`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    id: ChallengeId,
    kind: ChallengeKind,
    mutation: PendingMutation,
    state: ChallengeState,
    opened_at: DateTime<Local>,
    credential: Option<ChallengeCredential>,
}

impl AuthChallenge {
    pub(crate) fn open(mutation: PendingMutation, opened_at: DateTime<Local>) -> Self {
        Self {
            id: ChallengeId(Uuid::new_v4()),
            kind: mutation.required_challenge_kind(),
            mutation,
            state: ChallengeState::Pending,
            opened_at,
            credential: None,
        }
    }

    pub(crate) fn verified(mut self, credential: ChallengeCredential) -> Self {
        self.state = ChallengeState::Verified;
        self.credential = Some(credential);
        self
    }

    pub(crate) fn rejected(mut self) -> Self {
        self.state = ChallengeState::Rejected;
        self.credential = None;
        self
    }

    pub fn id(&self) -> ChallengeId {
        self.id
    }

    pub fn kind(&self) -> ChallengeKind {
        self.kind
    }

    pub fn mutation(&self) -> &PendingMutation {
        &self.mutation
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    pub fn opened_at(&self) -> DateTime<Local> {
        self.opened_at
    }

    pub fn is_verified(&self) -> bool {
        self.state == ChallengeState::Verified && self.credential.is_some()
    }

    pub(crate) fn credential(&self) -> Option<&ChallengeCredential> {
        self.credential.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{AdminCredential, ChallengeKind, ChallengeResponse, CredentialFormatError, Pin, PendingMutation};

    #[test]
    fn pin_requires_four_ascii_digits() {
        assert!(Pin::parse("0042").is_ok());
        assert_eq!(Pin::parse("042"), Err(CredentialFormatError::MalformedPin));
        assert_eq!(Pin::parse("04a2"), Err(CredentialFormatError::MalformedPin));
        assert_eq!(Pin::parse("٠١٢٣"), Err(CredentialFormatError::MalformedPin));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let pin = Pin::parse("1234").expect("valid pin");
        assert!(!format!("{pin:?}").contains("1234"));

        let admin = AdminCredential::new("admin", "S3cret!x").expect("valid credential");
        let rendered = format!("{admin:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("S3cret!x"));

        let response = ChallengeResponse::admin("admin", "S3cret!x");
        assert!(!format!("{response:?}").contains("S3cret!x"));
    }

    #[test]
    fn admin_credential_requires_both_parts() {
        assert_eq!(
            AdminCredential::new("  ", "pw"),
            Err(CredentialFormatError::MalformedAdminCredential)
        );
        assert_eq!(
            AdminCredential::new("admin", ""),
            Err(CredentialFormatError::MalformedAdminCredential)
        );
    }

    #[test]
    fn clear_all_requires_short_pin() {
        assert_eq!(
            PendingMutation::clear_all().required_challenge_kind(),
            ChallengeKind::ShortPin
        );
    }
}
