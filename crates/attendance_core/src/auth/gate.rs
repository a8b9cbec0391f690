//! Single-slot authorization gate.
//!
//! # Responsibility
//! - Open one challenge per pending mutation and bind the mutation to it.
//! - Verify the user's response and hand out a `Verified` challenge.
//!
//! # Invariants
//! - At most one challenge is outstanding; a second `open` is refused.
//! - A pending challenge expires after the configured TTL. Expiry is checked
//!   on every gate call and never touches a challenge already verified.
//! - Invalid credentials and rate limits abort the challenge (back to Idle).
//!   Malformed input and transport failures leave it pending.
//! - No credential is stored anywhere except on the returned verified
//!   challenge.

use crate::auth::challenge::{
    AdminCredential, AuthChallenge, ChallengeCredential, ChallengeId, ChallengeKind,
    ChallengeResponse, ChallengeState, CredentialFormatError, PendingMutation, Pin,
};
use crate::clock::SharedClock;
use crate::store::{PinVerifier, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GateResult<T> = Result<T, GateError>;

/// Gate operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    ChallengeOutstanding { id: ChallengeId },
    NoPendingChallenge,
    Expired { id: ChallengeId },
    MalformedCredential(CredentialFormatError),
    ResponseKindMismatch { expected: ChallengeKind },
    InvalidCredential { kind: ChallengeKind },
    RateLimited,
    Network(String),
    Verification(StoreError),
}

impl Display for GateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChallengeOutstanding { id } => {
                write!(f, "another authorization is already pending (challenge {id})")
            }
            Self::NoPendingChallenge => write!(f, "no authorization is pending"),
            Self::Expired { id } => write!(f, "authorization challenge {id} expired"),
            Self::MalformedCredential(err) => write!(f, "{err}"),
            Self::ResponseKindMismatch { expected } => {
                write!(f, "this action requires a {expected} response")
            }
            Self::InvalidCredential { kind: ChallengeKind::ShortPin } => write!(f, "invalid PIN"),
            Self::InvalidCredential {
                kind: ChallengeKind::AdminCredential,
            } => write!(f, "invalid admin credentials"),
            Self::RateLimited => write!(f, "too many attempts, please wait before retrying"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Verification(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedCredential(err) => Some(err),
            Self::Verification(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CredentialFormatError> for GateError {
    fn from(value: CredentialFormatError) -> Self {
        Self::MalformedCredential(value)
    }
}

/// Holds the one outstanding challenge.
pub struct AuthorizationGate {
    slot: Option<AuthChallenge>,
    ttl: chrono::Duration,
    clock: SharedClock,
}

impl AuthorizationGate {
    pub fn new(ttl: std::time::Duration, clock: SharedClock) -> Self {
        Self {
            slot: None,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
            clock,
        }
    }

    /// Current gate state.
    pub fn state(&mut self) -> ChallengeState {
        self.expire_if_due();
        self.slot
            .as_ref()
            .map_or(ChallengeState::Idle, AuthChallenge::state)
    }

    /// Outstanding challenge, if any.
    pub fn current(&mut self) -> Option<&AuthChallenge> {
        self.expire_if_due();
        self.slot.as_ref()
    }

    /// Opens a challenge bound to `mutation`.
    ///
    /// The returned value is a pending copy for presentation; the gate keeps
    /// the authoritative one.
    pub fn open(&mut self, mutation: PendingMutation) -> GateResult<AuthChallenge> {
        self.expire_if_due();
        if let Some(outstanding) = &self.slot {
            warn!(
                "event=challenge_open module=auth status=rejected reason=outstanding challenge_id={}",
                outstanding.id()
            );
            return Err(GateError::ChallengeOutstanding {
                id: outstanding.id(),
            });
        }

        let challenge = AuthChallenge::open(mutation, self.clock.now());
        info!(
            "event=challenge_open module=auth status=ok challenge_id={} kind={} action={}",
            challenge.id(),
            challenge.kind(),
            challenge.mutation().action().name()
        );
        self.slot = Some(challenge.clone());
        Ok(challenge)
    }

    /// Discards the pending challenge and returns its mutation untouched.
    pub fn cancel(&mut self) -> Option<PendingMutation> {
        let challenge = self.slot.take()?;
        info!(
            "event=challenge_cancel module=auth status=ok challenge_id={}",
            challenge.id()
        );
        Some(challenge.mutation().clone())
    }

    /// Moves an overdue pending challenge to Idle.
    ///
    /// Returns the expired challenge id, if one was dropped.
    pub fn expire_if_due(&mut self) -> Option<ChallengeId> {
        let due = self.slot.as_ref().is_some_and(|challenge| {
            challenge.state() == ChallengeState::Pending
                && self.clock.now() - challenge.opened_at() >= self.ttl
        });
        if !due {
            return None;
        }
        let expired = self.slot.take()?;
        warn!(
            "event=challenge_expire module=auth status=expired challenge_id={}",
            expired.id()
        );
        Some(expired.id())
    }

    /// Verifies `response` against the pending challenge.
    ///
    /// On success the gate returns to Idle and the caller owns the only
    /// `Verified` copy.
    pub fn verify(
        &mut self,
        response: ChallengeResponse,
        verifier: &dyn PinVerifier,
    ) -> GateResult<AuthChallenge> {
        if let Some(id) = self.expire_if_due() {
            return Err(GateError::Expired { id });
        }
        let (id, expected) = match &self.slot {
            Some(challenge) => (challenge.id(), challenge.kind()),
            None => return Err(GateError::NoPendingChallenge),
        };
        if response.kind() != expected {
            return Err(GateError::ResponseKindMismatch { expected });
        }

        let credential = match response {
            ChallengeResponse::Pin(raw) => {
                let pin = Pin::parse(&raw)?;
                match verifier.verify_pin(&pin) {
                    Ok(true) => ChallengeCredential::Pin(pin),
                    Ok(false) => return Err(self.reject(GateError::InvalidCredential { kind: expected })),
                    Err(StoreError::RateLimited) => return Err(self.reject(GateError::RateLimited)),
                    Err(StoreError::Network(message)) => {
                        warn!(
                            "event=challenge_verify module=auth status=error challenge_id={} error_code=network",
                            id
                        );
                        return Err(GateError::Network(message));
                    }
                    Err(other) => {
                        warn!(
                            "event=challenge_verify module=auth status=error challenge_id={} error_code=store",
                            id
                        );
                        return Err(GateError::Verification(other));
                    }
                }
            }
            ChallengeResponse::Admin { username, password } => {
                ChallengeCredential::Admin(AdminCredential::new(username, password)?)
            }
        };

        let challenge = match self.slot.take() {
            Some(challenge) => challenge.verified(credential),
            None => return Err(GateError::NoPendingChallenge),
        };
        info!(
            "event=challenge_verify module=auth status=ok challenge_id={} kind={}",
            challenge.id(),
            challenge.kind()
        );
        Ok(challenge)
    }

    fn reject(&mut self, error: GateError) -> GateError {
        if let Some(challenge) = self.slot.take() {
            let rejected = challenge.rejected();
            warn!(
                "event=challenge_verify module=auth status=rejected challenge_id={} kind={} state={:?} reason={}",
                rejected.id(),
                rejected.kind(),
                rejected.state(),
                match &error {
                    GateError::RateLimited => "rate_limited",
                    _ => "invalid_credential",
                }
            );
        }
        error
    }
}
