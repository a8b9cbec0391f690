//! Explicit session context.
//!
//! Created at app start, changed only through named setters and torn down
//! at logout. Nothing here is global.

use crate::model::meeting::Meeting;
use crate::store::CallContext;
use log::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    bearer_token: Option<String>,
    current_meeting: Option<Meeting>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bearer_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.bearer_token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        info!(
            "event=session_token module=session status=ok authenticated={}",
            self.bearer_token.is_some()
        );
    }

    pub fn set_current_meeting(&mut self, meeting: Option<Meeting>) {
        self.current_meeting = meeting;
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn current_meeting(&self) -> Option<&Meeting> {
        self.current_meeting.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer_token.is_some()
    }

    /// Per-call context for record store requests.
    pub fn call_context(&self) -> CallContext<'_> {
        CallContext {
            bearer_token: self.bearer_token(),
        }
    }

    /// Drops the token and meeting.
    pub fn teardown(&mut self) {
        self.bearer_token = None;
        self.current_meeting = None;
        info!("event=session_teardown module=session status=ok");
    }
}
