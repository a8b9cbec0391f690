//! Blocking REST client for the record store.
//!
//! # Responsibility
//! - Map [`RecordStore`] calls onto the `{base_url}/api/` endpoints.
//! - Classify responses through pure functions ([`classify_status`],
//!   [`classify_pin_verify`]) so the rules are testable without a server.
//!
//! # Invariants
//! - Logs carry operation names, counts, ids and durations only.
//! - A session bearer token is attached when the call context has one.

use super::wire::{
    ApologyPayload, ApologySubmission, AttendancePayload, MeetingRow, PatchPayload, PinBody,
    PinVerifyResponse, RecordRow,
};
use super::{CallContext, PinVerifier, RecordStore, StoreError, StoreResult};
use crate::auth::challenge::{AdminCredential, Pin};
use crate::model::entry::{ApologyEntry, AttendanceEntry, EntryKind, EntryPatch, RecordId, StoredRecord};
use crate::model::meeting::Meeting;
use log::{info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use std::time::{Duration, Instant};

const ADMIN_USERNAME_HEADER: &str = "X-Admin-Username";
const ADMIN_PASSWORD_HEADER: &str = "X-Admin-Password";

/// Record store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    base_url: String,
    client: Client,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Network(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn with_session(request: RequestBuilder, ctx: &CallContext<'_>) -> RequestBuilder {
        match ctx.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, op: &'static str, request: RequestBuilder) -> StoreResult<(u16, String)> {
        let started_at = Instant::now();
        let response = request.send().map_err(|err| {
            warn!(
                "event=store_call module=store status=error op={} duration_ms={} error_code=network",
                op,
                started_at.elapsed().as_millis()
            );
            StoreError::Network(err.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| StoreError::Network(err.to_string()))?;
        info!(
            "event=store_call module=store status=ok op={} http_status={} duration_ms={}",
            op,
            status,
            started_at.elapsed().as_millis()
        );
        Ok((status, body))
    }
}

fn record_path(action: &str, kind: EntryKind, id: RecordId) -> String {
    format!("{action}-{}/{}", kind.as_str(), id)
}

fn summary_path(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Attendance => "attendance-summary",
        EntryKind::Apology => "apology-summary",
    }
}

/// Extracts the store's message from an error body.
///
/// Prefers the JSON `error` or `detail` string, then the raw body, then a
/// generic `HTTP <status>` text.
pub fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "detail"] {
            if let Some(serde_json::Value::String(message)) = map.get(key) {
                return message.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

/// Classifies a mutation or read response.
pub fn classify_status(status: u16, body: &str) -> StoreResult<()> {
    match status {
        200..=299 => Ok(()),
        429 => Err(StoreError::RateLimited),
        401 | 403 => Err(StoreError::Unauthorized {
            status,
            message: extract_error_message(status, body),
        }),
        _ => Err(StoreError::Rejected {
            status,
            message: extract_error_message(status, body),
        }),
    }
}

/// Classifies a `pin/verify/` response into valid / invalid / error.
///
/// A body reporting `is_valid: false` is an invalid PIN whatever the
/// status, except 429 which is always a rate limit.
pub fn classify_pin_verify(status: u16, body: &str) -> StoreResult<bool> {
    if status == 429 {
        return Err(StoreError::RateLimited);
    }
    match serde_json::from_str::<PinVerifyResponse>(body) {
        Ok(parsed) if (200..=299).contains(&status) => Ok(parsed.is_valid),
        Ok(parsed) if !parsed.is_valid && matches!(status, 400 | 401 | 403) => Ok(false),
        Ok(_) | Err(_) if (200..=299).contains(&status) => Err(StoreError::InvalidResponse(
            "pin verification body is not valid JSON".to_string(),
        )),
        _ => classify_status(status, body).map(|()| false),
    }
}

impl PinVerifier for HttpRecordStore {
    fn verify_pin(&self, pin: &Pin) -> StoreResult<bool> {
        let request = self
            .client
            .post(self.url_for("pin/verify/"))
            .json(&PinBody { pin: pin.expose() });
        let (status, body) = self.send("verify_pin", request)?;
        classify_pin_verify(status, &body)
    }
}

impl RecordStore for HttpRecordStore {
    fn submit_attendance(
        &self,
        ctx: &CallContext<'_>,
        entries: &[AttendanceEntry],
        admin: &AdminCredential,
    ) -> StoreResult<()> {
        let payload: Vec<AttendancePayload<'_>> = entries.iter().map(AttendancePayload::from).collect();
        let request = self
            .client
            .post(self.url_for("submit-attendance"))
            .header(ADMIN_USERNAME_HEADER, admin.username())
            .header(ADMIN_PASSWORD_HEADER, admin.expose_password())
            .json(&payload);
        let (status, body) = self.send("submit_attendance", Self::with_session(request, ctx))?;
        classify_status(status, &body)
    }

    fn submit_apologies(
        &self,
        ctx: &CallContext<'_>,
        entries: &[ApologyEntry],
        admin: &AdminCredential,
    ) -> StoreResult<()> {
        let payload = ApologySubmission {
            apologies: entries.iter().map(ApologyPayload::from).collect(),
            admin_username: admin.username(),
            admin_password: admin.expose_password(),
        };
        let request = self
            .client
            .post(self.url_for("submit-apologies"))
            .json(&payload);
        let (status, body) = self.send("submit_apologies", Self::with_session(request, ctx))?;
        classify_status(status, &body)
    }

    fn edit_record(
        &self,
        ctx: &CallContext<'_>,
        kind: EntryKind,
        id: RecordId,
        patch: &EntryPatch,
    ) -> StoreResult<()> {
        let request = self
            .client
            .put(self.url_for(&record_path("edit", kind, id)))
            .json(&PatchPayload::for_kind(kind, patch));
        let (status, body) = self.send("edit_record", Self::with_session(request, ctx))?;
        classify_status(status, &body)
    }

    fn delete_record(
        &self,
        ctx: &CallContext<'_>,
        kind: EntryKind,
        id: RecordId,
        pin: &Pin,
    ) -> StoreResult<()> {
        let request = self
            .client
            .delete(self.url_for(&record_path("delete", kind, id)))
            .query(&[("pin", pin.expose())]);
        let (status, body) = self.send("delete_record", Self::with_session(request, ctx))?;
        classify_status(status, &body)
    }

    fn clear_all_data(&self, ctx: &CallContext<'_>, pin: &Pin) -> StoreResult<()> {
        let request = self
            .client
            .post(self.url_for("clear-all-data"))
            .json(&PinBody { pin: pin.expose() });
        let (status, body) = self.send("clear_all_data", Self::with_session(request, ctx))?;
        classify_status(status, &body)
    }

    fn fetch_records(&self, ctx: &CallContext<'_>, kind: EntryKind) -> StoreResult<Vec<StoredRecord>> {
        let request = self.client.get(self.url_for(summary_path(kind)));
        let (status, body) = self.send("fetch_records", Self::with_session(request, ctx))?;
        classify_status(status, &body)?;
        let rows: Vec<RecordRow> = serde_json::from_str(&body)
            .map_err(|err| StoreError::InvalidResponse(err.to_string()))?;
        rows.into_iter()
            .map(|row| row.into_stored(kind).map_err(StoreError::InvalidResponse))
            .collect()
    }

    fn current_meeting(&self, ctx: &CallContext<'_>) -> StoreResult<Option<Meeting>> {
        let request = self.client.get(self.url_for("current-meeting"));
        let (status, body) = self.send("current_meeting", Self::with_session(request, ctx))?;
        if status == 404 {
            return Ok(None);
        }
        classify_status(status, &body)?;
        let row: MeetingRow = serde_json::from_str(&body)
            .map_err(|err| StoreError::InvalidResponse(err.to_string()))?;
        Ok(Some(row.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_pin_verify, classify_status, extract_error_message, record_path};
    use crate::model::entry::{EntryKind, RecordId};
    use crate::store::StoreError;

    #[test]
    fn error_message_passes_store_text_through() {
        assert_eq!(
            extract_error_message(400, r#"{"error":"Jane Doe already submitted for this meeting."}"#),
            "Jane Doe already submitted for this meeting."
        );
        assert_eq!(
            extract_error_message(403, r#"{"detail":"Authentication credentials were not provided."}"#),
            "Authentication credentials were not provided."
        );
        assert_eq!(
            extract_error_message(400, r#"{"phone":["Phone number must contain only digits."]}"#),
            r#"{"phone":["Phone number must contain only digits."]}"#
        );
        assert_eq!(extract_error_message(502, "  "), "HTTP 502");
    }

    #[test]
    fn status_classification_separates_auth_and_rate_limit() {
        assert_eq!(classify_status(201, ""), Ok(()));
        assert_eq!(classify_status(429, ""), Err(StoreError::RateLimited));
        assert!(matches!(
            classify_status(401, r#"{"error":"bad admin"}"#),
            Err(StoreError::Unauthorized { status: 401, .. })
        ));
        assert_eq!(
            classify_status(404, r#"{"error":"Record not found or not authorized"}"#),
            Err(StoreError::Rejected {
                status: 404,
                message: "Record not found or not authorized".to_string(),
            })
        );
    }

    #[test]
    fn pin_verify_distinguishes_invalid_from_rate_limited() {
        assert_eq!(classify_pin_verify(200, r#"{"is_valid":true}"#), Ok(true));
        assert_eq!(classify_pin_verify(200, r#"{"is_valid":false}"#), Ok(false));
        assert_eq!(
            classify_pin_verify(400, r#"{"is_valid":false,"error":"Invalid PIN"}"#),
            Ok(false)
        );
        assert_eq!(
            classify_pin_verify(429, r#"{"is_valid":false}"#),
            Err(StoreError::RateLimited)
        );
        assert!(matches!(
            classify_pin_verify(200, "<html>"),
            Err(StoreError::InvalidResponse(_))
        ));
        assert!(matches!(
            classify_pin_verify(500, "boom"),
            Err(StoreError::Rejected { status: 500, .. })
        ));
    }

    #[test]
    fn record_paths_follow_kind() {
        assert_eq!(
            record_path("delete", EntryKind::Apology, RecordId(12)),
            "delete-apology/12"
        );
        assert_eq!(
            record_path("edit", EntryKind::Attendance, RecordId(3)),
            "edit-attendance/3"
        );
    }
}
