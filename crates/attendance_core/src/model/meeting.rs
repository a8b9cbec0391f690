//! Current meeting, owned by the record store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Active meeting as published by the record store. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub title: String,
    pub date: NaiveDate,
}
