// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote host records.
//!
//! Remote workspaces are an orthogonal transport; the daemon core only
//! round-trips these records through state and the API. No transport is
//! implemented here.

use crate::id::RemoteHostId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteHost {
    pub id: RemoteHostId,
    pub name: String,
    pub connection_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
