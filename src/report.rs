// znr - zone notes report for the DynECT DNS API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::client::{ApiMessage, describe_messages};
use crate::session::Session;
use anyhow::{Context, Result};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

pub const ZONE_NOTE_REPORT_PATH: &str = "/REST/ZoneNoteReport/";
pub const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueryParameters {
    pub zone: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ZoneNoteRecord {
    pub zone: String,
    #[serde(rename = "type")]
    pub note_type: String,
    #[serde(default)]
    pub note: String,
    #[serde(deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReport {
    pub records: Vec<ZoneNoteRecord>,
    pub nodes: Vec<String>,
}

impl ZoneReport {
    /// The first record heads the report.
    pub fn representative(&self) -> Option<&ZoneNoteRecord> {
        self.records.first()
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("zone note report for `{zone}` failed (status `{status}`){}", describe_messages(.messages))]
    Report {
        zone: String,
        status: String,
        messages: Vec<ApiMessage>,
    },
    #[error("node list for `{zone}` failed (status `{status}`){}", describe_messages(.messages))]
    NodeList {
        zone: String,
        status: String,
        messages: Vec<ApiMessage>,
    },
    #[error("zone note report for `{0}` returned no notes")]
    EmptyReport(String),
}

pub fn node_list_path(zone: &str) -> String {
    format!("/REST/NodeList/{zone}/")
}

/// Fetches the notes and then the node list of one zone. The node list is
/// only requested once the report succeeded.
pub fn fetch_zone_report(session: &Session<'_>, query: &QueryParameters) -> Result<ZoneReport> {
    let client = session.client();
    let params = serde_json::to_value(query).context("encoding report parameters")?;

    let response = client.execute(Method::POST, ZONE_NOTE_REPORT_PATH, Some(&params))?;
    if !response.is_success() {
        return Err(ReportError::Report {
            zone: query.zone.clone(),
            status: response.status,
            messages: response.msgs,
        }
        .into());
    }
    let records: Vec<ZoneNoteRecord> =
        serde_json::from_value(response.data).context("decoding zone note report")?;
    if records.is_empty() {
        return Err(ReportError::EmptyReport(query.zone.clone()).into());
    }

    let response = client.execute(Method::GET, &node_list_path(&query.zone), None)?;
    if !response.is_success() {
        return Err(ReportError::NodeList {
            zone: query.zone.clone(),
            status: response.status,
            messages: response.msgs,
        }
        .into());
    }
    let nodes: Vec<String> =
        serde_json::from_value(response.data).context("decoding node list")?;

    info!(
        zone = %query.zone,
        notes = records.len(),
        nodes = nodes.len(),
        "fetched zone report"
    );
    Ok(ZoneReport { records, nodes })
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number timestamp, got {other}"
        ))),
    }
}
