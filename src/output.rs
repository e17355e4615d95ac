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

//! Plain-text rendering of a zone report.
//!
//! The console gets the node list, the zone header and every note. The
//! optional file gets only the representative note.

use crate::report::{ZoneNoteRecord, ZoneReport};
use anyhow::{Result, anyhow};
use chrono::DateTime;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

const RULE: &str = "================";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampStyle {
    /// As returned by the API.
    #[default]
    Raw,
    /// Epoch seconds rendered as `Mon DD, YYYY (HH:MM - UTC)`.
    Formatted,
}

impl TimestampStyle {
    pub fn render(self, timestamp: &str) -> String {
        match self {
            TimestampStyle::Raw => timestamp.to_string(),
            TimestampStyle::Formatted => timestamp
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|dt| dt.format("%b %d, %Y (%H:%M - UTC)").to_string())
                .unwrap_or_else(|| timestamp.to_string()),
        }
    }
}

pub fn present<W: Write>(
    report: &ZoneReport,
    output_path: Option<&Path>,
    style: TimestampStyle,
    out: &mut W,
) -> Result<()> {
    let head = report
        .representative()
        .ok_or_else(|| anyhow!("zone report has no notes to present"))?;

    writeln!(out)?;
    writeln!(out, "NODE:")?;
    writeln!(out, "{RULE}")?;
    for node in &report.nodes {
        writeln!(out, "{node}")?;
    }

    if let Some(path) = output_path {
        match write_file(head, path, style) {
            Ok(()) => info!(path = %path.display(), "wrote zone note"),
            Err(err) => warn!("unable to write {}: {err}", path.display()),
        }
    }

    writeln!(out)?;
    writeln!(out, "Zone Note Report:")?;
    writeln!(out, "{RULE}")?;
    writeln!(out)?;
    writeln!(out, "Zone Name")?;
    writeln!(out, "{}", head.zone)?;
    writeln!(out)?;

    // The header record is listed again here along with the rest.
    for record in &report.records {
        section(out, "Type:", &record.note_type)?;
        section(out, "Timestamp:", &style.render(&record.timestamp))?;
        section(out, "Notes:", &record.note)?;
    }

    out.flush()?;
    Ok(())
}

fn section<W: Write>(out: &mut W, label: &str, value: &str) -> io::Result<()> {
    writeln!(out, "{label}")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "{value}")?;
    writeln!(out)
}

/// Truncates `path` and writes the four labelled blocks of one note.
pub fn write_file(record: &ZoneNoteRecord, path: &Path, style: TimestampStyle) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write!(
        file,
        "\nZone Name:\n{}\n\nType:\n{}\n\nNotes:\n{}\n\nTimestamp:\n{}\n",
        record.zone,
        record.note_type,
        record.note,
        style.render(&record.timestamp)
    )?;
    file.flush()
}
