/*!
 * Subtitle timing marker store.
 *
 * Tabular records keyed by document order, one row per subtitle mark:
 * relative timestamp, sample count, caption character length, persistent id
 * and record id. The store contract is read-all / rewrite-all; partial
 * updates are never performed.
 */

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Header row of a marker file, tab separated
pub const MARKER_FILE_HEADER: &str = "relativeMS\tsamples\tcharLength\tpersistentId\trecordId";

/// One timing record, mapped to one subtitle mark in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleRecord {
    /// Timestamp relative to the start of the recording, in milliseconds
    pub relative_milliseconds: u64,

    /// Audio sample count at the mark
    pub samples: u64,

    /// Character length of the caption following the mark
    pub char_length: usize,

    /// Stable subtitle identity
    pub persistent_id: String,

    /// Grouping record the subtitle belongs to
    pub record_id: Option<String>,
}

impl SubtitleRecord {
    /// Record for a freshly created subtitle. Timing fields are zeroed and
    /// filled in when new time slices are merged.
    pub fn placeholder(persistent_id: impl Into<String>, record_id: Option<String>) -> Self {
        SubtitleRecord {
            relative_milliseconds: 0,
            samples: 0,
            char_length: 0,
            persistent_id: persistent_id.into(),
            record_id,
        }
    }
}

/// A timestamp/sample pair from a subtitle import, not yet tied to an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlice {
    /// Timestamp relative to the start of the recording, in milliseconds
    pub relative_milliseconds: u64,

    /// Audio sample count
    pub samples: u64,
}

/// Parse a full marker file into records, in document order
pub fn parse_records(content: &str) -> Result<Vec<SubtitleRecord>> {
    let mut lines = content.lines();
    match lines.next() {
        Some(header) if header == MARKER_FILE_HEADER => {}
        Some(header) => {
            return Err(anyhow!("unexpected marker file header: {header:?}"));
        }
        None => return Err(anyhow!("marker file is empty")),
    }

    let mut records = Vec::new();
    for (idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 5 {
            return Err(anyhow!(
                "marker file row {} has {} fields, expected 5: {line:?}",
                idx + 2,
                fields.len()
            ));
        }
        let relative_milliseconds: u64 = fields[0]
            .parse()
            .with_context(|| format!("invalid relativeMS in marker row {}", idx + 2))?;
        let samples: u64 = fields[1]
            .parse()
            .with_context(|| format!("invalid samples in marker row {}", idx + 2))?;
        let char_length: usize = fields[2]
            .parse()
            .with_context(|| format!("invalid charLength in marker row {}", idx + 2))?;
        records.push(SubtitleRecord {
            relative_milliseconds,
            samples,
            char_length,
            persistent_id: fields[3].to_string(),
            record_id: if fields[4].is_empty() {
                None
            } else {
                Some(fields[4].to_string())
            },
        });
    }
    Ok(records)
}

/// Serialize records back to the full marker file contents
pub fn serialize_records(records: &[SubtitleRecord]) -> String {
    let mut out = String::from(MARKER_FILE_HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            record.relative_milliseconds,
            record.samples,
            record.char_length,
            record.persistent_id,
            record.record_id.as_deref().unwrap_or("")
        ));
    }
    out
}

/// Marker file path corresponding to a content file path
pub fn marker_file_path(content_path: &str) -> String {
    match content_path.strip_suffix(".at") {
        Some(stem) => format!("{stem}.subtitle_markers.csv"),
        None => format!("{content_path}.subtitle_markers.csv"),
    }
}
