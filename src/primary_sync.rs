/*!
 * Primary repository marker synchronization.
 *
 * After operations are derived for a commit range, the primary marker files
 * are rebuilt: the operation set is replayed over the existing records to
 * get the new identity order, fresh time slices from the subtitle import are
 * merged in positionally, and caption character lengths are recomputed from
 * the current content. Counts are cross-checked at every joint; a mismatch
 * aborts the file rather than guessing an alignment.
 */

use anyhow::{Result, bail};
use log::debug;

use crate::errors::SyncError;
use crate::marker_csv::{SubtitleRecord, TimeSlice};
use crate::operations::OperationsForFile;
use crate::subtitle::caption_char_lengths;

/// Rebuild the marker records for one primary file.
///
/// `existing` are the records as of the previous sync, `new_content` is the
/// content file at the new commit and `time_slices` the imported timing for
/// it, one slice per subtitle in document order.
pub fn compute_updated_records(
    path: &str,
    existing: &[SubtitleRecord],
    operations: &OperationsForFile,
    new_content: &str,
    time_slices: &[TimeSlice],
) -> Result<Vec<SubtitleRecord>> {
    let updated = operations.apply_to_subtitles(existing)?;

    if time_slices.len() != updated.len() {
        return Err(SyncError::CountMismatch {
            path: path.to_string(),
            old_count: existing.len(),
            delta: operations.subtitles_count_delta(),
            new_count: time_slices.len(),
        }
        .into());
    }

    let char_lengths = caption_char_lengths(new_content);
    if char_lengths.len() != updated.len() {
        return Err(SyncError::CountMismatch {
            path: path.to_string(),
            old_count: existing.len(),
            delta: operations.subtitles_count_delta(),
            new_count: char_lengths.len(),
        }
        .into());
    }

    let mut result = Vec::with_capacity(updated.len());
    let mut missing_record_ids = Vec::new();
    for ((record, slice), char_length) in updated.into_iter().zip(time_slices).zip(char_lengths) {
        if record.record_id.is_none() {
            missing_record_ids.push(record.persistent_id.clone());
        }
        result.push(SubtitleRecord {
            relative_milliseconds: slice.relative_milliseconds,
            samples: slice.samples,
            char_length,
            persistent_id: record.persistent_id,
            record_id: record.record_id,
        });
    }
    if !missing_record_ids.is_empty() {
        bail!(
            "{path}: records without a record id after sync: {}",
            missing_record_ids.join(", ")
        );
    }

    debug!("{path}: rebuilt {} marker record(s)", result.len());
    Ok(result)
}
