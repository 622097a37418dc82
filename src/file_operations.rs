/*!
 * Per-file operation derivation.
 *
 * Joins the three inputs for one content file: the from-version content, the
 * timing records carrying subtitle identities, and the diff hunks between
 * two commits. Subtitle records are distributed over the content lines by
 * mark count, each hunk is handed the lines it deletes, and the derived
 * operations are concatenated in hunk order into an `OperationsForFile`.
 */

use anyhow::{Result, bail};
use log::debug;

use crate::git::Hunk;
use crate::hunk_operations::{ContentLine, derive_hunk_operations};
use crate::marker_csv::SubtitleRecord;
use crate::operations::OperationsForFile;
use crate::subtitle::{Subtitle, count_marks};

/// Derive all operations for one file over one commit range
pub fn compute_operations_for_file(
    product_identity_id: &str,
    from_content: &str,
    records: &[SubtitleRecord],
    hunks: &[Hunk],
    from_commit: &str,
    to_commit: &str,
) -> Result<OperationsForFile> {
    let line_table = build_line_table(from_content, records)?;

    let mut operations = Vec::new();
    for (idx, hunk) in hunks.iter().enumerate() {
        let content_lines = lines_for_hunk(&line_table, hunk)?;
        let hunk_ops = derive_hunk_operations(&content_lines, hunk)?;
        debug!(
            "file {product_identity_id}: hunk {} yielded {} operation(s)",
            idx + 1,
            hunk_ops.len()
        );
        operations.extend(hunk_ops);
    }

    for operation in &operations {
        operation.validate()?;
    }

    Ok(OperationsForFile::new(
        product_identity_id,
        from_commit,
        to_commit,
        operations,
    ))
}

/// Distribute the subtitle records over the content lines, in document
/// order, one record per mark. Total mark count must match the record count
/// exactly or the file's identities cannot be trusted.
fn build_line_table(content: &str, records: &[SubtitleRecord]) -> Result<Vec<ContentLine>> {
    let total_marks: usize = content.lines().map(count_marks).sum();
    if total_marks != records.len() {
        bail!(
            "content has {total_marks} subtitle marks but {} timing records",
            records.len()
        );
    }

    let mut remaining = records.iter();
    let mut table = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let subtitles: Vec<Subtitle> = remaining
            .by_ref()
            .take(count_marks(line))
            .map(|r| Subtitle::new(&r.persistent_id, r.record_id.clone()))
            .collect();
        table.push(ContentLine {
            content: line.to_string(),
            line_no: idx as u32 + 1,
            subtitles,
        });
    }
    Ok(table)
}

/// The from-version lines a hunk deletes, in order
fn lines_for_hunk(line_table: &[ContentLine], hunk: &Hunk) -> Result<Vec<ContentLine>> {
    let mut lines = Vec::new();
    for line_no in hunk.deleted_line_numbers() {
        match line_table.get(line_no as usize - 1) {
            Some(line) if line.line_no == line_no => lines.push(line.clone()),
            _ => bail!("hunk references line {line_no}, beyond the file's {} lines", line_table.len()),
        }
    }
    Ok(lines)
}
