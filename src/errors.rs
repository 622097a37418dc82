/*!
 * Error types for the stsync engine.
 *
 * Two families: `DeriveError` for everything that can go wrong while turning
 * a diff hunk into subtitle operations, and `SyncError` for the pre-flight
 * and consistency checks around a sync run. Derivation errors are always
 * fatal for the affected file and carry the offending structure so the
 * input data can be fixed by hand.
 */

use thiserror::Error;

use crate::git::LineOrigin;

/// Errors raised while deriving subtitle operations from a hunk
#[derive(Error, Debug)]
pub enum DeriveError {
    /// The hunk's line-origin signature is not the single
    /// deletion/addition shape the deriver supports
    #[error("unsupported hunk shape {signature:?}: {details}")]
    UnsupportedHunkShape {
        /// Per-origin line group signature of the hunk
        signature: Vec<LineOrigin>,
        /// Hunk contents for diagnosis
        details: String,
    },

    /// The from-content lines covered by the hunk do not match the hunk's
    /// deleted lines
    #[error("mismatch between content and hunk:\nexpected: {expected:?}\nactual: {actual:?}")]
    ContentMismatch {
        /// Deleted line group content from the hunk
        expected: String,
        /// Content reconstructed from the from-version lines
        actual: String,
    },

    /// An insert or delete at the start of a hunk has no preceding subtitle
    /// to anchor on. Not supported; requires manual resolution.
    #[error("cannot derive {operation} operation without a preceding anchor subtitle: {details}")]
    MissingAnchor {
        /// Operation type that could not be anchored
        operation: &'static str,
        /// Pair contents for diagnosis
        details: String,
    },

    /// An operations group had a shape the deriver cannot classify
    #[error("unhandled operations group: {details}")]
    UnhandledGroup {
        /// Group contents for diagnosis
        details: String,
    },

    /// A pair kind arrived while the grouping machine was in a state with
    /// no transition for it
    #[error("invalid grouping transition: {event} while {state}")]
    InvalidGroupTransition {
        /// Current machine state
        state: String,
        /// Offending event
        event: String,
    },

    /// The grouping machine did not return to idle at the end of the hunk
    #[error("uncompleted operation analysis for hunk, machine ended in state {state}")]
    IncompleteGrouping {
        /// Final machine state
        state: String,
    },

    /// The hunk consumed more subtitle marks than marker records were
    /// supplied for it
    #[error("ran out of subtitle records while consuming hunk marks: {details}")]
    SubtitleInventoryExhausted {
        /// Caption that needed a subtitle
        details: String,
    },

    /// A caption carried more than one mark, which the splitter never emits
    #[error("malformed caption with multiple marks: {text:?}")]
    MalformedCaption {
        /// Offending caption text
        text: String,
    },
}

/// Errors raised by the sync protocol around derivation and transfer
#[derive(Error, Debug)]
pub enum SyncError {
    /// Subtitle counts before and after applying operations disagree with
    /// the timing store. Signals upstream data corruption or a derivation
    /// bug; never coerced.
    #[error(
        "subtitle count mismatch for {path}: \
         {old_count} existing records, operations change count by {delta}, \
         but {new_count} new records found"
    )]
    CountMismatch {
        /// File the mismatch was detected in
        path: String,
        /// Record count before applying operations
        old_count: usize,
        /// Net count change of the operation set
        delta: i64,
        /// Record count observed in the timing store
        new_count: usize,
    },

    /// The requested commit range does not line up with the repository or
    /// file sync state it is applied to
    #[error("stale commit range: requested {requested}, current state is {current}")]
    StaleCommitRange {
        /// Commit the caller asked to operate on
        requested: String,
        /// Commit the repository or file is actually at
        current: String,
    },

    /// Pre-flight check failed; resolve and retry
    #[error("repository {name} is not ready to sync: {reason}")]
    RepositoryNotReady {
        /// Repository name
        name: String,
        /// What the pre-flight check found
        reason: String,
    },
}
