#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

/// Errors from the manifest renderer (§4.2). These never reach an HTTP
/// client directly; the actor logs the cause and maps every variant to a
/// `500` (the renderer is a pure function of already-validated window
/// state, so a failure here means an internal invariant broke, not a bad
/// request).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("target duration does not fit u32: {0}")]
    TargetDurationOverflow(#[from] std::num::TryFromIntError),

    #[error("duration accumulator overflowed while walking the skip boundary")]
    DurationOverflow,
}

/// Errors from parsing `_HLS_msn` / `_HLS_part` / `_HLS_skip` query
/// parameters (§4.8, §7). Each variant maps deterministically to `400`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid _HLS_msn: {0}")]
    InvalidMsn(std::num::ParseIntError),

    #[error("invalid _HLS_part: {0}")]
    InvalidPart(std::num::ParseIntError),

    #[error("_HLS_part given without _HLS_msn")]
    PartWithoutMsn,
}
