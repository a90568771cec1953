//! Error types for the decoder core (§7 of the design).
//!
//! Recoverable conditions (FIR design failure, invalid protocol data) are
//! logged and handled locally by their callers and never reach these types.
//! Only the two kinds the spec calls "fatal" get a `Result` here; buffer
//! lifetime misuse is a programmer error and panics instead (see `buffer`).

use thiserror::Error;

/// Fatal configuration error, surfaced to the host.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error(
        "sample rate {rate} Hz is below the Nyquist minimum of {minimum} Hz for the configured channel bandwidth"
    )]
    SampleRateBelowNyquist { rate: f64, minimum: f64 },
}

/// Fatal per-call pipeline error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no NOTIFICATION_SAMPLE_RATE_CHANGE event has been received; pipeline is not configured")]
    NotConfigured,
}

/// Recoverable FIR design failure. The caller logs this at ERROR and falls
/// back to `windowed_sinc_lowpass`, which cannot fail.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum DesignError {
    #[error("remez exchange did not converge within the iteration budget")]
    DidNotConverge,
}
