//! Error taxonomy for scan and check runs.
//!
//! Only [`ConfigError`] aborts a run, and only before any socket is opened.
//! Everything else is scoped to a single probe or delivery attempt and is
//! logged by the caller while the run continues.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Startup validation failures. Fatal before any probing begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid IP range {0:?}, expected CIDR notation like 224.0.0.0/24")]
    InvalidRange(String),

    #[error("range {0} is not a multicast network")]
    NotMulticastRange(String),

    #[error("subnet size /{size} must be longer than the range prefix /{prefix}")]
    SubnetSize { size: u8, prefix: u8 },

    #[error("playlist file not found: {0}")]
    PlaylistNotFound(String),

    #[error("malformed playlist: {0}")]
    MalformedPlaylist(String),

    #[error("`{0}` is not available, install FFmpeg first")]
    ProberMissing(String),
}

/// A single probe failed to set up or wait on its socket. Never aborts the
/// run; the affected unit is logged and the sweep moves on.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0} is not a multicast address")]
    NotMulticast(Ipv4Addr),

    #[error("socket setup failed: {0}")]
    Socket(#[from] std::io::Error),
}

/// The external metadata prober could not be launched at all. Downgraded to
/// a no-stream classification by the coordinator.
#[derive(Debug, Error)]
#[error("failed to launch `{tool}`: {source}")]
pub struct InspectError {
    pub tool: String,
    #[source]
    pub source: std::io::Error,
}

/// Alert delivery failures. Logged by the caller, never fatal.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build the mail message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("mailer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
