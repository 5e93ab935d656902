//! Stream metadata inspection through an external prober (ffprobe).
//!
//! The prober is a black box invoked per responsive address; only its JSON
//! output contract matters here. Any failure past process launch collapses
//! into [`Inspection::NoStream`]: a dead stream and a transient prober
//! failure are deliberately not distinguished.

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::{ConfigError, InspectError};

/// Classification of a responsive address after metadata inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    /// No usable stream data behind the address.
    NoStream,
    /// A stream exists but carries no service name.
    Unnamed,
    /// A stream with an embedded service name.
    Named(String),
}

/// Capability to extract service metadata from a `udp://@group:port` stream.
#[async_trait]
pub trait MetadataProber: Send + Sync {
    async fn inspect(&self, group: Ipv4Addr, port: u16) -> Result<Inspection, InspectError>;
}

/// ffprobe-backed prober:
/// `ffprobe -v quiet -print_format json -show_programs udp://@group:port`.
pub struct Ffprobe {
    binary: String,
    timeout: Duration,
}

impl Ffprobe {
    pub const DEFAULT_BINARY: &'static str = "ffprobe";

    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: Self::DEFAULT_BINARY.to_string(),
            timeout,
        }
    }

    pub fn with_binary(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MetadataProber for Ffprobe {
    async fn inspect(&self, group: Ipv4Addr, port: u16) -> Result<Inspection, InspectError> {
        let url = format!("udp://@{group}:{port}");
        let child = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_programs"])
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InspectError {
                tool: self.binary.clone(),
                source,
            })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(%url, error = %e, "prober did not finish cleanly");
                return Ok(Inspection::NoStream);
            }
            // Dropping the timed-out future kills the child.
            Err(_) => {
                debug!(%url, "prober timed out");
                return Ok(Inspection::NoStream);
            }
        };
        Ok(classify(&output.stdout))
    }
}

/// Verify the prober binary can be launched at all. Run once at startup so a
/// missing tool surfaces as a configuration error instead of a sweep where
/// every responsive address classifies as no-stream.
pub async fn ensure_available(binary: &str) -> Result<(), ConfigError> {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|_| ConfigError::ProberMissing(binary.to_string()))?;
    Ok(())
}

/// Walk the prober's document: no program with streams means no stream at
/// all; streams without a non-empty `service_name` tag are unnamed; the
/// first non-empty tag wins.
fn classify(stdout: &[u8]) -> Inspection {
    let Ok(doc) = serde_json::from_slice::<ProbeDoc>(stdout) else {
        return Inspection::NoStream;
    };

    let mut saw_stream = false;
    for program in &doc.programs {
        if !program.streams.iter().any(|s| s.codec_type.is_some()) {
            continue;
        }
        saw_stream = true;
        let name = program
            .tags
            .as_ref()
            .and_then(|tags| tags.service_name.as_deref())
            .unwrap_or_default();
        if !name.is_empty() {
            return Inspection::Named(name.to_string());
        }
    }

    if saw_stream {
        Inspection::Unnamed
    } else {
        Inspection::NoStream
    }
}

#[derive(Deserialize)]
struct ProbeDoc {
    #[serde(default)]
    programs: Vec<ProgramDoc>,
}

#[derive(Deserialize)]
struct ProgramDoc {
    #[serde(default)]
    streams: Vec<StreamDoc>,
    tags: Option<TagsDoc>,
}

#[derive(Deserialize)]
struct StreamDoc {
    codec_type: Option<String>,
}

#[derive(Deserialize)]
struct TagsDoc {
    service_name: Option<String>,
}
