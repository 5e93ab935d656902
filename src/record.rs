//! Raw sample capture for streams that respond without a service name.
//!
//! Fire-and-forget: a failed capture is reported by the caller and never
//! fails the run.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

/// Capability to dump a few seconds of raw stream bytes to disk.
#[async_trait]
pub trait SampleRecorder: Send + Sync {
    async fn record(&self, group: Ipv4Addr, port: u16) -> anyhow::Result<PathBuf>;
}

/// ffmpeg-backed recorder:
/// `ffmpeg -v quiet -y -i udp://@group:port -t <secs> sample_<group>-<port>.mp4`.
pub struct FfmpegRecorder {
    binary: String,
    duration_secs: u64,
}

impl FfmpegRecorder {
    pub const DEFAULT_BINARY: &'static str = "ffmpeg";

    // Slack on top of the sample length before the capture is abandoned.
    const GRACE: Duration = Duration::from_secs(30);

    pub fn new(duration_secs: u64) -> Self {
        Self {
            binary: Self::DEFAULT_BINARY.to_string(),
            duration_secs,
        }
    }

    /// Deterministic output name for a given pair.
    pub fn sample_path(group: Ipv4Addr, port: u16) -> PathBuf {
        PathBuf::from(format!("sample_{group}-{port}.mp4"))
    }
}

#[async_trait]
impl SampleRecorder for FfmpegRecorder {
    async fn record(&self, group: Ipv4Addr, port: u16) -> anyhow::Result<PathBuf> {
        let path = Self::sample_path(group, port);
        let url = format!("udp://@{group}:{port}");
        let child = Command::new(&self.binary)
            .args(["-v", "quiet", "-y", "-i", &url, "-t"])
            .arg(self.duration_secs.to_string())
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let deadline = Duration::from_secs(self.duration_secs) + Self::GRACE;
        let status = timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| anyhow::anyhow!("capture of {url} did not finish in {deadline:?}"))??
            .status;
        if !status.success() {
            anyhow::bail!("{} exited with {status} for {url}", self.binary);
        }
        Ok(path)
    }
}
