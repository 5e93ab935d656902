//! Validated run configuration. Immutable once a run starts; workers only
//! ever see copies or shared references.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::range::Ipv4Net;

/// SMTP parameters for the alert sink.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub receivers: Vec<String>,
}

/// Configuration snapshot for one scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub range: Ipv4Net,
    /// Prefix length of the sub-blocks the range is divided into; one
    /// worker per sub-block.
    pub subnet_prefix: u8,
    /// Local interface the groups are joined on.
    pub iface: Ipv4Addr,
    /// Ports probed for every address, before playlist ports are merged in.
    pub ports: Vec<u16>,
    pub probe_timeout: Duration,
    pub inspect_timeout: Duration,
    /// Sample length for unnamed channels; 0 disables capture.
    pub sample_secs: u64,
    /// Known channels; their ports widen the scan and their pairs are
    /// skipped on discovery.
    pub playlist: Option<PathBuf>,
    /// Where the resulting playlist lands.
    pub output_dir: PathBuf,
    pub smtp: Option<SmtpConfig>,
}

impl ScanConfig {
    /// Reject bad input before any socket is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.range.is_multicast() {
            return Err(ConfigError::NotMulticastRange(self.range.to_string()));
        }
        self.range.subnets(self.subnet_prefix)?;
        if let Some(playlist) = &self.playlist {
            if !playlist.is_file() {
                return Err(ConfigError::PlaylistNotFound(
                    playlist.display().to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration snapshot for the periodic checker.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub playlist: PathBuf,
    pub iface: Ipv4Addr,
    pub probe_timeout: Duration,
    /// Sleep between two full sweeps.
    pub interval: Duration,
    pub smtp: Option<SmtpConfig>,
}

impl CheckConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.playlist.is_file() {
            return Err(ConfigError::PlaylistNotFound(
                self.playlist.display().to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_config(range: &str, subnet_prefix: u8) -> ScanConfig {
        ScanConfig {
            range: range.parse().unwrap(),
            subnet_prefix,
            iface: Ipv4Addr::UNSPECIFIED,
            ports: vec![1234],
            probe_timeout: Duration::from_secs(5),
            inspect_timeout: Duration::from_secs(10),
            sample_secs: 0,
            playlist: None,
            output_dir: PathBuf::from("."),
            smtp: None,
        }
    }

    #[test]
    fn accepts_a_sane_scan_config() {
        assert!(scan_config("239.0.0.0/16", 24).validate().is_ok());
    }

    #[test]
    fn rejects_non_multicast_range() {
        assert!(matches!(
            scan_config("10.0.0.0/16", 24).validate(),
            Err(ConfigError::NotMulticastRange(_))
        ));
    }

    #[test]
    fn rejects_subnet_size_not_longer_than_range() {
        assert!(matches!(
            scan_config("239.0.0.0/16", 16).validate(),
            Err(ConfigError::SubnetSize { .. })
        ));
        assert!(scan_config("239.0.0.0/16", 8).validate().is_err());
    }

    #[test]
    fn rejects_missing_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = scan_config("239.0.0.0/16", 24);
        config.playlist = Some(dir.path().join("missing.m3u"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PlaylistNotFound(_))
        ));
    }
}
