use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mcast_scanner::check::run_check;
use mcast_scanner::config::{CheckConfig, ScanConfig, SmtpConfig};
use mcast_scanner::inspect::{self, Ffprobe};
use mcast_scanner::notify::{AlertSink, Mailer};
use mcast_scanner::range::Ipv4Net;
use mcast_scanner::record::{FfmpegRecorder, SampleRecorder};
use mcast_scanner::scan::run_scan;

#[derive(Parser)]
#[command(
    name = "mcast-scanner",
    about = "Discover and monitor IPTV UDP multicast streams"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a multicast IP range for live streams and build a playlist
    Scan(ScanArgs),
    /// Periodically verify every channel of a playlist is emitting data
    Check(CheckArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Range of IPs to scan, CIDR notation (e.g. 239.0.0.0/16)
    #[arg(long)]
    range: Ipv4Net,

    /// Prefix length of the sub-blocks the range is divided into; one
    /// concurrent worker per sub-block
    #[arg(long)]
    size: u8,

    /// Playlist *.m3u file with known UDP streams; their ports widen the
    /// scan and already-listed channels are skipped
    #[arg(long)]
    playlist: Option<PathBuf>,

    /// Network interface IP address to receive the streams on
    #[arg(long, default_value = "0.0.0.0")]
    nic: Ipv4Addr,

    /// Seconds to wait for a UDP reply per address
    #[arg(long, default_value_t = 5)]
    udp_timeout: u64,

    /// Seconds to wait for stream metadata per responsive address
    #[arg(long, default_value_t = 10)]
    info_timeout: u64,

    /// UDP port(s) to scan for every address
    #[arg(long = "port", num_args = 1.., default_values_t = [1234u16])]
    ports: Vec<u16>,

    /// Sample length in seconds captured for unnamed channels; 0 disables
    #[arg(long, default_value_t = 60)]
    sample_sec: u64,

    /// Directory the resulting playlist is written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    #[command(flatten)]
    smtp: SmtpArgs,
}

#[derive(Args)]
struct CheckArgs {
    /// Playlist *.m3u file with the channels to monitor
    #[arg(long)]
    playlist: PathBuf,

    /// Network interface IP address to receive the streams on
    #[arg(long, default_value = "0.0.0.0")]
    nic: Ipv4Addr,

    /// Seconds to wait for a UDP reply per channel
    #[arg(long, default_value_t = 5)]
    udp_timeout: u64,

    /// Seconds to sleep between two full sweeps
    #[arg(long, default_value_t = 300)]
    interval: u64,

    #[command(flatten)]
    smtp: SmtpArgs,
}

#[derive(Args)]
struct SmtpArgs {
    /// SMTP server to send the report email through
    #[arg(long)]
    smtp_server: Option<String>,

    /// Port of the SMTP server
    #[arg(long, default_value_t = 25)]
    smtp_port: u16,

    /// Sender address for the report email
    #[arg(long)]
    sender: Option<String>,

    /// Receiver address(es) for the report email
    #[arg(long, num_args = 1..)]
    receivers: Vec<String>,
}

impl SmtpArgs {
    /// Alerting is enabled only when server, sender and receivers are all
    /// present.
    fn into_config(self) -> Option<SmtpConfig> {
        match (self.smtp_server, self.sender) {
            (Some(server), Some(sender)) if !self.receivers.is_empty() => Some(SmtpConfig {
                server,
                port: self.smtp_port,
                sender,
                receivers: self.receivers,
            }),
            _ => None,
        }
    }
}

fn mailer(smtp: &Option<SmtpConfig>) -> Option<Arc<dyn AlertSink>> {
    smtp.as_ref().map(|smtp| {
        Arc::new(Mailer::new(
            smtp.server.clone(),
            smtp.port,
            smtp.sender.clone(),
            smtp.receivers.clone(),
        )) as Arc<dyn AlertSink>
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Scan(args) => {
            let config = ScanConfig {
                range: args.range,
                subnet_prefix: args.size,
                iface: args.nic,
                ports: args.ports,
                probe_timeout: Duration::from_secs(args.udp_timeout),
                inspect_timeout: Duration::from_secs(args.info_timeout),
                sample_secs: args.sample_sec,
                playlist: args.playlist,
                output_dir: args.output_dir,
                smtp: args.smtp.into_config(),
            };
            config.validate()?;

            inspect::ensure_available(Ffprobe::DEFAULT_BINARY).await?;
            let recorder: Option<Arc<dyn SampleRecorder>> = if config.sample_secs > 0 {
                inspect::ensure_available(FfmpegRecorder::DEFAULT_BINARY).await?;
                Some(Arc::new(FfmpegRecorder::new(config.sample_secs)))
            } else {
                None
            };

            let inspector = Arc::new(Ffprobe::new(config.inspect_timeout));
            let alerts = mailer(&config.smtp);
            run_scan(config, inspector, recorder, alerts).await?;
        }
        Commands::Check(args) => {
            let config = CheckConfig {
                playlist: args.playlist,
                iface: args.nic,
                probe_timeout: Duration::from_secs(args.udp_timeout),
                interval: Duration::from_secs(args.interval),
                smtp: args.smtp.into_config(),
            };
            let alerts = mailer(&config.smtp);
            run_check(config, alerts).await?;
        }
    }
    Ok(())
}
