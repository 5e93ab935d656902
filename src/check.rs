//! Periodic liveness monitoring of a known playlist.
//!
//! Each sweep probes every channel once, concurrently, and reports the ones
//! with no traffic. The alert sink fires at most once per sweep. Sweeps
//! repeat after the configured interval until interrupted.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::Channel;
use crate::config::CheckConfig;
use crate::notify::{AlertSink, Report};
use crate::playlist;
use crate::probe::{ProbeOutcome, Prober};
use crate::report;

/// Monitor the playlist until interrupted.
pub async fn run_check(config: CheckConfig, alerts: Option<Arc<dyn AlertSink>>) -> anyhow::Result<()> {
    config.validate()?;
    let channels = playlist::load(&config.playlist)?;
    anyhow::ensure!(
        !channels.is_empty(),
        "no channels found in {}",
        config.playlist.display()
    );
    info!(
        playlist = %config.playlist.display(),
        channels = channels.len(),
        interval_secs = config.interval.as_secs(),
        "starting periodic channel checks"
    );

    let prober = Prober::new(config.iface, config.probe_timeout);
    loop {
        tokio::select! {
            _ = sweep_once(&channels, prober, alerts.as_deref(), &config) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    info!("interrupt received, stopping the checker");
    Ok(())
}

/// One full sweep: probe, report, alert once if anything failed. Returns the
/// channels that did not respond, in playlist order.
pub async fn sweep_once(
    channels: &[Channel],
    prober: Prober,
    alerts: Option<&dyn AlertSink>,
    config: &CheckConfig,
) -> Vec<Channel> {
    let failed = sweep(channels, prober).await;
    info!(
        checked = channels.len(),
        ok = channels.len() - failed.len(),
        failed = failed.len(),
        "sweep finished"
    );

    if failed.is_empty() {
        return failed;
    }
    if let Some(alerts) = alerts {
        let body = failure_body(&failed);
        let report = Report::new(
            format!(
                "IPTV check results for \"{}\"",
                config.playlist.display()
            ),
            body,
        );
        if let Err(e) = alerts.send(report).await {
            warn!(error = %e, "could not deliver the check report");
        }
    }
    failed
}

/// Probe every channel once, concurrently; collect the silent ones.
async fn sweep(channels: &[Channel], prober: Prober) -> Vec<Channel> {
    let mut tasks = JoinSet::new();
    for (idx, channel) in channels.iter().enumerate() {
        let channel = channel.clone();
        tasks.spawn(async move {
            let outcome = prober.probe(channel.group, channel.port).await;
            (idx, channel, outcome)
        });
    }

    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let Ok((idx, channel, outcome)) = joined else {
            continue;
        };
        match outcome {
            Ok(ProbeOutcome::Live) => {
                debug!(channel = %channel.display_name(), "working");
            }
            Ok(ProbeOutcome::Timeout) => {
                warn!(channel = %channel.display_name(), url = %channel.url(), "not working");
                failed.push((idx, channel));
            }
            Err(e) => {
                warn!(channel = %channel.display_name(), error = %e, "probe failed");
                failed.push((idx, channel));
            }
        }
    }
    // Completion order is arbitrary; report in playlist order.
    failed.sort_by_key(|(idx, _)| *idx);
    failed.into_iter().map(|(_, channel)| channel).collect()
}

fn failure_body(failed: &[Channel]) -> String {
    let mut body = format!(
        "Checked at {}. The following channel(s) are not working:\n",
        report::timestamp()
    );
    for channel in failed {
        body.push_str(&format!("{} ({})\n", channel.display_name(), channel.url()));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use socket2::{Domain, Protocol, Socket, Type};

    use crate::errors::NotifyError;

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<Report>>,
    }

    #[async_trait::async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, report: Report) -> Result<(), NotifyError> {
            self.reports.lock().unwrap().push(report);
            Ok(())
        }
    }

    fn feed(group: Ipv4Addr, port: u16) -> tokio::task::JoinHandle<()> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
        socket.set_multicast_if_v4(&Ipv4Addr::LOCALHOST).unwrap();
        socket.set_multicast_loop_v4(true).unwrap();
        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0).into())
            .unwrap();
        tokio::spawn(async move {
            let dest = SocketAddrV4::new(group, port).into();
            for _ in 0..500 {
                let _ = socket.send_to(b"ts", &dest);
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
    }

    fn check_config() -> CheckConfig {
        CheckConfig {
            playlist: PathBuf::from("channels.m3u"),
            iface: Ipv4Addr::LOCALHOST,
            probe_timeout: Duration::from_millis(300),
            interval: Duration::from_secs(300),
            smtp: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reports_only_the_silent_channel_and_alerts_once() {
        let live = Ipv4Addr::new(239, 254, 20, 1);
        let dead = Ipv4Addr::new(239, 254, 20, 2);
        let feeder = feed(live, 1234);

        let channels = vec![
            Channel::new(Some("ChannelA".into()), live, 1234),
            Channel::new(Some("ChannelB".into()), dead, 1234),
        ];
        let prober = Prober::new(Ipv4Addr::LOCALHOST, Duration::from_millis(500));
        let sink = RecordingSink::default();

        let failed = sweep_once(&channels, prober, Some(&sink), &check_config()).await;
        feeder.abort();

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name.as_deref(), Some("ChannelB"));

        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].body.contains("ChannelB"));
        assert!(!reports[0].body.contains("ChannelA ("));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthy_sweep_sends_no_alert() {
        let live = Ipv4Addr::new(239, 254, 21, 1);
        let feeder = feed(live, 1234);

        let channels = vec![Channel::new(Some("Only".into()), live, 1234)];
        let prober = Prober::new(Ipv4Addr::LOCALHOST, Duration::from_millis(500));
        let sink = RecordingSink::default();

        let failed = sweep_once(&channels, prober, Some(&sink), &check_config()).await;
        feeder.abort();

        assert!(failed.is_empty());
        assert!(sink.reports.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_keep_playlist_order() {
        let channels = vec![
            Channel::new(Some("First".into()), Ipv4Addr::new(239, 254, 22, 1), 1234),
            Channel::new(Some("Second".into()), Ipv4Addr::new(239, 254, 22, 2), 1234),
            Channel::new(Some("Third".into()), Ipv4Addr::new(239, 254, 22, 3), 1234),
        ];
        let prober = Prober::new(Ipv4Addr::LOCALHOST, Duration::from_millis(200));

        let failed = sweep(&channels, prober).await;
        let names: Vec<_> = failed.iter().map(|c| c.display_name()).collect();
        assert_eq!(names, ["First", "Second", "Third"]);
    }
}
