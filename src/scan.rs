//! Concurrent sweep of a multicast range: probe, inspect, aggregate.
//!
//! One worker task owns one sub-block of the range and walks its full
//! (address, port) cross-product sequentially. Workers never share sockets
//! or results; everything flows over a channel to a single consumer that
//! owns the catalog, so aggregation needs no locking at all.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Channel};
use crate::config::ScanConfig;
use crate::inspect::{Inspection, MetadataProber};
use crate::notify::{AlertSink, Report};
use crate::playlist;
use crate::probe::{ProbeOutcome, Prober};
use crate::range::Ipv4Net;
use crate::record::SampleRecorder;
use crate::report;

/// One worker's verdict on a single (group, port) unit.
enum ScanEvent {
    /// Unit finished with nothing worth cataloguing.
    Probed,
    /// Unit responded and classified as a stream.
    Discovered { channel: Channel, named: bool },
}

/// Run a full scan and return the catalog of discovered channels.
///
/// The catalog is also rendered to `scan_results_range_<net>-<prefix>.m3u`
/// in the configured output directory (when non-empty), samples are captured
/// for unnamed channels, and the alert sink is notified once. An interrupt
/// stops the sweep and flushes whatever was aggregated up to that point.
pub async fn run_scan(
    config: ScanConfig,
    inspector: Arc<dyn MetadataProber>,
    recorder: Option<Arc<dyn SampleRecorder>>,
    alerts: Option<Arc<dyn AlertSink>>,
) -> anyhow::Result<Catalog> {
    config.validate()?;

    let mut known = Vec::new();
    if let Some(path) = &config.playlist {
        known = playlist::load(path)?;
        info!(
            playlist = %path.display(),
            channels = known.len(),
            "loaded known channels"
        );
    }
    let ports: Arc<[u16]> = effective_ports(&config.ports, &known).into();

    let blocks = config.range.subnets(config.subnet_prefix)?;
    let eta = report::estimate(
        blocks[0].num_addresses(),
        ports.len() as u64,
        config.probe_timeout,
        config.inspect_timeout,
    );
    report::scan_banner(&config, &ports, blocks.len(), eta);

    let mut catalog = Catalog::new();
    for channel in &known {
        catalog.mark_known(channel.group, channel.port);
    }

    let prober = Prober::new(config.iface, config.probe_timeout);
    let (tx, mut rx) = mpsc::channel(256);
    let mut workers = JoinSet::new();
    for block in blocks {
        workers.spawn(sweep_block(
            block,
            Arc::clone(&ports),
            prober,
            Arc::clone(&inspector),
            tx.clone(),
        ));
    }
    drop(tx);

    let total_units = config.range.num_addresses() * ports.len() as u64;
    let progress = ProgressBar::new(total_units);
    progress.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} ({eta})").unwrap(),
    );

    let started = Instant::now();
    let mut unnamed = Vec::new();
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => aggregate(event, &mut catalog, &mut unnamed, &progress),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping the sweep");
                interrupted = true;
                // Aborted workers drop their sockets with their futures.
                workers.abort_all();
                break;
            }
        }
    }
    // Flush what the aborted workers already reported.
    while let Ok(event) = rx.try_recv() {
        aggregate(event, &mut catalog, &mut unnamed, &progress);
    }
    while workers.join_next().await.is_some() {}
    progress.finish_and_clear();

    if let Some(recorder) = &recorder {
        record_samples(recorder.as_ref(), &unnamed).await;
    }

    let playlist_file = flush_catalog(&config, &catalog).await?;

    if let (Some(alerts), Some(file)) = (&alerts, &playlist_file) {
        let report = Report::new(
            format!("IPTV scan results for \"{}\" range", config.range),
            format!(
                "The following channel(s) were found (see attached)\n{}\n",
                file.display()
            ),
        )
        .with_attachment(
            file.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scan_results.m3u".to_string()),
            playlist::render(&catalog),
        );
        if let Err(e) = alerts.send(report).await {
            warn!(error = %e, "could not deliver the scan report");
        }
    }

    info!(
        channels = catalog.len(),
        interrupted,
        elapsed = %report::humanize(started.elapsed()),
        "scan finished"
    );
    Ok(catalog)
}

/// Configured ports plus the unique ports of the known channels.
fn effective_ports(configured: &[u16], known: &[Channel]) -> Vec<u16> {
    let mut ports: Vec<u16> = configured
        .iter()
        .copied()
        .chain(known.iter().map(|c| c.port))
        .collect();
    ports.sort_unstable();
    ports.dedup();
    ports
}

async fn sweep_block(
    block: Ipv4Net,
    ports: Arc<[u16]>,
    prober: Prober,
    inspector: Arc<dyn MetadataProber>,
    tx: mpsc::Sender<ScanEvent>,
) {
    for group in block.addresses() {
        for &port in ports.iter() {
            let event = scan_unit(group, port, &prober, inspector.as_ref()).await;
            if tx.send(event).await.is_err() {
                // Aggregator is gone; nothing left to report to.
                return;
            }
        }
    }
}

async fn scan_unit(
    group: Ipv4Addr,
    port: u16,
    prober: &Prober,
    inspector: &dyn MetadataProber,
) -> ScanEvent {
    match prober.probe(group, port).await {
        Ok(ProbeOutcome::Live) => {}
        Ok(ProbeOutcome::Timeout) => return ScanEvent::Probed,
        Err(e) => {
            debug!(%group, port, error = %e, "probe failed");
            return ScanEvent::Probed;
        }
    }

    debug!(%group, port, "responding, inspecting");
    let inspection = match inspector.inspect(group, port).await {
        Ok(inspection) => inspection,
        Err(e) => {
            warn!(%group, port, error = %e, "inspection unavailable, treating as no stream");
            Inspection::NoStream
        }
    };

    match inspection {
        Inspection::NoStream => ScanEvent::Probed,
        Inspection::Unnamed => ScanEvent::Discovered {
            channel: Channel::new(None, group, port),
            named: false,
        },
        Inspection::Named(name) => ScanEvent::Discovered {
            channel: Channel::new(Some(name), group, port),
            named: true,
        },
    }
}

fn aggregate(
    event: ScanEvent,
    catalog: &mut Catalog,
    unnamed: &mut Vec<Channel>,
    progress: &ProgressBar,
) {
    progress.inc(1);
    let ScanEvent::Discovered { channel, named } = event else {
        return;
    };
    let label = channel.display_name();
    let url = channel.url();
    if catalog.insert(channel.clone()) {
        info!(channel = %label, %url, "channel added to the catalog");
        if !named {
            unnamed.push(channel);
        }
    } else {
        debug!(%url, "already catalogued, skipping");
    }
}

async fn record_samples(recorder: &dyn SampleRecorder, unnamed: &[Channel]) {
    if unnamed.is_empty() {
        return;
    }
    info!(channels = unnamed.len(), "recording samples for unnamed channels");
    for channel in unnamed {
        match recorder.record(channel.group, channel.port).await {
            Ok(path) => info!(url = %channel.url(), file = %path.display(), "sample captured"),
            Err(e) => warn!(url = %channel.url(), error = %e, "sample capture failed"),
        }
    }
}

/// Render and write the playlist once, unless nothing was found.
async fn flush_catalog(config: &ScanConfig, catalog: &Catalog) -> anyhow::Result<Option<PathBuf>> {
    if catalog.is_empty() {
        info!("no channels found");
        return Ok(None);
    }
    let file = config.output_dir.join(format!(
        "scan_results_range_{}-{}.m3u",
        config.range.network(),
        config.range.prefix()
    ));
    tokio::fs::write(&file, playlist::render(catalog))
        .await
        .with_context(|| format!("writing {}", file.display()))?;
    info!(
        channels = catalog.len(),
        file = %file.display(),
        "resulting playlist written"
    );
    Ok(Some(file))
}
