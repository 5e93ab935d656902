//! Operator-facing reporting: the pre-run banner, runtime estimates and
//! human-readable durations.

use std::time::Duration;

use tracing::info;

use crate::config::ScanConfig;

/// Break a duration into days/hours/minutes/seconds.
pub fn humanize(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    let days = secs / 86_400;
    secs %= 86_400;
    let hours = secs / 3_600;
    secs %= 3_600;
    let minutes = secs / 60;
    secs %= 60;
    format!("{days} day(s) {hours} hour(s) {minutes} minute(s) {secs} second(s)")
}

/// Current local time for report bodies.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Upper bound for a full sweep: sub-blocks run in parallel, so the wall
/// clock is one block's cross-product with every unit paying both the probe
/// and the inspection timeout. Probes return early on success, so real runs
/// finish well under this.
pub fn estimate(
    addrs_per_block: u64,
    port_count: u64,
    probe_timeout: Duration,
    inspect_timeout: Duration,
) -> Duration {
    (probe_timeout + inspect_timeout).mul_f64((addrs_per_block * port_count) as f64)
}

/// Log the run totals and the ETA before the sweep starts.
pub fn scan_banner(config: &ScanConfig, ports: &[u16], block_count: usize, eta: Duration) {
    let total_addrs = config.range.num_addresses();
    let port_list = ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    info!(range = %config.range, "IP range to scan");
    info!(addresses = total_addrs, ports = ports.len(), port_list = %port_list, "scan surface");
    info!(
        probe_timeout_secs = config.probe_timeout.as_secs(),
        inspect_timeout_secs = config.inspect_timeout.as_secs(),
        "timeouts"
    );
    info!(
        total_units = total_addrs * ports.len() as u64,
        workers = block_count,
        addresses_per_worker = total_addrs / block_count as u64,
        "totals"
    );
    info!(
        estimated_max = %humanize(eta),
        "estimated maximum time to complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_breaks_down_components() {
        assert_eq!(
            humanize(Duration::from_secs(0)),
            "0 day(s) 0 hour(s) 0 minute(s) 0 second(s)"
        );
        assert_eq!(
            humanize(Duration::from_secs(90)),
            "0 day(s) 0 hour(s) 1 minute(s) 30 second(s)"
        );
        assert_eq!(
            humanize(Duration::from_secs(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5)),
            "2 day(s) 3 hour(s) 4 minute(s) 5 second(s)"
        );
    }

    #[test]
    fn estimate_scales_with_block_surface() {
        let eta = estimate(64, 2, Duration::from_secs(5), Duration::from_secs(10));
        assert_eq!(eta, Duration::from_secs(64 * 2 * 15));
    }
}
