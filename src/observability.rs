use std::net::SocketAddr;

use crate::wire::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "railyard_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "railyard_command_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "railyard_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "railyard_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "railyard_connections_rejected_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::Put { .. } => "put",
        Command::Get { .. } => "get",
        Command::Del { .. } => "del",
        Command::Keys { .. } => "keys",
        Command::LineSet { .. } => "line_set",
        Command::LineGet { .. } => "line_get",
        Command::LineDel { .. } => "line_del",
        Command::Report { .. } => "report",
    }
}
