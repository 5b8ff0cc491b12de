use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_messages_total",
        "Total messages received from the sensor feed"
    ))
    .expect("valid metric opts");
    pub static ref VALID_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_valid_messages_total",
        "Total messages applied to the dashboard"
    ))
    .expect("valid metric opts");
    pub static ref INVALID_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_invalid_messages_total",
        "Total malformed messages discarded"
    ))
    .expect("valid metric opts");
    pub static ref HISTORY_WRITE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_history_write_failures_total",
        "Total failed writes to the local history log"
    ))
    .expect("valid metric opts");
    pub static ref FORECAST_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_forecast_requests_total",
        "Total forecast requests issued"
    ))
    .expect("valid metric opts");
    pub static ref FORECAST_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "dashboard_forecast_failures_total",
        "Total forecast requests that failed"
    ))
    .expect("valid metric opts");
    pub static ref FEED_CONNECTED: Gauge = Gauge::with_opts(Opts::new(
        "dashboard_feed_connected",
        "1 while the sensor feed connection is open"
    ))
    .expect("valid metric opts");
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VALID_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HISTORY_WRITE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FORECAST_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FORECAST_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FEED_CONNECTED.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# failed to encode metrics: {}\n", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
