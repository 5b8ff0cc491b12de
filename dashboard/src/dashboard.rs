use crate::chart;
use crate::history::HistoryStore;
use crate::model::{LedState, Metric, PerMetric, Sample, SensorMessage};
use crate::series::{ChartData, RollingSeries};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// Live state of the sensor dashboard, owned by a single task
#[derive(Debug, Clone)]
pub struct DashboardState {
    latest: PerMetric<Option<f64>>,
    series: PerMetric<RollingSeries>,
    led_state: LedState,
    updated_at: Option<DateTime<Utc>>,
}

/// Read-only copy published after every applied message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub latest: PerMetric<Option<f64>>,
    pub led_state: LedState,
    pub series: PerMetric<ChartData>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DashboardState {
    pub fn new(series_capacity: usize) -> Self {
        Self {
            latest: PerMetric::default(),
            series: PerMetric::from_fn(|_| RollingSeries::new(series_capacity)),
            led_state: LedState::default(),
            updated_at: None,
        }
    }

    /// Fold one validated message into the state.
    ///
    /// Only the metrics present in the message change. Returns the samples that
    /// were appended, in metric order.
    pub fn apply(&mut self, message: &SensorMessage) -> Vec<(Metric, Sample)> {
        let samples: Vec<(Metric, Sample)> = message.samples().collect();

        for (metric, sample) in &samples {
            *self.latest.get_mut(*metric) = Some(sample.value);
            self.series.get_mut(*metric).push(*sample);
        }

        if let Some(led_state) = message.led_state {
            self.led_state = led_state;
        }
        self.updated_at = Some(message.received_at);

        samples
    }

    pub fn latest(&self, metric: Metric) -> Option<f64> {
        *self.latest.get(metric)
    }

    pub fn series(&self, metric: Metric) -> &RollingSeries {
        self.series.get(metric)
    }

    pub fn led_state(&self) -> LedState {
        self.led_state
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            latest: self.latest.clone(),
            led_state: self.led_state,
            series: PerMetric::from_fn(|m| self.series.get(m).chart_data()),
            updated_at: self.updated_at,
        }
    }

    /// Status card followed by one chart per metric
    pub fn render(&self) -> String {
        let mut out = String::from("ESP32 Sensor Data\n");
        for metric in Metric::ALL {
            match self.latest(metric) {
                Some(value) => {
                    out.push_str(&format!("  {}: {} {}\n", metric.label(), value, metric.unit()))
                }
                None => out.push_str(&format!("  {}: Loading...\n", metric.label())),
            }
        }
        out.push_str(&format!("  LED State: {}\n", self.led_state));

        for (metric, series) in self.series.iter() {
            out.push('\n');
            if series.is_empty() {
                out.push_str(&format!("{} ({})\n  waiting for data\n", metric.label(), metric.unit()));
                continue;
            }

            let chart_data = series.chart_data();
            let values: Vec<Option<f64>> = chart_data.data.iter().copied().map(Some).collect();
            let title = format!("{} [{}/{}]", metric.label(), series.len(), series.capacity());
            out.push_str(&chart::render(&title, metric.unit(), &chart_data.labels, &values));
        }
        out
    }
}

/// Apply decoded messages one at a time until the feed side hangs up
pub async fn run_dashboard(
    mut rx: mpsc::Receiver<SensorMessage>,
    mut state: DashboardState,
    mut history: Option<HistoryStore>,
    snapshots: watch::Sender<Snapshot>,
    print: bool,
) -> DashboardState {
    info!(
        "Starting dashboard with series capacity {}, history {}",
        state.series(Metric::Co2).capacity(),
        if history.is_some() { "on" } else { "off" }
    );

    while let Some(message) = rx.recv().await {
        let samples = state.apply(&message);
        debug!("Applied message with {} readings", samples.len());

        if let Some(store) = history.as_mut() {
            for (metric, sample) in &samples {
                if let Err(e) = store.append(*metric, *sample).await {
                    error!("Failed to persist {} sample: {}", metric, e);
                }
            }
        }

        snapshots.send_replace(state.snapshot());

        if print {
            println!("{}", state.render());
        }
    }

    info!("Feed channel closed, dashboard stopped");
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::decode_message;
    use crate::history::load_history;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn message_at(i: i64, payload: &str) -> SensorMessage {
        let at = Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap();
        decode_message(payload, at).unwrap()
    }

    #[test]
    fn test_fields_update_independently() {
        let mut state = DashboardState::new(10);
        state.apply(&message_at(0, r#"{"co2": 400, "temperature": 20.0}"#));
        state.apply(&message_at(1, r#"{"humidity": 45}"#));

        assert_eq!(state.latest(Metric::Co2), Some(400.0));
        assert_eq!(state.latest(Metric::Temperature), Some(20.0));
        assert_eq!(state.latest(Metric::Humidity), Some(45.0));
        assert_eq!(state.series(Metric::Co2).len(), 1);
        assert_eq!(state.series(Metric::Humidity).len(), 1);
    }

    #[test]
    fn test_after_n_plus_k_messages_holds_last_n() {
        let mut state = DashboardState::new(10);
        for i in 0..17 {
            state.apply(&message_at(i, &format!("{{\"co2\": {}}}", 400 + i)));
        }

        let values = state.series(Metric::Co2).values();
        let expected: Vec<f64> = (7..17).map(|i| (400 + i) as f64).collect();
        assert_eq!(values, expected);
        assert_eq!(state.latest(Metric::Co2), Some(416.0));
        assert!(state.series(Metric::Temperature).is_empty());
    }

    #[test]
    fn test_led_only_changes_when_present() {
        let mut state = DashboardState::new(10);
        assert_eq!(state.led_state(), LedState::Off);

        state.apply(&message_at(0, r#"{"ledState": "1"}"#));
        assert_eq!(state.led_state(), LedState::On);

        state.apply(&message_at(1, r#"{"co2": 500}"#));
        assert_eq!(state.led_state(), LedState::On);

        state.apply(&message_at(2, r#"{"ledState": "0"}"#));
        assert_eq!(state.led_state(), LedState::Off);
    }

    #[test]
    fn test_render_before_first_reading() {
        let state = DashboardState::new(10);
        let text = state.render();
        assert!(text.contains("CO2 Level: Loading..."));
        assert!(text.contains("LED State: OFF"));
    }

    #[test]
    fn test_run_dashboard_publishes_snapshots() {
        tokio_test::block_on(async {
            let (tx, rx) = mpsc::channel(16);
            let (snap_tx, snap_rx) = watch::channel(Snapshot::default());

            for i in 0..3 {
                tx.send(message_at(i, &format!("{{\"temperature\": {}}}", 20 + i)))
                    .await
                    .unwrap();
            }
            drop(tx);

            let state = run_dashboard(rx, DashboardState::new(2), None, snap_tx, false).await;

            let snapshot = snap_rx.borrow().clone();
            assert_eq!(snapshot.latest.temperature, Some(22.0));
            assert_eq!(snapshot.series.temperature.data, vec![21.0, 22.0]);
            assert_eq!(snapshot, state.snapshot());
        });
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("dashboard-state-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_run_dashboard_appends_history() {
        let dir = scratch_dir();
        let store = HistoryStore::open(&dir, 3).await.unwrap();
        let (tx, rx) = mpsc::channel(16);
        let (snap_tx, _snap_rx) = watch::channel(Snapshot::default());

        for i in 0..5 {
            let payload = format!("{{\"co2\": {}, \"humidity\": {}}}", 400 + i, 40 + i);
            tx.send(message_at(i, &payload)).await.unwrap();
        }
        tx.send(message_at(5, r#"{"temperature": 21.5}"#)).await.unwrap();
        drop(tx);

        run_dashboard(rx, DashboardState::new(10), Some(store), snap_tx, false).await;

        let logs = load_history(&dir).await.unwrap();
        let co2: Vec<f64> = logs.co2.iter().map(|s| s.value).collect();
        let humidity: Vec<f64> = logs.humidity.iter().map(|s| s.value).collect();
        assert_eq!(co2, vec![402.0, 403.0, 404.0]);
        assert_eq!(humidity, vec![42.0, 43.0, 44.0]);
        let at = Utc.timestamp_opt(1_700_000_005, 0).unwrap();
        assert_eq!(logs.temperature, vec![Sample::new(at, 21.5)]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_history_write_failure_keeps_live_state() {
        let dir = scratch_dir();
        let store = HistoryStore::open(&dir, 10).await.unwrap();

        // Directory replaced by a plain file, every write now fails
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"not a directory").unwrap();

        let (tx, rx) = mpsc::channel(16);
        let (snap_tx, snap_rx) = watch::channel(Snapshot::default());
        tx.send(message_at(0, r#"{"co2": 700, "ledState": "1"}"#)).await.unwrap();
        tx.send(message_at(1, r#"{"co2": 710, "temperature": 22.0}"#)).await.unwrap();
        drop(tx);

        let state = run_dashboard(rx, DashboardState::new(10), Some(store), snap_tx, false).await;

        assert_eq!(state.latest(Metric::Co2), Some(710.0));
        assert_eq!(state.latest(Metric::Temperature), Some(22.0));
        assert_eq!(state.series(Metric::Co2).values(), vec![700.0, 710.0]);
        assert_eq!(state.led_state(), LedState::On);
        assert_eq!(*snap_rx.borrow(), state.snapshot());

        let _ = std::fs::remove_file(&dir);
    }
}
