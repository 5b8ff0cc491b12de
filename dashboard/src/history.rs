use crate::errors::Result;
use crate::metrics::HISTORY_WRITE_FAILURES_TOTAL;
use crate::model::{Metric, PerMetric, Sample};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Device-local sample log, one JSON array file per metric key
///
/// Each file holds `[{"timestamp": ..., "value": ...}, ...]`, oldest first,
/// never longer than `cap`. The logs are loaded once on open and rewritten
/// whole on each append.
#[derive(Debug)]
pub struct HistoryStore {
    dir: PathBuf,
    cap: usize,
    logs: PerMetric<Vec<Sample>>,
}

impl HistoryStore {
    pub async fn open(dir: impl AsRef<Path>, cap: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut logs = PerMetric::<Vec<Sample>>::default();
        for metric in Metric::ALL {
            let mut log = read_log(&dir, metric).await?;
            trim_to_cap(&mut log, cap);
            *logs.get_mut(metric) = log;
        }

        info!(
            "History store opened at {} (co2={}, temperature={}, humidity={})",
            dir.display(),
            logs.co2.len(),
            logs.temperature.len(),
            logs.humidity.len()
        );

        Ok(Self { dir, cap, logs })
    }

    /// Append one sample and persist the metric's log
    pub async fn append(&mut self, metric: Metric, sample: Sample) -> Result<()> {
        let log = self.logs.get_mut(metric);
        log.push(sample);
        trim_to_cap(log, self.cap);

        let result = write_log(&self.dir, metric, log).await;
        if result.is_err() {
            HISTORY_WRITE_FAILURES_TOTAL.inc();
        }
        result
    }

    pub async fn clear(&mut self) -> Result<()> {
        for metric in Metric::ALL {
            self.logs.get_mut(metric).clear();
            write_log(&self.dir, metric, &[]).await?;
        }
        info!("History cleared");
        Ok(())
    }
}

/// Load every metric log from `dir` without keeping a store open
pub async fn load_history(dir: impl AsRef<Path>) -> Result<PerMetric<Vec<Sample>>> {
    let dir = dir.as_ref();
    let mut logs = PerMetric::<Vec<Sample>>::default();
    for metric in Metric::ALL {
        *logs.get_mut(metric) = read_log(dir, metric).await?;
    }
    Ok(logs)
}

fn trim_to_cap(log: &mut Vec<Sample>, cap: usize) {
    if log.len() > cap {
        let excess = log.len() - cap;
        log.drain(..excess);
    }
}

fn log_path(dir: &Path, metric: Metric) -> PathBuf {
    dir.join(format!("{}.json", metric.storage_key()))
}

async fn read_log(dir: &Path, metric: Metric) -> Result<Vec<Sample>> {
    let path = log_path(dir, metric);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No history for {} yet", metric);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&bytes) {
        Ok(log) => Ok(log),
        Err(e) => {
            warn!(
                "Discarding unreadable history at {}: {}",
                path.display(),
                e
            );
            Ok(Vec::new())
        }
    }
}

async fn write_log(dir: &Path, metric: Metric, log: &[Sample]) -> Result<()> {
    let path = log_path(dir, metric);
    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_vec(log)?;

    tokio::fs::write(&tmp, payload).await?;
    tokio::fs::rename(&tmp, &path).await?;
    debug!("Persisted {} {} samples", log.len(), metric);
    Ok(())
}
