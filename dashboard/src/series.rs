use crate::model::Sample;
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_SERIES_CAPACITY: usize = 10;

/// Fixed-capacity window of the most recent samples of one metric
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSeries {
    samples: VecDeque<Sample>,
    capacity: usize,
}

/// Chart-ready view of a series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

impl RollingSeries {
    /// A zero capacity is bumped to one so the latest sample is always charted
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, dropping the oldest one when full
    pub fn push(&mut self, sample: Sample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn chart_data(&self) -> ChartData {
        ChartData {
            labels: self.samples.iter().map(Sample::label).collect(),
            data: self.values(),
        }
    }
}

impl Default for RollingSeries {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(i: i64) -> Sample {
        let base = Utc.with_ymd_and_hms(2024, 10, 4, 12, 0, 0).unwrap();
        Sample::new(base + Duration::seconds(i), i as f64)
    }

    #[test]
    fn test_fills_up_to_capacity() {
        let mut series = RollingSeries::new(10);
        for i in 0..7 {
            series.push(sample(i));
        }
        assert_eq!(series.len(), 7);
        assert_eq!(series.values(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_keeps_last_n_in_arrival_order() {
        let mut series = RollingSeries::new(10);
        for i in 0..25 {
            series.push(sample(i));
            assert!(series.len() <= 10);
        }

        assert_eq!(series.len(), 10);
        let expected: Vec<f64> = (15..25).map(|i| i as f64).collect();
        assert_eq!(series.values(), expected);
    }

    #[test]
    fn test_random_volume_never_exceeds_capacity() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        for _ in 0..20 {
            let capacity = rng.gen_range(1..20);
            let total = rng.gen_range(0..200);
            let mut series = RollingSeries::new(capacity);
            for i in 0..total {
                series.push(sample(i));
            }

            assert_eq!(series.len(), (total as usize).min(capacity));
            let expected: Vec<f64> = ((total - capacity as i64).max(0)..total)
                .map(|i| i as f64)
                .collect();
            assert_eq!(series.values(), expected);
        }
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut series = RollingSeries::new(0);
        series.push(sample(1));
        series.push(sample(2));
        assert_eq!(series.capacity(), 1);
        assert_eq!(series.values(), vec![2.0]);
    }

    #[test]
    fn test_chart_data_lines_up() {
        let mut series = RollingSeries::default();
        series.push(sample(0));
        series.push(sample(1));

        let chart = series.chart_data();
        assert_eq!(chart.labels.len(), chart.data.len());
        assert_eq!(chart.data, vec![0.0, 1.0]);
    }
}
