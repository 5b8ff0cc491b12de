use crate::errors::Result;
use crate::model::{Metric, PerMetric, Sample};
use chrono::SecondsFormat;
use std::io::Write;

pub const CSV_HEADER: [&str; 6] = [
    "co2_time",
    "co2_ppm",
    "temperature_time",
    "temperature_c",
    "humidity_time",
    "humidity_pct",
];

/// Flatten the three metric logs into one table.
///
/// Row `i` holds the `i`-th sample of every log that has one; shorter logs
/// leave their time and value fields empty. Returns the number of data rows.
pub fn export_csv<W: Write>(history: &PerMetric<Vec<Sample>>, writer: W) -> Result<usize> {
    let rows = Metric::ALL
        .iter()
        .map(|m| history.get(*m).len())
        .max()
        .unwrap_or(0);

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;

    for i in 0..rows {
        let mut record: Vec<String> = Vec::with_capacity(CSV_HEADER.len());
        for metric in Metric::ALL {
            match history.get(metric).get(i) {
                Some(sample) => {
                    record.push(sample.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));
                    record.push(sample.value.to_string());
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(rows)
}

pub fn export_csv_string(history: &PerMetric<Vec<Sample>>) -> Result<String> {
    let mut buffer = Vec::new();
    export_csv(history, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
