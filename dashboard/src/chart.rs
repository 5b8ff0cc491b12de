//! Plain-text charts for the terminal
//!
//! Values are scaled into the range of the series and drawn as a one-line
//! sparkline with min/max annotations. Missing values render as a gap.

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const GAP: char = ' ';

/// Minimum y-range so a flat series still renders mid-height
const MIN_DATA_RANGE: f64 = 1e-9;

/// Min/max of the finite values, if any
pub fn bounds(values: &[Option<f64>]) -> Option<(f64, f64)> {
    values
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

pub fn sparkline(values: &[Option<f64>]) -> String {
    let Some((lo, hi)) = bounds(values) else {
        return values.iter().map(|_| GAP).collect();
    };
    let range = hi - lo;

    values
        .iter()
        .map(|value| match value {
            Some(v) if v.is_finite() => {
                if range < MIN_DATA_RANGE {
                    return BARS[BARS.len() / 2];
                }
                let level = ((v - lo) / range * (BARS.len() - 1) as f64).round() as usize;
                BARS[level.min(BARS.len() - 1)]
            }
            _ => GAP,
        })
        .collect()
}

/// Titled chart block: sparkline plus range and first/last labels
pub fn render(title: &str, unit: &str, labels: &[String], values: &[Option<f64>]) -> String {
    let mut out = format!("{} ({})\n", title, unit);

    match bounds(values) {
        Some((lo, hi)) => {
            out.push_str(&format!("  {}  min {:.2} max {:.2}\n", sparkline(values), lo, hi));
        }
        None => {
            out.push_str("  no data\n");
            return out;
        }
    }

    if let (Some(first), Some(last)) = (labels.first(), labels.last()) {
        out.push_str(&format!("  {} .. {}\n", first, last));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparkline_scales_to_range() {
        let line = sparkline(&[Some(0.0), Some(50.0), Some(100.0)]);
        let chars: Vec<char> = line.chars().collect();
        assert_eq!(chars, vec!['▁', '▅', '█']);
    }

    #[test]
    fn test_sparkline_gaps() {
        let line = sparkline(&[Some(1.0), None, Some(2.0)]);
        assert_eq!(line.chars().nth(1), Some(' '));
        assert_eq!(line.chars().count(), 3);
    }

    #[test]
    fn test_flat_series() {
        let line = sparkline(&[Some(21.0), Some(21.0)]);
        assert_eq!(line, "▅▅");
    }

    #[test]
    fn test_render_empty() {
        let block = render("Humidity", "%", &[], &[]);
        assert!(block.contains("no data"));
    }

    #[test]
    fn test_bounds_ignore_missing() {
        assert_eq!(bounds(&[None, Some(3.0), Some(-1.0)]), Some((-1.0, 3.0)));
        assert_eq!(bounds(&[None, None]), None);
    }
}
