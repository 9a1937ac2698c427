use std::cmp::Ordering;

use crate::eval::Value;

/// Percentile of an ascending slice with linear interpolation between ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

pub fn sorted_numbers<I: IntoIterator<Item = f64>>(values: I) -> Vec<f64> {
    let mut numbers: Vec<f64> = values.into_iter().filter(|n| !n.is_nan()).collect();
    numbers.sort_by(f64::total_cmp);
    numbers
}

/// `[Q1 - k*IQR, Q3 + k*IQR]` of an ascending slice.
pub fn quartile_range(sorted: &[f64], k: f64) -> (f64, f64) {
    let q1 = percentile(sorted, 25.0);
    let q3 = percentile(sorted, 75.0);
    let iqr = q3 - q1;
    (q1 - k * iqr, q3 + k * iqr)
}

/// Index of the bin `x` falls in: the number of edges `<= x`.
pub fn digitize(x: f64, edges: &[f64]) -> usize {
    edges.iter().take_while(|edge| **edge <= x).count()
}

/// Two decimals with trailing zeros and dot trimmed: `2.50` -> `2.5`, `3.00` -> `3`.
pub fn format_edge(edge: f64) -> String {
    let text = format!("{:.2}", edge);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Distinct values with their counts, most frequent first. Ties keep value order.
pub fn value_counts<'a, I: IntoIterator<Item = &'a Value>>(values: I) -> Vec<(Value, usize)> {
    let mut sorted: Vec<&Value> = values.into_iter().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut counts: Vec<(Value, usize)> = Vec::new();
    for value in sorted {
        match counts.last_mut() {
            Some((last, n)) if last.total_cmp(value) == Ordering::Equal => *n += 1,
            _ => counts.push((value.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert_eq!(percentile(&values, 50.0), 2.5);
        assert_eq!(percentile(&values, 25.0), 1.75);
        assert_eq!(percentile(&[7.0], 80.0), 7.0);
    }

    #[test]
    fn test_digitize_left_closed() {
        let edges = [0.0, 2.0, 4.0];
        assert_eq!(digitize(-1.0, &edges), 0);
        assert_eq!(digitize(0.0, &edges), 1);
        assert_eq!(digitize(2.0, &edges), 2);
        assert_eq!(digitize(3.9, &edges), 2);
        assert_eq!(digitize(4.0, &edges), 3);
    }

    #[test]
    fn test_format_edge() {
        assert_eq!(format_edge(3.0), "3");
        assert_eq!(format_edge(2.5), "2.5");
        assert_eq!(format_edge(1.456), "1.46");
        assert_eq!(format_edge(10.0), "10");
        assert_eq!(format_edge(0.0), "0");
    }

    #[test]
    fn test_value_counts_order() {
        let values = vec![
            Value::from("b"),
            Value::from("a"),
            Value::from("b"),
            Value::from("c"),
        ];
        let counts = value_counts(&values);
        assert_eq!(
            counts,
            vec![
                (Value::from("b"), 2),
                (Value::from("a"), 1),
                (Value::from("c"), 1)
            ]
        );
    }
}
