//! Scalar aggregates, rankings and display formatting.

use crate::records::Metric;

/// Sums metrics, counting undefined values as zero.
pub fn sum<I>(values: I) -> f64
where
    I: IntoIterator<Item = Metric>,
{
    values.into_iter().map(Metric::or_zero).sum()
}

/// Returns the `top_n` items with the largest defined metric, largest first.
///
/// Items whose metric is undefined are left out. Equal values keep their
/// input order.
pub fn rank<T, F>(items: &[T], top_n: usize, metric: F) -> Vec<&T>
where
    F: Fn(&T) -> Metric,
{
    let mut ranked: Vec<(f64, &T)> = items
        .iter()
        .filter_map(|item| metric(item).value().map(|v| (v, item)))
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.truncate(top_n);
    ranked.into_iter().map(|(_, item)| item).collect()
}

/// Rounds half away from zero to `decimals` places. Values too large to
/// scale are returned unrounded.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    let rounded = scaled.round() / factor;
    // drop the sign of negative zero
    rounded + 0.0
}

/// Formats a number with `,` thousands separators and at most three
/// fraction digits, e.g. `1234567` → `"1,234,567"` and `0.5` → `"0.5"`.
/// Non-finite values format as `"0"`.
pub fn format_num(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let rounded = round_to(value, 3);
    let text = format!("{:.3}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded < 0.0 { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

/// Formats a percentage with one decimal and a trailing `%`, rounding half
/// away from zero: `12.349` → `"12.3%"`, `12.35` → `"12.4%"`. Non-finite
/// values format as `"0.0%"`.
pub fn format_pct(value: f64) -> String {
    if !value.is_finite() {
        return "0.0%".to_string();
    }
    format!("{:.1}%", round_to(value, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(raw: &[&str]) -> Vec<Metric> {
        raw.iter().map(|r| Metric::parse(r)).collect()
    }

    #[test]
    fn test_sum_counts_undefined_as_zero() {
        assert_eq!(sum(metrics(&["1000", "3000"])), 4000.0);
        assert_eq!(sum(metrics(&["1000", "n/a", "", "3000", "NaN"])), 4000.0);
        assert_eq!(sum(Vec::<Metric>::new()), 0.0);
    }

    #[test]
    fn test_sum_invariant_under_non_numeric_inserts() {
        let base = metrics(&["12.5", "7", "-2"]);
        let mut noisy = base.clone();
        noisy.insert(1, Metric::parse("abc"));
        noisy.push(Metric::parse("inf"));
        noisy.insert(0, Metric::UNDEFINED);
        assert_eq!(sum(base), sum(noisy));
    }

    #[test]
    fn test_rank_descending_and_truncated() {
        let items = vec![("a", "5"), ("b", "50"), ("c", "20"), ("d", "1")];
        let ranked = rank(&items, 3, |(_, v)| Metric::parse(v));
        let names: Vec<_> = ranked.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_length_counts_only_defined() {
        let items = vec![("a", "5"), ("b", "n/a"), ("c", "")];
        assert_eq!(rank(&items, 5, |(_, v)| Metric::parse(v)).len(), 1);
        assert_eq!(rank(&items, 0, |(_, v)| Metric::parse(v)).len(), 0);
        let empty: Vec<(&str, &str)> = Vec::new();
        assert!(rank(&empty, 3, |(_, v)| Metric::parse(v)).is_empty());
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let items = vec![("a", "10"), ("b", "20"), ("c", "10"), ("d", "20"), ("e", "10")];
        let ranked = rank(&items, 5, |(_, v)| Metric::parse(v));
        let names: Vec<_> = ranked.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn test_format_num() {
        assert_eq!(format_num(1234567.0), "1,234,567");
        assert_eq!(format_num(4000.0), "4,000");
        assert_eq!(format_num(999.0), "999");
        assert_eq!(format_num(0.0), "0");
        assert_eq!(format_num(-1234.5), "-1,234.5");
        assert_eq!(format_num(1000.12345), "1,000.123");
        assert_eq!(format_num(f64::NAN), "0");
    }

    #[test]
    fn test_format_pct_rounds_half_away_from_zero() {
        assert_eq!(format_pct(12.34), "12.3%");
        assert_eq!(format_pct(12.349), "12.3%");
        assert_eq!(format_pct(12.35), "12.4%");
        assert_eq!(format_pct(0.0), "0.0%");
        assert_eq!(format_pct(-0.04), "0.0%");
        assert_eq!(format_pct(f64::INFINITY), "0.0%");
    }

    #[test]
    fn test_format_huge_finite_values() {
        let huge = format_num(1e306);
        assert!(huge.starts_with("1,000,"));
        assert!(!huge.contains("inf"));
        assert!(format_num(f64::MAX).chars().all(|c| c.is_ascii_digit() || c == ','));
        assert!(format_num(-f64::MAX).starts_with('-'));
        assert!(!format_pct(f64::MAX).contains("inf"));
        assert!(format_pct(f64::MAX).ends_with(".0%"));
    }
}
