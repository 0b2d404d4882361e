const UNITS: [(f64, &str); 5] = [
    (1e15, "PB"),
    (1e12, "TB"),
    (1e9, "GB"),
    (1e6, "MB"),
    (1e3, "kB"),
];

/// Formats a number of bytes with decimal units and two decimals.
///
/// ```
/// use lsst_rsp::utils::format_bytes;
///
/// assert_eq!(format_bytes(1), "1 B");
/// assert_eq!(format_bytes(1234), "1.23 kB");
/// assert_eq!(format_bytes(1234567890000000), "1.23 PB");
/// ```
pub fn format_bytes(n: u64) -> String {
    let value = n as f64;
    UNITS
        .iter()
        .find(|(threshold, _)| value > *threshold)
        .map(|(threshold, unit)| format!("{:.2} {unit}", value / threshold))
        .unwrap_or_else(|| format!("{n} B"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0, "0 B")]
    #[case::one(1, "1 B")]
    #[case::threshold_is_exclusive(1000, "1000 B")]
    #[case::kilo(1234, "1.23 kB")]
    #[case::mega(12345678, "12.35 MB")]
    #[case::giga(1234567890, "1.23 GB")]
    #[case::tera(1234567890000, "1.23 TB")]
    #[case::peta(1234567890000000, "1.23 PB")]
    #[case::huge(1234567890000000000, "1234.57 PB")]
    fn formats(#[case] n: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(n), expected);
    }

    #[test]
    fn output_grows_with_input() {
        let parse = |s: String| {
            let (num, unit) = s.split_once(' ').unwrap();
            let factor = match unit {
                "PB" => 1e15,
                "TB" => 1e12,
                "GB" => 1e9,
                "MB" => 1e6,
                "kB" => 1e3,
                _ => 1.0,
            };
            num.parse::<f64>().unwrap() * factor
        };
        let samples = [1u64, 999, 1001, 45_000, 2_000_000, 7_500_000_000];
        let values: Vec<f64> = samples.iter().map(|n| parse(format_bytes(*n))).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }
}
