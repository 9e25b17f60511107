//! Display helpers. Lossy, but the same input always gives the same text.

use itertools::Itertools;

pub const NANOS_PER_IOTA: u64 = 1_000_000_000;

const SECONDS_PER_YEAR: u64 = 31_536_000;
const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

const SHORT_SCALES: [(f64, &str); 5] = [
    (1.0, ""),
    (1e3, "K"),
    (1e6, "M"),
    (1e9, "B"),
    (1e12, "T"),
];

pub fn object_explorer_url(explorer_url: &str, id: impl std::fmt::Display) -> String {
    format!("{}/object/{id}", explorer_url.trim_end_matches('/'))
}

pub fn nanos_to_iota(amount: u64) -> f64 {
    amount as f64 / NANOS_PER_IOTA as f64
}

/// `0x` plus the first and last `visible` digits, e.g. `0x30a8...e36e`.
pub fn shorten_hex(hex: &str, visible: usize) -> String {
    if hex.len() <= 2 + visible * 2 || !hex.is_ascii() {
        return hex.to_string();
    }
    format!("{}...{}", &hex[..2 + visible], &hex[hex.len() - visible..])
}

/// `1d 2h 5s`; zero units are skipped and anything below a second is empty.
pub fn time_human_readable(milliseconds: u64) -> String {
    let seconds = milliseconds / 1000;
    let units = [
        (seconds / SECONDS_PER_YEAR, "y"),
        ((seconds % SECONDS_PER_YEAR) / SECONDS_PER_DAY, "d"),
        ((seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR, "h"),
        ((seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE, "m"),
        (seconds % SECONDS_PER_MINUTE, "s"),
    ];
    units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .join(" ")
}

pub fn round_fractional(num: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (num * factor).round() / factor
}

/// Thousands grouped with dots: `1234567` becomes `1.234.567`.
pub fn format_num(num: u64) -> String {
    let digits = num.to_string();
    let head = digits.len() % 3;
    let mut groups = Vec::with_capacity(digits.len() / 3 + 1);
    if head > 0 {
        groups.push(&digits[..head]);
    }
    groups.extend(
        (head..digits.len())
            .step_by(3)
            .map(|start| &digits[start..start + 3]),
    );
    groups.join(".")
}

/// Two decimals and the largest fitting suffix: `1500` becomes `1.50 K`.
pub fn format_num_short(num: f64) -> String {
    let (scale, suffix) = SHORT_SCALES
        .iter()
        .rev()
        .find(|(scale, _)| num >= *scale)
        .copied()
        .unwrap_or(SHORT_SCALES[0]);
    let scaled = format!("{:.2}", num / scale);
    if suffix.is_empty() {
        scaled
    } else {
        format!("{scaled} {suffix}")
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn object_explorer_url__joins_base_and_id() {
        assert_eq!(
            "https://explorer.iota.org/object/0xabc",
            object_explorer_url("https://explorer.iota.org/", "0xabc")
        );
    }

    #[test]
    fn nanos_to_iota__divides_by_a_billion() {
        assert_eq!(10.0, nanos_to_iota(10_000_000_000));
        assert_eq!(0.01, nanos_to_iota(10_000_000));
    }

    #[test]
    fn shorten_hex__keeps_prefix_and_tail() {
        let id = "0x30a86d4f81fe8609ff7e4774b3fc281597e72c2911e805b3180b05c95baae36e";

        assert_eq!("0x30a8...e36e", shorten_hex(id, 4));
        assert_eq!("0x12", shorten_hex("0x12", 4));
    }

    #[test]
    fn time_human_readable__skips_zero_units() {
        let ms = (SECONDS_PER_DAY + 2 * SECONDS_PER_HOUR + 5) * 1000;

        assert_eq!("1d 2h 5s", time_human_readable(ms));
        assert_eq!("1y", time_human_readable(SECONDS_PER_YEAR * 1000));
        assert_eq!("", time_human_readable(999));
    }

    #[test]
    fn round_fractional__rounds_to_given_decimals() {
        assert_eq!(1.23, round_fractional(1.2345, 2));
        assert_eq!(2.0, round_fractional(1.5, 0));
    }

    #[test]
    fn format_num__groups_thousands_from_the_right() {
        assert_eq!("0", format_num(0));
        assert_eq!("999", format_num(999));
        assert_eq!("1.234", format_num(1234));
        assert_eq!("12.345.678", format_num(12_345_678));
        assert_eq!("100.000", format_num(100_000));
    }

    #[test]
    fn format_num_short__picks_largest_scale() {
        assert_eq!("0.00", format_num_short(0.0));
        assert_eq!("12.00", format_num_short(12.0));
        assert_eq!("1.50 K", format_num_short(1_500.0));
        assert_eq!("2.00 M", format_num_short(2_000_000.0));
        assert_eq!("1000.00 T", format_num_short(1e15));
    }

    #[test]
    fn formatting__is_deterministic() {
        for n in [0u64, 7, 1_000, 987_654_321] {
            assert_eq!(format_num(n), format_num(n));
            assert_eq!(format_num_short(n as f64), format_num_short(n as f64));
            assert_eq!(time_human_readable(n), time_human_readable(n));
        }
    }
}
