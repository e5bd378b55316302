//! Number format application for cell display text.
//!
//! Spreadsheet number format codes are a mini-language. We support the codes
//! training plans actually use and fall back to the default decimal display
//! for anything else:
//!
//! - `General` / `@`
//! - fixed and optional decimals: `0`, `0.00`, `0.##`
//! - thousands separators: `#,##0.00`
//! - percentages: `0%`, `0.0%`
//! - literal text: `0.0" kg"`, `\x`, currency symbols
//! - sections: `positive;negative;zero`
//! - dates and times in the 1900 date system: `dd.mm.yyyy`, `h:mm`, `d-mmm-yy`
//!
//! Color (`[Red]`) and condition (`[>100]`) brackets are stripped.

use crate::types::{Cell, CellValue};

/// Largest serial date (9999-12-31) in the 1900 date system.
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Maximum decimal places honoured by numeric formats.
const MAX_DECIMALS: usize = 10;

/// Built-in number format IDs (0-49 are predefined by the format).
/// See: ECMA-376 Part 1, Section 18.8.30
pub const fn builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        5 => Some("$#,##0_);($#,##0)"),
        6 => Some("$#,##0_);[Red]($#,##0)"),
        7 => Some("$#,##0.00_);($#,##0.00)"),
        8 => Some("$#,##0.00_);[Red]($#,##0.00)"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0 ;(#,##0)"),
        38 => Some("#,##0 ;[Red](#,##0)"),
        39 => Some("#,##0.00;(#,##0.00)"),
        40 => Some("#,##0.00;[Red](#,##0.00)"),
        45 => Some("mm:ss"),
        49 => Some("@"),
        _ => None,
    }
}

/// Default decimal display: integers without a fraction, other values with
/// trailing zeros trimmed.
///
/// Returns `None` for non-finite values.
#[allow(clippy::cast_possible_truncation)]
pub fn format_default(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return Some(format!("{}", value as i64));
    }
    if value.abs() >= 1e15 || value.abs() < 1e-9 {
        return Some(format!("{value:E}"));
    }
    let s = format!("{value:.10}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    Some(s.to_string())
}

/// Format a numeric value with a format code.
///
/// Returns `None` when the value cannot be shown under the code (non-finite
/// numbers, dates outside the supported serial range). Callers fall back to
/// the literal value in that case.
pub fn format_number(value: f64, format_code: &str) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let code = format_code.trim();
    if code.is_empty() || code.eq_ignore_ascii_case("General") || code == "@" {
        return format_default(value);
    }

    let sections = split_sections(code);
    let (section, use_abs) = pick_section(&sections, value);
    let section = strip_brackets(section);
    if section.eq_ignore_ascii_case("General") {
        return format_default(value);
    }

    if is_date_format(&section) {
        return format_date(value, &section);
    }

    let shown = if use_abs { value.abs() } else { value };
    Some(format_numeric(shown, &section))
}

/// Text shown for a cell.
///
/// Document-supplied display text wins. Numbers use their format code when
/// one is present and the default decimal display otherwise; a number the
/// code cannot display falls back to its literal representation.
pub fn display_text(cell: &Cell) -> String {
    if let Some(ref display) = cell.display {
        return display.clone();
    }
    match &cell.value {
        CellValue::Empty => String::new(),
        CellValue::Text(s) | CellValue::Error(s) | CellValue::Malformed(s) => s.clone(),
        CellValue::Boolean(true) => "TRUE".to_string(),
        CellValue::Boolean(false) => "FALSE".to_string(),
        CellValue::Number(n) => {
            let formatted = match cell.format.as_deref() {
                Some(code) => format_number(*n, code),
                None => format_default(*n),
            };
            formatted.unwrap_or_else(|| n.to_string())
        }
    }
}

/// Check if a format code is a date/time format.
///
/// Date tokens inside quoted literals do not count.
pub fn is_date_format(format_code: &str) -> bool {
    let mut in_quotes = false;
    let mut escaped = false;
    for ch in format_code.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if !in_quotes => escaped = true,
            'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' | 'm' | 'M' if !in_quotes => {
                return true;
            }
            _ => {}
        }
    }
    false
}

/// Split a format code on `;` outside quoted literals.
fn split_sections(code: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, ch) in code.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                sections.push(code.get(start..i).unwrap_or(""));
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(code.get(start..).unwrap_or(""));
    sections
}

/// Choose the section for a value. The flag is true when the section carries
/// its own sign (negative section), so the value is shown unsigned.
fn pick_section<'a>(sections: &[&'a str], value: f64) -> (&'a str, bool) {
    let first = sections.first().copied().unwrap_or("General");
    if value < 0.0 {
        if let Some(neg) = sections.get(1) {
            return (neg, true);
        }
    } else if value == 0.0 {
        if let Some(zero) = sections.get(2) {
            return (zero, false);
        }
    }
    (first, false)
}

/// Remove `[Red]`, `[>100]` and similar bracketed directives.
fn strip_brackets(section: &str) -> String {
    let mut out = String::with_capacity(section.len());
    let mut depth = 0u32;
    let mut in_quotes = false;
    for ch in section.chars() {
        match ch {
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Compiled numeric section: literal prefix, digit pattern, literal suffix.
#[derive(Debug, Default)]
struct NumericPattern {
    prefix: String,
    suffix: String,
    min_int_digits: usize,
    min_decimals: usize,
    max_decimals: usize,
    thousands: bool,
    percent: bool,
    has_digits: bool,
}

fn compile_numeric(section: &str) -> NumericPattern {
    let mut pattern = NumericPattern::default();
    let mut chars = section.chars().peekable();
    let mut seen_digits = false;
    let mut after_point = false;

    while let Some(ch) = chars.next() {
        let literal: Option<String> = match ch {
            '"' => {
                let mut lit = String::new();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    lit.push(c);
                }
                Some(lit)
            }
            '\\' => chars.next().map(String::from),
            '_' => {
                chars.next();
                Some(" ".to_string())
            }
            '*' => {
                chars.next();
                None
            }
            '0' | '#' | '?' => {
                seen_digits = true;
                if after_point {
                    pattern.max_decimals += 1;
                    if ch == '0' {
                        pattern.min_decimals += 1;
                    }
                } else if ch == '0' {
                    pattern.min_int_digits += 1;
                }
                None
            }
            '.' if !after_point => {
                after_point = true;
                seen_digits = true;
                None
            }
            ',' if seen_digits && !after_point => {
                pattern.thousands = true;
                None
            }
            '%' => {
                pattern.percent = true;
                Some("%".to_string())
            }
            other => Some(other.to_string()),
        };

        if let Some(lit) = literal {
            if seen_digits {
                pattern.suffix.push_str(&lit);
            } else {
                pattern.prefix.push_str(&lit);
            }
        }
    }

    pattern.has_digits = seen_digits;
    pattern.max_decimals = pattern.max_decimals.min(MAX_DECIMALS);
    pattern.min_decimals = pattern.min_decimals.min(pattern.max_decimals);
    pattern
}

fn format_numeric(value: f64, section: &str) -> String {
    let pattern = compile_numeric(section);
    if !pattern.has_digits {
        return format!("{}{}", pattern.prefix, pattern.suffix);
    }
    let scaled = if pattern.percent { value * 100.0 } else { value };
    let negative = scaled < 0.0;

    // Round half away from zero before formatting; `{:.N}` rounds ties to even.
    let factor = 10f64.powi(i32::try_from(pattern.max_decimals).unwrap_or(0));
    let rounded = (scaled.abs() * factor).round() / factor;
    let text = format!("{:.prec$}", rounded, prec = pattern.max_decimals);
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut frac = frac_part.to_string();
    while frac.len() > pattern.min_decimals && frac.ends_with('0') {
        frac.pop();
    }

    let mut int_digits = int_part.trim_start_matches('0').to_string();
    let min_int = pattern.min_int_digits.max(usize::from(frac.is_empty()));
    while int_digits.len() < min_int {
        int_digits.insert(0, '0');
    }
    if pattern.thousands {
        int_digits = group_thousands(&int_digits);
    }

    let mut out = String::new();
    let is_zero = int_digits.chars().all(|c| c == '0' || c == ',') && frac.chars().all(|c| c == '0');
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(&pattern.prefix);
    out.push_str(&int_digits);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(&frac);
    }
    out.push_str(&pattern.suffix);
    out
}

/// Insert `,` between groups of three digits.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, PartialEq)]
enum DateToken {
    Year4,
    Year2,
    MonthFull,
    MonthAbbrev,
    Month2,
    Month1,
    Minute2,
    Minute1,
    DayFull,
    DayAbbrev,
    Day2,
    Day1,
    Hour2,
    Hour1,
    Second2,
    Second1,
    AmPm,
    Literal(String),
}

fn tokenize_date(section: &str) -> Vec<DateToken> {
    let chars: Vec<char> = section.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(&ch) = chars.get(i) {
        let run = chars
            .iter()
            .skip(i)
            .take_while(|c| c.eq_ignore_ascii_case(&ch))
            .count();
        let lower = ch.to_ascii_lowercase();
        match lower {
            'y' => {
                tokens.push(if run > 2 { DateToken::Year4 } else { DateToken::Year2 });
                i += run;
            }
            'm' => {
                tokens.push(match run {
                    1 => DateToken::Month1,
                    2 => DateToken::Month2,
                    3 => DateToken::MonthAbbrev,
                    _ => DateToken::MonthFull,
                });
                i += run;
            }
            'd' => {
                tokens.push(match run {
                    1 => DateToken::Day1,
                    2 => DateToken::Day2,
                    3 => DateToken::DayAbbrev,
                    _ => DateToken::DayFull,
                });
                i += run;
            }
            'h' => {
                tokens.push(if run > 1 { DateToken::Hour2 } else { DateToken::Hour1 });
                i += run;
            }
            's' => {
                tokens.push(if run > 1 { DateToken::Second2 } else { DateToken::Second1 });
                i += run;
            }
            'a' if chars
                .iter()
                .skip(i)
                .take(5)
                .map(char::to_ascii_uppercase)
                .eq("AM/PM".chars()) =>
            {
                tokens.push(DateToken::AmPm);
                i += 5;
            }
            '"' => {
                let lit: String = chars.iter().skip(i + 1).take_while(|c| **c != '"').collect();
                i += lit.chars().count() + 2;
                tokens.push(DateToken::Literal(lit));
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    tokens.push(DateToken::Literal(next.to_string()));
                }
                i += 2;
            }
            _ => {
                tokens.push(DateToken::Literal(ch.to_string()));
                i += 1;
            }
        }
    }

    resolve_minutes(&mut tokens);
    tokens
}

/// `m`/`mm` means minutes right after an hour token or right before a seconds token.
fn resolve_minutes(tokens: &mut [DateToken]) {
    let is_time_neighbour = |t: Option<&DateToken>, hour: bool| match t {
        Some(DateToken::Hour1 | DateToken::Hour2) => hour,
        Some(DateToken::Second1 | DateToken::Second2) => !hour,
        _ => false,
    };

    let significant: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !matches!(t, DateToken::Literal(_)))
        .map(|(i, _)| i)
        .collect();

    for (pos, &idx) in significant.iter().enumerate() {
        let prev = pos
            .checked_sub(1)
            .and_then(|p| significant.get(p))
            .and_then(|&i| tokens.get(i));
        let next = significant.get(pos + 1).and_then(|&i| tokens.get(i));
        let minute = is_time_neighbour(prev, true) || is_time_neighbour(next, false);
        if minute {
            if let Some(token) = tokens.get_mut(idx) {
                match token {
                    DateToken::Month1 => *token = DateToken::Minute1,
                    DateToken::Month2 => *token = DateToken::Minute2,
                    _ => {}
                }
            }
        }
    }
}

fn format_date(serial: f64, section: &str) -> Option<String> {
    if !(0.0..=MAX_DATE_SERIAL).contains(&serial) {
        return None;
    }
    let tokens = tokenize_date(section);
    let (year, month, day, hour, minute, second) = serial_to_components(serial);
    let twelve_hour = tokens.contains(&DateToken::AmPm);
    let display_hour = if twelve_hour {
        match hour % 12 {
            0 => 12,
            h => h,
        }
    } else {
        hour
    };

    let mut out = String::new();
    for token in &tokens {
        match token {
            DateToken::Year4 => out.push_str(&format!("{year:04}")),
            DateToken::Year2 => out.push_str(&format!("{:02}", year.rem_euclid(100))),
            DateToken::MonthFull => out.push_str(month_name(month)),
            DateToken::MonthAbbrev => out.push_str(month_name(month).get(..3).unwrap_or("")),
            DateToken::Month2 => out.push_str(&format!("{month:02}")),
            DateToken::Month1 => out.push_str(&month.to_string()),
            DateToken::Minute2 => out.push_str(&format!("{minute:02}")),
            DateToken::Minute1 => out.push_str(&minute.to_string()),
            DateToken::DayFull => out.push_str(weekday_name(serial)),
            DateToken::DayAbbrev => out.push_str(weekday_name(serial).get(..3).unwrap_or("")),
            DateToken::Day2 => out.push_str(&format!("{day:02}")),
            DateToken::Day1 => out.push_str(&day.to_string()),
            DateToken::Hour2 => out.push_str(&format!("{display_hour:02}")),
            DateToken::Hour1 => out.push_str(&display_hour.to_string()),
            DateToken::Second2 => out.push_str(&format!("{second:02}")),
            DateToken::Second1 => out.push_str(&second.to_string()),
            DateToken::AmPm => out.push_str(if hour < 12 { "AM" } else { "PM" }),
            DateToken::Literal(s) => out.push_str(s),
        }
    }
    Some(out)
}

/// Convert a 1900-system serial date to (year, month, day, hour, minute, second).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn serial_to_components(serial: f64) -> (i32, u32, u32, u32, u32, u32) {
    let mut days = serial.floor() as i64;
    let mut total_seconds = (serial.fract() * 86_400.0).round() as u32;
    if total_seconds >= 86_400 {
        total_seconds -= 86_400;
        days += 1;
    }

    // Serial 60 is the phantom 1900-02-29 kept for Lotus compatibility.
    let (year, month, day) = if days == 60 {
        (1900, 2, 29)
    } else {
        // JDN of 1899-12-31 is 2415020; serials after the phantom day shift by one.
        let jdn = if days < 60 { days + 2_415_020 } else { days + 2_415_019 };
        jdn_to_ymd(jdn)
    };

    (
        year,
        month,
        day,
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
    )
}

/// Julian Day Number to proleptic Gregorian (year, month, day).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn jdn_to_ymd(jdn: i64) -> (i32, u32, u32) {
    let f = jdn + 1401 + (((4 * jdn + 274_277) / 146_097) * 3) / 4 - 38;
    let e = 4 * f + 3;
    let g = (e % 1461) / 4;
    let h = 5 * g + 2;
    let day = (h % 153) / 5 + 1;
    let month = ((h / 153 + 2) % 12) + 1;
    let year = e / 1461 - 4716 + (12 + 2 - month) / 12;
    (year as i32, month as u32, day as u32)
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

/// Serial 1 (1900-01-01) was a Sunday in the 1900 date system.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn weekday_name(serial: f64) -> &'static str {
    match (serial.floor() as i64).rem_euclid(7) {
        1 => "Sunday",
        2 => "Monday",
        3 => "Tuesday",
        4 => "Wednesday",
        5 => "Thursday",
        6 => "Friday",
        _ => "Saturday",
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(80.0, "80"; "integer")]
    #[test_case(82.5, "82.5"; "fraction")]
    #[test_case(0.1 + 0.2, "0.3"; "float noise trimmed")]
    #[test_case(-3.0, "-3"; "negative integer")]
    fn test_default_format(value: f64, expected: &str) {
        assert_eq!(format_default(value).unwrap(), expected);
    }

    #[test]
    fn test_default_rejects_non_finite() {
        assert_eq!(format_default(f64::NAN), None);
        assert_eq!(format_number(f64::INFINITY, "0.00"), None);
    }

    #[test_case(62.5, "0", "63"; "rounded integer")]
    #[test_case(62.5, "0.00", "62.50"; "fixed decimals")]
    #[test_case(62.5, "0.##", "62.5"; "optional decimals")]
    #[test_case(62.0, "0.##", "62"; "optional decimals integer")]
    #[test_case(1_234_567.891, "#,##0.00", "1,234,567.89"; "thousands")]
    #[test_case(0.75, "0%", "75%"; "percent")]
    #[test_case(0.125, "0.0%", "12.5%"; "percent decimals")]
    #[test_case(72.5, "0.0\" kg\"", "72.5 kg"; "quoted suffix")]
    #[test_case(-5.0, "0;(0)", "(5)"; "negative section")]
    #[test_case(-5.0, "0.0", "-5.0"; "single section negative")]
    #[test_case(0.0, "0;-0;\"rest\"", "rest"; "zero section")]
    #[test_case(12.0, "[Red]0.0", "12.0"; "color stripped")]
    #[test_case(3.0, "General", "3"; "general")]
    #[test_case(0.4, "0.00", "0.40"; "leading zero kept")]
    fn test_numeric_formats(value: f64, code: &str, expected: &str) {
        assert_eq!(format_number(value, code).unwrap(), expected);
    }

    #[test_case(45_000.0, "yyyy-mm-dd", "2023-03-15"; "iso date")]
    #[test_case(45_000.0, "dd.mm.yyyy", "15.03.2023"; "dotted date")]
    #[test_case(45_000.0, "d-mmm-yy", "15-Mar-23"; "abbrev month")]
    #[test_case(45_000.5, "hh:mm", "12:00"; "minutes after hours")]
    #[test_case(0.75, "h:mm AM/PM", "6:00 PM"; "twelve hour")]
    #[test_case(1.0, "yyyy-mm-dd", "1900-01-01"; "epoch")]
    #[test_case(61.0, "yyyy-mm-dd", "1900-03-01"; "after phantom leap day")]
    fn test_date_formats(value: f64, code: &str, expected: &str) {
        assert_eq!(format_number(value, code).unwrap(), expected);
    }

    #[test]
    fn test_date_out_of_range_is_none() {
        assert_eq!(format_number(-1.0, "yyyy-mm-dd"), None);
        assert_eq!(format_number(3_000_000.0, "yyyy-mm-dd"), None);
    }

    #[test]
    fn test_date_detection_ignores_quoted_text() {
        assert!(is_date_format("yyyy-mm-dd"));
        assert!(!is_date_format("0.0\" kg\""));
        assert!(!is_date_format("#,##0.00"));
    }

    #[test]
    fn test_display_text_fallbacks() {
        let formatted = Cell::new(0, CellValue::Number(72.5)).with_format("0.0\" kg\"");
        assert_eq!(display_text(&formatted), "72.5 kg");
        let out_of_range = Cell::new(0, CellValue::Number(-2.0)).with_format("yyyy-mm-dd");
        assert_eq!(display_text(&out_of_range), "-2");
        let document_text = Cell::new(0, CellValue::Number(0.5)).with_display("50 %");
        assert_eq!(display_text(&document_text), "50 %");
        assert_eq!(display_text(&Cell::new(0, CellValue::Boolean(true))), "TRUE");
        assert_eq!(
            display_text(&Cell::new(0, CellValue::Malformed("1,5x".to_string()))),
            "1,5x"
        );
    }

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin_format(2), Some("0.00"));
        assert_eq!(builtin_format(14), Some("mm-dd-yy"));
        assert_eq!(builtin_format(164), None);
    }
}
