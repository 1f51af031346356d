//! Mixed-format, day-first date parsing for `transaction_date`

use chrono::NaiveDate;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parse a date written in any of the formats the source file mixes.
///
/// Accepted forms:
/// - `YYYY-MM-DD`, `YYYY/MM/DD` and compact `YYYYMMDD`, optionally followed
///   by a time part; year-day-month only when year-month-day is not a real date
/// - numeric `D/M/Y`, `D-M-Y` or `D.M.Y` with a 2- or 4-digit year, read
///   day-first; month-first only when the day-first reading is not a real date
/// - textual months: `2 Jan 2024`, `2-Jan-2024`, `Jan 2 2024`, `January 2, 2024`,
///   optionally followed by a time part
///
/// Returns `None` when no reading yields a valid calendar date.
pub fn parse_mixed_date(input: &str) -> Option<NaiveDate> {
    let text = input.trim();
    if text.is_empty() {
        return None;
    }

    parse_numeric(text).or_else(|| parse_textual(text))
}

fn parse_numeric(text: &str) -> Option<NaiveDate> {
    let (date_part, time_part) = match text.find(['T', ' ']) {
        Some(idx) => (&text[..idx], Some(text[idx + 1..].trim())),
        None => (text, None),
    };

    if let Some(time) = time_part {
        if !looks_like_time(time) {
            return None;
        }
    }

    if date_part.len() == 8 && date_part.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = date_part[..4].parse().ok()?;
        return ymd(year, date_part[4..6].parse().ok()?, date_part[6..].parse().ok()?);
    }

    let separator = date_part.chars().find(|c| matches!(c, '-' | '/' | '.'))?;
    let parts: Vec<&str> = date_part.split(separator).collect();
    let [first, second, third] = parts.as_slice() else {
        return None;
    };
    if ![first, second, third]
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    if first.len() == 4 {
        let year: i32 = first.parse().ok()?;
        let a: u32 = second.parse().ok()?;
        let b: u32 = third.parse().ok()?;
        return ymd(year, a, b).or_else(|| ymd(year, b, a));
    }

    if first.len() > 2 || second.len() > 2 {
        return None;
    }

    let year = parse_year(third)?;
    let a: u32 = first.parse().ok()?;
    let b: u32 = second.parse().ok()?;

    ymd(year, b, a).or_else(|| ymd(year, a, b))
}

fn parse_textual(text: &str) -> Option<NaiveDate> {
    let text = match text.rsplit_once(char::is_whitespace) {
        Some((date, time)) if looks_like_time(time) => date.trim_end(),
        _ => text,
    };

    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '-' | '/' | '.'))
        .filter(|t| !t.is_empty())
        .collect();

    let [first, second, third] = tokens.as_slice() else {
        return None;
    };

    let year = parse_year(third)?;
    let (day, month) = match (month_from_name(first), month_from_name(second)) {
        (None, Some(month)) => (first, month),
        (Some(month), None) => (second, month),
        _ => return None,
    };

    let day = strip_ordinal(day);
    if day.is_empty() || day.len() > 2 || !day.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    ymd(year, month, day.parse().ok()?)
}

fn month_from_name(token: &str) -> Option<u32> {
    let lower = token.to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }

    MONTHS
        .iter()
        .position(|name| {
            *name == lower || name[..3] == lower || (lower == "sept" && *name == "september")
        })
        .map(|idx| idx as u32 + 1)
}

fn strip_ordinal(day: &str) -> &str {
    ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| day.strip_suffix(suffix))
        .unwrap_or(day)
}

/// Four-digit years verbatim; two-digit years pivot at 69 (`00..=68` is 20xx)
fn parse_year(text: &str) -> Option<i32> {
    if !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    match text.len() {
        4 => text.parse().ok(),
        2 => {
            let yy: i32 = text.parse().ok()?;
            Some(if yy < 69 { 2000 + yy } else { 1900 + yy })
        }
        _ => None,
    }
}

fn looks_like_time(text: &str) -> bool {
    !text.is_empty()
        && text.contains(':')
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ':' | '.' | '+' | '-' | 'Z'))
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}
