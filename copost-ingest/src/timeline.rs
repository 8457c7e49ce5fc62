//! Parser for timeline text copied from a profile page.
//!
//! Layout: the first line is ignored, the next two are the display name and
//! handle, the fourth is ignored, and the rest is a run of blocks shaped like
//!
//! ```text
//! ·
//! Mar 4
//! tweet text, possibly
//! over several lines
//! ```
//!
//! Dates may omit the year (`Mar 4`) or be relative (`5h`, `12m`).

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use copost_core::models::TweetRecord;
use regex::Regex;
use serde::Serialize;

const SEPARATOR: &str = "·";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTweet {
    pub date: NaiveDate,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTimeline {
    pub partner_name: String,
    pub partner_handle: String,
    /// Newest first.
    pub tweets: Vec<ParsedTweet>,
}

impl ParsedTimeline {
    /// Import records carrying the parsed handle and name.
    pub fn to_records(&self) -> Vec<TweetRecord> {
        let handle = self.partner_handle.trim_start_matches('@');
        self.tweets
            .iter()
            .map(|t| TweetRecord {
                content: t.content.clone(),
                date: t.date.format("%Y-%m-%d").to_string(),
                username: (!self.partner_name.is_empty()).then(|| self.partner_name.clone()),
                handle: (!handle.is_empty()).then(|| handle.to_string()),
                ..Default::default()
            })
            .collect()
    }
}

fn date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^(?P<month>[A-Z][a-z]{2}) (?P<day>\d{1,2})(?:, (?P<year>\d{4}))?$").ok()
        })
        .as_ref()
}

fn relative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\d+[smh]$").ok())
        .as_ref()
}

fn month_number(abbrev: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    MONTHS
        .iter()
        .position(|m| *m == abbrev)
        .map(|i| i as u32 + 1)
}

/// Resolve one date line. `last_year` tracks the most recent explicit year.
fn resolve_date(raw: &str, today: NaiveDate, last_year: &mut i32) -> Option<NaiveDate> {
    let raw = raw.trim();
    if relative_pattern()?.is_match(raw) {
        return Some(today);
    }

    let caps = date_pattern()?.captures(raw)?;
    let month = month_number(caps.name("month")?.as_str())?;
    let day: u32 = caps.name("day")?.as_str().parse().ok()?;

    if let Some(year) = caps.name("year") {
        let year: i32 = year.as_str().parse().ok()?;
        *last_year = year;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    // A yearless date that would land after today belongs to the year before
    let candidate = NaiveDate::from_ymd_opt(*last_year, month, day)?;
    if candidate > today {
        NaiveDate::from_ymd_opt(*last_year - 1, month, day)
    } else {
        Some(candidate)
    }
}

/// Parse pasted timeline text. Blocks whose date cannot be resolved are dropped.
pub fn parse_timeline(text: &str, today: NaiveDate) -> ParsedTimeline {
    let lines: Vec<&str> = text.lines().collect();
    let header = |i: usize| lines.get(i).map(|l| l.trim().to_string()).unwrap_or_default();
    let partner_name = header(1);
    let partner_handle = header(2);

    let body: &[&str] = if lines.len() > 4 { &lines[4..] } else { &[] };
    let markers: Vec<usize> = body
        .iter()
        .enumerate()
        .filter(|(_, l)| l.trim() == SEPARATOR)
        .map(|(i, _)| i)
        .collect();

    let mut last_year = today.year();
    let mut tweets = Vec::new();

    for (n, &start) in markers.iter().enumerate() {
        let end = markers.get(n + 1).copied().unwrap_or(body.len());
        let Some(date_line) = body.get(start + 1) else {
            continue;
        };
        let Some(date) = resolve_date(date_line, today, &mut last_year) else {
            continue;
        };

        let content_lines = body.get(start + 2..end).unwrap_or(&[]);
        let content = content_lines
            .iter()
            .flat_map(|l| l.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ");

        if content.is_empty() {
            continue;
        }
        tweets.push(ParsedTweet { date, content });
    }

    tweets.sort_by(|a, b| b.date.cmp(&a.date));

    ParsedTimeline {
        partner_name,
        partner_handle,
        tweets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    const SAMPLE: &str = "Profile\nAcme Protocol\n@acme\n1,234 posts\n·\nJun 10\nMainnet   is\nlive!\n·\nDec 3, 2023\nOld   news\n·\nAug 2\nSummer recap\n·\nnot a date\ndropped\n·\n5h\nfresh take";

    #[test]
    fn test_header_lines_are_extracted() {
        let parsed = parse_timeline(SAMPLE, today());
        assert_eq!(parsed.partner_name, "Acme Protocol");
        assert_eq!(parsed.partner_handle, "@acme");
    }

    #[test]
    fn test_blocks_are_parsed_collapsed_and_sorted_newest_first() {
        let parsed = parse_timeline(SAMPLE, today());
        let got: Vec<(String, &str)> = parsed
            .tweets
            .iter()
            .map(|t| (t.date.to_string(), t.content.as_str()))
            .collect();

        assert_eq!(
            got,
            vec![
                ("2024-06-15".to_string(), "fresh take"),
                ("2024-06-10".to_string(), "Mainnet is live!"),
                ("2023-12-03".to_string(), "Old news"),
                ("2023-08-02".to_string(), "Summer recap"),
            ]
        );
    }

    #[test]
    fn test_timeline_crossing_new_year_resolves_each_side() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let text = "x\nName\n@h\nmeta\n·\nJan 18\nnew year build\n·\nJan 3\nkickoff\n·\nDec 30\nyear in review\n·\nNov 12\nautumn update\n·\nOct 1, 2022\npinned anniversary\n·\nSep 9\nolder still";
        let dates: Vec<String> = parse_timeline(text, today)
            .tweets
            .iter()
            .map(|t| t.date.to_string())
            .collect();

        assert_eq!(
            dates,
            vec![
                "2024-01-18",
                "2024-01-03",
                "2023-12-30",
                "2023-11-12",
                "2022-10-01",
                "2022-09-09",
            ]
        );
    }

    #[test]
    fn test_yearless_date_after_current_month_is_last_year() {
        let text = "x\nName\n@h\nmeta\n·\nNov 20\nlate last year";
        let parsed = parse_timeline(text, today());
        assert_eq!(
            parsed.tweets[0].date,
            NaiveDate::from_ymd_opt(2023, 11, 20).unwrap()
        );
    }

    #[test]
    fn test_short_input_yields_no_tweets() {
        let parsed = parse_timeline("only\nthree\nlines", today());
        assert_eq!(parsed.partner_name, "three");
        assert_eq!(parsed.partner_handle, "lines");
        assert!(parsed.tweets.is_empty());
    }

    #[test]
    fn test_records_carry_handle_without_at() {
        let parsed = parse_timeline(SAMPLE, today());
        let records = parsed.to_records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].handle.as_deref(), Some("acme"));
        assert_eq!(records[0].username.as_deref(), Some("Acme Protocol"));
        assert_eq!(records[1].date, "2024-06-10");
    }
}
