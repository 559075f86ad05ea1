use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Weekly repetition extracted from a phrase like `Walk dog every Monday at 6pm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub description: String,
    /// 0 = Sunday … 6 = Saturday.
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
}

fn phrase_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(.+?) every (\w+) at (\d{1,2})\s?(am|pm)\b")
            .expect("recurrence pattern is valid")
    })
}

pub fn weekday_index(name: &str) -> Option<u8> {
    match name.to_ascii_lowercase().as_str() {
        "sunday" => Some(0),
        "monday" => Some(1),
        "tuesday" => Some(2),
        "wednesday" => Some(3),
        "thursday" => Some(4),
        "friday" => Some(5),
        "saturday" => Some(6),
        _ => None,
    }
}

fn to_24_hour(hour: u8, meridiem: &str) -> Option<u8> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = meridiem.eq_ignore_ascii_case("pm");
    Some(match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    })
}

/// Parses `<description> every <weekday> at <N>(am|pm)`, case-insensitively.
///
/// Anything else yields `None`; callers simply skip scheduling.
pub fn parse(input: &str) -> Option<Recurrence> {
    let Some(captures) = phrase_pattern().captures(input.trim()) else {
        debug!(input, "no recurrence phrase found");
        return None;
    };
    let description = captures[1].trim().to_string();
    let Some(weekday) = weekday_index(&captures[2]) else {
        debug!(input, weekday = &captures[2], "unknown weekday in recurrence phrase");
        return None;
    };
    let hour = captures[3].parse::<u8>().ok().and_then(|h| to_24_hour(h, &captures[4]));
    let Some(hour) = hour else {
        debug!(input, "hour out of range in recurrence phrase");
        return None;
    };
    if description.is_empty() {
        return None;
    }
    Some(Recurrence {
        description,
        weekday,
        hour,
        minute: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weekly_phrase() {
        let parsed = parse("Walk dog every Monday at 6pm").unwrap();
        assert_eq!(
            parsed,
            Recurrence {
                description: "Walk dog".into(),
                weekday: 1,
                hour: 18,
                minute: 0,
            }
        );
    }

    #[test]
    fn is_case_insensitive() {
        let parsed = parse("PAY RENT EVERY sunday AT 9AM").unwrap();
        assert_eq!(parsed.description, "PAY RENT");
        assert_eq!(parsed.weekday, 0);
        assert_eq!(parsed.hour, 9);
    }

    #[test]
    fn noon_and_midnight() {
        assert_eq!(parse("Lunch every friday at 12pm").unwrap().hour, 12);
        assert_eq!(parse("Backup every saturday at 12am").unwrap().hour, 0);
    }

    #[test]
    fn rejects_malformed_phrases() {
        assert!(parse("Buy milk").is_none());
        assert!(parse("Buy milk every someday at 5pm").is_none());
        assert!(parse("Buy milk every monday at 17pm").is_none());
        assert!(parse("Buy milk every monday at 5").is_none());
        assert!(parse("every monday at 5pm").is_none());
    }
}
