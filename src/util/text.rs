use std::borrow::Cow;
use std::sync::OnceLock;

use chrono::{DateTime, Days, FixedOffset, Local, TimeZone};
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

const TIME_FORMAT: &str = "%I:%M %p";
const DAY_FORMAT: &str = "%m/%d/%Y";

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[^>]+(>|$)").expect("static regex"))
}

/// Remove anything that looks like an HTML tag. Entities are left alone.
///
/// An unterminated tag at the end of the input is removed as well.
pub fn strip_html(html: &str) -> String {
    tag_pattern().replace_all(html, "").into_owned()
}

/// Strip tags, then cut to `max_chars` characters with a trailing "...".
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let stripped = strip_html(text);
    match stripped.char_indices().nth(max_chars) {
        None => stripped,
        Some((cut, _)) => format!("{}{ELLIPSIS}", &stripped[..cut]),
    }
}

/// Human-friendly publication date relative to `now` in the local zone.
pub fn format_date(raw: &str, now: DateTime<Local>) -> String {
    format_date_in(raw, &now)
}

/// Human-friendly publication date relative to `now`, rendered in `now`'s zone.
///
/// - same calendar day: `Today, 09:05 AM`
/// - previous day: `Yesterday, 11:40 PM`
/// - otherwise: `03/14/2024, 06:00 PM`
///
/// Accepts RFC 2822 (RSS `pubDate`) and RFC 3339. Anything else yields "".
pub fn format_date_in<Tz>(raw: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(parsed) = parse_timestamp(raw) else {
        return String::new();
    };
    let local = parsed.with_timezone(&now.timezone());
    let time = local.format(TIME_FORMAT);

    let day = local.date_naive();
    let today = now.date_naive();
    if day == today {
        format!("Today, {time}")
    } else if today.checked_sub_days(Days::new(1)) == Some(day) {
        format!("Yesterday, {time}")
    } else {
        format!("{}, {time}", local.format(DAY_FORMAT))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

/// Display width in terminal columns (CJK and emoji count double).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate to at most `max_width` columns, ending in "..." when cut.
///
/// Widths too narrow for a character plus the ellipsis get as many characters
/// as fit and no ellipsis.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width <= ELLIPSIS_WIDTH {
        max_width
    } else {
        max_width - ELLIPSIS_WIDTH
    };

    let mut width = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        cut = idx + c.len_utf8();
    }

    if max_width <= ELLIPSIS_WIDTH {
        Cow::Owned(s[..cut].to_string())
    } else {
        Cow::Owned(format!("{}{ELLIPSIS}", &s[..cut]))
    }
}

/// Strip terminal control characters and ANSI escape sequences.
///
/// Feed text is printed straight to the terminal. Tab, newline and carriage
/// return survive.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let needs_strip = s
        .bytes()
        .any(|b| b == 0x1b || b == 0x7f || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r')));
    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                // CSI: parameters until a final byte in 0x40..=0x7e
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ST
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_ascii_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use proptest::prelude::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>World</b></p>"), "Hello World");
        assert_eq!(strip_html("a < b and c > d"), "a  d");
        assert_eq!(strip_html("Dangling <img src=\"x\""), "Dangling ");
        assert_eq!(strip_html("Fish &amp; Chips"), "Fish &amp; Chips");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("<p>Short</p>", 10), "Short");
        assert_eq!(truncate_text("<p>Exactly</p>", 7), "Exactly");
        assert_eq!(truncate_text("<p>Hello World</p>", 5), "Hello...");
        assert_eq!(truncate_text("Grüße aus Bremerhaven", 5), "Grüße...");
        assert_eq!(truncate_text("", 5), "");
    }

    fn berlin() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    #[test]
    fn test_format_date_today() {
        let now = berlin().with_ymd_and_hms(2024, 3, 14, 18, 0, 0).unwrap();
        assert_eq!(
            format_date_in("Thu, 14 Mar 2024 08:05:00 +0000", &now),
            "Today, 09:05 AM"
        );
    }

    #[test]
    fn test_format_date_yesterday_across_zones() {
        let now = berlin().with_ymd_and_hms(2024, 3, 14, 0, 30, 0).unwrap();
        // 22:40 UTC on the 13th is 23:40 on the 13th in UTC+1.
        assert_eq!(
            format_date_in("2024-03-13T22:40:00Z", &now),
            "Yesterday, 11:40 PM"
        );
    }

    #[test]
    fn test_format_date_older() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        assert_eq!(
            format_date_in("Mon, 01 Jan 2024 18:00:00 GMT", &now),
            "01/01/2024, 06:00 PM"
        );
    }

    #[test]
    fn test_format_date_future_is_absolute() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        assert_eq!(
            format_date_in("Fri, 15 Mar 2024 12:00:00 +0000", &now),
            "03/15/2024, 12:00 PM"
        );
    }

    #[test]
    fn test_format_date_invalid() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        assert_eq!(format_date_in("", &now), "");
        assert_eq!(format_date_in("next tuesday", &now), "");
    }

    #[test]
    fn test_display_width() {
        assert_eq!(display_width("Hello"), 5);
        assert_eq!(display_width("你好"), 4);
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("Short", 10), "Short");
        assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
        assert_eq!(truncate_to_width("你好世界", 7), "你好...");
        assert_eq!(truncate_to_width("Test", 0), "");
        assert_eq!(truncate_to_width("Test", 3), "Tes");
    }

    #[test]
    fn test_strip_control_chars() {
        assert!(matches!(strip_control_chars("clean\ttext\n"), Cow::Borrowed(_)));
        assert_eq!(strip_control_chars("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_control_chars("\x1b]0;title\x07after"), "after");
        assert_eq!(strip_control_chars("\x1b]8;;x\x1b\\link"), "link");
        assert_eq!(strip_control_chars("a\x00b\x7fc"), "abc");
    }

    proptest! {
        #[test]
        fn truncate_to_width_never_exceeds(s in "[a-zA-Z0-9 你好世界]{0,40}", width in 0usize..30) {
            prop_assert!(display_width(&truncate_to_width(&s, width)) <= width);
        }

        #[test]
        fn strip_html_leaves_no_tags(s in "[a-z<>/ ]{0,40}") {
            let out = strip_html(&s);
            prop_assert!(!tag_pattern().is_match(&out));
        }
    }
}
