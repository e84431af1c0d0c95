//! Plain-text and markdown views of articles for the terminal.

use chrono::{DateTime, TimeZone};
use std::fmt::Write;

use crate::storage::Article;
use crate::util::{format_date_in, strip_control_chars, strip_html, truncate_to_width};

/// Column budget for titles in the list view.
pub const TITLE_WIDTH: usize = 72;

/// One line of the article list: `  3. Title...  (Today, 09:05 AM)`.
///
/// `index` is 1-based, matching `show`/`open` arguments.
pub fn list_row<Tz>(index: usize, article: &Article, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let title = strip_control_chars(&article.title);
    let title = truncate_to_width(&title, TITLE_WIDTH);
    let date = format_date_in(&article.published_at, now);
    if date.is_empty() {
        format!("{index:>3}. {title}")
    } else {
        format!("{index:>3}. {title}  ({date})")
    }
}

/// Markdown detail view: heading, byline, categories, then the body as text.
pub fn detail_markdown<Tz>(article: &Article, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", article.title);

    let date = format_date_in(&article.published_at, now);
    match article.creator.as_deref() {
        Some(creator) => {
            let _ = writeln!(out, "By **{creator}** • {date}\n");
        }
        None => {
            let _ = writeln!(out, "{date}\n");
        }
    }

    if !article.categories.is_empty() {
        let _ = writeln!(out, "**Categories:** {}\n", article.categories.join(", "));
    }

    out.push_str(strip_html(article.body()).trim());
    out.push('\n');

    strip_control_chars(&out).into_owned()
}
