//! Best-effort extraction of search filters from a free-text query.
//!
//! Recognised forms (case-insensitive):
//! - `after|since|from YYYY-MM-DD`, `before|until YYYY-MM-DD`, `on|at YYYY-MM-DD`
//! - `by|author|from Name [Surname]`
//! - `category|in|about Word [Word]`
//!
//! Whatever is left after removing those and a few filler phrases becomes the
//! free-text `search` term.

use chrono::{Days, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use url::Url;

use super::SearchError;

pub const DEFAULT_PER_PAGE: usize = 10;

const API_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Filters understood by the WordPress `posts` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub search: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub per_page: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            search: None,
            author: None,
            category: None,
            before: None,
            after: None,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:from|after|since)\s+(\d{4}-\d{1,2}-\d{1,2})|(?:before|until)\s+(\d{4}-\d{1,2}-\d{1,2})|(?:on|at)\s+(\d{4}-\d{1,2}-\d{1,2}))",
        )
        .expect("static regex")
    })
}

fn author_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:by|author|from)\s+([a-zäöüß]+(?:\s+[a-zäöüß]+)?)")
            .expect("static regex")
    })
}

fn category_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:category|in|about)\s+([a-zäöüß]+(?:\s+[a-zäöüß]+)?)")
            .expect("static regex")
    })
}

fn filler_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:search for|find|show me|get|articles about|posts about)\b")
            .expect("static regex")
    })
}

/// Parse `YYYY-M-D` into midnight of that day.
fn parse_day(raw: &str) -> Option<NaiveDateTime> {
    let mut parts = raw.splitn(3, '-').map(|p| p.parse::<u32>().ok());
    let year = i32::try_from(parts.next()??).ok()?;
    let month = parts.next()??;
    let day = parts.next()??;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}

fn api_date(moment: NaiveDateTime) -> String {
    moment.format(API_DATE_FORMAT).to_string()
}

/// Extract filters and residual search terms from `query`.
///
/// Dates that do not exist on the calendar are ignored.
pub fn parse_query(query: &str) -> SearchParams {
    let mut params = SearchParams::default();

    for caps in date_pattern().captures_iter(query) {
        if let Some(day) = caps.get(1).and_then(|m| parse_day(m.as_str())) {
            params.after = Some(api_date(day));
        }
        if let Some(day) = caps.get(2).and_then(|m| parse_day(m.as_str())) {
            params.before = Some(api_date(day));
        }
        if let Some(day) = caps.get(3).and_then(|m| parse_day(m.as_str())) {
            params.after = Some(api_date(day));
            params.before = day.checked_add_days(Days::new(1)).map(api_date);
        }
    }

    params.author = author_pattern()
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    params.category = category_pattern()
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let rest = date_pattern().replace_all(query, "");
    let rest = author_pattern().replace(&rest, "");
    let rest = category_pattern().replace(&rest, "");
    let rest = filler_pattern().replace_all(&rest, "");
    let terms = rest.split_whitespace().collect::<Vec<_>>().join(" ");

    if !terms.is_empty() {
        params.search = Some(terms);
    }

    tracing::debug!(?params, "Parsed search query");
    params
}

/// Build the `<base>/posts` request URL for `params`.
///
/// Author and category names go in as additional `search` values, since the
/// endpoint only filters those by numeric id.
pub fn build_search_url(base: &Url, params: &SearchParams) -> Result<Url, SearchError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| SearchError::InvalidBase(base.to_string()))?
        .pop_if_empty()
        .push("posts");

    {
        let mut query = url.query_pairs_mut();
        if let Some(search) = &params.search {
            query.append_pair("search", search);
        }
        if let Some(before) = &params.before {
            query.append_pair("before", before);
        }
        if let Some(after) = &params.after {
            query.append_pair("after", after);
        }
        query.append_pair("per_page", &params.per_page.to_string());
        if let Some(author) = &params.author {
            query.append_pair("search", author);
        }
        if let Some(category) = &params.category {
            query.append_pair("search", category);
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_terms() {
        let params = parse_query("iPhone 15 Pro");
        assert_eq!(
            params,
            SearchParams {
                search: Some("iPhone 15 Pro".to_string()),
                ..SearchParams::default()
            }
        );
    }

    #[test]
    fn test_filler_phrases_removed() {
        let params = parse_query("Search for Samsung Galaxy");
        assert_eq!(params.search.as_deref(), Some("Samsung Galaxy"));
    }

    #[test]
    fn test_after_and_before_dates() {
        let params = parse_query("Pixel since 2023-1-5 until 2023-02-10");
        assert_eq!(params.after.as_deref(), Some("2023-01-05T00:00:00"));
        assert_eq!(params.before.as_deref(), Some("2023-02-10T00:00:00"));
        assert_eq!(params.search.as_deref(), Some("Pixel"));
    }

    #[test]
    fn test_on_date_spans_one_day() {
        let params = parse_query("news on 2024-02-29");
        assert_eq!(params.after.as_deref(), Some("2024-02-29T00:00:00"));
        assert_eq!(params.before.as_deref(), Some("2024-03-01T00:00:00"));
    }

    #[test]
    fn test_impossible_date_ignored() {
        let params = parse_query("news after 2023-13-40");
        assert_eq!(params.after, None);
    }

    #[test]
    fn test_author_extraction() {
        let params = parse_query("Show me articles by Carsten Knobloch");
        assert_eq!(params.author.as_deref(), Some("Carsten Knobloch"));
        assert_eq!(params.search.as_deref(), Some("articles"));
    }

    #[test]
    fn test_from_date_is_not_an_author() {
        let params = parse_query("Android from 2022-06-01");
        assert_eq!(params.author, None);
        assert_eq!(params.after.as_deref(), Some("2022-06-01T00:00:00"));
    }

    #[test]
    fn test_category_extraction() {
        let params = parse_query("Find news about Smart Home");
        assert_eq!(params.category.as_deref(), Some("Smart Home"));
        assert_eq!(params.search.as_deref(), Some("news"));
    }

    #[test]
    fn test_keywords_need_word_boundary() {
        // "in" inside "Linux" must not start a category.
        let params = parse_query("Linux kernel");
        assert_eq!(params.category, None);
        assert_eq!(params.search.as_deref(), Some("Linux kernel"));
    }

    #[test]
    fn test_build_search_url() {
        let base = Url::parse("https://blog.example.com/wp-json/wp/v2").unwrap();
        let params = SearchParams {
            search: Some("kindle".to_string()),
            author: Some("Carsten".to_string()),
            after: Some("2023-01-01T00:00:00".to_string()),
            per_page: 5,
            ..SearchParams::default()
        };

        let url = build_search_url(&base, &params).unwrap();
        assert_eq!(url.path(), "/wp-json/wp/v2/posts");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("search".to_string(), "kindle".to_string()),
                ("after".to_string(), "2023-01-01T00:00:00".to_string()),
                ("per_page".to_string(), "5".to_string()),
                ("search".to_string(), "Carsten".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_search_url_trailing_slash() {
        let base = Url::parse("https://blog.example.com/wp-json/wp/v2/").unwrap();
        let url = build_search_url(&base, &SearchParams::default()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://blog.example.com/wp-json/wp/v2/posts?per_page=10"
        );
    }

    #[test]
    fn test_build_search_url_rejects_opaque_base() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(matches!(
            build_search_url(&base, &SearchParams::default()),
            Err(SearchError::InvalidBase(_))
        ));
    }
}
