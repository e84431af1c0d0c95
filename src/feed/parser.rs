use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::storage::Article;

/// Title used for items that have none.
pub const UNTITLED: &str = "No Title";

#[derive(Debug, Error)]
pub enum FeedError {
    /// The document is not XML or lacks the `rss > channel > item` structure.
    #[error("Invalid RSS format: {0}")]
    InvalidFeedFormat(String),
    /// A well-formed channel without a single `<item>`.
    #[error("Invalid RSS format: channel contains no items")]
    EmptyChannel,
}

/// Parses an RSS 2.0 document into articles, preserving item order.
///
/// A channel with one item and a channel with many are handled the same way.
/// Missing fields are normalized: title becomes [`UNTITLED`], link, pubDate
/// and description become empty strings, categories an empty list. A `<guid>`
/// is read as its text content whatever attributes it carries.
///
/// # Errors
///
/// [`FeedError::InvalidFeedFormat`] when the XML is malformed, the root is not
/// `<rss>`, or the channel is missing. [`FeedError::EmptyChannel`] when the
/// channel contains no items.
///
/// # Security
///
/// quick-xml (0.37) never expands `<!ENTITY>` declarations, so XXE payloads in
/// a hostile feed surface as unescape failures, never as file reads.
pub fn parse_feed(xml: &str) -> Result<Vec<Article>, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut articles = Vec::new();
    // Element names from the root down to the current element
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut saw_channel = false;
    let mut item: Option<ItemBuilder> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                match path.len() {
                    0 if name != b"rss" => {
                        return Err(invalid(format!(
                            "expected <rss> root element, found <{}>",
                            String::from_utf8_lossy(&name)
                        )))
                    }
                    1 if name == b"channel" => saw_channel = true,
                    2 if is_channel_item(&path, &name) => item = Some(ItemBuilder::default()),
                    3 => text.clear(),
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if path.is_empty() {
                    return Err(invalid("document has no <rss> content".to_string()));
                }
                if path.len() == 1 && e.name().as_ref() == b"channel" {
                    saw_channel = true;
                }
                if path.len() == 2 && is_channel_item(&path, e.name().as_ref()) {
                    articles.push(ItemBuilder::default().build());
                } else if path.len() == 3 {
                    if let Some(builder) = item.as_mut() {
                        builder.set_field(&e, "");
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if item.is_some() && path.len() == 4 {
                    match e.unescape() {
                        Ok(value) => text.push_str(&value),
                        Err(err) => {
                            // Stray HTML entities (&nbsp;) in titles: keep the raw text
                            tracing::debug!(error = %err, "Keeping undecodable text verbatim");
                            text.push_str(&String::from_utf8_lossy(&e));
                        }
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if item.is_some() && path.len() == 4 {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else {
                    return Err(invalid("unbalanced closing tag".to_string()));
                };
                match path.len() {
                    3 => {
                        if let Some(builder) = item.as_mut() {
                            builder.set_text(&name, std::mem::take(&mut text));
                        }
                    }
                    2 if is_channel_item(&path, &name) => {
                        if let Some(builder) = item.take() {
                            articles.push(builder.build());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(invalid(format!("XML parse error: {e}"))),
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(invalid("unexpected end of document".to_string()));
    }
    if !saw_channel {
        return Err(invalid("missing <channel> element".to_string()));
    }
    if articles.is_empty() {
        return Err(FeedError::EmptyChannel);
    }

    Ok(articles)
}

fn invalid(reason: String) -> FeedError {
    FeedError::InvalidFeedFormat(reason)
}

fn is_channel_item(path: &[Vec<u8>], name: &[u8]) -> bool {
    name == b"item" && path.last().is_some_and(|p| p == b"channel")
}

/// Accumulates the direct children of one `<item>`.
#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    description: Option<String>,
    creator: Option<String>,
    content: Option<String>,
    categories: Vec<String>,
    guid: Option<String>,
}

impl ItemBuilder {
    fn set_text(&mut self, name: &[u8], value: String) {
        match name {
            b"title" => self.title = Some(value),
            b"link" => self.link = Some(value),
            b"pubDate" => self.pub_date = Some(value),
            b"description" => self.description = Some(value),
            b"dc:creator" => self.creator = Some(value),
            b"content:encoded" => self.content = Some(value),
            b"category" => {
                if !value.is_empty() {
                    self.categories.push(value);
                }
            }
            b"guid" => self.guid = Some(value),
            _ => {}
        }
    }

    fn set_field(&mut self, e: &BytesStart<'_>, value: &str) {
        self.set_text(e.name().as_ref(), value.to_string());
    }

    fn build(self) -> Article {
        Article {
            title: non_empty(self.title).unwrap_or_else(|| UNTITLED.to_string()),
            link: self.link.unwrap_or_default(),
            published_at: self.pub_date.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            content: non_empty(self.content),
            creator: non_empty(self.creator),
            categories: self.categories,
            guid: non_empty(self.guid),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
