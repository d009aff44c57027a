use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A fetched feed: channel metadata plus its entries in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    pub title: Option<String>,
    pub link: Option<String>,
    pub items: Vec<Item>,
}

/// One normalized feed entry, emitted as a single JSON object.
///
/// Absent fields are omitted from the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    pub guid: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enclosures: Vec<Enclosure>,
}

impl Item {
    /// Publication time in Unix seconds, falling back to the update time.
    ///
    /// `None` when the entry carries neither (or neither parsed).
    pub fn published_timestamp(&self) -> Option<i64> {
        self.published.or(self.updated).map(|dt| dt.timestamp())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enclosure {
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

/// Parse RSS, Atom or JSON Feed bytes into a [`Feed`].
pub fn parse_feed(bytes: &[u8]) -> Result<Feed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let items = feed.entries.into_iter().map(normalize_entry).collect();

    Ok(Feed {
        title: feed.title.map(|t| t.content),
        link: feed.links.into_iter().next().map(|l| l.href),
        items,
    })
}

fn normalize_entry(entry: Entry) -> Item {
    let links: Vec<String> = entry.links.into_iter().map(|l| l.href).collect();
    let link = links.first().cloned();
    let title = entry.title.map(|t| t.content);

    let existing_id = if entry.id.is_empty() {
        None
    } else {
        Some(entry.id.as_str())
    };
    let guid = generate_guid(
        existing_id,
        link.as_deref(),
        title.as_deref().unwrap_or(""),
        entry.published.or(entry.updated).map(|dt| dt.timestamp()),
    );

    let enclosures = entry
        .media
        .into_iter()
        .flat_map(|m| m.content)
        .filter_map(|c| {
            c.url.map(|url| Enclosure {
                url: url.to_string(),
                media_type: c.content_type.map(|m| m.to_string()),
                length: c.size,
            })
        })
        .collect();

    Item {
        title,
        description: entry.summary.map(|s| s.content),
        content: entry.content.and_then(|c| c.body),
        link,
        links,
        published: entry.published,
        updated: entry.updated,
        authors: entry
            .authors
            .into_iter()
            .map(|p| Author {
                name: p.name,
                email: p.email,
                uri: p.uri,
            })
            .collect(),
        guid,
        categories: entry.categories.into_iter().map(|c| c.term).collect(),
        enclosures,
    }
}

fn generate_guid(
    existing: Option<&str>,
    url: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
