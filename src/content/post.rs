//! Post document model and identifiers

use chrono::{DateTime, FixedOffset, NaiveDate};
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::fmt;

use super::FrontMatter;
use crate::error::StoreError;

/// Title used when a post is created without one
pub const DEFAULT_TITLE: &str = "Untitled Post";

/// File extension of stored posts
pub const POST_EXTENSION: &str = "md";

lazy_static! {
    static ref POST_NAME: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}-[^/\\]*\.md$").unwrap();
}

/// A stored post
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Identifier (file name) of the post
    pub id: PostId,

    /// Front-matter fields
    pub frontmatter: FrontMatter,

    /// Body text, opaque to the store
    pub body: String,
}

impl Document {
    pub fn new(id: PostId, frontmatter: FrontMatter, body: impl Into<String>) -> Self {
        Self {
            id,
            frontmatter,
            body: body.into(),
        }
    }

    /// Decode a document from its stored text
    pub fn parse(id: PostId, text: &str) -> Result<Self, StoreError> {
        let (frontmatter, body) = FrontMatter::decode(text)?;
        Ok(Self {
            id,
            frontmatter,
            body,
        })
    }

    /// Encode the document into its stored text
    pub fn render(&self) -> Result<String, StoreError> {
        self.frontmatter.encode(&self.body)
    }

    /// Post title, or the placeholder when the field is missing
    pub fn title(&self) -> &str {
        self.frontmatter.get_str("title").unwrap_or(DEFAULT_TITLE)
    }

    /// Parse the `date` field
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.frontmatter
            .get_str("date")
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
    }
}

/// Identifier of a post, `{YYYY-MM-DD}-{slug}.md`
///
/// Displays as the public URL path, `/{identifier}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(String);

impl PostId {
    /// Identifier for a post created on `date` with the given slug.
    /// `suffix` disambiguates colliding identifiers (`-2`, `-3`, ...).
    pub fn for_post(date: NaiveDate, slug: &str, suffix: Option<u32>) -> Self {
        let stem = format!("{}-{}", date.format("%Y-%m-%d"), slug);
        match suffix {
            Some(n) => Self(format!("{}-{}.{}", stem, n, POST_EXTENSION)),
            None => Self(format!("{}.{}", stem, POST_EXTENSION)),
        }
    }

    /// Resolve an identifier from a bare name, a path or a full URL.
    ///
    /// The last path segment is used, with any query or fragment removed.
    /// A malformed segment is a validation error. A well-formed name that
    /// cannot be a post (`README.md`, `.git`) is reported as not found.
    pub fn parse(url: &str) -> Result<Self, StoreError> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let segment = path.rsplit('/').next().unwrap_or_default().trim();

        let name = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| StoreError::Validation(format!("invalid post url: {}", url)))?;

        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(StoreError::Validation(format!("invalid post url: {}", url)));
        }

        if !POST_NAME.is_match(&name) {
            return Err(StoreError::NotFound(format!("/{}", name)));
        }

        Ok(Self(name.into_owned()))
    }

    /// The identifier itself (the file name)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public URL path of the post
    pub fn path(&self) -> String {
        format!("/{}", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}
