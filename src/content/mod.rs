//! Content module - post documents, front-matter and slugs

mod frontmatter;
mod post;
pub mod properties;
mod slug;

pub use frontmatter::{FrontMatter, DELIMITER};
pub use post::{Document, PostId, DEFAULT_TITLE, POST_EXTENSION};
pub use properties::Properties;
pub use slug::slugify;
