//! Configuration module

mod service;

pub use service::CollisionPolicy;
pub use service::CommitAuthor;
pub use service::EventsConfig;
pub use service::PublishConfig;
pub use service::PublishStrategy;
pub use service::ServerConfig;
pub use service::ServiceConfig;
pub use service::{CONFIG_FILE, REPO_PATH_ENV};
