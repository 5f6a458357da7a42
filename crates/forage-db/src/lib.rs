pub mod config;
pub mod content_repository;
pub mod database;
pub mod status_repository;

pub use config::DatabaseConfig;
pub use content_repository::ContentRepository;
pub use database::Database;
pub use status_repository::SourceStatusRepository;
