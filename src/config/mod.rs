/// Database configuration and connection management
pub mod database;

/// Service settings loaded from spinventory.toml
pub mod settings;

/// Secrets and deployment values read from environment variables
pub mod secrets;
