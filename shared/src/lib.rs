//! Assembles Kafka client configuration from `.properties` files and
//! environment variables, validates it, and hands it to `rdkafka`.

pub mod assembler;
pub mod config;
pub mod error;
pub mod kafka;
pub mod properties;

pub use assembler::{load_from_environment, load_from_file, validate_required};
pub use error::{ConfigError, Result};
pub use properties::Properties;
