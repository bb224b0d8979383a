//! Animation error types

use thiserror::Error;

/// Errors raised by the animation engine and its configuration
#[derive(Error, Debug)]
pub enum AnimationError {
    /// An argument was rejected at call time
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine behind a handle has been dropped
    #[error("Animation engine has been dropped")]
    EngineDropped,

    /// No global engine has been installed
    #[error("Global animation engine not initialized. Call set_global_engine() at startup.")]
    GlobalNotInitialized,

    /// A global engine was already installed
    #[error("Global animation engine already initialized")]
    GlobalAlreadyInitialized,

    /// Failed to start the pulse timer thread
    #[error("Failed to spawn pulse thread: {0}")]
    PulseThread(std::io::Error),

    /// Failed to read a configuration file
    #[error("Failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Failed to parse a configuration file
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
