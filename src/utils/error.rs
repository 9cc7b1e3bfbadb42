// src/utils/error.rs
use thiserror::Error;

// Errors raised while building or parsing a single marker line
#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("Pattern '{pattern}' does not match line: {line}")]
    PatternMismatch { pattern: String, line: String },

    #[error("Pattern '{pattern}' matched but capture group {group} is empty for line: {line}")]
    MissingCapture {
        pattern: String,
        group: usize,
        line: String,
    },

    #[error("Line {line} matches both '{first}' and '{second}'")]
    AmbiguousRegistry {
        line: String,
        first: String,
        second: String,
    },
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Could not start converter '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Converter I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Converter '{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Converter output is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Marker extraction failed: {0}")]
    Marker(#[from] MarkerError),

    #[error("Placeholder {placeholder} collides with document line {line}")]
    PlaceholderCollision { placeholder: String, line: usize },

    #[error("External conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("{} placeholder(s) not found in converted text: {placeholders:?}", .placeholders.len())]
    UnresolvedMarkers { placeholders: Vec<String> },
}

#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Unbalanced removal for '{identity}' at line {line}: {reason}")]
    UnbalancedRemoval {
        identity: String,
        line: usize,
        reason: String,
    },

    #[error("No sections found for '{identity}'")]
    NoSections { identity: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse rules file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Rule '{name}' has invalid syntax token '{syntax}'")]
    InvalidSyntax { name: String, syntax: String },

    #[error("Section rule '{name}' needs a heading level of at least 1")]
    InvalidLevel { name: String },

    #[error("Rule '{name}' uses '{syntax}' for both start and end")]
    SameBoundaries { name: String, syntax: String },

    #[error("Rule '{name}' produced an invalid pattern: {source}")]
    InvalidRegex { name: String, source: regex::Error },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
