use thiserror::Error;

/// Errors raised while compiling mappings or formatting templates.
///
/// All of them point at a broken provider configuration except
/// [`MappingError::Conversion`], which is raised for a concrete value and is
/// downgraded to the `N/A` sentinel during extraction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("unknown converter '{name}'")]
    UnknownConverter { name: String },

    #[error("invalid arguments for converter '{converter}': {message}")]
    InvalidArguments { converter: String, message: String },

    #[error("no value for template field '{field}'")]
    MissingField { field: String },

    #[error("malformed template '{template}': {message}")]
    MalformedTemplate { template: String, message: String },

    #[error("converter '{converter}' failed on '{value}': {message}")]
    Conversion {
        converter: &'static str,
        value: String,
        message: String,
    },

    #[error("invalid metadata mapping for '{key}': {message}")]
    InvalidEntry { key: String, message: String },

    #[error("invalid XML document: {message}")]
    Xml { message: String },
}
