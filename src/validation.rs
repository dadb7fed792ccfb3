//! Input validation for names and records read from disk.

use crate::exec::{validate_command_line, CommandLineError};
use crate::storage::catalog::Chain;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username is empty")]
    EmptyName,

    #[error("Username is too long (maximum {max} characters)")]
    NameTooLong { max: usize },

    #[error("Username cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Username contains control characters")]
    ControlCharacters,

    #[error("Username contains path separators (/ or \\)")]
    PathTraversal,

    #[error("Chain description is empty")]
    EmptyDescription,

    #[error("Chain command line: {0}")]
    CommandLine(#[from] CommandLineError),

    #[error("File size exceeds limit ({limit} bytes)")]
    FileSizeExceeded { limit: u64 },

    #[error("Invalid format")]
    InvalidFormat,
}

pub const MAX_USERNAME_LEN: usize = 30;

/// Percent-encode a username for use as a file name.
pub fn safe_filename(username: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    utf8_percent_encode(username, NON_ALPHANUMERIC).to_string()
}

/// Validate a username and return it unchanged.
pub fn validate_user_name(name: &str) -> Result<&str, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::NameTooLong {
            max: MAX_USERNAME_LEN,
        });
    }
    if name.trim() != name {
        return Err(ValidationError::InvalidWhitespace);
    }
    if name.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters);
    }
    if name.contains('/') || name.contains('\\') {
        return Err(ValidationError::PathTraversal);
    }
    Ok(name)
}

/// A catalog entry must have a description and a launchable command line.
pub fn validate_chain(chain: &Chain) -> Result<(), ValidationError> {
    if chain.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    validate_command_line(&chain.filename)?;
    Ok(())
}

pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::FileSizeExceeded { limit: max_size });
    }
    Ok(())
}

/// Parse JSON read from a data file, tolerating leading NULs left by an
/// interrupted write.
pub fn secure_json_parse<T>(content: &str, max_bytes: u64) -> Result<T, ValidationError>
where
    T: serde::de::DeserializeOwned,
{
    validate_file_size(content.len() as u64, max_bytes)?;
    let normalized = content.trim_start_matches('\0');
    serde_json::from_str(normalized).map_err(|_| ValidationError::InvalidFormat)
}
