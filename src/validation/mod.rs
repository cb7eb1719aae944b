//! Input validation for message content and message ids.
//!
//! The request boundary runs these checks before calling into the relay, and
//! every store backend runs them again before writing.

use thiserror::Error;

use crate::utils::Error;

pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message content cannot be empty")]
    EmptyContent,
    #[error("message content too long (max {max} characters)")]
    ContentTooLong { max: usize },
    #[error("message content contains invalid characters")]
    InvalidCharacters,
    #[error("message id must be positive")]
    InvalidId,
}

impl ValidationError {
    /// Reclassify as an `InvalidInput` failure of `op`.
    pub fn into_error(self, op: &'static str) -> Error {
        Error::invalid_input(op, self.to_string()).with_source(self)
    }
}

/// Validates message content and ids.
#[derive(Debug, Clone, Copy)]
pub struct MessageValidator {
    max_content_length: usize,
}

impl MessageValidator {
    pub fn new(max_content_length: usize) -> Self {
        Self { max_content_length }
    }

    /// Content must be 1..=max code points and free of `<` and `>`.
    pub fn validate_content(&self, content: &str) -> Result<(), ValidationError> {
        if content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }

        if content.chars().count() > self.max_content_length {
            return Err(ValidationError::ContentTooLong {
                max: self.max_content_length,
            });
        }

        if content.contains(['<', '>']) {
            return Err(ValidationError::InvalidCharacters);
        }

        Ok(())
    }

    /// Ids start from 1.
    pub fn validate_id(&self, id: i64) -> Result<(), ValidationError> {
        if id <= 0 {
            return Err(ValidationError::InvalidId);
        }
        Ok(())
    }
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTENT_LENGTH)
    }
}
