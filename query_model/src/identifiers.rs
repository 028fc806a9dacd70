//! Identifier validation
//!
//! Field, column and table names end up inside filter strings handed to the
//! data collaborator, so they are restricted to plain identifiers.

use std::fmt;

/// Validation errors for identifiers
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifierError {
    /// Name (or one of its dotted segments) is empty
    Empty,
    /// Segment is too long (PostgreSQL limit is 63 characters)
    TooLong {
        name: String,
        length: usize,
        max_length: usize,
    },
    /// Segment must start with a letter or underscore
    InvalidStartCharacter(String),
    /// Only alphanumeric characters and underscores are allowed
    InvalidCharacters(String),
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierError::Empty => write!(f, "name cannot be empty"),
            IdentifierError::TooLong {
                name,
                length,
                max_length,
            } => write!(
                f,
                "'{}' is too long: {} characters (max {})",
                name, length, max_length
            ),
            IdentifierError::InvalidStartCharacter(name) => {
                write!(f, "'{}' must start with a letter or underscore", name)
            }
            IdentifierError::InvalidCharacters(name) => write!(
                f,
                "'{}' contains invalid characters: only alphanumeric characters and underscores are allowed",
                name
            ),
        }
    }
}

impl std::error::Error for IdentifierError {}

/// PostgreSQL identifier length limit
const MAX_LENGTH: usize = 63;

fn validate_segment(segment: &str) -> Result<(), IdentifierError> {
    let first_char = segment.chars().next().ok_or(IdentifierError::Empty)?;

    if segment.len() > MAX_LENGTH {
        return Err(IdentifierError::TooLong {
            name: segment.to_string(),
            length: segment.len(),
            max_length: MAX_LENGTH,
        });
    }

    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(IdentifierError::InvalidStartCharacter(segment.to_string()));
    }

    if !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(IdentifierError::InvalidCharacters(segment.to_string()));
    }

    Ok(())
}

/// A validated table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedTableName(String);

impl ValidatedTableName {
    pub fn new(name: &str) -> Result<Self, IdentifierError> {
        validate_segment(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated field name.
///
/// Dotted names (`dealer.city`) address columns of an embedded resource; every
/// segment must be a valid identifier on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedFieldName(String);

impl ValidatedFieldName {
    pub fn new(name: &str) -> Result<Self, IdentifierError> {
        if name.is_empty() {
            return Err(IdentifierError::Empty);
        }
        for segment in name.split('.') {
            validate_segment(segment)?;
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments of a dotted name, outermost first
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check if a string is a valid field name without keeping the validated value
pub fn is_valid_field_name(name: &str) -> bool {
    ValidatedFieldName::new(name).is_ok()
}
