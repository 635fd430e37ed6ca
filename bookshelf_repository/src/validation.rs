use crate::api::{BookDetails, BookPatch, CommentDetails, SearchCriteria};

/// Column bound for most text attributes
pub const SHORT_TEXT_MAX_LEN: usize = 255;
/// Column bound for book descriptions and comment contents
pub const LONG_TEXT_MAX_LEN: usize = 4096;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown field {0}")]
    UnknownField(String),

    #[error("Field {field} must be a string or null")]
    InvalidType { field: String },

    #[error("Field {field} is longer than {max_len} characters")]
    TooLong { field: &'static str, max_len: usize },

    #[error("Year must be exactly 4 digits, got {0:?}")]
    InvalidYear(String),

    #[error("Limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: i64, max: i64 },

    #[error("Cursor must not be negative, got {0}")]
    InvalidCursor(i64),
}

fn check_length(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(text) if text.chars().count() > max_len => {
            Err(ValidationError::TooLong { field, max_len })
        }
        _ => Ok(()),
    }
}

impl BookDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("title", self.title.as_deref(), SHORT_TEXT_MAX_LEN)?;
        check_length("author", self.author.as_deref(), SHORT_TEXT_MAX_LEN)?;
        check_length(
            "publishedDate",
            self.published_date.as_deref(),
            SHORT_TEXT_MAX_LEN,
        )?;
        check_length("imageUrl", self.image_url.as_deref(), SHORT_TEXT_MAX_LEN)?;
        check_length(
            "description",
            self.description.as_deref(),
            LONG_TEXT_MAX_LEN,
        )?;
        check_length("createdBy", self.created_by.as_deref(), SHORT_TEXT_MAX_LEN)?;
        check_length(
            "createdById",
            self.created_by_id.as_deref(),
            SHORT_TEXT_MAX_LEN,
        )
    }
}

impl BookPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        // Present fields are checked with the same bounds as on create
        let as_details = BookDetails {
            title: self.title.clone().flatten(),
            author: self.author.clone().flatten(),
            published_date: self.published_date.clone().flatten(),
            image_url: self.image_url.clone().flatten(),
            description: self.description.clone().flatten(),
            created_by: self.created_by.clone().flatten(),
            created_by_id: self.created_by_id.clone().flatten(),
        };
        as_details.validate()
    }
}

impl CommentDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("username", self.username.as_deref(), SHORT_TEXT_MAX_LEN)?;
        check_length("content", self.content.as_deref(), LONG_TEXT_MAX_LEN)
    }
}

impl SearchCriteria {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.year_filter() {
            Some(year) if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) => {
                Err(ValidationError::InvalidYear(year.to_string()))
            }
            _ => Ok(()),
        }
    }
}
