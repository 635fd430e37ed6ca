use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::validation::ValidationError;

pub type BookId = i32;
pub type CommentId = i32;

/// Keys accepted in a book update, in their wire form
pub const BOOK_FIELDS: [&str; 7] = [
    "title",
    "author",
    "publishedDate",
    "imageUrl",
    "description",
    "createdBy",
    "createdById",
];

/// Book attributes supplied by the caller when creating a book.
/// The id is assigned by the store, so it is rejected here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookDetails {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_by_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_by_id: Option<String>,
}

impl Book {
    pub fn from_details(id: BookId, details: BookDetails) -> Self {
        Self {
            id,
            title: details.title,
            author: details.author,
            published_date: details.published_date,
            image_url: details.image_url,
            description: details.description,
            created_by: details.created_by,
            created_by_id: details.created_by_id,
        }
    }

    pub fn details(&self) -> BookDetails {
        BookDetails {
            title: self.title.clone(),
            author: self.author.clone(),
            published_date: self.published_date.clone(),
            image_url: self.image_url.clone(),
            description: self.description.clone(),
            created_by: self.created_by.clone(),
            created_by_id: self.created_by_id.clone(),
        }
    }
}

/// Partial update of a book.
///
/// The outer `Option` tells whether the field is present in the update,
/// the inner one whether it is set to a value or cleared.
/// Deserialization goes through [`BookPatch::set_field`], so only keys from
/// [`BOOK_FIELDS`] are accepted.
#[derive(Debug, Clone, Default, Serialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<Option<String>>,
}

impl BookPatch {
    /// Sets a single field by its wire name, rejecting anything outside the book schema
    pub fn set_field(&mut self, key: &str, value: Value) -> Result<(), ValidationError> {
        let slot = match key {
            "title" => &mut self.title,
            "author" => &mut self.author,
            "publishedDate" => &mut self.published_date,
            "imageUrl" => &mut self.image_url,
            "description" => &mut self.description,
            "createdBy" => &mut self.created_by,
            "createdById" => &mut self.created_by_id,
            unknown => return Err(ValidationError::UnknownField(unknown.to_string())),
        };
        *slot = match value {
            Value::Null => Some(None),
            Value::String(text) => Some(Some(text)),
            _ => {
                return Err(ValidationError::InvalidType {
                    field: key.to_string(),
                })
            }
        };
        Ok(())
    }

    pub fn apply_to(&self, book: &mut Book) {
        fn overwrite(target: &mut Option<String>, update: &Option<Option<String>>) {
            if let Some(value) = update {
                target.clone_from(value);
            }
        }
        overwrite(&mut book.title, &self.title);
        overwrite(&mut book.author, &self.author);
        overwrite(&mut book.published_date, &self.published_date);
        overwrite(&mut book.image_url, &self.image_url);
        overwrite(&mut book.description, &self.description);
        overwrite(&mut book.created_by, &self.created_by);
        overwrite(&mut book.created_by_id, &self.created_by_id);
    }
}

impl TryFrom<Map<String, Value>> for BookPatch {
    type Error = ValidationError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut patch = BookPatch::default();
        for (key, value) in fields {
            patch.set_field(&key, value)?;
        }
        Ok(patch)
    }
}

impl<'de> Deserialize<'de> for BookPatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::deserialize(deserializer)?;
        BookPatch::try_from(fields).map_err(serde::de::Error::custom)
    }
}

/// Comment attributes supplied by the caller.
/// The owning book comes from the request path, a `book_id` in the body is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct CommentDetails {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub rate: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct Comment {
    pub id: CommentId,
    pub book_id: BookId,
    pub username: Option<String>,
    pub content: Option<String>,
    pub rate: Option<i32>,
}

impl Comment {
    pub fn from_details(id: CommentId, book_id: BookId, details: CommentDetails) -> Self {
        Self {
            id,
            book_id,
            username: details.username,
            content: details.content,
            rate: details.rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct BookWithComments {
    pub book: Book,
    /// Newest first
    pub comments: Vec<Comment>,
}

/// Empty strings mean "do not filter"
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct SearchCriteria {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

impl SearchCriteria {
    pub fn title_filter(&self) -> Option<&str> {
        self.title.as_deref().filter(|title| !title.is_empty())
    }

    pub fn year_filter(&self) -> Option<&str> {
        self.year.as_deref().filter(|year| !year.is_empty())
    }

    pub fn matches(&self, book: &Book) -> bool {
        let title_matches = self
            .title_filter()
            .map_or(true, |title| book.title.as_deref() == Some(title));
        let year_matches = self.year_filter().map_or(true, |year| {
            book.published_date
                .as_deref()
                .is_some_and(|date| date.starts_with(year))
        });
        title_matches && year_matches
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct BooksPage {
    pub books: Vec<Book>,
    /// Offset of the next page, absent when this page was not full
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub cursor: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct SearchQuery {
    pub title: Option<String>,
    pub year: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<i64>,
}

impl SearchQuery {
    pub fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            title: self.title.clone(),
            year: self.year.clone(),
        }
    }
}

/// Book summary together with the average rate of its comments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct RatedBook {
    pub id: BookId,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub avg_rate: f64,
}

/// Books ordered by average rate, `ranks[i]` is the rank of `books[i]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Apiv2Schema)]
pub struct Ranking {
    pub books: Vec<RatedBook>,
    pub ranks: Vec<u32>,
}

#[cfg(test)]
mod api_tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn book_patch_accepts_only_known_fields() {
        let patch: BookPatch =
            serde_json::from_value(json!({"title": "Dune", "publishedDate": null}))
                .expect("Failed to parse patch");
        assert_eq!(
            patch,
            BookPatch {
                title: Some(Some("Dune".to_string())),
                published_date: Some(None),
                ..BookPatch::default()
            }
        );

        let typo = serde_json::from_value::<BookPatch>(json!({"titel": "Dune"}));
        assert!(typo.is_err());

        let mut fields = Map::new();
        fields.insert("id".to_string(), json!(7));
        assert_eq!(
            BookPatch::try_from(fields),
            Err(ValidationError::UnknownField("id".to_string()))
        );

        let mut fields = Map::new();
        fields.insert("author".to_string(), json!(12));
        assert_eq!(
            BookPatch::try_from(fields),
            Err(ValidationError::InvalidType {
                field: "author".to_string()
            })
        );
    }

    #[test]
    fn every_book_field_is_patchable() {
        let mut patch = BookPatch::default();
        for field in BOOK_FIELDS {
            patch
                .set_field(field, json!("x"))
                .expect("Field should be accepted");
        }
        let mut book = Book::default();
        patch.apply_to(&mut book);
        assert_eq!(
            book.details(),
            BookDetails {
                title: Some("x".to_string()),
                author: Some("x".to_string()),
                published_date: Some("x".to_string()),
                image_url: Some("x".to_string()),
                description: Some("x".to_string()),
                created_by: Some("x".to_string()),
                created_by_id: Some("x".to_string()),
            }
        );
    }

    #[test]
    fn book_details_reject_caller_supplied_id() {
        let result =
            serde_json::from_value::<BookDetails>(json!({"id": 3, "title": "Dune"}));
        assert!(result.is_err());
    }

    #[test]
    fn comment_details_ignore_book_id() {
        let details: CommentDetails =
            serde_json::from_value(json!({"book_id": 99, "username": "u", "rate": 4}))
                .expect("Failed to parse comment");
        assert_eq!(
            details,
            CommentDetails {
                username: Some("u".to_string()),
                content: None,
                rate: Some(4),
            }
        );
    }

    #[test]
    fn book_serializes_to_flat_camel_case_mapping() {
        let book = Book {
            id: 1,
            title: Some("Dune".to_string()),
            published_date: Some("1965-08-01".to_string()),
            ..Book::default()
        };
        let value = serde_json::to_value(&book).expect("Failed to serialize");
        assert_eq!(value["id"], json!(1));
        assert_eq!(value["publishedDate"], json!("1965-08-01"));
        assert_eq!(value["createdById"], Value::Null);
    }

    #[test]
    fn search_criteria_combine_title_and_year() {
        let book = Book {
            id: 1,
            title: Some("Dune".to_string()),
            published_date: Some("1965-08-01".to_string()),
            ..Book::default()
        };
        let criteria = |title: &str, year: &str| SearchCriteria {
            title: Some(title.to_string()),
            year: Some(year.to_string()),
        };
        assert!(criteria("", "").matches(&book));
        assert!(criteria("Dune", "").matches(&book));
        assert!(criteria("", "1965").matches(&book));
        assert!(criteria("Dune", "1965").matches(&book));
        assert!(!criteria("Dune", "1966").matches(&book));
        assert!(!criteria("Emma", "1965").matches(&book));
        assert!(SearchCriteria::default().matches(&book));
    }
}
