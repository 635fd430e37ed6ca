pub use in_memory_books_repository::InMemoryBookRepository;
pub use postgres_books_repository::{
    connect as postgres_connect, create_schema, PostgresBooksRepository,
    PostgresBooksRepositoryConfig,
};

use crate::api::{
    Book, BookDetails, BookId, BookPatch, BookWithComments, BooksPage, Comment, CommentDetails,
    Ranking, SearchCriteria,
};
use crate::validation::ValidationError;

mod in_memory_books_repository;
mod postgres_books_repository;

#[derive(thiserror::Error, Debug)]
pub enum BookRepositoryError {
    #[error("Book {0} not found")]
    NotFound(BookId),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

/// Access to books and their comments.
///
/// Every write is a single transaction, inputs are validated before anything is written.
#[async_trait::async_trait]
pub trait BookRepository: Send + Sync {
    /// Lists books ordered by title, starting at offset `cursor`
    async fn list_books(&self, limit: i64, cursor: i64) -> Result<BooksPage, BookRepositoryError>;

    /// Retrieves a book with its comments, newest comment first.
    /// Returns None if there is no book with given id
    async fn get_book(
        &self,
        book_id: BookId,
    ) -> Result<Option<BookWithComments>, BookRepositoryError>;

    /// Adds book to repository, returns it with the id assigned by the store
    async fn create_book(&self, details: BookDetails) -> Result<Book, BookRepositoryError>;

    /// Overwrites the fields present in the patch, returns the updated book
    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Book, BookRepositoryError>;

    /// Removes the book together with its comments, missing book is not an error
    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError>;

    /// Filters books by exact title and publication year, both optional
    async fn search_books(
        &self,
        criteria: SearchCriteria,
        limit: i64,
        cursor: i64,
    ) -> Result<BooksPage, BookRepositoryError>;

    /// Adds comment to the book, returns it with the id assigned by the store
    async fn add_comment(
        &self,
        book_id: BookId,
        details: CommentDetails,
    ) -> Result<Comment, BookRepositoryError>;

    /// Comments of the book, newest first
    async fn get_comments(&self, book_id: BookId) -> Result<Vec<Comment>, BookRepositoryError>;

    /// Books with at least one rated comment, ordered by their average rate
    async fn ranking(&self) -> Result<Ranking, BookRepositoryError>;
}
