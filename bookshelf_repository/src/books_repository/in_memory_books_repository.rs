use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, Ordering};

use crate::api::{
    Book, BookDetails, BookId, BookPatch, BookWithComments, BooksPage, Comment, CommentDetails,
    CommentId, RatedBook, Ranking, SearchCriteria,
};
use crate::books_repository::{BookRepository, BookRepositoryError};
use crate::pagination::{check_bounds, take_page};
use crate::ranking::{average_rate, rank_books};

#[derive(Default)]
struct Tables {
    books: BTreeMap<BookId, BookDetails>,
    comments: BTreeMap<CommentId, Comment>,
}

impl Tables {
    /// Books ordered by title, then id
    fn books_by_title(&self) -> Vec<Book> {
        let mut books: Vec<Book> = self
            .books
            .iter()
            .map(|(&id, details)| Book::from_details(id, details.clone()))
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        books
    }

    fn comments_of(&self, book_id: BookId) -> Vec<Comment> {
        self.comments
            .values()
            .rev()
            .filter(|comment| comment.book_id == book_id)
            .cloned()
            .collect()
    }
}

/// Keeps books and comments in a single lock so every write is atomic
pub struct InMemoryBookRepository {
    book_sequence_generator: AtomicI32,
    comment_sequence_generator: AtomicI32,
    tables: parking_lot::RwLock<Tables>,
}

impl Default for InMemoryBookRepository {
    fn default() -> Self {
        Self {
            // Ids start at 1 like a SERIAL column
            book_sequence_generator: AtomicI32::new(1),
            comment_sequence_generator: AtomicI32::new(1),
            tables: Default::default(),
        }
    }
}

#[async_trait::async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn list_books(&self, limit: i64, cursor: i64) -> Result<BooksPage, BookRepositoryError> {
        check_bounds(limit, cursor)?;
        let books = self.tables.read().books_by_title();
        let (books, next_cursor) = take_page(books.into_iter(), limit, cursor);
        Ok(BooksPage { books, next_cursor })
    }

    async fn get_book(
        &self,
        book_id: BookId,
    ) -> Result<Option<BookWithComments>, BookRepositoryError> {
        let tables = self.tables.read();
        Ok(tables.books.get(&book_id).map(|details| BookWithComments {
            book: Book::from_details(book_id, details.clone()),
            comments: tables.comments_of(book_id),
        }))
    }

    async fn create_book(&self, details: BookDetails) -> Result<Book, BookRepositoryError> {
        details.validate()?;
        let id = self.book_sequence_generator.fetch_add(1, Ordering::Relaxed);
        self.tables.write().books.insert(id, details.clone());
        Ok(Book::from_details(id, details))
    }

    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Book, BookRepositoryError> {
        patch.validate()?;
        let mut tables = self.tables.write();
        let details = tables
            .books
            .get_mut(&book_id)
            .ok_or(BookRepositoryError::NotFound(book_id))?;

        let mut book = Book::from_details(book_id, details.clone());
        patch.apply_to(&mut book);
        *details = book.details();
        Ok(book)
    }

    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError> {
        let mut tables = self.tables.write();
        tables
            .comments
            .retain(|_, comment| comment.book_id != book_id);
        tables.books.remove(&book_id);
        Ok(())
    }

    async fn search_books(
        &self,
        criteria: SearchCriteria,
        limit: i64,
        cursor: i64,
    ) -> Result<BooksPage, BookRepositoryError> {
        criteria.validate()?;
        check_bounds(limit, cursor)?;
        let books = self.tables.read().books_by_title();
        let matching = books.into_iter().filter(|book| criteria.matches(book));
        let (books, next_cursor) = take_page(matching, limit, cursor);
        Ok(BooksPage { books, next_cursor })
    }

    async fn add_comment(
        &self,
        book_id: BookId,
        details: CommentDetails,
    ) -> Result<Comment, BookRepositoryError> {
        details.validate()?;
        let mut tables = self.tables.write();
        if !tables.books.contains_key(&book_id) {
            return Err(BookRepositoryError::ConstraintViolation(format!(
                "comment references missing book {book_id}"
            )));
        }
        let id = self
            .comment_sequence_generator
            .fetch_add(1, Ordering::Relaxed);
        let comment = Comment::from_details(id, book_id, details);
        tables.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn get_comments(&self, book_id: BookId) -> Result<Vec<Comment>, BookRepositoryError> {
        Ok(self.tables.read().comments_of(book_id))
    }

    async fn ranking(&self) -> Result<Ranking, BookRepositoryError> {
        let tables = self.tables.read();

        let mut rates: HashMap<BookId, (i64, i64)> = HashMap::new();
        for comment in tables.comments.values() {
            if let Some(rate) = comment.rate {
                let (sum, count) = rates.entry(comment.book_id).or_default();
                *sum += i64::from(rate);
                *count += 1;
            }
        }

        let rated_books = rates
            .into_iter()
            .filter_map(|(book_id, (sum, count))| {
                let details = tables.books.get(&book_id)?;
                Some(RatedBook {
                    id: book_id,
                    title: details.title.clone(),
                    author: details.author.clone(),
                    published_date: details.published_date.clone(),
                    avg_rate: average_rate(sum, count),
                })
            })
            .collect();

        Ok(rank_books(rated_books))
    }
}

#[cfg(test)]
mod in_memory_book_repository_tests {
    use std::sync::Arc;

    use crate::books_repository::book_repository_contract as contract;
    use crate::books_repository::InMemoryBookRepository;

    #[tokio::test]
    async fn test_create_book_and_get_it() {
        contract::create_and_read_back(&InMemoryBookRepository::default()).await;
    }

    #[tokio::test]
    async fn test_list_books_in_title_order() {
        contract::list_in_title_order(&InMemoryBookRepository::default()).await;
    }

    #[tokio::test]
    async fn test_update_book() {
        contract::update_known_fields(&InMemoryBookRepository::default()).await;
    }

    #[tokio::test]
    async fn test_delete_book_with_comments() {
        contract::delete_with_comments(&InMemoryBookRepository::default()).await;
    }

    #[tokio::test]
    async fn test_comments_newest_first() {
        contract::comments_newest_first(&InMemoryBookRepository::default()).await;
    }

    #[tokio::test]
    async fn test_search_by_title_and_year() {
        contract::search_by_title_and_year(&InMemoryBookRepository::default()).await;
    }

    #[tokio::test]
    async fn test_ranking() {
        contract::rank_by_average_rate(&InMemoryBookRepository::default()).await;
    }

    #[tokio::test]
    async fn test_ranking_ties_after_rounding() {
        contract::rank_ties_on_rounded_average(&InMemoryBookRepository::default()).await;
    }

    #[tokio::test]
    async fn test_concurrent_comments() {
        contract::concurrent_comments_are_kept(Arc::new(InMemoryBookRepository::default())).await;
    }
}
