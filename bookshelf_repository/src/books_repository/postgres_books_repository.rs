use anyhow::Context;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, GenericClient, NoTls, Row};

use crate::api::{
    Book, BookDetails, BookId, BookPatch, BookWithComments, BooksPage, Comment, CommentDetails,
    RatedBook, Ranking, SearchCriteria,
};
use crate::books_repository::{BookRepository, BookRepositoryError};
use crate::pagination::{check_bounds, next_cursor};
use crate::ranking::{average_rate, rank_books};

const BOOK_COLUMNS: &str =
    "id, title, author, published_date, image_url, description, created_by, created_by_id";
const COMMENT_COLUMNS: &str = "id, book_id, username, content, rate";

pub struct PostgresBooksRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub dbname: Option<String>,
}

impl PostgresBooksRepositoryConfig {
    fn connection_str(&self) -> String {
        let mut connection_str = format!(
            "postgresql://{}:{}@{}",
            self.username, self.password, self.hostname
        );
        if let Some(dbname) = &self.dbname {
            connection_str.push('/');
            connection_str.push_str(dbname);
        }
        connection_str
    }
}

/// Opens a connection and drives it on a background task
pub async fn connect(config: &PostgresBooksRepositoryConfig) -> anyhow::Result<Client> {
    tracing::info!(
        "Connecting to postgres at {} as {}",
        config.hostname,
        config.username
    );
    let (client, connection) = tokio_postgres::connect(&config.connection_str(), NoTls)
        .await
        .context("Failed to start postgres")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("connection error: {}", e);
        }
    });

    Ok(client)
}

/// Creates the books and comments tables if they do not exist yet
pub async fn create_schema(client: &Client) -> Result<(), tokio_postgres::Error> {
    client
        .batch_execute(
            "
        CREATE TABLE IF NOT EXISTS books (
            id              SERIAL PRIMARY KEY,
            title           VARCHAR(255),
            author          VARCHAR(255),
            published_date  VARCHAR(255),
            image_url       VARCHAR(255),
            description     VARCHAR(4096),
            created_by      VARCHAR(255),
            created_by_id   VARCHAR(255)
            );
        CREATE TABLE IF NOT EXISTS comments (
            id              SERIAL PRIMARY KEY,
            book_id         INTEGER NOT NULL REFERENCES books (id),
            username        VARCHAR(255),
            content         VARCHAR(4096),
            rate            INTEGER
            );
        CREATE INDEX IF NOT EXISTS comments_book_id_idx ON comments (book_id);
        ",
        )
        .await
}

pub struct PostgresBooksRepository {
    client: Mutex<Client>,
}

impl PostgresBooksRepository {
    pub async fn init(config: PostgresBooksRepositoryConfig) -> anyhow::Result<Self> {
        let client = connect(&config).await?;
        create_schema(&client)
            .await
            .context("Failed to setup tables")?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

/// Foreign key and uniqueness violations are reported as such, anything else is a database failure
fn classify_error(err: tokio_postgres::Error) -> BookRepositoryError {
    let constraint_message = err
        .as_db_error()
        .filter(|db_err| {
            [SqlState::FOREIGN_KEY_VIOLATION, SqlState::UNIQUE_VIOLATION].contains(db_err.code())
        })
        .map(|db_err| db_err.message().to_string());

    match constraint_message {
        Some(message) => BookRepositoryError::ConstraintViolation(message),
        None => BookRepositoryError::DatabaseFailure(err),
    }
}

fn book_from_row(row: &Row) -> Result<Book, tokio_postgres::Error> {
    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        published_date: row.try_get("published_date")?,
        image_url: row.try_get("image_url")?,
        description: row.try_get("description")?,
        created_by: row.try_get("created_by")?,
        created_by_id: row.try_get("created_by_id")?,
    })
}

fn comment_from_row(row: &Row) -> Result<Comment, tokio_postgres::Error> {
    Ok(Comment {
        id: row.try_get("id")?,
        book_id: row.try_get("book_id")?,
        username: row.try_get("username")?,
        content: row.try_get("content")?,
        rate: row.try_get("rate")?,
    })
}

fn books_page(rows: Vec<Row>, limit: i64, cursor: i64) -> Result<BooksPage, BookRepositoryError> {
    let books = rows
        .iter()
        .map(book_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let next_cursor = next_cursor(cursor, limit, books.len());
    Ok(BooksPage { books, next_cursor })
}

async fn select_book<C: GenericClient + Sync>(
    client: &C,
    book_id: BookId,
    for_update: bool,
) -> Result<Option<Book>, BookRepositoryError> {
    let lock_clause = if for_update { " FOR UPDATE" } else { "" };
    let query = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1{lock_clause}");
    let row = client.query_opt(query.as_str(), &[&book_id]).await?;
    Ok(row.as_ref().map(book_from_row).transpose()?)
}

async fn select_comments<C: GenericClient + Sync>(
    client: &C,
    book_id: BookId,
) -> Result<Vec<Comment>, BookRepositoryError> {
    let query =
        format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE book_id = $1 ORDER BY id DESC");
    let rows = client.query(query.as_str(), &[&book_id]).await?;
    Ok(rows
        .iter()
        .map(comment_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

async fn insert_book<C: GenericClient + Sync>(
    client: &C,
    details: &BookDetails,
) -> Result<Book, BookRepositoryError> {
    let row = client
        .query_one(
            format!(
                "INSERT INTO books (title, author, published_date, image_url, description, created_by, created_by_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {BOOK_COLUMNS}"
            )
            .as_str(),
            &[
                &details.title,
                &details.author,
                &details.published_date,
                &details.image_url,
                &details.description,
                &details.created_by,
                &details.created_by_id,
            ],
        )
        .await
        .map_err(classify_error)?;
    Ok(book_from_row(&row)?)
}

async fn overwrite_book<C: GenericClient + Sync>(
    client: &C,
    book: &Book,
) -> Result<(), BookRepositoryError> {
    client
        .execute(
            "UPDATE books SET title = $1, author = $2, published_date = $3, image_url = $4, \
             description = $5, created_by = $6, created_by_id = $7 WHERE id = $8",
            &[
                &book.title,
                &book.author,
                &book.published_date,
                &book.image_url,
                &book.description,
                &book.created_by,
                &book.created_by_id,
                &book.id,
            ],
        )
        .await
        .map_err(classify_error)?;
    Ok(())
}

async fn insert_comment<C: GenericClient + Sync>(
    client: &C,
    book_id: BookId,
    details: &CommentDetails,
) -> Result<Comment, BookRepositoryError> {
    let row = client
        .query_one(
            format!(
                "INSERT INTO comments (book_id, username, content, rate) \
                 VALUES ($1, $2, $3, $4) RETURNING {COMMENT_COLUMNS}"
            )
            .as_str(),
            &[&book_id, &details.username, &details.content, &details.rate],
        )
        .await
        .map_err(classify_error)?;
    Ok(comment_from_row(&row)?)
}

#[async_trait::async_trait]
impl BookRepository for PostgresBooksRepository {
    #[tracing::instrument(skip(self))]
    async fn list_books(&self, limit: i64, cursor: i64) -> Result<BooksPage, BookRepositoryError> {
        check_bounds(limit, cursor)?;
        let client = self.client.lock().await;
        let rows = client
            .query(
                format!(
                    "SELECT {BOOK_COLUMNS} FROM books ORDER BY title NULLS FIRST, id LIMIT $1 OFFSET $2"
                )
                .as_str(),
                &[&limit, &cursor],
            )
            .await?;
        books_page(rows, limit, cursor)
    }

    #[tracing::instrument(skip(self))]
    async fn get_book(
        &self,
        book_id: BookId,
    ) -> Result<Option<BookWithComments>, BookRepositoryError> {
        let client = self.client.lock().await;
        let Some(book) = select_book(&*client, book_id, false).await? else {
            return Ok(None);
        };
        let comments = select_comments(&*client, book_id).await?;
        Ok(Some(BookWithComments { book, comments }))
    }

    #[tracing::instrument(skip(self))]
    async fn create_book(&self, details: BookDetails) -> Result<Book, BookRepositoryError> {
        details.validate()?;
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let book = insert_book(&transaction, &details).await?;
        transaction.commit().await?;
        tracing::info!("Created book {}", book.id);
        Ok(book)
    }

    #[tracing::instrument(skip(self))]
    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Book, BookRepositoryError> {
        patch.validate()?;
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let mut book = select_book(&transaction, book_id, true)
            .await?
            .ok_or(BookRepositoryError::NotFound(book_id))?;
        patch.apply_to(&mut book);
        overwrite_book(&transaction, &book).await?;
        transaction.commit().await?;
        Ok(book)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let removed_comments = transaction
            .execute("DELETE FROM comments WHERE book_id = $1", &[&book_id])
            .await
            .map_err(classify_error)?;
        let removed_books = transaction
            .execute("DELETE FROM books WHERE id = $1", &[&book_id])
            .await
            .map_err(classify_error)?;
        transaction.commit().await?;
        tracing::info!(
            "Deleted {} book(s) and {} comment(s) for id {}",
            removed_books,
            removed_comments,
            book_id
        );
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn search_books(
        &self,
        criteria: SearchCriteria,
        limit: i64,
        cursor: i64,
    ) -> Result<BooksPage, BookRepositoryError> {
        criteria.validate()?;
        check_bounds(limit, cursor)?;
        let client = self.client.lock().await;
        let rows = client
            .query(
                format!(
                    "SELECT {BOOK_COLUMNS} FROM books \
                     WHERE ($1::TEXT IS NULL OR title = $1) \
                     AND ($2::TEXT IS NULL OR published_date LIKE ($2 || '%')) \
                     ORDER BY title NULLS FIRST, id LIMIT $3 OFFSET $4"
                )
                .as_str(),
                &[
                    &criteria.title_filter(),
                    &criteria.year_filter(),
                    &limit,
                    &cursor,
                ],
            )
            .await?;
        books_page(rows, limit, cursor)
    }

    #[tracing::instrument(skip(self))]
    async fn add_comment(
        &self,
        book_id: BookId,
        details: CommentDetails,
    ) -> Result<Comment, BookRepositoryError> {
        details.validate()?;
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let comment = insert_comment(&transaction, book_id, &details).await?;
        transaction.commit().await?;
        Ok(comment)
    }

    #[tracing::instrument(skip(self))]
    async fn get_comments(&self, book_id: BookId) -> Result<Vec<Comment>, BookRepositoryError> {
        let client = self.client.lock().await;
        select_comments(&*client, book_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn ranking(&self) -> Result<Ranking, BookRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT b.id, b.title, b.author, b.published_date, r.rate_sum, r.rate_count \
                 FROM books b \
                 JOIN (SELECT book_id, SUM(rate)::INT8 AS rate_sum, COUNT(rate) AS rate_count \
                       FROM comments WHERE rate IS NOT NULL GROUP BY book_id) r \
                 ON r.book_id = b.id",
                &[],
            )
            .await?;

        let rated_books = rows
            .iter()
            .map(|row| {
                Ok(RatedBook {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    author: row.try_get("author")?,
                    published_date: row.try_get("published_date")?,
                    avg_rate: average_rate(
                        row.try_get("rate_sum")?,
                        row.try_get("rate_count")?,
                    ),
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

        Ok(rank_books(rated_books))
    }
}

#[cfg(all(test, feature = "postgres_tests"))]
mod postgres_book_repository_tests {
    use std::sync::Arc;

    use serial_test::file_serial;
    use testcontainers::core::IntoContainerPort;
    use testcontainers::runners::AsyncRunner;
    use testcontainers::{ContainerAsync, GenericImage, ImageExt};

    use crate::books_repository::book_repository_contract as contract;
    use crate::books_repository::{PostgresBooksRepository, PostgresBooksRepositoryConfig};

    async fn start_postgres_container_and_init_repo(
    ) -> (ContainerAsync<GenericImage>, PostgresBooksRepository) {
        let pg_container = GenericImage::new("postgres", "latest")
            .with_mapped_port(5432, 5432.tcp())
            .with_env_var("POSTGRES_USER", "postgres")
            .with_env_var("POSTGRES_PASSWORD", "postgres")
            .start()
            .await
            .expect("Failed to start postgres");

        for _ in 0..10 {
            if let Ok(repo) = PostgresBooksRepository::init(PostgresBooksRepositoryConfig {
                hostname: "127.0.0.1".to_string(),
                username: "postgres".to_string(),
                password: "postgres".to_string(),
                dbname: None,
            })
            .await
            {
                return (pg_container, repo);
            }
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }
        panic!("Failed to setup postgres container")
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    async fn test_create_book_and_get_it() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::create_and_read_back(&repo).await;
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    async fn test_list_books_in_title_order() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::list_in_title_order(&repo).await;
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    async fn test_update_book() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::update_known_fields(&repo).await;
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    async fn test_delete_book_with_comments() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::delete_with_comments(&repo).await;
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    async fn test_comments_newest_first() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::comments_newest_first(&repo).await;
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    async fn test_search_by_title_and_year() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::search_by_title_and_year(&repo).await;
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Covers the 4.50, 4.50, 3.00 tie and a book without comments
    async fn test_ranking() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::rank_by_average_rate(&repo).await;
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    async fn test_ranking_ties_after_rounding() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::rank_ties_on_rounded_average(&repo).await;
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    async fn test_concurrent_comments() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;
        contract::concurrent_comments_are_kept(Arc::new(repo)).await;
    }
}
