use anyhow::{bail, Context};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    Book, BookDetails, BookId, BookPatch, BookWithComments, BooksPage, Comment, CommentDetails,
    Ranking, SearchCriteria,
};

pub struct BookshelfClient {
    url: String,
    client: ClientWithMiddleware,
}

impl BookshelfClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    async fn error_message(response: reqwest::Response) -> String {
        response.json().await.unwrap_or_default()
    }

    /// Calls POST /api/book endpoint
    /// Returns the created book, including its id
    pub async fn create_book(&self, details: &BookDetails) -> anyhow::Result<Book> {
        let response = self
            .client
            .post(format!("{}/api/book", self.url))
            .json(details)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to add book {}", Self::error_message(response).await)
        }
        Ok(response.json().await?)
    }

    /// Calls GET /api/book/{book_id} endpoint
    /// Returns None if book was not in the repository
    pub async fn get_book(&self, book_id: BookId) -> anyhow::Result<Option<BookWithComments>> {
        let response = self
            .client
            .get(format!("{}/api/book/{}", self.url, book_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get book {}", Self::error_message(response).await)
        }
    }

    /// Calls PUT /api/book/{book_id} endpoint
    pub async fn update_book(&self, book_id: BookId, patch: &BookPatch) -> anyhow::Result<Book> {
        let response = self
            .client
            .put(format!("{}/api/book/{}", self.url, book_id))
            .json(patch)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "Failed to update book {} ({}) {}",
                book_id,
                status,
                Self::error_message(response).await
            )
        }
        Ok(response.json().await?)
    }

    /// Calls DELETE /api/book/{book_id} endpoint
    pub async fn delete_book(&self, book_id: BookId) -> anyhow::Result<()> {
        let response = self
            .client
            .delete(format!("{}/api/book/{}", self.url, book_id))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to delete book {}", Self::error_message(response).await)
        }
        Ok(())
    }

    /// Calls GET /api/books endpoint
    pub async fn list_books(&self, limit: i64, cursor: i64) -> anyhow::Result<BooksPage> {
        let response = self
            .client
            .get(format!("{}/api/books", self.url))
            .query(&[("limit", limit), ("cursor", cursor)])
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to list books {}", Self::error_message(response).await)
        }
        Ok(response.json().await?)
    }

    /// Calls GET /api/books/search endpoint
    pub async fn search_books(
        &self,
        criteria: &SearchCriteria,
        limit: i64,
        cursor: i64,
    ) -> anyhow::Result<BooksPage> {
        let response = self
            .client
            .get(format!("{}/api/books/search", self.url))
            .query(criteria)
            .query(&[("limit", limit), ("cursor", cursor)])
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to search books {}", Self::error_message(response).await)
        }
        Ok(response.json().await?)
    }

    /// Calls GET /api/books/ranking endpoint
    pub async fn ranking(&self) -> anyhow::Result<Ranking> {
        let response = self
            .client
            .get(format!("{}/api/books/ranking", self.url))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to get ranking {}", Self::error_message(response).await)
        }
        Ok(response.json().await?)
    }

    /// Calls POST /api/book/{book_id}/comments endpoint
    pub async fn add_comment(
        &self,
        book_id: BookId,
        details: &CommentDetails,
    ) -> anyhow::Result<Comment> {
        let response = self
            .client
            .post(format!("{}/api/book/{}/comments", self.url, book_id))
            .json(details)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "Failed to add comment to book {} ({}) {}",
                book_id,
                status,
                Self::error_message(response).await
            )
        }
        Ok(response.json().await?)
    }

    /// Calls GET /api/book/{book_id}/comments endpoint
    pub async fn get_comments(&self, book_id: BookId) -> anyhow::Result<Vec<Comment>> {
        let response = self
            .client
            .get(format!("{}/api/book/{}/comments", self.url, book_id))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to get comments {}", Self::error_message(response).await)
        }
        Ok(response.json().await?)
    }
}
