use std::sync::Arc;

use actix_web::http::header::LOCATION;
use actix_web::web::Data;
use actix_web::Error;
use actix_web::HttpResponse;
use paperclip::actix::{
    api_v2_operation,
    web::{self},
};

use crate::api::{BookDetails, BookId, BookPatch, CommentDetails, PageQuery, SearchQuery};
use crate::books_repository::{BookRepository, BookRepositoryError};
use crate::pagination::DEFAULT_PAGE_LIMIT;

fn error_response(operation: &str, err: BookRepositoryError) -> HttpResponse {
    match err {
        BookRepositoryError::NotFound(_) => HttpResponse::NotFound().finish(),
        BookRepositoryError::Validation(err) => HttpResponse::BadRequest().json(err.to_string()),
        BookRepositoryError::ConstraintViolation(message) => {
            HttpResponse::Conflict().json(message)
        }
        err => {
            tracing::error!("{} failed {}", operation, err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn list_books(
    books_repository: Data<Arc<dyn BookRepository>>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let cursor = query.cursor.unwrap_or_default();
    Ok(match books_repository.list_books(limit, cursor).await {
        Ok(page) => HttpResponse::Ok().json(page),
        Err(err) => error_response("List books", err),
    })
}

#[api_v2_operation]
pub async fn search_books(
    books_repository: Data<Arc<dyn BookRepository>>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, Error> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let cursor = query.cursor.unwrap_or_default();
    Ok(
        match books_repository
            .search_books(query.criteria(), limit, cursor)
            .await
        {
            Ok(page) => HttpResponse::Ok().json(page),
            Err(err) => error_response("Search books", err),
        },
    )
}

#[api_v2_operation]
pub async fn ranking(
    books_repository: Data<Arc<dyn BookRepository>>,
) -> Result<HttpResponse, Error> {
    Ok(match books_repository.ranking().await {
        Ok(ranking) => HttpResponse::Ok().json(ranking),
        Err(err) => error_response("Ranking", err),
    })
}

#[api_v2_operation]
pub async fn create_book(
    books_repository: Data<Arc<dyn BookRepository>>,
    details: web::Json<BookDetails>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.create_book(details.into_inner()).await {
            Ok(book) => HttpResponse::Ok()
                .append_header((LOCATION, format!("/api/book/{}", book.id)))
                .json(book),
            Err(err) => error_response("Create book", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_book(
    books_repository: Data<Arc<dyn BookRepository>>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.get_book(book_id.into_inner()).await {
            Ok(Some(book_with_comments)) => HttpResponse::Ok().json(book_with_comments),
            Ok(None) => HttpResponse::NotFound().finish(),
            Err(err) => error_response("Get book", err),
        },
    )
}

#[api_v2_operation]
pub async fn update_book(
    books_repository: Data<Arc<dyn BookRepository>>,
    book_id: web::Path<BookId>,
    patch: web::Json<BookPatch>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository
            .update_book(book_id.into_inner(), patch.into_inner())
            .await
        {
            Ok(book) => HttpResponse::Ok().json(book),
            Err(err) => error_response("Update book", err),
        },
    )
}

#[api_v2_operation]
pub async fn delete_book(
    books_repository: Data<Arc<dyn BookRepository>>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.delete_book(book_id.into_inner()).await {
            Ok(()) => HttpResponse::Ok().finish(),
            Err(err) => error_response("Delete book", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_comments(
    books_repository: Data<Arc<dyn BookRepository>>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.get_comments(book_id.into_inner()).await {
            Ok(comments) => HttpResponse::Ok().json(comments),
            Err(err) => error_response("Get comments", err),
        },
    )
}

#[api_v2_operation]
pub async fn add_comment(
    books_repository: Data<Arc<dyn BookRepository>>,
    book_id: web::Path<BookId>,
    details: web::Json<CommentDetails>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository
            .add_comment(book_id.into_inner(), details.into_inner())
            .await
        {
            Ok(comment) => HttpResponse::Ok().json(comment),
            // The only constraint on a new comment is its book reference
            Err(BookRepositoryError::ConstraintViolation(_)) => HttpResponse::NotFound().finish(),
            Err(err) => error_response("Add comment", err),
        },
    )
}
