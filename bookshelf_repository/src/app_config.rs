use paperclip::actix::web;

use crate::handlers;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/api")
                .service(web::resource("/books").route(web::get().to(handlers::list_books)))
                .service(
                    web::resource("/books/search").route(web::get().to(handlers::search_books)),
                )
                .service(web::resource("/books/ranking").route(web::get().to(handlers::ranking)))
                .service(
                    web::scope("/book")
                        .service(web::resource("").route(web::post().to(handlers::create_book)))
                        .service(
                            web::resource("/{book_id}")
                                .route(web::get().to(handlers::get_book))
                                .route(web::put().to(handlers::update_book))
                                .route(web::delete().to(handlers::delete_book)),
                        )
                        .service(
                            web::resource("/{book_id}/comments")
                                .route(web::get().to(handlers::get_comments))
                                .route(web::post().to(handlers::add_comment)),
                        ),
                ),
        );
}
