use rand::prelude::SliceRandom;
use rand::thread_rng;

use bookshelf_repository::client::BookshelfClient;
use bookshelf_tests::{bookshelf_url, generate_books, generate_comment, unique_suffix};

#[tokio::test]
async fn generate_lots_of_books_and_comments() {
    const NO_OF_BOOKS_TO_GENERATE: usize = 50;
    const NO_OF_COMMENTS: usize = 500;

    let client = BookshelfClient::new(&bookshelf_url()).expect("Failed to create client");
    let run = unique_suffix();

    let mut book_ids = vec![];
    {
        let mut rng = thread_rng();
        for book in generate_books(&mut rng, NO_OF_BOOKS_TO_GENERATE, run) {
            let created = client
                .create_book(&book)
                .await
                .expect("Failed to create book");
            book_ids.push(created.id);
            println!("Added book {}", created.id);
        }
    }

    for _ in 0..NO_OF_COMMENTS {
        let (book_id, comment) = {
            let mut rng = thread_rng();
            let book_id = *book_ids.choose(&mut rng).expect("No books generated");
            (book_id, generate_comment(&mut rng))
        };
        client
            .add_comment(book_id, &comment)
            .await
            .expect("Failed to add comment");
    }

    let ranking = client.ranking().await.expect("Failed to get ranking");
    assert_eq!(ranking.books.len(), ranking.ranks.len());
    assert!(ranking
        .books
        .windows(2)
        .all(|pair| pair[0].avg_rate >= pair[1].avg_rate));
    assert!(ranking.ranks.windows(2).all(|pair| pair[0] <= pair[1]));

    // Page through everything, every generated book must show up exactly once
    let mut cursor = 0;
    let mut seen = 0;
    loop {
        let page = client
            .list_books(100, cursor)
            .await
            .expect("Failed to list books");
        seen += page
            .books
            .iter()
            .filter(|book| book.created_by_id.as_deref() == Some(run.to_string().as_str()))
            .count();
        match page.next_cursor {
            Some(next) => cursor = next,
            None => break,
        }
    }
    assert_eq!(seen, NO_OF_BOOKS_TO_GENERATE);
}
