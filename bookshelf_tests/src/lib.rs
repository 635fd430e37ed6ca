//! Data generators and settings shared by the system and load tests.
//! Both expect a bookshelf server to be running already.

use rand::prelude::SliceRandom;
use rand::Rng;

use bookshelf_repository::api::{BookDetails, CommentDetails};

pub const DEFAULT_BOOKSHELF_URL: &str = "http://127.0.0.1:8080";

/// Url of the server under test, `BOOKSHELF_URL` overrides the default
pub fn bookshelf_url() -> String {
    std::env::var("BOOKSHELF_URL").unwrap_or(DEFAULT_BOOKSHELF_URL.to_string())
}

/// Suffix keeping titles of separate test runs apart
pub fn unique_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

pub fn generate_books(rng: &mut impl Rng, no_of_books: usize, run: u128) -> Vec<BookDetails> {
    (0..no_of_books)
        .map(|no| BookDetails {
            title: Some(format!(
                "The {} {} {} #{}",
                ADJECTIVES.choose(rng).unwrap_or(&"Quiet"),
                NOUNS.choose(rng).unwrap_or(&"Harbour"),
                run,
                no
            )),
            author: Some(format!("Author {}", no % 7)),
            published_date: Some(format!(
                "{}-{:02}-{:02}",
                rng.gen_range(1900..2024),
                rng.gen_range(1..13),
                rng.gen_range(1..29)
            )),
            image_url: None,
            description: Some("Generated for load testing".to_string()),
            created_by: Some("load_test".to_string()),
            created_by_id: Some(run.to_string()),
        })
        .collect()
}

pub fn generate_comment(rng: &mut impl Rng) -> CommentDetails {
    CommentDetails {
        username: Some(format!("reader{}", rng.gen_range(0..100))),
        content: Some("Generated comment".to_string()),
        rate: Some(rng.gen_range(1..=5)),
    }
}

const ADJECTIVES: [&str; 8] = [
    "Silent", "Burning", "Hidden", "Last", "Frozen", "Golden", "Broken", "Distant",
];

const NOUNS: [&str; 8] = [
    "Garden", "Empire", "River", "Lighthouse", "Orchard", "Station", "Comet", "Library",
];
