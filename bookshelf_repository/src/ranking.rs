use std::cmp::Ordering;

use crate::api::{RatedBook, Ranking};

/// Averages are compared for ties after rounding to 2 decimal places, half to even
pub fn round_rate(average: f64) -> f64 {
    (average * 100.0).round_ties_even() / 100.0
}

/// Exact `sum / count` rounded half to even at 2 decimal places.
/// `count` must be positive.
pub fn average_rate(sum: i64, count: i64) -> f64 {
    let scaled = sum * 100;
    let quotient = scaled.div_euclid(count);
    let remainder = scaled.rem_euclid(count);
    let hundredths = match (2 * remainder).cmp(&count) {
        Ordering::Greater => quotient + 1,
        Ordering::Equal => quotient + quotient.rem_euclid(2),
        Ordering::Less => quotient,
    };
    hundredths as f64 / 100.0
}

/// Dense competition ranks for averages already sorted in descending order.
/// Equal rounded averages share a rank, the next distinct average gets its
/// 1-based position.
pub fn competition_ranks(averages: impl IntoIterator<Item = f64>) -> Vec<u32> {
    let mut ranks = vec![];
    let mut current: Option<(f64, u32)> = None;

    for (position, average) in (1..).zip(averages) {
        let rounded = round_rate(average);
        let rank = match current {
            Some((rate, rank)) if rounded >= rate => rank,
            _ => {
                current = Some((rounded, position));
                position
            }
        };
        ranks.push(rank);
    }
    ranks
}

/// Highest average first, ties keep the lower book id first
pub fn compare_rated_books(a: &RatedBook, b: &RatedBook) -> Ordering {
    b.avg_rate.total_cmp(&a.avg_rate).then(a.id.cmp(&b.id))
}

pub fn rank_books(mut books: Vec<RatedBook>) -> Ranking {
    for book in &mut books {
        book.avg_rate = round_rate(book.avg_rate);
    }
    books.sort_by(compare_rated_books);
    let ranks = competition_ranks(books.iter().map(|book| book.avg_rate));
    Ranking { books, ranks }
}

#[cfg(test)]
mod ranking_tests {
    use super::*;

    fn rated(id: i32, avg_rate: f64) -> RatedBook {
        RatedBook {
            id,
            title: Some(format!("book {id}")),
            author: None,
            published_date: None,
            avg_rate,
        }
    }

    #[test]
    fn ties_share_rank_and_next_rank_is_position() {
        assert_eq!(competition_ranks([4.5, 4.5, 3.0]), vec![1, 1, 3]);
        assert_eq!(competition_ranks([5.0, 4.0, 4.0, 4.0, 1.0]), vec![1, 2, 2, 2, 5]);
        assert_eq!(competition_ranks(Vec::<f64>::new()), Vec::<u32>::new());
    }

    #[test]
    fn ties_are_detected_after_rounding() {
        assert_eq!(
            competition_ranks([4.67, 4.666_666, 4.664]),
            vec![1, 1, 3]
        );
    }

    #[test]
    fn exact_halves_round_to_even() {
        assert_eq!(round_rate(1.125), 1.12);
        assert_eq!(round_rate(1.375), 1.38);
        assert_eq!(competition_ranks([1.13, 1.125, 1.12]), vec![1, 2, 2]);
    }

    #[test]
    fn average_rate_is_exact() {
        assert_eq!(average_rate(9, 8), 1.12);
        assert_eq!(average_rate(11, 8), 1.38);
        assert_eq!(average_rate(933, 200), 4.66);
        assert_eq!(average_rate(935, 200), 4.68);
        assert_eq!(average_rate(14, 3), 4.67);
        assert_eq!(average_rate(-9, 8), -1.12);
        assert_eq!(average_rate(9, 2), 4.5);
    }

    #[test]
    fn rank_books_reports_rounded_averages() {
        let ranking = rank_books(vec![rated(1, 1.12), rated(2, 1.125), rated(3, 1.13)]);
        let ids: Vec<i32> = ranking.books.iter().map(|book| book.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        let averages: Vec<f64> = ranking.books.iter().map(|book| book.avg_rate).collect();
        assert_eq!(averages, vec![1.13, 1.12, 1.12]);
        assert_eq!(ranking.ranks, vec![1, 2, 2]);
    }

    #[test]
    fn rank_books_orders_by_average_descending() {
        let ranking = rank_books(vec![rated(3, 3.0), rated(2, 4.5), rated(1, 4.5)]);
        let ids: Vec<i32> = ranking.books.iter().map(|book| book.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(ranking.ranks, vec![1, 1, 3]);
    }
}
