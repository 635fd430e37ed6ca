use crate::validation::ValidationError;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Offset of the following page.
/// A full page signals that more rows may exist, a short one ends the listing.
pub fn next_cursor(cursor: i64, limit: i64, returned: usize) -> Option<i64> {
    if i64::try_from(returned).is_ok_and(|returned| returned == limit) {
        Some(cursor + limit)
    } else {
        None
    }
}

pub fn check_bounds(limit: i64, cursor: i64) -> Result<(), ValidationError> {
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ValidationError::InvalidLimit {
            limit,
            max: MAX_PAGE_LIMIT,
        });
    }
    if cursor < 0 {
        return Err(ValidationError::InvalidCursor(cursor));
    }
    Ok(())
}

/// Takes one page out of already ordered rows, returns it with the next cursor
pub fn take_page<T>(rows: impl Iterator<Item = T>, limit: i64, cursor: i64) -> (Vec<T>, Option<i64>) {
    // Both are non-negative after check_bounds
    let page: Vec<T> = rows
        .skip(usize::try_from(cursor).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or_default())
        .collect();
    let next = next_cursor(cursor, limit, page.len());
    (page, next)
}
