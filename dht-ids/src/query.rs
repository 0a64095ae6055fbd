/// Maximum accepted length, in bytes, of a caller-supplied query string
/// (spec.md §3).
pub const MAX_QUERY_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    TooLong,
}

impl core::fmt::Display for QueryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "query too long")
    }
}

impl std::error::Error for QueryError {}

/// Strip the configured TLD suffix (if present) and lower-case what
/// remains. Does not validate the character class; that is
/// [`is_valid_hostname`], a separate predicate (spec.md §4.A).
pub fn sanitize_query(query: &str, tld: &str) -> Result<String, QueryError> {
    let trimmed = if !tld.is_empty() && query.ends_with(tld) {
        &query[..query.len() - tld.len()]
    } else {
        query
    };

    if trimmed.len() > MAX_QUERY_LEN {
        return Err(QueryError::TooLong);
    }

    Ok(trimmed.to_ascii_lowercase())
}

/// `[0-9A-Za-z._-]*`
pub fn is_valid_hostname(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
}
