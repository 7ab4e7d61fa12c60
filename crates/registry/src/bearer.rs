//! Bearer-token extraction from the `Authorization` header.

/// Pull the bearer token out of an `Authorization` header value.
///
/// Returns `None` when the scheme is not `Bearer` or the token is empty;
/// callers treat both the same as a missing credential.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_token() {
        assert_eq!(bearer_token("Bearer sk-alice-001"), Some("sk-alice-001"));
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("bearer sk-alice-001"), None);
    }

    #[test]
    fn rejects_empty_token() {
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token(""), None);
    }
}
