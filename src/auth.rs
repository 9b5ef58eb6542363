//! Stateless admin authorisation: every admin invocation presents the shared token again.

use crate::error::{Error, Result};
use constant_time_eq::constant_time_eq;

/// Checks a presented admin token against the configured one.
///
/// A missing token is [`Error::Unauthorized`]; a wrong token, or any token while admin access
/// is not configured, is [`Error::Forbidden`].
pub fn authorize(presented: Option<&str>, configured: Option<&str>) -> Result<()> {
    let presented = presented
        .filter(|token| !token.is_empty())
        .ok_or(Error::Unauthorized)?;

    match configured {
        Some(expected)
            if !expected.is_empty() && constant_time_eq(presented.as_bytes(), expected.as_bytes()) =>
        {
            Ok(())
        }
        _ => {
            tracing::warn!("rejected admin command with an invalid token");
            Err(Error::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_unauthorized() {
        assert!(matches!(authorize(None, Some("s3cret")), Err(Error::Unauthorized)));
        assert!(matches!(authorize(Some(""), Some("s3cret")), Err(Error::Unauthorized)));
    }

    #[test]
    fn wrong_token_is_forbidden() {
        assert!(matches!(authorize(Some("guess"), Some("s3cret")), Err(Error::Forbidden)));
        assert!(matches!(authorize(Some("s3cre"), Some("s3cret")), Err(Error::Forbidden)));
    }

    #[test]
    fn same_length_token_is_forbidden() {
        assert!(matches!(authorize(Some("s3creT"), Some("s3cret")), Err(Error::Forbidden)));
        assert!(matches!(authorize(Some("s3cret!"), Some("s3cret")), Err(Error::Forbidden)));
    }

    #[test]
    fn unconfigured_admin_rejects_everything() {
        assert!(matches!(authorize(Some("anything"), None), Err(Error::Forbidden)));
        assert!(matches!(authorize(Some("anything"), Some("")), Err(Error::Forbidden)));
    }

    #[test]
    fn matching_token_passes() {
        assert!(authorize(Some("s3cret"), Some("s3cret")).is_ok());
    }
}
