//! Public path allowlist.

use crate::domain::error::DomainError;

/// Matcher for paths that bypass authorization entirely.
#[derive(Clone, Default)]
pub struct PublicPathMatcher {
    matcher: matchit::Router<()>,
}

impl PublicPathMatcher {
    /// Build a matcher from matchit patterns (`/health`, `/static/{*rest}`).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPublicPath` if a pattern is rejected by the router.
    pub fn from_patterns(patterns: &[String]) -> Result<Self, DomainError> {
        let mut matcher = matchit::Router::new();
        for pattern in patterns {
            matcher
                .insert(pattern.as_str(), ())
                .map_err(|e| DomainError::InvalidPublicPath {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(Self { matcher })
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.matcher.at(path).is_ok()
    }
}
