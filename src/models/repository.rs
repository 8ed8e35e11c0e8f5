//! Repository locator parsed from a repository web URL.

use std::fmt;

use reqwest::Url;

/// Owner and name of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocator {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid repository URL: {0}")]
pub struct LocatorError(pub String);

impl RepositoryLocator {
    /// Parse `https://<host>/<owner>/<repo>[/...]`.
    ///
    /// Trailing segments (`/tree/main`, ...) are ignored. Fails when the
    /// input is not a URL or fewer than two non-empty path segments follow
    /// the host.
    pub fn parse(url: &str) -> Result<Self, LocatorError> {
        let parsed = Url::parse(url.trim()).map_err(|_| LocatorError(url.to_string()))?;

        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| LocatorError(url.to_string()))?;

        match (segments.next(), segments.next()) {
            (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(LocatorError(url.to_string())),
        }
    }
}

impl fmt::Display for RepositoryLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
