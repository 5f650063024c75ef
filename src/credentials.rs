//! Resolution of the GitHub access token.
//!
//! The token is looked up once when the provider is built but only checked
//! when a tool actually needs it, so the server can start, answer health
//! checks and list its tools without one.

use crate::error::McpGithubError;

/// Environment variables consulted for the token, highest priority first.
pub const TOKEN_ENV_VARS: [&str; 2] = ["MY_GITHUB_TOKEN", "GITHUB_TOKEN"];

#[derive(Clone, Default)]
pub struct CredentialProvider {
    token: Option<(&'static str, String)>,
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("source", &self.source())
            .finish()
    }
}

impl CredentialProvider {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. The first non-empty value wins.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = TOKEN_ENV_VARS.iter().find_map(|&name| {
            lookup(name).filter(|v| !v.is_empty()).map(|v| (name, v))
        });
        Self { token }
    }

    pub fn token(&self) -> Result<&str, McpGithubError> {
        self.token
            .as_ref()
            .map(|(_, t)| t.as_str())
            .ok_or_else(|| {
                McpGithubError::Configuration(format!(
                    "Missing GitHub token: set {} (or {})",
                    TOKEN_ENV_VARS[0], TOKEN_ENV_VARS[1]
                ))
            })
    }

    /// Name of the variable the token came from, if any.
    pub fn source(&self) -> Option<&'static str> {
        self.token.as_ref().map(|(name, _)| *name)
    }
}
