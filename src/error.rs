use rmcp::model::ErrorData;

#[derive(Debug, thiserror::Error)]
pub enum McpGithubError {
    #[error("GitHub API error: {0}")]
    GitHub(#[from] octocrab::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Path is a directory, not a file: {0}")]
    NotAFile(String),

    #[error("Could not decode file content: {0}")]
    Decode(String),

    #[error("Cannot read {path} as text: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}

impl McpGithubError {
    /// Failures the calling agent can reason about. These are reported inside a
    /// successful tool response as `{ok: false, error}` rather than as faults.
    pub fn is_tool_level(&self) -> bool {
        matches!(
            self,
            McpGithubError::GitHub(_)
                | McpGithubError::InvalidParam(_)
                | McpGithubError::NotAFile(_)
                | McpGithubError::Decode(_)
                | McpGithubError::Unreadable { .. }
        )
    }

    /// Message for the failure envelope. Upstream errors surface GitHub's own
    /// message text when there is one.
    pub fn tool_message(&self) -> String {
        match self {
            McpGithubError::GitHub(octocrab::Error::GitHub { source, .. }) => {
                format!("GitHub API error: {}", source.message)
            }
            other => other.to_string(),
        }
    }

    pub fn to_mcp_error(&self) -> ErrorData {
        match self {
            McpGithubError::InvalidParam(_) => ErrorData::invalid_params(self.to_string(), None),
            McpGithubError::GitHub(_)
            | McpGithubError::NotAFile(_)
            | McpGithubError::Decode(_)
            | McpGithubError::Unreadable { .. }
            | McpGithubError::Configuration(_)
            | McpGithubError::Other(_) => ErrorData::internal_error(self.to_string(), None),
        }
    }
}
