use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{schemars, tool, tool_handler, tool_router, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::contents::{self, ContentsResponse, FileResult, ToolResponse, TreeEntry};
use crate::credentials::CredentialProvider;
use crate::error::McpGithubError;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Tool registry. Cloning is cheap and clones share the lazily built GitHub
/// client, so one instance can back any number of protocol sessions.
#[derive(Clone)]
pub struct McpGithubServer {
    credentials: Arc<CredentialProvider>,
    api_base: Arc<str>,
    github: Arc<OnceCell<octocrab::Octocrab>>,
    tool_router: ToolRouter<Self>,
}

// -- Tool parameter types --

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ReadFileParams {
    #[schemars(description = "Repository owner (user or org)")]
    pub owner: String,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "File path within the repository")]
    pub path: String,

    #[schemars(description = "Branch, tag, or commit SHA. Defaults to the repo's default branch")]
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ListTreeParams {
    #[schemars(description = "Repository owner (user or org)")]
    pub owner: String,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Directory path within the repository (default: repository root)")]
    #[serde(default)]
    pub path: Option<String>,

    #[schemars(description = "Branch, tag, or commit SHA. Defaults to the repo's default branch")]
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

impl McpGithubServer {
    pub fn new(credentials: CredentialProvider, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            credentials: Arc::new(credentials),
            api_base: Arc::from(api_base.trim_end_matches('/')),
            github: Arc::new(OnceCell::new()),
            tool_router: Self::tool_router(),
        }
    }

    /// Descriptors of every registered tool. Needs neither a session nor a token.
    pub fn tool_catalog() -> Vec<Tool> {
        Self::tool_router().list_all()
    }

    /// Authenticated GitHub client, built on first use. Fails without a token.
    async fn client(&self) -> Result<&octocrab::Octocrab, McpGithubError> {
        let token = self.credentials.token()?;
        self.github
            .get_or_try_init(|| async {
                let builder = octocrab::OctocrabBuilder::new()
                    .personal_token(token.to_string())
                    .base_uri(&*self.api_base)?;
                Ok::<_, McpGithubError>(builder.build()?)
            })
            .await
    }

    async fn fetch_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<ContentsResponse, McpGithubError> {
        let github = self.client().await?;
        let route = contents::contents_route(owner, repo, path, git_ref);
        tracing::debug!(%route, "Fetching repository contents");
        let response: ContentsResponse = github.get(&route, None::<&()>).await?;
        Ok(response)
    }

    pub async fn do_read_file(
        &self,
        params: &ReadFileParams,
    ) -> Result<FileResult, McpGithubError> {
        sanitize_github_name(&params.owner, "owner")?;
        sanitize_github_name(&params.repo, "repo")?;
        sanitize_url_value(&params.path, "path")?;
        sanitize_repo_path(&params.path, "path")?;
        if let Some(ref git_ref) = params.git_ref {
            sanitize_url_value(git_ref, "ref")?;
        }

        let response = self
            .fetch_contents(
                &params.owner,
                &params.repo,
                &params.path,
                params.git_ref.as_deref(),
            )
            .await?;
        contents::file_result(response, &params.path)
    }

    pub async fn do_list_tree(
        &self,
        params: &ListTreeParams,
    ) -> Result<Vec<TreeEntry>, McpGithubError> {
        sanitize_github_name(&params.owner, "owner")?;
        sanitize_github_name(&params.repo, "repo")?;
        let path = params.path.as_deref().unwrap_or("");
        sanitize_repo_path(path, "path")?;
        if let Some(ref git_ref) = params.git_ref {
            sanitize_url_value(git_ref, "ref")?;
        }

        let response = self
            .fetch_contents(
                &params.owner,
                &params.repo,
                path,
                params.git_ref.as_deref(),
            )
            .await?;
        Ok(contents::tree_entries(response))
    }

    /// Tool-level failures become an `{ok: false}` envelope flagged as an error
    /// result; anything else is a protocol fault.
    fn respond<T: Serialize>(
        &self,
        tool: &str,
        result: Result<T, McpGithubError>,
    ) -> Result<CallToolResult, ErrorData> {
        if let Err(ref e) = result {
            if !e.is_tool_level() {
                tracing::error!(tool, error = %e, "Tool call failed");
                return Err(e.to_mcp_error());
            }
            tracing::warn!(tool, error = %e, "Tool call returned a failure");
        }

        let response = ToolResponse::from(result);
        let text = serde_json::to_string_pretty(&response)
            .unwrap_or_else(|_| "{}".to_string());
        if response.is_ok() {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        }
    }
}

/// Validate that a GitHub owner/repo name doesn't contain characters that
/// could be used for URL injection in raw API routes.
fn sanitize_github_name(name: &str, field: &str) -> Result<(), McpGithubError> {
    if name.is_empty() {
        return Err(McpGithubError::InvalidParam(format!(
            "{} must not be empty",
            field
        )));
    }
    for ch in ['/', '?', '#', '%', '\0', ' ', '\n', '\t'] {
        if name.contains(ch) {
            return Err(McpGithubError::InvalidParam(format!(
                "{} contains invalid character '{}'",
                field,
                ch.escape_default()
            )));
        }
    }
    Ok(())
}

/// Validate a repository path. Segments are percent-encoded when the route is
/// built, but `.` and `..` survive encoding and would climb out of the
/// contents endpoint, so they are rejected.
fn sanitize_repo_path(path: &str, field: &str) -> Result<(), McpGithubError> {
    if path.chars().any(char::is_control) {
        return Err(McpGithubError::InvalidParam(format!(
            "{} contains invalid character",
            field
        )));
    }
    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(McpGithubError::InvalidParam(format!(
            "{} must not contain '.' or '..' segments",
            field
        )));
    }
    Ok(())
}

/// Validate a path or ref. These are percent-encoded when the route is built,
/// so only emptiness and control characters are rejected.
fn sanitize_url_value(value: &str, field: &str) -> Result<(), McpGithubError> {
    if value.is_empty() {
        return Err(McpGithubError::InvalidParam(format!(
            "{} must not be empty",
            field
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(McpGithubError::InvalidParam(format!(
            "{} contains invalid character",
            field
        )));
    }
    Ok(())
}

// -- MCP tool handlers (thin wrappers calling do_* methods) --

#[tool_router]
impl McpGithubServer {
    #[tool(
        name = "github.readFile",
        title = "Read file from GitHub",
        description = "Read a UTF-8 text file from a GitHub repo"
    )]
    async fn read_file(
        &self,
        Parameters(params): Parameters<ReadFileParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tracing::info!(
            owner = %params.owner,
            repo = %params.repo,
            path = %params.path,
            "github.readFile"
        );
        let result = self.do_read_file(&params).await;
        self.respond("github.readFile", result)
    }

    #[tool(
        name = "github.listTree",
        title = "List files at path",
        description = "List files/folders at a path in a GitHub repo"
    )]
    async fn list_tree(
        &self,
        Parameters(params): Parameters<ListTreeParams>,
    ) -> Result<CallToolResult, ErrorData> {
        tracing::info!(
            owner = %params.owner,
            repo = %params.repo,
            path = params.path.as_deref().unwrap_or(""),
            "github.listTree"
        );
        let result = self.do_list_tree(&params).await;
        self.respond("github.listTree", result)
    }
}

#[tool_handler]
impl ServerHandler for McpGithubServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "github-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Read-only GitHub access. Use github.listTree to browse a repository \
                 directory and github.readFile to read a text file. Results are JSON \
                 objects of the form {ok, result} or {ok: false, error}."
                    .to_string(),
            ),
        }
    }
}
