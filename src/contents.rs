//! Shapes for the GitHub "get repository content" endpoint and the values the
//! tools hand back to the caller.

use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::McpGithubError;

/// Characters left untouched when encoding a path segment or a ref (RFC 3986 unreserved).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

// -- Upstream wire types --

/// GitHub answers with an array for directories and an object for anything else.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentsResponse {
    Listing(Vec<EntryDescriptor>),
    Item(FileDescriptor),
}

#[derive(Debug, Deserialize)]
pub struct EntryDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct FileDescriptor {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: Option<serde_json::Value>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

// -- Tool results --

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    /// Anything that is not a directory (symlinks, submodules) is listed as a file.
    fn from_upstream(kind: &str) -> Self {
        if kind == "dir" {
            EntryKind::Dir
        } else {
            EntryKind::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    pub path: String,
    pub size: Option<u64>,
}

/// Envelope returned by every tool: `{ok: true, result}` or `{ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResponse<T> {
    Success(T),
    Failure(String),
}

impl<T> ToolResponse<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolResponse::Success(_))
    }
}

impl<T> From<Result<T, McpGithubError>> for ToolResponse<T> {
    fn from(result: Result<T, McpGithubError>) -> Self {
        match result {
            Ok(value) => ToolResponse::Success(value),
            Err(e) => ToolResponse::Failure(e.tool_message()),
        }
    }
}

impl<T: Serialize> Serialize for ToolResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ToolResponse", 2)?;
        match self {
            ToolResponse::Success(result) => {
                s.serialize_field("ok", &true)?;
                s.serialize_field("result", result)?;
            }
            ToolResponse::Failure(error) => {
                s.serialize_field("ok", &false)?;
                s.serialize_field("error", error)?;
            }
        }
        s.end()
    }
}

// -- Shaping --

/// Decode a GitHub base64 payload. GitHub wraps the encoded text with newlines,
/// and invalid UTF-8 sequences become replacement characters.
pub fn decode_content(encoded: &str) -> Result<String, McpGithubError> {
    let cleaned: String = encoded.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| McpGithubError::Decode(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn file_result(response: ContentsResponse, path: &str) -> Result<FileResult, McpGithubError> {
    match response {
        ContentsResponse::Listing(_) => Err(McpGithubError::NotAFile(path.to_string())),
        ContentsResponse::Item(file) => {
            let unreadable = |reason: String| McpGithubError::Unreadable {
                path: path.to_string(),
                reason,
            };
            if let Some(kind) = file.kind.as_deref().filter(|k| *k != "file") {
                return Err(unreadable(format!("it is a {}, not a file", kind)));
            }
            match (file.encoding.as_deref(), file.content.as_deref()) {
                (Some("base64"), Some(encoded)) => Ok(FileResult {
                    text: decode_content(encoded)?,
                }),
                (Some("none"), _) => {
                    tracing::warn!(path = %file.path, "GitHub returned no inline content for file");
                    Err(unreadable(
                        "GitHub does not return inline content for files this large".to_string(),
                    ))
                }
                (Some(other), _) => Err(unreadable(format!("unsupported encoding '{}'", other))),
                (None, _) => Err(unreadable("response carries no file content".to_string())),
            }
        }
    }
}

/// Entries keep the order GitHub reported. A path naming a single file yields
/// a one-element listing for that file.
pub fn tree_entries(response: ContentsResponse) -> Vec<TreeEntry> {
    match response {
        ContentsResponse::Listing(entries) => entries
            .into_iter()
            .map(|e| TreeEntry {
                kind: EntryKind::from_upstream(&e.kind),
                name: e.name,
                path: e.path,
                size: e.size.as_ref().and_then(|s| s.as_u64()),
            })
            .collect(),
        ContentsResponse::Item(file) => vec![TreeEntry {
            kind: EntryKind::File,
            name: file.name,
            path: file.path,
            size: file.size.as_ref().and_then(|s| s.as_u64()),
        }],
    }
}

/// API route for the content at `path`. An empty path addresses the repository root.
pub fn contents_route(owner: &str, repo: &str, path: &str, git_ref: Option<&str>) -> String {
    let encoded_path = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| utf8_percent_encode(segment, COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("/");

    let mut route = format!("/repos/{}/{}/contents", owner, repo);
    if !encoded_path.is_empty() {
        route.push('/');
        route.push_str(&encoded_path);
    }
    if let Some(git_ref) = git_ref {
        route.push_str("?ref=");
        route.push_str(&utf8_percent_encode(git_ref, COMPONENT).to_string());
    }
    route
}
