use serde::{Deserialize, Serialize};

/// File content as returned by the repository contents API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileContent {
    pub name: String,
    pub html_url: String,
    pub content: String,
    pub encoding: String,
}
