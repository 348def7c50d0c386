//! Wire types for the git-lfs batch API and the task payload.

use serde::{Deserialize, Serialize};

use super::SyncError;

/// An LFS pointer: content address plus size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LfsPointer {
    /// sha256 content id.
    pub oid: String,
    /// Object size in bytes.
    pub size: u64,
    /// Resolved download URL, filled in from the batch response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// Payload stashed on a task by the repo-sync phase: the LFS pointers
/// discovered while scanning the mirrored branches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LfsTaskPayload {
    #[serde(default)]
    pub pointers: Vec<LfsPointer>,
    /// Branch the pointers were collected from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl LfsTaskPayload {
    /// Parse the payload column of a task. An absent payload means there
    /// is nothing to transfer.
    pub fn parse(raw: Option<&str>) -> Result<LfsTaskPayload, SyncError> {
        match raw {
            None | Some("") => Ok(LfsTaskPayload::default()),
            Some(json) => {
                serde_json::from_str(json).map_err(|e| SyncError::InvalidPayload(e.to_string()))
            }
        }
    }
}

// Batch API request/response, see the git-lfs batch protocol.

#[derive(Debug, Serialize)]
pub struct LfsBatchRequest {
    pub operation: String,
    pub objects: Vec<LfsBatchObject>,
    pub transfers: Vec<String>,
    pub hash_algo: String,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<LfsBatchRef>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LfsBatchObject {
    pub oid: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct LfsBatchRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LfsBatchResponse {
    #[serde(default)]
    pub objects: Vec<LfsBatchResponseObject>,
}

#[derive(Debug, Deserialize)]
pub struct LfsBatchResponseObject {
    pub oid: String,
    pub size: u64,
    #[serde(default)]
    pub actions: Option<LfsBatchActions>,
    #[serde(default)]
    pub error: Option<LfsBatchObjectError>,
}

#[derive(Debug, Deserialize)]
pub struct LfsBatchActions {
    #[serde(default)]
    pub download: Option<LfsBatchAction>,
}

#[derive(Debug, Deserialize)]
pub struct LfsBatchAction {
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub struct LfsBatchObjectError {
    pub code: i64,
    pub message: String,
}
