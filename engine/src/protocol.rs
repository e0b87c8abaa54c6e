//! Message bodies of the document service API.
//!
//! All bodies are JSON with camelCase field names.

use crate::{Document, Sequence};
use serde::{Deserialize, Serialize};

/// Body of `PUT /{database}/documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutDocuments {
    /// Documents to upsert; tombstones delete
    pub documents: Vec<Document>,
}

/// Response to `PUT /{database}/documents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutResult {
    /// Number of documents written
    pub accepted: usize,
    /// Sequence of the last written document
    pub last_seq: Sequence,
}

/// Response to `GET /{database}/changes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    /// Changed documents (tombstones included), ordered by sequence
    pub documents: Vec<Document>,
    /// Sequence to pass as `since` on the next request
    pub last_seq: Sequence,
    /// Whether more changes are waiting
    pub has_more: bool,
}
