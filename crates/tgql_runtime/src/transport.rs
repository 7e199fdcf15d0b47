//! Transport interface and the raw response shape.

use crate::operation::RequestPayload;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tgql_core::Result;
use tokio_util::sync::CancellationToken;

/// Sends a built request and returns the raw response.
///
/// Implementations abort in-flight I/O when `cancel` fires and report
/// connectivity or status failures as transport-category errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestPayload, cancel: &CancellationToken) -> Result<RawResponse>;
}

/// A response as received, before result parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    /// `None` when the key is absent; `Some(Value::Null)` when sent as null.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl RawResponse {
    /// Whether the response carries either `data` or `errors`.
    pub fn is_well_formed(&self) -> bool {
        self.data.is_some() || !self.errors.is_empty()
    }
}

/// A GraphQL error as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            locations: Vec::new(),
            extensions: None,
        }
    }
}

/// A source location inside the operation document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}
