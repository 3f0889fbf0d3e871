//! Interpret raw store-call outcomes.
//!
//! The transport yields either a response body or a transport error; this
//! turns both into one `Result` over the identifier list.

use crate::error::CacheError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StoreResponse {
    responses: Option<Vec<CacheId>>,
}

#[derive(Debug, Deserialize)]
struct CacheId {
    uuid: String,
}

/// Identifiers from a store call, in request order.
///
/// Empty strings are kept: they mark entries the store rejected.
pub fn interpret(raw: Result<String, CacheError>) -> Result<Vec<String>, CacheError> {
    let body = raw?;

    let parsed: StoreResponse =
        serde_json::from_str(&body).map_err(|e| CacheError::Parse(e.to_string()))?;

    let responses = parsed.responses.ok_or_else(|| {
        CacheError::Protocol(format!("missing \"responses\" field in {}", truncate(&body)))
    })?;

    Ok(responses.into_iter().map(|r| r.uuid).collect())
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
