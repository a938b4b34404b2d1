//! HTTP Parameter Pollution Middleware
//!
//! Collapses repeated query keys to their last occurrence before routing,
//! so handlers never see array-valued parameters they did not ask for.

use std::collections::HashMap;

use axum::{
    extract::Request,
    http::uri::{PathAndQuery, Uri},
    middleware::Next,
    response::Response,
};

/// Rewrite the request URI when its query string repeats a key
pub async fn parameter_pollution(mut request: Request, next: Next) -> Response {
    if let Some((query, polluted)) = request.uri().query().and_then(dedupe_query) {
        tracing::debug!(?polluted, "Collapsed duplicated query parameters");
        if let Some(uri) = with_query(request.uri(), &query) {
            *request.uri_mut() = uri;
        }
    }
    next.run(request).await
}

fn key_of(segment: &str) -> &str {
    segment.split_once('=').map_or(segment, |(key, _)| key)
}

/// Keep the last occurrence of every key, in order.
///
/// Returns `None` when no key repeats; otherwise the rebuilt query and the
/// sorted list of repeated keys.
pub fn dedupe_query(query: &str) -> Option<(String, Vec<String>)> {
    let segments: Vec<&str> = query.split('&').filter(|s| !s.is_empty()).collect();

    let mut last: HashMap<&str, usize> = HashMap::new();
    for (index, segment) in segments.iter().enumerate() {
        last.insert(key_of(segment), index);
    }
    if last.len() == segments.len() {
        return None;
    }

    let mut polluted = Vec::new();
    let mut kept = Vec::with_capacity(last.len());
    for (index, segment) in segments.iter().enumerate() {
        let key = key_of(segment);
        if last.get(key) == Some(&index) {
            kept.push(*segment);
        } else {
            polluted.push(key.to_owned());
        }
    }
    polluted.sort();
    polluted.dedup();

    Some((kept.join("&"), polluted))
}

fn with_query(uri: &Uri, query: &str) -> Option<Uri> {
    let path_and_query = if query.is_empty() {
        PathAndQuery::try_from(uri.path()).ok()?
    } else {
        PathAndQuery::try_from(format!("{}?{}", uri.path(), query)).ok()?
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).ok()
}
