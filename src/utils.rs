use axum::http::StatusCode;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::env;
use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::{error::Elapsed, timeout};
use url::Url;

// Bare domain with optional scheme, port and path, e.g. `example.com:8080/docs`.
static DOMAIN_LIKE_URL: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r"^(https?://)?([A-Za-z0-9-]+\.)+[A-Za-z]{2,}(:\d+)?(/\S*)?$")
});

pub fn internal_error<E>(err: E) -> (StatusCode, String)
where
    E: Error,
{
    tracing::error!("{}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub async fn with_timeout<F: Future>(
    duration_in_mills: u64,
    task: F,
) -> Result<<F as Future>::Output, Elapsed> {
    timeout(Duration::from_millis(duration_in_mills), task).await
}

pub fn get_env(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("Environment variable {} is required", name))
}

pub fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Accepts anything with both a scheme and a host, and falls back to
/// scheme-less domains such as `example.com` or `example.com:8080/path`.
pub fn is_valid_url(candidate: &str) -> bool {
    // `url` repairs `http:example.com` into a full url; require the `://` as written.
    let has_host = Url::parse(candidate)
        .map(|url| {
            url.host_str().is_some_and(|host| !host.is_empty())
                && candidate
                    .split_once("://")
                    .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case(url.scheme()))
        })
        .unwrap_or(false);
    if has_host {
        return true;
    }
    match DOMAIN_LIKE_URL.as_ref() {
        Ok(pattern) => pattern.is_match(candidate),
        Err(err) => {
            tracing::error!("Url pattern failed to compile: {}", err);
            false
        }
    }
}

/// Trims and lowercases each comma separated tag, dropping blanks and
/// repeats. Returns `None` when nothing is left.
pub fn normalize_tags(raw: &str) -> Option<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(|tag| tag.trim().to_lowercase()) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.is_empty() {
        None
    } else {
        Some(tags.join(","))
    }
}

pub fn normalize_tag_filter(raw: &str) -> Option<String> {
    let tag = raw.trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

/// Pool size from configuration; zero or garbage is `None`.
pub fn parse_max_connections(raw: &str) -> Option<u32> {
    raw.trim().parse().ok().filter(|connections| *connections > 0)
}

pub fn generate_id() -> String {
    let random_id: u64 = rand::thread_rng().gen();
    BASE64_URL_SAFE_NO_PAD.encode(random_id.to_be_bytes())
}
