//! Shared JSON-over-HTTP plumbing.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{NetError, Result};

/// Default request timeout for collaborator endpoints.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client with the given request timeout.
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Join `path` onto `base`, tolerating a trailing slash on the base.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// POST `body` as JSON and decode a JSON reply.
///
/// Non-success statuses become [`NetError::Status`] carrying the body text.
pub async fn post_json<B, R>(client: &reqwest::Client, url: &str, body: &B) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client.post(url).json(body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(url, status = status.as_u16(), "collaborator returned error status");
        return Err(NetError::Status {
            endpoint: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| NetError::Decode(format!("{url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        assert_eq!(endpoint("http://tn", "sealoutput"), "http://tn/sealoutput");
        assert_eq!(endpoint("http://tn/", "/sealoutput"), "http://tn/sealoutput");
    }
}
