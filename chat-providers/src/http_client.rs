use std::sync::Arc;
use std::time::Duration;

use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Request, Response, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{ProviderError, ProviderResult};

pub(crate) type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn build_https_client() -> ProviderResult<HyperClient> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));

    Ok(Client::builder().build::<_, Body>(connector))
}

/// Posts a JSON payload and returns the successful response with its body
/// unread, so callers can either buffer or stream it. Non-2xx responses are
/// buffered and converted into [`ProviderError::Response`].
pub(crate) async fn post_json<T: Serialize>(
    client: &HyperClient,
    uri: Uri,
    payload: &T,
    request_timeout: Duration,
    provider: &str,
) -> ProviderResult<Response<Body>> {
    let body = serde_json::to_vec(payload).map_err(|err| {
        ProviderError::invalid_request(format!("failed to encode {provider} request: {err}"))
    })?;

    let request = Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|err| {
            ProviderError::transport(format!("failed to build {provider} request: {err}"))
        })?;

    let response = timeout(request_timeout, client.request(request))
        .await
        .map_err(|_| ProviderError::transport(format!("{provider} request timed out")))?
        .map_err(|err| ProviderError::transport(format!("{provider} request failed: {err}")))?;

    let status = response.status();
    if !status.is_success() {
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            ProviderError::transport(format!("failed to read {provider} response: {err}"))
        })?;
        let reason = String::from_utf8_lossy(&bytes).to_string();
        return Err(ProviderError::Response {
            reason: format!("{provider} returned {status}: {reason}"),
        });
    }

    Ok(response)
}

/// Buffers and decodes a JSON response body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response<Body>,
    provider: &str,
) -> ProviderResult<T> {
    let bytes = to_bytes(response.into_body()).await.map_err(|err| {
        ProviderError::transport(format!("failed to read {provider} response: {err}"))
    })?;

    serde_json::from_slice(&bytes).map_err(|err| ProviderError::Response {
        reason: format!("failed to decode {provider} response: {err}"),
    })
}

pub(crate) fn sanitize_base_url(input: &str, provider: &str) -> ProviderResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ProviderError::configuration(format!(
            "{provider} base URL must start with http:// or https://"
        )));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>().map_err(|err| {
        ProviderError::configuration(format!("invalid {provider} base URL: {err}"))
    })?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_requires_scheme() {
        let err = sanitize_base_url("api.example.com", "test").expect_err("missing scheme");
        assert!(matches!(err, ProviderError::Configuration { .. }));
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let base = sanitize_base_url("https://example.com/api", "test").expect("valid url");
        assert_eq!(base, "https://example.com/api/");
    }
}
