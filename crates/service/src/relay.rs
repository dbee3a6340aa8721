//! Streaming relay for download references.
//!
//! A download reference looks like
//!
//! ```text
//! /s3-proxy/{base64url(storage origin)}/{bucket}/{key}?{signed query}
//! ```
//!
//! so the browser only ever talks to this service. The origin is repackaged,
//! not encrypted: the relay is a transport and the presigned query string is
//! what authorizes the download upstream.

use std::collections::HashSet;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use http::header;
use url::Url;

/// Path prefix the relay is mounted under
pub const RELAY_PREFIX: &str = "/s3-proxy";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid relay path")]
    InvalidPath,
    #[error("invalid endpoint encoding")]
    InvalidEndpoint,
    #[error("endpoint {0} is not allowed")]
    OriginNotAllowed(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::InvalidPath | RelayError::InvalidEndpoint => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            RelayError::OriginNotAllowed(ref origin) => {
                tracing::warn!(origin = origin.as_str(), "relay to unlisted endpoint refused");
                (StatusCode::FORBIDDEN, "endpoint not allowed").into_response()
            }
            RelayError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, self.to_string()).into_response()
            }
            RelayError::Upstream(e) => {
                // the url carries the signature, keep it out of logs and responses
                tracing::error!(error = %e.without_url(), "relay upstream failed");
                (StatusCode::BAD_GATEWAY, "proxy error").into_response()
            }
        }
    }
}

/// Wrap a signed storage URL as a relay path on our own origin.
pub fn relay_path(signed: &Url) -> String {
    let origin = signed.origin().ascii_serialization();
    let mut path = format!(
        "{}/{}{}",
        RELAY_PREFIX,
        URL_SAFE_NO_PAD.encode(origin.as_bytes()),
        signed.path()
    );
    if let Some(query) = signed.query() {
        path.push('?');
        path.push_str(query);
    }
    path
}

/// Recover the upstream URL from a relay path and query string.
pub fn decode_target(path: &str, query: Option<&str>) -> Result<Url, RelayError> {
    let rest = path
        .strip_prefix(RELAY_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or(RelayError::InvalidPath)?;
    let (encoded, object_path) = rest.split_once('/').ok_or(RelayError::InvalidPath)?;
    if object_path.is_empty() {
        return Err(RelayError::InvalidPath);
    }

    let endpoint = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(RelayError::InvalidEndpoint)?;
    let endpoint = Url::parse(&endpoint).map_err(|_| RelayError::InvalidEndpoint)?;
    if !matches!(endpoint.scheme(), "http" | "https") || endpoint.host_str().is_none() {
        return Err(RelayError::InvalidEndpoint);
    }

    let mut target = format!(
        "{}/{}",
        endpoint.origin().ascii_serialization(),
        object_path
    );
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    Url::parse(&target).map_err(|_| RelayError::InvalidPath)
}

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Copy `headers` minus hop-by-hop headers, anything named in `Connection`,
/// and `extra`.
fn filter_headers(headers: &HeaderMap, extra: &[HeaderName]) -> HeaderMap {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP.contains(&name.as_str()) || extra.contains(name) || listed.contains(name) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// Which storage origins the relay will talk to.
#[derive(Debug, Clone, Default)]
pub struct RelayPolicy {
    allowed: Option<HashSet<String>>,
}

impl RelayPolicy {
    /// Any `http`/`https` origin.
    pub fn any() -> Self {
        Self { allowed: None }
    }

    /// Only the origins of the given endpoints.
    pub fn allow<I, S>(endpoints: I) -> Result<Self, url::ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = endpoints
            .into_iter()
            .map(|endpoint| Url::parse(endpoint.as_ref()).map(|u| u.origin().ascii_serialization()))
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self {
            allowed: Some(allowed),
        })
    }

    pub fn permits(&self, origin: &str) -> bool {
        match &self.allowed {
            Some(allowed) => allowed.contains(origin),
            None => true,
        }
    }
}

/// Forwards relay requests upstream and streams the answer back.
#[derive(Debug, Clone)]
pub struct Relay {
    client: reqwest::Client,
    policy: RelayPolicy,
}

impl Relay {
    pub fn new(policy: RelayPolicy) -> Result<Self, reqwest::Error> {
        // a redirect would be followed with our request headers to wherever it points
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, policy })
    }

    pub async fn forward(
        &self,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<Response, RelayError> {
        if method != Method::GET && method != Method::HEAD {
            return Err(RelayError::MethodNotAllowed);
        }

        let target = decode_target(uri.path(), uri.query())?;
        let origin = target.origin().ascii_serialization();
        if !self.policy.permits(&origin) {
            return Err(RelayError::OriginNotAllowed(origin));
        }

        let request_headers = filter_headers(
            headers,
            &[
                header::HOST,
                header::AUTHORIZATION,
                header::COOKIE,
                header::CONTENT_LENGTH,
            ],
        );
        let upstream = self
            .client
            .request(method, target)
            .headers(request_headers)
            .send()
            .await?;

        let status = upstream.status();
        let response_headers = filter_headers(upstream.headers(), &[]);
        tracing::debug!(%status, "relaying upstream response");

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn encode(endpoint: &str) -> String {
        URL_SAFE_NO_PAD.encode(endpoint)
    }

    #[test]
    fn test_relay_path_hides_endpoint() {
        let signed = Url::parse(
            "http://garage.internal:3900/docs/readme.txt?X-Amz-Expires=3600&X-Amz-Signature=abc",
        )
        .unwrap();
        let path = relay_path(&signed);

        assert!(path.starts_with("/s3-proxy/"));
        assert!(!path.contains("garage.internal"));
        assert!(path.ends_with("/docs/readme.txt?X-Amz-Expires=3600&X-Amz-Signature=abc"));

        let (path_only, query) = path.split_once('?').unwrap();
        assert_eq!(decode_target(path_only, Some(query)).unwrap(), signed);
    }

    #[test]
    fn test_percent_encoding_survives() {
        let signed = Url::parse("https://s3.example.com/docs/my%20file.txt?sig=a%2Fb").unwrap();
        let path = relay_path(&signed);
        let (path_only, query) = path.split_once('?').unwrap();

        let target = decode_target(path_only, Some(query)).unwrap();
        assert_eq!(target.path(), "/docs/my%20file.txt");
        assert_eq!(target.query(), Some("sig=a%2Fb"));
    }

    #[test]
    fn test_padded_endpoint_accepted() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode("http://localhost:39");
        assert!(padded.ends_with('='));
        let path = format!("/s3-proxy/{}/docs/a.txt", padded);
        let target = decode_target(&path, None).unwrap();
        assert_eq!(target.as_str(), "http://localhost:39/docs/a.txt");
    }

    #[test]
    fn test_bad_paths_rejected() {
        assert!(matches!(
            decode_target("/s3-proxy/", None),
            Err(RelayError::InvalidPath)
        ));
        let only_endpoint = format!("/s3-proxy/{}", encode("http://localhost:3900"));
        assert!(matches!(
            decode_target(&only_endpoint, None),
            Err(RelayError::InvalidPath)
        ));
        assert!(matches!(
            decode_target("/s3-proxy/!!!/docs/a.txt", None),
            Err(RelayError::InvalidEndpoint)
        ));
        let file = format!("/s3-proxy/{}/etc/passwd", encode("file:///"));
        assert!(matches!(
            decode_target(&file, None),
            Err(RelayError::InvalidEndpoint)
        ));
    }

    #[test]
    fn test_policy() {
        assert!(RelayPolicy::any().permits("http://anything:1"));

        let policy = RelayPolicy::allow(["http://garage:3900/"]).unwrap();
        assert!(policy.permits("http://garage:3900"));
        assert!(!policy.permits("http://169.254.169.254"));
    }

    #[test]
    fn test_header_filtering() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("console.example.com"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-hop"));
        headers.insert("x-hop", HeaderValue::from_static("1"));
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-99"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=abc"));

        let filtered = filter_headers(&headers, &[header::HOST, header::COOKIE]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get(header::RANGE).unwrap(), "bytes=0-99");
    }

    #[tokio::test]
    async fn test_write_methods_refused() {
        let relay = Relay::new(RelayPolicy::any()).unwrap();
        let uri: Uri = format!("/s3-proxy/{}/docs/a.txt", encode("http://localhost:3900"))
            .parse()
            .unwrap();
        for method in [Method::PUT, Method::POST, Method::DELETE] {
            assert!(matches!(
                relay.forward(method, &uri, &HeaderMap::new()).await,
                Err(RelayError::MethodNotAllowed)
            ));
        }
    }

    #[tokio::test]
    async fn test_unlisted_origin_refused() {
        let relay = Relay::new(RelayPolicy::allow(["http://garage:3900"]).unwrap()).unwrap();
        let uri: Uri = format!("/s3-proxy/{}/docs/a.txt", encode("http://evil.example"))
            .parse()
            .unwrap();
        assert!(matches!(
            relay.forward(Method::GET, &uri, &HeaderMap::new()).await,
            Err(RelayError::OriginNotAllowed(_))
        ));
    }
}
