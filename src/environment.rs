use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Lazy accessor of the raw request body
///
/// The callable is shared between clones and invoked on every read.
#[derive(Clone)]
pub struct RawBody(Arc<dyn Fn() -> Vec<u8> + Send + Sync>);

impl RawBody {
    pub fn new(read: impl Fn() -> Vec<u8> + Send + Sync + 'static) -> Self {
        Self(Arc::new(read))
    }

    /// A body already held in memory
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let bytes: Arc<[u8]> = Arc::from(bytes);

        Self::new(move || bytes.to_vec())
    }

    pub fn read(&self) -> Vec<u8> {
        (self.0)()
    }
}

impl fmt::Debug for RawBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawBody(..)")
    }
}

/// Raw, untrusted request data as handed over by the host server
///
/// Every field is optional. Maps hold arbitrarily nested JSON values which are validated when the
/// request is assembled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEnvironment {
    /// `on` (or any non empty value other than `off`) for a TLS connection
    pub https: Option<String>,
    pub http_host: Option<String>,
    pub server_name: Option<String>,
    pub server_port: Option<u16>,
    /// Request target, `/` when missing
    pub request_uri: Option<String>,
    pub script_name: Option<String>,
    pub request_method: Option<String>,
    /// Address of the connected peer
    pub remote_addr: Option<String>,
    pub remote_host: Option<String>,
    pub auth_user: Option<String>,
    pub auth_password: Option<String>,
    /// Raw header lines, server variables are scanned when missing
    pub headers: Option<Vec<(String, String)>>,
    pub variables: IndexMap<String, String>,
    /// Query parameters, parsed from the request target when missing
    pub query: Option<Map<String, Value>>,
    pub post: Map<String, Value>,
    pub cookies: Map<String, Value>,
    pub files: Map<String, Value>,
    #[serde(skip)]
    pub body: Option<RawBody>,
}

#[cfg(feature = "http")]
impl RawEnvironment {
    /// Fill an environment from an `http` request head
    ///
    /// The host header is only used before HTTP/2, the uri authority is used otherwise. Cookies
    /// are read from the `Cookie` header.
    ///
    /// # Example
    /// ```
    /// use trusted_request::RawEnvironment;
    ///
    /// let (parts, _) = http::Request::get("https://example.com/a?b=c")
    ///     .header("cookie", "lang=en; theme=dark")
    ///     .body(())
    ///     .unwrap()
    ///     .into_parts();
    ///
    /// let env = RawEnvironment::from_parts(&parts, Some("192.0.2.1".parse().unwrap()));
    ///
    /// assert_eq!(env.https.as_deref(), Some("on"));
    /// assert_eq!(env.http_host.as_deref(), Some("example.com"));
    /// assert_eq!(env.request_uri.as_deref(), Some("/a?b=c"));
    /// assert_eq!(env.cookies["theme"], "dark");
    /// ```
    pub fn from_parts(parts: &http::request::Parts, peer: Option<core::net::IpAddr>) -> Self {
        let host_header = parts
            .headers
            .get(http::header::HOST)
            .and_then(|value| value.to_str().ok())
            // skip host header if HTTP/2, we should use :authority instead
            .filter(|_| parts.version < http::Version::HTTP_2);
        let http_host = host_header
            .or_else(|| parts.uri.authority().map(|auth| auth.as_str()))
            .map(str::to_string);

        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        let cookies = parts
            .headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }

                Some((
                    crate::url::form_decode(name),
                    Value::String(crate::url::form_decode(value.trim())),
                ))
            })
            .collect();

        Self {
            https: (parts.uri.scheme() == Some(&http::uri::Scheme::HTTPS)).then(|| "on".to_string()),
            http_host,
            request_uri: Some(
                parts
                    .uri
                    .path_and_query()
                    .map_or("/", |target| target.as_str())
                    .to_string(),
            ),
            request_method: Some(parts.method.as_str().to_string()),
            remote_addr: peer.map(|peer| peer.to_string()),
            headers: Some(headers),
            cookies,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize() {
        let env: RawEnvironment = serde_json::from_str(
            r#"{
                "https": "on",
                "http_host": "example.com",
                "server_port": 443,
                "request_uri": "/index.php?a=1",
                "headers": [["Accept", "text/html"]],
                "post": {"name": "value", "list": [1, 2]}
            }"#,
        )
        .unwrap();

        assert_eq!(env.https.as_deref(), Some("on"));
        assert_eq!(env.server_port, Some(443));
        assert_eq!(
            env.headers,
            Some(vec![("Accept".to_string(), "text/html".to_string())])
        );
        assert_eq!(env.post.len(), 2);
        assert!(env.query.is_none());
        assert!(env.body.is_none());
    }

    #[test]
    fn raw_body_is_shared() {
        let body = RawBody::from_bytes("payload");
        let clone = body.clone();

        assert_eq!(body.read(), b"payload");
        assert_eq!(clone.read(), b"payload");
        assert_eq!(format!("{body:?}"), "RawBody(..)");
    }

    #[cfg(feature = "http")]
    #[test]
    fn from_http2_parts() {
        let (parts, _) = http::Request::get("https://authority.example/x")
            .version(http::Version::HTTP_2)
            .header("host", "spoofed.example")
            .header("x-forwarded-for", "1.1.1.1")
            .body(())
            .unwrap()
            .into_parts();

        let env = RawEnvironment::from_parts(&parts, None);

        assert_eq!(env.http_host.as_deref(), Some("authority.example"));
        assert_eq!(env.request_method.as_deref(), Some("GET"));
        assert!(env.remote_addr.is_none());
        assert!(env
            .headers
            .unwrap()
            .contains(&("x-forwarded-for".to_string(), "1.1.1.1".to_string())));
    }
}
