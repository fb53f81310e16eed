use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::environment::RawBody;
use crate::files::{FileNode, FileTree};
use crate::headers::Headers;
use crate::url::{Param, Params, UrlImmutable, UrlScript};

/// Cookie set with `SameSite=Strict` by the application, only sent back on same-site navigation
pub const STRICT_COOKIE_NAME: &str = "_nss";

/// Reverse DNS resolution of the client address
///
/// Any `Fn(&str) -> Option<String>` closure is a resolver.
pub trait ReverseLookup {
    fn reverse_lookup(&self, address: &str) -> Option<String>;
}

impl<F> ReverseLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn reverse_lookup(&self, address: &str) -> Option<String> {
        self(address)
    }
}

/// Immutable snapshot of an HTTP request
///
/// Built by [`crate::RequestFactory`], every value is sanitized and the client information only
/// comes from trusted proxies.
#[derive(Debug, Clone)]
pub struct Request {
    url: UrlScript,
    post: Params,
    files: FileTree,
    cookies: Params,
    headers: Headers,
    method: String,
    remote_address: Option<String>,
    remote_host: Option<String>,
    raw_body: Option<RawBody>,
}

impl Request {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        url: UrlScript,
        post: Params,
        files: FileTree,
        cookies: Params,
        headers: Headers,
        method: impl Into<String>,
        remote_address: Option<String>,
        remote_host: Option<String>,
        raw_body: Option<RawBody>,
    ) -> Self {
        Self {
            url,
            post,
            files,
            cookies,
            headers,
            method: method.into(),
            remote_address,
            remote_host,
            raw_body,
        }
    }

    /// Copy of the request with another url
    pub fn with_url(&self, url: UrlScript) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }

    pub fn url(&self) -> &UrlScript {
        &self.url
    }

    /// Query parameters
    pub fn query(&self) -> &Params {
        self.url.query_parameters()
    }

    pub fn query_param(&self, key: &str) -> Option<&Param> {
        self.url.query_parameter(key)
    }

    /// Post parameters
    pub fn post(&self) -> &Params {
        &self.post
    }

    pub fn post_param(&self, key: &str) -> Option<&Param> {
        self.post.get(key)
    }

    /// Uploaded file or tree of files at `path`, `["docs", "0"]` stands for `docs[0]`
    pub fn file(&self, path: &[&str]) -> Option<&FileNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.files.get(*first)?;

        for key in rest {
            node = node.as_tree()?.get(*key)?;
        }

        Some(node)
    }

    pub fn files(&self) -> &FileTree {
        &self.files
    }

    pub fn cookie(&self, key: &str) -> Option<&Param> {
        self.cookies.get(key)
    }

    pub fn cookies(&self) -> &Params {
        &self.cookies
    }

    /// Whether the request comes from the same site, see [`STRICT_COOKIE_NAME`]
    pub fn is_same_site(&self) -> bool {
        self.cookies.contains_key(STRICT_COOKIE_NAME)
    }

    /// Request method, as sent by the client
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Case-insensitive method check
    pub fn is_method(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Parsed `Referer` header, `None` when missing or malformed
    pub fn referer(&self) -> Option<UrlImmutable> {
        self.header("referer")
            .and_then(|referer| UrlImmutable::new(referer).ok())
    }

    pub fn is_secured(&self) -> bool {
        self.url.scheme() == "https"
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    /// Remote host as given by the server, never resolved here
    pub fn remote_host(&self) -> Option<&str> {
        self.remote_host.as_deref()
    }

    /// Remote host, resolved from the remote address when unknown
    pub fn resolve_remote_host(&self, resolver: &impl ReverseLookup) -> Option<String> {
        match (&self.remote_host, &self.remote_address) {
            (Some(host), _) => Some(host.clone()),
            (None, Some(address)) => resolver.reverse_lookup(address),
            (None, None) => None,
        }
    }

    /// Raw body, read on every call
    pub fn raw_body(&self) -> Option<Vec<u8>> {
        self.raw_body.as_ref().map(RawBody::read)
    }

    /// User and password of a `Basic` authorization header
    pub fn basic_credentials(&self) -> Option<(String, String)> {
        let (scheme, token) = self.header("authorization")?.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic")
            || token.is_empty()
            || token.contains(char::is_whitespace)
        {
            return None;
        }

        let decoded = String::from_utf8(STANDARD.decode(token).ok()?).ok()?;
        let (user, password) = decoded.split_once(':')?;

        Some((user.to_string(), password.to_string()))
    }

    /// Language of `supported` preferred by the client through `Accept-Language`
    ///
    /// A supported tag matches an accepted language equal to it or one of its subtags, `en`
    /// matches `en-us`. More specific supported tags are tried first.
    ///
    /// # Example
    /// ```
    /// # use trusted_request::{Config, RawEnvironment, RequestFactory};
    /// let env = RawEnvironment {
    ///     headers: Some(vec![("Accept-Language".into(), "cs, en-US;q=0.8, en;q=0.7".into())]),
    ///     ..Default::default()
    /// };
    /// let request = RequestFactory::new(Config::new()).create_request(env).unwrap();
    ///
    /// assert_eq!(request.detect_language(&["en", "de"]), Some("en"));
    /// assert_eq!(request.detect_language(&["cs", "en"]), Some("cs"));
    /// assert_eq!(request.detect_language(&["fr"]), None);
    /// ```
    pub fn detect_language<'a>(&self, supported: &[&'a str]) -> Option<&'a str> {
        let header = self
            .header("accept-language")?
            .to_lowercase()
            .replace('_', "-");

        let mut supported = supported
            .iter()
            .map(|lang| (lang.to_lowercase(), *lang))
            .collect::<Vec<_>>();
        supported.sort_by(|a, b| b.0.cmp(&a.0));

        let mut best = None;
        let mut max = 0.0_f32;

        for item in header.split(',') {
            let mut parts = item.split(';');
            let tag = parts.next().unwrap_or_default().trim();
            let quality = parts
                .find_map(|param| param.trim().strip_prefix("q="))
                .map_or(Some(1.0), |q| q.trim().parse::<f32>().ok())
                .unwrap_or(0.0);

            let matched = supported.iter().find(|(lang, _)| {
                tag == lang.as_str()
                    || tag
                        .strip_prefix(lang.as_str())
                        .is_some_and(|rest| rest.starts_with('-'))
            });

            if let Some((_, original)) = matched {
                if quality > max {
                    max = quality;
                    best = Some(*original);
                }
            }
        }

        best
    }
}
