use std::fmt;
use std::str::FromStr;

use super::{parse_query, Components, Param, Params, UrlImmutable};
use crate::error::{Error, Result};

/// Mutable URL builder
///
/// Setters modify the url in place and can be chained. Use [`UrlImmutable`] once the url is
/// complete.
///
/// # Example
/// ```
/// use trusted_request::url::Url;
///
/// let mut url = Url::new("https://example.com/en/manual.php?lang=en").unwrap();
/// url.set_port(8443).set_query_parameter("page", Some("2".into()));
///
/// assert_eq!(url.authority(), "example.com:8443");
/// assert_eq!(url.to_string(), "https://example.com:8443/en/manual.php?lang=en&page=2");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Url {
    pub(crate) inner: Components,
}

impl Url {
    /// Parse an URI reference, fails with [`Error::MalformedUrl`]
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            inner: Components::parse(url)?,
        })
    }

    pub fn set_scheme(&mut self, scheme: &str) -> &mut Self {
        self.inner.scheme = scheme.to_ascii_lowercase();
        self
    }

    pub fn scheme(&self) -> &str {
        &self.inner.scheme
    }

    pub fn set_user(&mut self, user: impl Into<String>) -> &mut Self {
        self.inner.user = user.into();
        self
    }

    pub fn user(&self) -> &str {
        &self.inner.user
    }

    pub fn set_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.inner.password = password.into();
        self
    }

    pub fn password(&self) -> &str {
        &self.inner.password
    }

    /// Set the host, a relative path becomes absolute
    pub fn set_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.inner.set_host(host.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Host labels, see [`UrlImmutable::domain`]
    pub fn domain(&self, level: i32) -> String {
        self.inner.domain(level)
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.inner.port = Some(port);
        self
    }

    /// Explicit port, or the default port of the scheme
    pub fn port(&self) -> Option<u16> {
        self.inner.effective_port()
    }

    pub fn default_port(&self) -> Option<u16> {
        self.inner.default_port()
    }

    pub fn set_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.inner.set_path(path.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Replace the query by parsing `query`
    pub fn set_query(&mut self, query: &str) -> &mut Self {
        self.inner.query = parse_query(query);
        self
    }

    pub fn set_query_parameters(&mut self, params: Params) -> &mut Self {
        self.inner.query = params;
        self
    }

    /// Append a query string, its parameters override existing ones
    pub fn append_query(&mut self, query: &str) -> &mut Self {
        self.inner.append_query(parse_query(query));
        self
    }

    /// Merge parameters, given ones take precedence
    pub fn append_query_parameters(&mut self, params: Params) -> &mut Self {
        self.inner.append_query(params);
        self
    }

    /// Query string encoded following RFC 3986
    pub fn query(&self) -> String {
        super::build_query(&self.inner.query)
    }

    pub fn query_parameters(&self) -> &Params {
        &self.inner.query
    }

    pub fn query_parameter(&self, name: &str) -> Option<&Param> {
        self.inner.query.get(name)
    }

    /// Set a query parameter, `None` removes it
    pub fn set_query_parameter(&mut self, name: &str, value: Option<Param>) -> &mut Self {
        match value {
            Some(value) => {
                self.inner.query.insert(name.to_string(), value);
            }
            None => {
                self.inner.query.shift_remove(name);
            }
        }
        self
    }

    pub fn set_fragment(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.inner.fragment = fragment.into();
        self
    }

    pub fn fragment(&self) -> &str {
        &self.inner.fragment
    }

    /// The entire url including query string and fragment
    pub fn absolute_url(&self) -> String {
        self.inner.absolute_url(&self.inner.authority())
    }

    /// `[user[:password]@]host[:port]`
    pub fn authority(&self) -> String {
        self.inner.authority()
    }

    /// Scheme and authority
    pub fn host_url(&self) -> String {
        self.inner.host_url(&self.inner.authority())
    }

    /// Path up to and including its last `/`
    pub fn base_path(&self) -> &str {
        self.inner.base_path()
    }

    pub fn base_url(&self) -> String {
        self.host_url() + self.base_path()
    }

    /// Absolute url without its base url
    pub fn relative_url(&self) -> String {
        let absolute = self.absolute_url();
        let base = self.base_url();

        absolute.get(base.len()..).unwrap_or_default().to_string()
    }

    /// Compare with another url, see [`UrlImmutable::is_equal`]
    pub fn is_equal(&self, other: &Url) -> bool {
        self.inner.is_equal(&other.inner)
    }

    /// Compare with an url string, a malformed one is never equal
    pub fn is_equal_str(&self, other: &str) -> bool {
        Components::parse(other).is_ok_and(|other| self.inner.is_equal(&other))
    }

    /// All components as a JSON object, the query as nested parameters
    pub fn export(&self) -> serde_json::Value {
        serde_json::json!({
            "scheme": self.inner.scheme,
            "user": self.inner.user,
            "password": self.inner.password,
            "host": self.inner.host,
            "port": self.port(),
            "path": self.inner.path,
            "query": self.inner.query,
            "fragment": self.inner.fragment,
        })
    }

    /// Transform the url to its canonical form
    ///
    /// The path is unescaped (keeping `%` and `/` encoded) and re-encoded, the host is
    /// lower-cased without trailing dot and query parameters are sorted by name.
    pub fn canonicalize(&mut self) -> &mut Self {
        self.inner.canonicalize();
        self
    }
}

impl FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<UrlImmutable> for Url {
    fn from(url: UrlImmutable) -> Self {
        Self { inner: url.inner }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute_url())
    }
}
