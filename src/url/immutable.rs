use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::{parse_query, Components, Param, Params, Url};
use crate::error::{Error, Result};

/// Immutable URL
///
/// Every `with_*` method returns a modified copy. The authority is computed once per value.
///
/// # Example
/// ```
/// use trusted_request::url::UrlImmutable;
///
/// let base = UrlImmutable::new("http://a/b/c/").unwrap();
///
/// assert_eq!(base.resolve("../d").unwrap().to_string(), "http://a/b/d");
/// assert_eq!(base.with_port(8080).authority(), "a:8080");
/// assert_eq!(base.authority(), "a");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UrlImmutable {
    pub(crate) inner: Components,
    authority: String,
}

impl UrlImmutable {
    /// Parse an URI reference, fails with [`Error::MalformedUrl`]
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self::from_components(Components::parse(url)?))
    }

    pub(crate) fn from_components(inner: Components) -> Self {
        let authority = inner.authority();

        Self { inner, authority }
    }

    fn map_authority(&self, update: impl FnOnce(&mut Components)) -> Self {
        let mut inner = self.inner.clone();
        update(&mut inner);

        Self::from_components(inner)
    }

    fn map(&self, update: impl FnOnce(&mut Components)) -> Self {
        let mut dolly = self.clone();
        update(&mut dolly.inner);

        dolly
    }

    pub fn with_scheme(&self, scheme: &str) -> Self {
        self.map_authority(|inner| inner.scheme = scheme.to_ascii_lowercase())
    }

    pub fn scheme(&self) -> &str {
        &self.inner.scheme
    }

    pub fn with_user(&self, user: &str) -> Self {
        self.map_authority(|inner| inner.user = user.to_string())
    }

    pub fn user(&self) -> &str {
        &self.inner.user
    }

    pub fn with_password(&self, password: &str) -> Self {
        self.map_authority(|inner| inner.password = password.to_string())
    }

    pub fn password(&self) -> &str {
        &self.inner.password
    }

    pub fn without_user_info(&self) -> Self {
        self.map_authority(|inner| {
            inner.user.clear();
            inner.password.clear();
        })
    }

    /// Change the host, a relative path becomes absolute
    pub fn with_host(&self, host: &str) -> Self {
        self.map_authority(|inner| inner.set_host(host.to_string()))
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Last `level` labels of the host name
    ///
    /// A negative level drops the last `-level` labels instead. IPv4 hosts are returned whole.
    pub fn domain(&self, level: i32) -> String {
        self.inner.domain(level)
    }

    pub fn with_port(&self, port: u16) -> Self {
        self.map_authority(|inner| inner.port = Some(port))
    }

    /// Explicit port, or the default port of the scheme
    pub fn port(&self) -> Option<u16> {
        self.inner.effective_port()
    }

    pub fn default_port(&self) -> Option<u16> {
        self.inner.default_port()
    }

    pub fn with_path(&self, path: &str) -> Self {
        self.map(|inner| inner.set_path(path.to_string()))
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn with_query(&self, query: &str) -> Self {
        self.map(|inner| inner.query = parse_query(query))
    }

    pub fn with_query_parameters(&self, params: Params) -> Self {
        self.map(|inner| inner.query = params)
    }

    /// Copy with a query parameter set, `None` removes it
    pub fn with_query_parameter(&self, name: &str, value: Option<Param>) -> Self {
        self.map(|inner| match value {
            Some(value) => {
                inner.query.insert(name.to_string(), value);
            }
            None => {
                inner.query.shift_remove(name);
            }
        })
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

    pub fn with_fragment(&self, fragment: &str) -> Self {
        self.map(|inner| inner.fragment = fragment.to_string())
    }

    pub fn fragment(&self) -> &str {
        &self.inner.fragment
    }

    /// The entire url including query string and fragment
    pub fn absolute_url(&self) -> String {
        self.inner.absolute_url(&self.authority)
    }

    /// `[user[:password]@]host[:port]`, the port is omitted when it is the scheme default
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Scheme and authority
    pub fn host_url(&self) -> String {
        self.inner.host_url(&self.authority)
    }

    /// Compare with another url
    ///
    /// Hosts are compared case-insensitively without trailing dot (IDN aware), ports after
    /// default port substitution, paths after unescaping and query parameters regardless of
    /// their order.
    pub fn is_equal(&self, other: &UrlImmutable) -> bool {
        self.inner.is_equal(&other.inner)
    }

    /// Compare with an url string, a malformed one is never equal
    pub fn is_equal_str(&self, other: &str) -> bool {
        Components::parse(other).is_ok_and(|other| self.inner.is_equal(&other))
    }

    /// Resolve a reference the same way a browser does
    ///
    /// A relative path is resolved against this url's path, an absolute one against the host
    /// root.
    pub fn resolve(&self, reference: &str) -> Result<Self> {
        let reference = Components::parse(reference)?;

        Ok(Self::from_components(self.inner.resolve(reference)))
    }
}

impl FromStr for UrlImmutable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<Url> for UrlImmutable {
    fn from(url: Url) -> Self {
        Self::from_components(url.inner)
    }
}

impl fmt::Display for UrlImmutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute_url())
    }
}

impl Serialize for UrlImmutable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.absolute_url())
    }
}
