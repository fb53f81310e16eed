use std::fmt;
use std::ops::Deref;

use serde::{Serialize, Serializer};

use super::{Param, Params, UrlImmutable};
use crate::error::{Error, Result};

/// Immutable URL aware of the application entry point
///
/// ```text
///      base url    base path  relative path  relative url
///         |          |        |               |
/// /---------------/-----\/--------\-----------------------------\
/// http://nette.org/admin/script.php/pathinfo/?name=param#fragment
///                 \_______________/\________/
///                        |              |
///                   script path      path info
/// ```
///
/// Every accessor of [`UrlImmutable`] is available through `Deref`.
#[derive(Debug, Clone)]
pub struct UrlScript {
    url: UrlImmutable,
    script_path: String,
    base_path: String,
}

impl UrlScript {
    /// Wrap an url, an empty `script_path` means the whole path
    ///
    /// Fails with [`Error::ScriptPathMismatch`] when the script path up to its last `/` is not a
    /// prefix of the url path.
    ///
    /// # Example
    /// ```
    /// use trusted_request::url::{UrlImmutable, UrlScript};
    ///
    /// let url = UrlImmutable::new("http://nette.org/admin/script.php/pathinfo/?name=param").unwrap();
    /// let url = UrlScript::new(url, "/admin/script.php").unwrap();
    ///
    /// assert_eq!(url.base_path(), "/admin/");
    /// assert_eq!(url.path_info(), "/pathinfo/");
    /// assert_eq!(url.base_url(), "http://nette.org/admin/");
    /// assert_eq!(url.relative_url(), "script.php/pathinfo/?name=param");
    /// ```
    pub fn new(url: UrlImmutable, script_path: &str) -> Result<Self> {
        let script_path = if script_path.is_empty() {
            url.path().to_string()
        } else {
            script_path.to_string()
        };

        let base_path = match script_path.rfind('/') {
            Some(pos) => script_path[..=pos].to_string(),
            None => String::new(),
        };

        if !url.path().starts_with(&base_path) {
            return Err(Error::ScriptPathMismatch {
                script_path,
                path: url.path().to_string(),
            });
        }

        Ok(Self {
            url,
            script_path,
            base_path,
        })
    }

    /// Parse an url string with the whole path as script path
    pub fn parse(url: &str) -> Result<Self> {
        Self::new(UrlImmutable::new(url)?, "")
    }

    /// The underlying url without script information
    pub fn url(&self) -> &UrlImmutable {
        &self.url
    }

    pub fn script_path(&self) -> &str {
        &self.script_path
    }

    /// Script path up to and including its last `/`
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Path after the base path
    pub fn relative_path(&self) -> &str {
        self.path().get(self.base_path.len()..).unwrap_or_default()
    }

    pub fn base_url(&self) -> String {
        self.host_url() + &self.base_path
    }

    /// Absolute url without its base url
    pub fn relative_url(&self) -> String {
        let absolute = self.absolute_url();

        absolute
            .get(self.base_url().len()..)
            .unwrap_or_default()
            .to_string()
    }

    /// Path after the script path
    pub fn path_info(&self) -> &str {
        self.path().get(self.script_path.len()..).unwrap_or_default()
    }

    fn rebuild(&self, url: UrlImmutable) -> Self {
        Self {
            url,
            script_path: self.script_path.clone(),
            base_path: self.base_path.clone(),
        }
    }

    pub fn with_scheme(&self, scheme: &str) -> Self {
        self.rebuild(self.url.with_scheme(scheme))
    }

    pub fn with_user(&self, user: &str) -> Self {
        self.rebuild(self.url.with_user(user))
    }

    pub fn with_password(&self, password: &str) -> Self {
        self.rebuild(self.url.with_password(password))
    }

    pub fn with_port(&self, port: u16) -> Self {
        self.rebuild(self.url.with_port(port))
    }

    pub fn with_query(&self, query: &str) -> Self {
        self.rebuild(self.url.with_query(query))
    }

    pub fn with_query_parameters(&self, params: Params) -> Self {
        self.rebuild(self.url.with_query_parameters(params))
    }

    pub fn with_query_parameter(&self, name: &str, value: Option<Param>) -> Self {
        self.rebuild(self.url.with_query_parameter(name, value))
    }

    pub fn with_fragment(&self, fragment: &str) -> Self {
        self.rebuild(self.url.with_fragment(fragment))
    }

    /// Change the host, the script path must still match the normalized path
    pub fn with_host(&self, host: &str) -> Result<Self> {
        Self::new(self.url.with_host(host), &self.script_path)
    }

    /// Change the path and the script path (empty for the whole path)
    pub fn with_path(&self, path: &str, script_path: &str) -> Result<Self> {
        Self::new(self.url.with_path(path), script_path)
    }
}

impl Deref for UrlScript {
    type Target = UrlImmutable;

    fn deref(&self) -> &UrlImmutable {
        &self.url
    }
}

impl From<UrlScript> for UrlImmutable {
    fn from(url: UrlScript) -> Self {
        url.url
    }
}

impl fmt::Display for UrlScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

impl Serialize for UrlScript {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.url.serialize(serializer)
    }
}
