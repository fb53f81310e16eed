use core::net::IpAddr;

use ipnet::IpNet;
use regex::Regex;

use crate::cidr::net_contains;
use crate::error::Result;

/// Config for the request factory
///
/// By default no proxy is trusted, input is filtered (strict mode) and runs of slashes in the
/// request path are collapsed.
///
/// # Example
/// ```
/// use trusted_request::Config;
///
/// let mut config = Config::new();
/// config.add_trusted_proxy("168.10.0.0/16").unwrap();
/// config.add_url_filter("%20$", "").unwrap();
///
/// assert!(config.is_trusted("168.10.3.4"));
/// assert!(!config.is_trusted("8.8.8.8"));
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    trusted_proxies: Vec<IpNet>,
    binary: bool,
    url_filters: Vec<(Regex, String)>,
    path_filters: Vec<(Regex, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Create a new config with no trusted proxies
    pub fn new() -> Self {
        Self {
            trusted_proxies: Vec::new(),
            binary: false,
            url_filters: Vec::new(),
            path_filters: vec![(Regex::new("/{2,}").unwrap(), "/".to_string())],
        }
    }

    /// Create a new config with local and private networks trusted
    pub fn new_local() -> Self {
        Self {
            trusted_proxies: vec![
                // IPV4 Loopback
                "127.0.0.0/8".parse().unwrap(),
                // IPV4 Private Networks
                "10.0.0.0/8".parse().unwrap(),
                "172.16.0.0/12".parse().unwrap(),
                "192.168.0.0/16".parse().unwrap(),
                // IPV6 Loopback
                "::1/128".parse().unwrap(),
                // IPV6 Private network
                "fd00::/8".parse().unwrap(),
            ],
            ..Self::new()
        }
    }

    /// Add a trusted proxy to the list of trusted proxies
    ///
    /// proxy can be an IP address or a CIDR
    pub fn add_trusted_proxy(&mut self, proxy: &str) -> Result<&mut Self> {
        let proxy = proxy.trim();

        match proxy.parse() {
            Ok(net) => self.trusted_proxies.push(net),
            Err(e) => match proxy.parse::<IpAddr>() {
                Ok(address) => self.trusted_proxies.push(IpNet::from(address)),
                _ => return Err(e.into()),
            },
        }

        Ok(self)
    }

    /// Trust every valid entry of `proxies`, malformed ones are logged and skipped
    pub fn with_proxies<I, S>(mut self, proxies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for proxy in proxies {
            let proxy = proxy.as_ref();
            if let Err(error) = self.add_trusted_proxy(proxy) {
                tracing::warn!(proxy, %error, "ignoring malformed trusted proxy");
            }
        }

        self
    }

    pub fn trusted_proxies(&self) -> &[IpNet] {
        &self.trusted_proxies
    }

    /// Check if a remote address is trusted given the list of trusted proxies
    pub fn is_ip_trusted(&self, remote_addr: &IpAddr) -> bool {
        self.trusted_proxies
            .iter()
            .any(|proxy| net_contains(proxy, remote_addr))
    }

    /// Same as [`Config::is_ip_trusted`] for a textual address, a malformed one is never trusted
    pub fn is_trusted(&self, remote_addr: &str) -> bool {
        remote_addr
            .trim()
            .parse::<IpAddr>()
            .is_ok_and(|address| self.is_ip_trusted(&address))
    }

    /// Disable input filtering, keys and values are kept as received
    pub fn set_binary(&mut self, binary: bool) -> &mut Self {
        self.binary = binary;
        self
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Rewrite the raw request target before it is split into path and query
    pub fn add_url_filter(&mut self, pattern: &str, replacement: &str) -> Result<&mut Self> {
        self.url_filters
            .push((Regex::new(pattern)?, replacement.to_string()));
        Ok(self)
    }

    /// Rewrite the unescaped request path
    pub fn add_path_filter(&mut self, pattern: &str, replacement: &str) -> Result<&mut Self> {
        self.path_filters
            .push((Regex::new(pattern)?, replacement.to_string()));
        Ok(self)
    }

    pub(crate) fn url_filters(&self) -> &[(Regex, String)] {
        &self.url_filters
    }

    pub(crate) fn path_filters(&self) -> &[(Regex, String)] {
        &self.path_filters
    }
}
