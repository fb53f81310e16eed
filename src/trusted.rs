use std::net::IpAddr;

use crate::extract::ProxyHeaders;
use crate::url::{default_port, split_host_port, Url};
use crate::Config;

/// Client information once forwarding headers of trusted proxies are applied
///
/// Scheme, host and port are only set when a trusted header rewrote them, the remote address and
/// host start from the peer values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trusted {
    remote_address: Option<String>,
    remote_host: Option<String>,
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

/// Trim whitespace then any quote marks.
fn unquote(val: &str) -> &str {
    val.trim().trim_start_matches('"').trim_end_matches('"')
}

/// Remove port and IPv6 square brackets from a peer specification.
fn bare_address(val: &str) -> &str {
    if val.starts_with('[') {
        val.split("]:")
            .next()
            .map(|s| s.trim_start_matches('[').trim_end_matches(']'))
            // this indicates that the IPv6 address is malformed so shouldn't
            // usually happen, but if it does, just return the original input
            .unwrap_or(val)
    } else if val.matches(':').count() > 1 {
        // bare IPv6 without port
        val
    } else {
        val.split(':').next().unwrap_or(val)
    }
}

fn scheme_of(proto: &str) -> &'static str {
    if proto.trim().eq_ignore_ascii_case("https") {
        "https"
    } else {
        "http"
    }
}

#[derive(Default)]
struct ForwardedParams<'a> {
    r#for: Vec<&'a str>,
    host: Vec<&'a str>,
    proto: Vec<&'a str>,
}

impl Trusted {
    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    pub fn remote_host(&self) -> Option<&str> {
        self.remote_host.as_deref()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Evaluate forwarding headers sent by the peer
    ///
    /// Headers are only read when `peer` is inside the configured trust list. The `Forwarded`
    /// header takes precedence, `X-Forwarded-*` headers are used when it is absent.
    pub fn from<T: ProxyHeaders>(
        peer: Option<&str>,
        peer_host: Option<&str>,
        headers: &T,
        config: &Config,
    ) -> Self {
        let mut trusted = Self {
            remote_address: peer.map(str::to_string),
            remote_host: peer_host.map(str::to_string),
            ..Self::default()
        };

        let Some(peer) = peer.filter(|peer| config.is_trusted(peer)) else {
            // if the peer address is not trusted, we can't trust the headers
            tracing::debug!(peer, "peer is not a trusted proxy, ignoring forwarding headers");
            return trusted;
        };

        let has_forwarded = headers.forwarded().any(|value| !value.trim().is_empty());
        let client = if has_forwarded {
            trusted.use_forwarded(headers, config)
        } else {
            trusted.use_x_forwarded(headers, config)
        };

        if let Some(client) = client {
            tracing::debug!(peer, client = %client, "client address rewritten by trusted proxy");
            trusted.remote_address = Some(client.to_string());
            // the peer host belongs to the proxy
            trusted.remote_host = None;
        }

        trusted
    }

    fn use_forwarded<T: ProxyHeaders>(&mut self, headers: &T, config: &Config) -> Option<IpAddr> {
        let mut params = ForwardedParams::default();

        // "for=1.2.3.4, for=5.6.7.8; proto=https" => ["for=1.2.3.4", "for=5.6.7.8", "proto=https"]
        for item in headers.forwarded().flat_map(|vals| vals.split([',', ';'])) {
            let (key, value) = item.split_once('=').unwrap_or((item, ""));

            match key.trim().to_lowercase().as_str() {
                "for" => params.r#for.push(unquote(value)),
                "host" => params.host.push(unquote(value)),
                "proto" => params.proto.push(unquote(value)),
                _ => {}
            }
        }

        if let [proto] = params.proto.as_slice() {
            let scheme = scheme_of(proto);
            self.scheme = Some(scheme.to_string());
            self.port = default_port(scheme);
        }

        // a repeated parameter can't be attributed to a single proxy hop
        if let [host] = params.host.as_slice() {
            match split_host_port(host) {
                Some((name, port)) => {
                    self.host = Some(name.to_ascii_lowercase());
                    if let Some(port) = port.and_then(|port| port.parse().ok()) {
                        self.port = Some(port);
                    }
                }
                None => tracing::debug!(host, "ignoring malformed forwarded host"),
            }
        }

        // quote from RFC 7239:
        // A proxy server that wants to add a new "Forwarded" header field value
        //    can either append it to the last existing "Forwarded" header field
        //    after a comma separator or add a new field at the end of the header
        //    block.
        // --- https://datatracker.ietf.org/doc/html/rfc7239#section-4
        // so we get the values in reverse order as we want to get the first untrusted value
        for value in params.r#for.into_iter().rev() {
            match bare_address(value).parse::<IpAddr>() {
                Ok(ip) if config.is_ip_trusted(&ip) => continue,
                Ok(ip) => return Some(ip),
                // obfuscated or unknown identifiers
                Err(_) => return None,
            }
        }

        None
    }

    fn use_x_forwarded<T: ProxyHeaders>(&mut self, headers: &T, config: &Config) -> Option<IpAddr> {
        if let Some(proto) = headers
            .x_forwarded_proto()
            .flat_map(|vals| vals.split(','))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .next_back()
        {
            let scheme = scheme_of(proto);
            self.scheme = Some(scheme.to_string());
            self.port = default_port(scheme);
        }

        if let Some(port) = headers
            .x_forwarded_port()
            .flat_map(|vals| vals.split(','))
            .map(|s| s.trim())
            .next_back()
            .and_then(|port| port.parse::<u16>().ok())
        {
            self.port = Some(port);
        }

        let forwarded_for = headers
            .x_forwarded_for()
            .flat_map(|vals| vals.split(','))
            .map(|s| s.trim())
            .collect::<Vec<_>>();

        let mut client = None;
        for (index, value) in forwarded_for.iter().enumerate().rev() {
            if let Ok(ip) = bare_address(value).parse::<IpAddr>() {
                if config.is_ip_trusted(&ip) {
                    continue;
                }

                client = Some((index, ip));
            }

            break;
        }

        let (index, ip) = client?;

        if let Some(host) = headers
            .x_forwarded_host()
            .flat_map(|vals| vals.split(','))
            .nth(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
        {
            match split_host_port(host) {
                Some((name, port)) => {
                    self.host = Some(name.to_ascii_lowercase());
                    if let Some(port) = port.and_then(|port| port.parse().ok()) {
                        self.port = Some(port);
                    }
                }
                None => tracing::debug!(host, "ignoring malformed forwarded host"),
            }
        }

        Some(ip)
    }

    /// Write the rewritten scheme, host and port into `url`
    pub fn apply(&self, url: &mut Url) {
        if let Some(scheme) = &self.scheme {
            url.set_scheme(scheme);
        }
        if let Some(host) = &self.host {
            url.set_host(host.as_str());
        }
        if let Some(port) = self.port {
            url.set_port(port);
        }
    }
}
