use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::environment::RawEnvironment;
use crate::error::Result;
use crate::headers::Headers;
use crate::request::Request;
use crate::sanitizer::Sanitizer;
use crate::trusted::Trusted;
use crate::url::{parse_query, unescape, Url, UrlImmutable, UrlScript};
use crate::Config;

static HOST: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^([a-z0-9_.-]+|\[[a-f0-9:]+\])(:\d+)?$")
        .case_insensitive(true)
        .build()
        .expect("Invalid host regex")
});

/// Assemble trusted [`Request`]s from raw environments
///
/// # Example
/// ```
/// use trusted_request::{Config, RawEnvironment, RequestFactory};
///
/// let mut config = Config::new();
/// config.add_trusted_proxy("10.0.0.0/8").unwrap();
///
/// let env = RawEnvironment {
///     http_host: Some("example.com".into()),
///     request_uri: Some("/app/index.php/page?id=3".into()),
///     script_name: Some("/app/index.php".into()),
///     remote_addr: Some("10.0.0.1".into()),
///     headers: Some(vec![
///         ("X-Forwarded-For".into(), "203.0.113.9, 10.0.0.1".into()),
///         ("X-Forwarded-Proto".into(), "https".into()),
///     ]),
///     ..Default::default()
/// };
///
/// let request = RequestFactory::new(config).create_request(env).unwrap();
///
/// assert_eq!(request.url().to_string(), "https://example.com/app/index.php/page?id=3");
/// assert_eq!(request.url().base_path(), "/app/");
/// assert_eq!(request.remote_address(), Some("203.0.113.9"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestFactory {
    config: Config,
}

impl RequestFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a request from raw data
    ///
    /// Fails with [`crate::Error::InvalidInputType`] when an input map holds a `null` outside of
    /// binary mode.
    pub fn create_request(&self, env: RawEnvironment) -> Result<Request> {
        let sanitizer = Sanitizer::new(self.config.is_binary());
        let mut url = Url::default();

        let secured = env
            .https
            .as_deref()
            .is_some_and(|https| !https.is_empty() && !https.eq_ignore_ascii_case("off"));
        url.set_scheme(if secured { "https" } else { "http" });
        url.set_user(env.auth_user.unwrap_or_default());
        url.set_password(env.auth_password.unwrap_or_default());

        let host = env.http_host.as_deref().or(env.server_name.as_deref());
        self.set_authority(&mut url, host, env.server_port);

        let target = env.request_uri.as_deref().unwrap_or("/");
        let target = self
            .config
            .url_filters()
            .iter()
            .fold(Cow::Borrowed(target), |target, (pattern, replacement)| {
                Cow::Owned(pattern.replace_all(&target, replacement.as_str()).into_owned())
            });
        let (path, query) = target.split_once('?').unwrap_or((target.as_ref(), ""));

        let path = self
            .config
            .path_filters()
            .iter()
            .fold(unescape(path, "%/?#"), |path, (pattern, replacement)| {
                pattern.replace_all(&path, replacement.as_str()).into_owned()
            });
        url.set_path(path);

        let query = match env.query {
            Some(query) => sanitizer.input("query", query)?,
            None => sanitizer.params(parse_query(query)),
        };
        url.set_query_parameters(query);

        let post = sanitizer.input("post", env.post)?;
        let cookies = sanitizer.input("cookies", env.cookies)?;
        let files = sanitizer.files(env.files);

        let headers = match env.headers {
            Some(lines) => Headers::from_pairs(lines),
            None => Headers::from_variables(&env.variables),
        };

        let remote_address = env.remote_addr.filter(|address| !address.is_empty());
        let remote_host = env.remote_host.filter(|host| !host.is_empty());
        let trusted = Trusted::from(
            remote_address.as_deref(),
            remote_host.as_deref(),
            &headers,
            &self.config,
        );
        trusted.apply(&mut url);

        let script_name = env.script_name.as_deref().unwrap_or_default();
        let script_path = detect_script_path(url.path(), script_name);
        let url = UrlScript::new(UrlImmutable::from(url), &script_path)?;

        let mut method = env.request_method.unwrap_or_else(|| "GET".to_string());
        if method == "POST" {
            if let Some(overridden) = headers
                .get("x-http-method-override")
                .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_uppercase()))
            {
                tracing::debug!(method = overridden, "method overridden");
                method = overridden.to_string();
            }
        }

        Ok(Request::new(
            url,
            post,
            files,
            cookies,
            headers,
            method,
            trusted.remote_address().map(str::to_string),
            trusted.remote_host().map(str::to_string),
            env.body,
        ))
    }

    fn set_authority(&self, url: &mut Url, host: Option<&str>, server_port: Option<u16>) {
        let Some(host) = host else {
            return;
        };
        let Some(captures) = HOST.captures(host) else {
            tracing::debug!(host, "ignoring malformed host");
            return;
        };

        let name = captures.get(1).map_or("", |name| name.as_str());
        url.set_host(name.to_ascii_lowercase().trim_end_matches('.'));

        let port = match captures.get(2) {
            Some(port) => port.as_str()[1..].parse().ok(),
            None => server_port,
        };
        if let Some(port) = port {
            url.set_port(port);
        }
    }
}

/// Longest directory shared by the path and the declared script name
fn detect_script_path(path: &str, script_name: &str) -> String {
    if path.eq_ignore_ascii_case(script_name) {
        return path.to_string();
    }

    let shared = path
        .bytes()
        .zip(script_name.bytes())
        .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
        .count();

    if shared == 0 {
        return if path.starts_with('/') { "/" } else { "" }.to_string();
    }

    match path.as_bytes()[..shared].iter().rposition(|b| *b == b'/') {
        Some(slash) => path[..=slash].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::url::Param;
    use serde_json::json;

    fn env() -> RawEnvironment {
        RawEnvironment {
            http_host: Some("example.com".into()),
            request_uri: Some("/".into()),
            remote_addr: Some("203.0.113.5".into()),
            ..Default::default()
        }
    }

    fn create(env: RawEnvironment) -> Request {
        RequestFactory::default().create_request(env).unwrap()
    }

    #[test]
    fn empty_environment() {
        let request = create(RawEnvironment::default());

        assert_eq!(request.method(), "GET");
        assert_eq!(request.url().scheme(), "http");
        assert_eq!(request.url().host(), "");
        assert_eq!(request.url().path(), "/");
        assert_eq!(request.remote_address(), None);
    }

    #[test]
    fn scheme_from_https_flag() {
        for (flag, scheme) in [("on", "https"), ("1", "https"), ("OFF", "http"), ("", "http")] {
            let request = create(RawEnvironment {
                https: Some(flag.into()),
                ..env()
            });
            assert_eq!(request.url().scheme(), scheme, "https={flag}");
        }
    }

    #[test]
    fn host_and_port() {
        let request = create(RawEnvironment {
            http_host: Some("Example.COM.:8080".into()),
            server_port: Some(9000),
            ..env()
        });
        assert_eq!(request.url().host(), "example.com");
        assert_eq!(request.url().port(), Some(8080));

        let request = create(RawEnvironment {
            http_host: None,
            server_name: Some("server.example".into()),
            server_port: Some(9000),
            ..env()
        });
        assert_eq!(request.url().authority(), "server.example:9000");

        let request = create(RawEnvironment {
            http_host: Some("[2001:DB8::1]:81".into()),
            ..env()
        });
        assert_eq!(request.url().host(), "[2001:db8::1]");
        assert_eq!(request.url().port(), Some(81));

        let request = create(RawEnvironment {
            http_host: Some("evil.com/path".into()),
            server_name: Some("ignored.example".into()),
            ..env()
        });
        assert_eq!(request.url().host(), "");
    }

    #[test]
    fn credentials() {
        let request = create(RawEnvironment {
            auth_user: Some("user".into()),
            auth_password: Some("secret".into()),
            ..env()
        });

        assert_eq!(request.url().user(), "user");
        assert_eq!(request.url().password(), "secret");
    }

    #[test]
    fn path_and_query() {
        let request = create(RawEnvironment {
            request_uri: Some("//a%20b%2F//c?x=1&arr[]=2&bad%01=3".into()),
            ..env()
        });

        assert_eq!(request.url().path(), "/a b%2F/c");
        assert_eq!(request.query_param("x"), Some(&Param::from("1")));
        assert!(request.query_param("arr").and_then(Param::as_array).is_some());
        assert_eq!(request.query().len(), 2);
    }

    #[test]
    fn invalid_utf8_in_path_is_dropped() {
        let request = create(RawEnvironment {
            request_uri: Some("/caf%C3%A9%FF".into()),
            ..env()
        });

        assert_eq!(request.url().path(), "/café");
    }

    #[test]
    fn url_and_path_filters() {
        let mut config = Config::new();
        config
            .add_url_filter("%20$", "")
            .unwrap()
            .add_path_filter("\\.html$", "")
            .unwrap();

        let request = RequestFactory::new(config)
            .create_request(RawEnvironment {
                request_uri: Some("/page.html%20".into()),
                ..env()
            })
            .unwrap();

        assert_eq!(request.url().path(), "/page");
    }

    #[test]
    fn supplied_query_map() {
        let request = create(RawEnvironment {
            request_uri: Some("/?from=target".into()),
            query: Some(json!({"from": "map"}).as_object().unwrap().clone()),
            ..env()
        });

        assert_eq!(request.query_param("from"), Some(&Param::from("map")));
    }

    #[test]
    fn sanitized_inputs() {
        let request = create(RawEnvironment {
            post: json!({"ok": "a\u{0}b", "k\u{1}": "v"}).as_object().unwrap().clone(),
            cookies: json!({"session": "abc"}).as_object().unwrap().clone(),
            ..env()
        });

        assert_eq!(request.post_param("ok"), Some(&Param::from("ab")));
        assert_eq!(request.post().len(), 1);
        assert_eq!(request.cookie("session"), Some(&Param::from("abc")));
    }

    #[test]
    fn null_input_fails() {
        let result = RequestFactory::default().create_request(RawEnvironment {
            post: json!({"a": null}).as_object().unwrap().clone(),
            ..env()
        });

        assert!(matches!(result, Err(Error::InvalidInputType { .. })));
    }

    #[test]
    fn script_path_detection() {
        assert_eq!(detect_script_path("/admin/index.php", "/admin/index.php"), "/admin/index.php");
        assert_eq!(detect_script_path("/admin/index.php/info", "/admin/index.php"), "/admin/");
        assert_eq!(detect_script_path("/Admin/user", "/admin/index.php"), "/Admin/");
        assert_eq!(detect_script_path("/other", "/admin/index.php"), "/");
        assert_eq!(detect_script_path("/", ""), "/");
        assert_eq!(detect_script_path("x", "y"), "");
    }

    #[test]
    fn script_url() {
        let request = create(RawEnvironment {
            request_uri: Some("/app/index.php/users?page=2".into()),
            script_name: Some("/app/index.php".into()),
            ..env()
        });

        assert_eq!(request.url().script_path(), "/app/");
        assert_eq!(request.url().base_url(), "http://example.com/app/");
        assert_eq!(request.url().relative_url(), "index.php/users?page=2");
    }

    #[test]
    fn method_override() {
        let post = |override_header: &str| RawEnvironment {
            request_method: Some("POST".into()),
            headers: Some(vec![("X-HTTP-Method-Override".into(), override_header.into())]),
            ..env()
        };

        assert_eq!(create(post("PATCH")).method(), "PATCH");
        assert_eq!(create(post("patch")).method(), "POST");
        assert_eq!(create(post("")).method(), "POST");

        let request = create(RawEnvironment {
            request_method: Some("PUT".into()),
            ..post("PATCH")
        });
        assert_eq!(request.method(), "PUT");
    }

    #[test]
    fn headers_from_variables() {
        let request = create(RawEnvironment {
            variables: [("HTTP_X_REQUESTED_WITH", "XMLHttpRequest"), ("CONTENT_TYPE", "text/plain")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..env()
        });

        assert!(request.is_ajax());
        assert_eq!(request.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn untrusted_peer_keeps_values() {
        let request = create(RawEnvironment {
            remote_host: Some("peer.example".into()),
            headers: Some(vec![("X-Forwarded-For".into(), "1.2.3.4".into())]),
            ..env()
        });

        assert_eq!(request.remote_address(), Some("203.0.113.5"));
        assert_eq!(request.remote_host(), Some("peer.example"));
    }

    #[test]
    fn trusted_proxy_rewrites_url() {
        let factory = RequestFactory::new(Config::new().with_proxies(["10.0.0.0/8"]));
        let request = factory
            .create_request(RawEnvironment {
                remote_addr: Some("10.0.0.1".into()),
                remote_host: Some("proxy.lan".into()),
                headers: Some(vec![(
                    "Forwarded".into(),
                    "for=198.51.100.2;proto=https;host=shop.example".into(),
                )]),
                ..env()
            })
            .unwrap();

        assert_eq!(request.url().to_string(), "https://shop.example/");
        assert!(request.is_secured());
        assert_eq!(request.remote_address(), Some("198.51.100.2"));
        assert_eq!(request.remote_host(), None);
    }
}
