use rstest::*;
use serde::Deserialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trusted_request::{Config, RawEnvironment, RequestFactory};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Deserialize)]
struct ConfigJson {
    trusted_proxies: Option<Vec<String>>,
    #[serde(default)]
    local: bool,
    #[serde(default)]
    https: bool,
    script_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Expected {
    url: String,
    method: Option<String>,
    remote_address: Option<String>,
    script_path: Option<String>,
}

#[rstest]
fn fixture(
    #[files("**/*.test")]
    #[base_dir = "tests/fixtures"]
    path: PathBuf,
) {
    init_tracing();

    let content = std::fs::read_to_string(&path).unwrap();
    let split = content
        .split("-----------------------\n")
        .collect::<Vec<&str>>();

    let ip_addr_str = split.first().expect("no ip address");
    let plain_http_request = split.get(1).expect("no plain http request");
    let config_str = split.get(2).expect("no config");
    let expected_str = split.get(3).expect("no expected");

    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut parsed_request = httparse::Request::new(&mut headers);

    parsed_request.parse(plain_http_request.as_bytes()).unwrap();

    let mut headers_owned = vec![];
    let mut host = None;

    for header in parsed_request.headers.iter() {
        let name = header.name.to_string();
        let value = std::str::from_utf8(header.value).unwrap().to_string();

        if name.eq_ignore_ascii_case("host") {
            host = Some(value.clone());
        }
        headers_owned.push((name, value));
    }

    let config_json = serde_json::from_str::<ConfigJson>(config_str).unwrap();
    let expected =
        serde_json::from_str::<Expected>(expected_str).expect("failed to parse expected");

    let mut config = if config_json.local {
        Config::new_local()
    } else {
        Config::new()
    };

    if let Some(trusted_proxies) = config_json.trusted_proxies {
        for trusted_proxy in trusted_proxies {
            config.add_trusted_proxy(&trusted_proxy).unwrap();
        }
    }

    let peer = ip_addr_str.trim();
    let env = RawEnvironment {
        https: config_json.https.then(|| "on".to_string()),
        http_host: host,
        request_uri: parsed_request.path.map(str::to_string),
        request_method: parsed_request.method.map(str::to_string),
        script_name: config_json.script_name,
        remote_addr: (!peer.is_empty()).then(|| peer.to_string()),
        headers: Some(headers_owned),
        ..Default::default()
    };

    let request = RequestFactory::new(config).create_request(env).unwrap();

    assert_eq!(request.url().to_string(), expected.url);
    assert_eq!(request.remote_address(), expected.remote_address.as_deref());

    if let Some(method) = expected.method {
        assert_eq!(request.method(), method);
    }

    if let Some(script_path) = expected.script_path {
        assert_eq!(request.url().script_path(), script_path);
    }
}

#[rstest]
#[case("203.0.113.5", "", "1.2.3.4", "203.0.113.5")]
#[case("10.0.0.1", "10.0.0.0/8", "1.2.3.4, 10.0.0.1", "1.2.3.4")]
#[case("10.0.0.1", "10.0.0.0/8", "1.2.3.4, 10.0.0.2, 10.0.0.3", "1.2.3.4")]
#[case("10.0.0.1", "10.0.0.0/8", "1.2.3.4, 5.6.7.8", "5.6.7.8")]
#[case("10.0.0.1", "10.0.0.0/8", "1.2.3.4, garbage", "10.0.0.1")]
#[case("2001:db8::1", "2001:db8::/32", "2001:db8::2, 2606:4700::1111", "2606:4700::1111")]
#[case("192.0.2.1", "10.0.0.0/8", "1.2.3.4", "192.0.2.1")]
fn x_forwarded_for(
    #[case] peer: &str,
    #[case] proxies: &str,
    #[case] forwarded_for: &str,
    #[case] expected: &str,
) {
    let config = Config::new().with_proxies(proxies.split(',').filter(|p| !p.is_empty()));
    let env = RawEnvironment {
        http_host: Some("example.com".into()),
        remote_addr: Some(peer.into()),
        headers: Some(vec![("X-Forwarded-For".into(), forwarded_for.into())]),
        ..Default::default()
    };

    let request = RequestFactory::new(config).create_request(env).unwrap();

    assert_eq!(request.remote_address(), Some(expected));
}

#[rstest]
#[case("POST", "PATCH", "PATCH")]
#[case("POST", "patch", "POST")]
#[case("POST", "PUT1", "POST")]
#[case("GET", "DELETE", "GET")]
#[case("post", "PATCH", "post")]
fn method_override(#[case] method: &str, #[case] header: &str, #[case] expected: &str) {
    let env = RawEnvironment {
        request_method: Some(method.into()),
        headers: Some(vec![("X-Http-Method-Override".into(), header.into())]),
        ..Default::default()
    };

    let request = RequestFactory::default().create_request(env).unwrap();

    assert_eq!(request.method(), expected);
}

#[rstest]
#[case("192.168.1.5", "192.168.1.0/24", true)]
#[case("192.168.2.5", "192.168.1.0/24", false)]
#[case("10.1.2.3", "10.1.2.3", true)]
#[case("10.1.2.4", "10.1.2.3", false)]
#[case("1.2.3.4", "0.0.0.0/0", true)]
#[case("2001:db8::1", "2001:db8::/32", true)]
#[case("2001:db9::1", "2001:db8::/32", false)]
#[case("::1", "127.0.0.1/8", false)]
#[case("127.0.0.1", "::1/128", false)]
#[case("1.2.3.4", "1.2.3.0/33", false)]
#[case("1.2.3.4", "1.2.3.0/", false)]
#[case("not-an-ip", "0.0.0.0/0", false)]
fn cidr(#[case] address: &str, #[case] block: &str, #[case] expected: bool) {
    assert_eq!(trusted_request::ip_match(address, block), expected);
}
