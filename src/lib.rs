//! # Trusted request
//!
//! This crate turns raw, untrusted request data (host, request target, headers, input maps) into an
//! immutable [`Request`]. The client address, host and scheme are only rewritten from forwarding
//! headers when the peer is a trusted proxy.
//!
//! ## Usage
//!
//! ```rust
//! use trusted_request::{Config, RawEnvironment, RequestFactory};
//!
//! let config = Config::new_local();
//! let env = RawEnvironment {
//!     http_host: Some("internal:8080".into()),
//!     request_uri: Some("/blog/?page=2".into()),
//!     remote_addr: Some("127.0.0.1".into()),
//!     headers: Some(vec![(
//!         "Forwarded".into(),
//!         "for=1.2.3.4; proto=https; by=myproxy; host=mydomain.com".into(),
//!     )]),
//!     ..Default::default()
//! };
//!
//! let request = RequestFactory::new(config).create_request(env).unwrap();
//!
//! assert_eq!(request.url().to_string(), "https://mydomain.com/blog/?page=2");
//! assert_eq!(request.remote_address(), Some("1.2.3.4"));
//! assert!(request.is_secured());
//! ```
//!
//! ## Features
//!
//!  * Use the `Forwarded` header to extract the client ip address and other informations in priority.
//!  * Fall back to the `X-Forwarded-*` headers if the `Forwarded` header is not present.
//!  * Filter every query, post, cookie and file name value to a safe character class.
//!  * RFC 3986 urls: [`url::Url`] builder, immutable [`url::UrlImmutable`] and [`url::UrlScript`].
//!  * With the `http` feature (default), read requests built with the `http` crate.
//!
//! ## Implementation
//!
//! Forwarding headers try to follow the [RFC 7239](https://tools.ietf.org/html/rfc7239)
//! specifications but may differ on real world usage.

mod cidr;
mod config;
mod environment;
mod error;
mod extract;
mod factory;
mod files;
mod headers;
mod request;
pub mod sanitizer;
mod trusted;
pub mod url;

pub use cidr::{ip_match, parse_block};
pub use config::Config;
pub use environment::{RawBody, RawEnvironment};
pub use error::{Error, Result};
pub use extract::ProxyHeaders;
pub use factory::RequestFactory;
pub use files::{FileNode, FileTree, FileUpload, UploadError};
pub use headers::Headers;
pub use request::{Request, ReverseLookup, STRICT_COOKIE_NAME};
pub use trusted::Trusted;
