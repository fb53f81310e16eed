use crate::headers::Headers;

/// A trait giving access to the forwarding headers of a request
///
/// A double-ended iterator is returned to allow the implementation to optimize the iteration in
/// case of multiple header lines. Each item may still hold comma separated values.
pub trait ProxyHeaders {
    /// Get the `Forwarded` header values
    fn forwarded(&self) -> impl DoubleEndedIterator<Item = &str>;

    /// Get the `X-Forwarded-For` header values
    fn x_forwarded_for(&self) -> impl DoubleEndedIterator<Item = &str>;

    /// Get the `X-Forwarded-Host` header values
    fn x_forwarded_host(&self) -> impl DoubleEndedIterator<Item = &str>;

    /// Get the `X-Forwarded-Proto` header values
    fn x_forwarded_proto(&self) -> impl DoubleEndedIterator<Item = &str>;

    /// Get the `X-Forwarded-Port` header values
    fn x_forwarded_port(&self) -> impl DoubleEndedIterator<Item = &str>;
}

impl ProxyHeaders for Headers {
    fn forwarded(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.get("forwarded").into_iter()
    }

    fn x_forwarded_for(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.get("x-forwarded-for").into_iter()
    }

    fn x_forwarded_host(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.get("x-forwarded-host").into_iter()
    }

    fn x_forwarded_proto(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.get("x-forwarded-proto").into_iter()
    }

    fn x_forwarded_port(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.get("x-forwarded-port").into_iter()
    }
}

#[cfg(feature = "http")]
mod http {
    use super::ProxyHeaders;

    fn values<'a>(
        headers: &'a http::HeaderMap,
        name: &'static str,
    ) -> impl DoubleEndedIterator<Item = &'a str> {
        headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
    }

    impl ProxyHeaders for http::HeaderMap {
        fn forwarded(&self) -> impl DoubleEndedIterator<Item = &str> {
            values(self, "forwarded")
        }

        fn x_forwarded_for(&self) -> impl DoubleEndedIterator<Item = &str> {
            values(self, "x-forwarded-for")
        }

        fn x_forwarded_host(&self) -> impl DoubleEndedIterator<Item = &str> {
            values(self, "x-forwarded-host")
        }

        fn x_forwarded_proto(&self) -> impl DoubleEndedIterator<Item = &str> {
            values(self, "x-forwarded-proto")
        }

        fn x_forwarded_port(&self) -> impl DoubleEndedIterator<Item = &str> {
            values(self, "x-forwarded-port")
        }
    }

    impl<T> ProxyHeaders for http::Request<T> {
        fn forwarded(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers().forwarded()
        }

        fn x_forwarded_for(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers().x_forwarded_for()
        }

        fn x_forwarded_host(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers().x_forwarded_host()
        }

        fn x_forwarded_proto(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers().x_forwarded_proto()
        }

        fn x_forwarded_port(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers().x_forwarded_port()
        }
    }

    impl ProxyHeaders for http::request::Parts {
        fn forwarded(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers.forwarded()
        }

        fn x_forwarded_for(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers.x_forwarded_for()
        }

        fn x_forwarded_host(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers.x_forwarded_host()
        }

        fn x_forwarded_proto(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers.x_forwarded_proto()
        }

        fn x_forwarded_port(&self) -> impl DoubleEndedIterator<Item = &str> {
            self.headers.x_forwarded_port()
        }
    }
}
