//! Client identification for rate limiting.

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let raw = headers.get(name)?.to_str().ok()?;
    // X-Forwarded-For lists the original client first
    raw.split(',').next()?.trim().parse().ok()
}

/// Client IP from proxy headers, then the socket address, then loopback.
pub fn extract_ip_from_headers(headers: &HeaderMap, fallback: Option<IpAddr>) -> IpAddr {
    header_ip(headers, "x-forwarded-for")
        .or_else(|| header_ip(headers, "x-real-ip"))
        .or(fallback)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Remote socket address when the server was started with connect info.
/// Never rejects, so handlers work the same under `oneshot` in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaybeRemoteAddr(pub Option<SocketAddr>);

impl MaybeRemoteAddr {
    pub fn client_ip(&self, headers: &HeaderMap) -> IpAddr {
        extract_ip_from_headers(headers, self.0.map(|addr| addr.ip()))
    }
}

impl<S> FromRequestParts<S> for MaybeRemoteAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeRemoteAddr(parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let ip = extract_ip_from_headers(&headers, Some(IpAddr::from([10, 0, 0, 9])));
        assert_eq!(ip, IpAddr::from([203, 0, 113, 7]));
    }

    #[test]
    fn test_real_ip_then_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(extract_ip_from_headers(&headers, None), IpAddr::from([198, 51, 100, 2]));

        let empty = HeaderMap::new();
        assert_eq!(
            extract_ip_from_headers(&empty, Some(IpAddr::from([10, 0, 0, 9]))),
            IpAddr::from([10, 0, 0, 9])
        );
        assert_eq!(extract_ip_from_headers(&empty, None), IpAddr::from([127, 0, 0, 1]));
    }

    #[test]
    fn test_garbage_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-real-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(extract_ip_from_headers(&headers, None), "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_remote_addr_is_the_fallback() {
        let remote = MaybeRemoteAddr(Some(SocketAddr::from(([192, 0, 2, 5], 4000))));
        assert_eq!(remote.client_ip(&HeaderMap::new()), IpAddr::from([192, 0, 2, 5]));
        assert_eq!(MaybeRemoteAddr::default().client_ip(&HeaderMap::new()), IpAddr::from([127, 0, 0, 1]));
    }
}
