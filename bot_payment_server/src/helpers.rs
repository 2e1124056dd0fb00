use std::{net::IpAddr, str::FromStr, sync::OnceLock};

use actix_web::HttpRequest;
use log::{debug, trace};
use regex::Regex;

fn forwarded_for() -> Option<&'static Regex> {
    static FORWARDED_FOR: OnceLock<Option<Regex>> = OnceLock::new();
    FORWARDED_FOR.get_or_init(|| Regex::new(r#"for="?(?P<ip>[^;,"]+)"?"#).ok()).as_ref()
}

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| forwarded_for().and_then(|re| re.captures(v)))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use actix_web::test::TestRequest;

    use super::*;

    fn peer() -> SocketAddr {
        "10.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn headers_are_only_trusted_when_enabled() {
        let req = TestRequest::default()
            .peer_addr(peer())
            .insert_header(("X-Forwarded-For", "52.31.139.75, 10.0.0.2"))
            .insert_header(("Forwarded", "for=52.49.173.169;proto=https"))
            .to_http_request();
        assert_eq!(get_remote_ip(&req, false, false), Some("10.0.0.1".parse().unwrap()));
        assert_eq!(get_remote_ip(&req, true, false), Some("52.31.139.75".parse().unwrap()));
        assert_eq!(get_remote_ip(&req, false, true), Some("52.49.173.169".parse().unwrap()));
        assert_eq!(get_remote_ip(&req, true, true), Some("52.31.139.75".parse().unwrap()));
    }

    #[test]
    fn garbage_headers_fall_back_to_the_peer() {
        let req = TestRequest::default()
            .peer_addr(peer())
            .insert_header(("X-Forwarded-For", "unknown"))
            .insert_header(("Forwarded", "by=proxy"))
            .to_http_request();
        assert_eq!(get_remote_ip(&req, true, true), Some("10.0.0.1".parse().unwrap()));
    }
}
