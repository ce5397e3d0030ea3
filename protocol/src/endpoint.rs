//! Node endpoints and URL composition.

/// A node API route, optionally versioned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub path: &'static str,
    pub version: &'static str,
}

impl Endpoint {
    pub const HANDSHAKE: Endpoint = Endpoint {
        path: "/web/handshake",
        version: "",
    };

    pub const fn new(path: &'static str, version: &'static str) -> Self {
        Self { path, version }
    }
}

/// `{peer_url}{path}{version}`, tolerating a trailing slash on the peer URL.
pub fn compose_url(peer_url: &str, endpoint: &Endpoint) -> String {
    format!(
        "{}{}{}",
        peer_url.trim_end_matches('/'),
        endpoint.path,
        endpoint.version
    )
}

/// The `host:port` part of a peer URL, with any scheme and path removed.
pub fn socket_address(peer_url: &str) -> &str {
    let without_scheme = peer_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(peer_url);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_handshake_url() {
        assert_eq!(
            compose_url("https://node1.example:7470/", &Endpoint::HANDSHAKE),
            "https://node1.example:7470/web/handshake"
        );
    }

    #[test]
    fn appends_version_suffix() {
        let sign = Endpoint::new("/web/pkp/sign", "/v2");
        assert_eq!(
            compose_url("http://127.0.0.1:7470", &sign),
            "http://127.0.0.1:7470/web/pkp/sign/v2"
        );
    }

    #[test]
    fn strips_scheme_and_path() {
        assert_eq!(socket_address("https://10.0.0.1:443"), "10.0.0.1:443");
        assert_eq!(socket_address("http://127.0.0.1:7470/web"), "127.0.0.1:7470");
        assert_eq!(socket_address("127.0.0.1:7470"), "127.0.0.1:7470");
    }
}
