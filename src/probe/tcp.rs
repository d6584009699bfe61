use std::time::Duration;
use tokio::net::TcpStream;

/// Per-probe connect timeout for single-shot reachability checks.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Single-shot TCP reachability check with a short per-probe timeout.
/// Connection failure and timeout both read as "unreachable".
pub async fn tcp_reachable(host: &str, port: u16) -> bool {
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Check whether something is listening on a local port.
pub async fn port_listening(port: u16) -> bool {
    tcp_reachable("127.0.0.1", port).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn unused_port_is_unreachable() {
        assert!(!tcp_reachable("127.0.0.1", 59987).await);
        assert!(!port_listening(59987).await);
    }

    #[tokio::test]
    async fn bound_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(tcp_reachable("127.0.0.1", port).await);
        assert!(port_listening(port).await);
    }
}
