//! Skips mock-server tests on hosts where localhost sockets cannot be bound.
//!
//! Some sandboxed CI runners forbid binding even loopback ports. Tests call
//! [`start_mock_server_or_skip`] and return early on `None`. Set
//! `QURANCOM_REQUIRE_SOCKET_TESTS=1` to turn the skip into a failure.

use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "QURANCOM_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_ENV).is_ok_and(|value| value == "1")
}

/// Starts a mock server, or returns `None` when loopback binding is denied.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => {
            drop(listener);
            Some(MockServer::start().await)
        }
        Err(e) => {
            assert!(
                !sockets_required(),
                "{REQUIRE_ENV}=1 but localhost cannot be bound: {e}"
            );
            eprintln!("skipping socket-bound test: cannot bind localhost ({e})");
            None
        }
    }
}
