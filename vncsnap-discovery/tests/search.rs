//! Search client tests against a canned local HTTP server.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use vncsnap_discovery::{DiscoveryError, ShodanClient};

/// Serve exactly one HTTP response on a fresh port and return the base
/// URL to point the client at.
async fn one_shot_http(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        // Read until the end of the request headers.
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            if sock.read_exact(&mut byte).await.is_err() {
                return;
            }
            request.push(byte[0]);
        }
        let request = String::from_utf8_lossy(&request).into_owned();
        assert!(request.contains("GET /shodan/host/search"));
        assert!(request.contains("key=test-key"));

        let response = format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        sock.write_all(response.as_bytes()).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn search_parses_matches() {
    let base = one_shot_http(
        "HTTP/1.1 200 OK",
        r#"{"matches": [{"ip_str": "192.0.2.10", "port": 5901}], "total": 1}"#,
    )
    .await;

    let client = ShodanClient::new("test-key").with_base_urls(base.clone(), base);
    let page = client.search("port:5901 authentication disabled", 1).await.unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.matches.len(), 1);
    assert_eq!(page.matches[0].ip_str, "192.0.2.10");
}

#[tokio::test]
async fn search_surfaces_api_rejections_as_fatal() {
    let base = one_shot_http("HTTP/1.1 401 Unauthorized", r#"{"error": "Invalid API key"}"#).await;

    let client = ShodanClient::new("test-key").with_base_urls(base.clone(), base);
    let err = client.search("anything", 1).await.unwrap_err();

    match err {
        DiscoveryError::Api { status, body } => {
            assert_eq!(status.as_u16(), 401);
            assert!(body.contains("Invalid API key"));
        }
        other => panic!("expected API error, got {other}"),
    }
}
