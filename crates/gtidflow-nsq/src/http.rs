use std::time::Duration;

use tracing::debug;

use crate::error::{NsqError, NsqResult};
use crate::topic::validate_topic;
use crate::Publisher;

/// Publishes through nsqd's HTTP `/pub` endpoint.
#[derive(Debug, Clone)]
pub struct NsqHttpPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl NsqHttpPublisher {
    /// Create a publisher for `base_url` such as `http://127.0.0.1:4151`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> NsqResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NsqError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn publish_url(&self, topic: &str) -> String {
        // '#' of an ephemeral topic would otherwise start a URL fragment.
        format!("{}/pub?topic={}", self.base_url, topic.replace('#', "%23"))
    }

    /// Check that nsqd answers its `/ping` endpoint.
    pub async fn ping(&self) -> NsqResult<()> {
        let response = self
            .client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await
            .map_err(|e| NsqError::Network(e.to_string()))?;
        check_status(response).await
    }
}

impl Publisher for NsqHttpPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> NsqResult<()> {
        validate_topic(topic)?;
        if payload.is_empty() {
            return Err(NsqError::EmptyMessage);
        }

        let bytes = payload.len();
        let response = self
            .client
            .post(self.publish_url(topic))
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| NsqError::Network(e.to_string()))?;

        check_status(response).await?;
        debug!(topic, bytes, "Published message");
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> NsqResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "<unable to read body>".to_string());

    if status.is_server_error() {
        Err(NsqError::ServerError {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(NsqError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection and record each request.
    async fn serve(status: &'static str, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), requests)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_publish_posts_to_topic() {
        let (url, requests) = serve("200 OK", "OK").await;
        let publisher = NsqHttpPublisher::new(url, Duration::from_secs(5)).unwrap();

        publisher
            .publish("db1", br#"{"Schema":"db1"}"#.to_vec())
            .await
            .unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("POST /pub?topic=db1 HTTP/1.1"));
        assert!(requests[0].ends_with(r#"{"Schema":"db1"}"#));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let (url, _) = serve("500 Internal Server Error", "E_PUB_FAILED").await;
        let publisher = NsqHttpPublisher::new(url, Duration::from_secs(5)).unwrap();

        let err = publisher.publish("db1", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, NsqError::ServerError { status: 500, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_bad_request_is_permanent() {
        let (url, _) = serve("400 Bad Request", "E_BAD_TOPIC").await;
        let publisher = NsqHttpPublisher::new(url, Duration::from_secs(5)).unwrap();

        let err = publisher.publish("db1", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, NsqError::Rejected { status: 400, ref message } if message == "E_BAD_TOPIC"));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_ping() {
        let (url, requests) = serve("200 OK", "OK").await;
        let publisher = NsqHttpPublisher::new(format!("{}/", url), Duration::from_secs(5)).unwrap();

        publisher.ping().await.unwrap();
        assert!(requests.lock().unwrap()[0].starts_with("GET /ping HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_rejects_before_sending() {
        let publisher =
            NsqHttpPublisher::new("http://127.0.0.1:1", Duration::from_millis(100)).unwrap();

        assert!(matches!(
            publisher.publish("bad topic", b"x".to_vec()).await,
            Err(NsqError::InvalidTopic { .. })
        ));
        assert!(matches!(
            publisher.publish("db1", vec![]).await,
            Err(NsqError::EmptyMessage)
        ));
    }

    #[test]
    fn test_publish_url_escapes_ephemeral_marker() {
        let publisher =
            NsqHttpPublisher::new("http://nsqd:4151/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            publisher.publish_url("db1#ephemeral"),
            "http://nsqd:4151/pub?topic=db1%23ephemeral"
        );
    }
}
