use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::llm::{ChatBackend, Message};

const CONNECTION_ERROR: &str = "Failed to connect to Ollama. Please check that Ollama is downloaded, running and accessible. https://ollama.com/download";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [&'a Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<Message>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Blocking client for the Ollama `/api/chat` endpoint.
pub struct Ollama {
    client: Client,
    chat_url: Url,
}

impl Ollama {
    pub fn new(host: &Url) -> Result<Self> {
        // Generation can take arbitrarily long, so requests never time out.
        // The server is local, so system proxies are ignored.
        let client = Client::builder()
            .timeout(None::<Duration>)
            .no_proxy()
            .build()
            .with_context(|| "unable to build the http client")?;

        Ok(Self {
            client,
            chat_url: join_path(host, "api/chat")?,
        })
    }

    fn decode_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
        let cause = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(response) => response.error,
            Err(_) if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
            Err(_) => body.trim().to_string(),
        };

        anyhow!("{cause} (status code: {})", status.as_u16())
    }
}

impl ChatBackend for Ollama {
    fn chat(&self, model: &str, messages: &[&Message]) -> Result<Message> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    anyhow!(CONNECTION_ERROR)
                } else {
                    anyhow::Error::new(e).context("chat request failed")
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .with_context(|| "failed to read chat response")?;

        if !status.is_success() {
            return Err(Self::decode_error(status, &body));
        }

        let decoded: ChatResponse =
            serde_json::from_str(&body).with_context(|| "malformed chat response")?;

        match decoded.message {
            Some(message) => Ok(message),
            None => bail!("chat response has no message"),
        }
    }
}

/// Appends `path` to the host URL, keeping any prefix the host already has.
fn join_path(host: &Url, path: &str) -> Result<Url> {
    let base = format!("{}/", host.as_str().trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|base| base.join(path))
        .with_context(|| format!("invalid Ollama host {host}"))
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use super::*;
    use crate::llm::MessageRole;

    /// Serves exactly one HTTP request with a canned response and hands back
    /// the raw request line and body it received.
    fn serve_once(status: &str, body: &str) -> (Url, JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length = 0;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }

            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            (
                request_line.trim_end().to_string(),
                String::from_utf8(request_body).unwrap(),
            )
        });

        (url, handle)
    }

    #[test]
    fn test_chat_posts_window_and_returns_message() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"model":"phi3","created_at":"2024-05-01T00:00:00Z","message":{"role":"assistant","content":"Hi there!"},"done":true}"#,
        );
        let ollama = Ollama::new(&url).unwrap();

        let system = Message::system("be nice");
        let user = Message::user("Hello");
        let reply = ollama.chat("phi3", &[&system, &user]).unwrap();

        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.content, "Hi there!");

        let (request_line, body) = server.join().unwrap();
        assert_eq!(request_line, "POST /api/chat HTTP/1.1");

        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "phi3",
                "messages": [
                    {"role": "system", "content": "be nice"},
                    {"role": "user", "content": "Hello"},
                ],
                "stream": false,
            })
        );
    }

    #[test]
    fn test_error_status_reports_server_error() {
        let (url, server) = serve_once("404 Not Found", r#"{"error":"model 'phi3' not found"}"#);
        let ollama = Ollama::new(&url).unwrap();

        let user = Message::user("Hello");
        let err = ollama.chat("phi3", &[&user]).unwrap_err();

        assert_eq!(
            format!("{err:#}"),
            "model 'phi3' not found (status code: 404)"
        );
        server.join().unwrap();
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        let (url, server) = serve_once("200 OK", "not json");
        let ollama = Ollama::new(&url).unwrap();

        let user = Message::user("Hello");
        let err = ollama.chat("phi3", &[&user]).unwrap_err();

        assert!(format!("{err:#}").starts_with("malformed chat response"));
        server.join().unwrap();
    }

    #[test]
    fn test_missing_message_is_an_error() {
        let (url, server) = serve_once("200 OK", r#"{"done":true}"#);
        let ollama = Ollama::new(&url).unwrap();

        let user = Message::user("Hello");
        let err = ollama.chat("phi3", &[&user]).unwrap_err();

        assert_eq!(err.to_string(), "chat response has no message");
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_host_reports_connection_error() {
        // Bind then drop to get a port nothing is listening on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
        let ollama = Ollama::new(&url).unwrap();

        let user = Message::user("Hello");
        let err = ollama.chat("phi3", &[&user]).unwrap_err();

        assert_eq!(err.to_string(), CONNECTION_ERROR);
    }

    #[test]
    fn test_join_path_keeps_host_prefix() {
        let host = Url::parse("http://example.com:8080/proxy").unwrap();
        assert_eq!(
            join_path(&host, "api/chat").unwrap().as_str(),
            "http://example.com:8080/proxy/api/chat"
        );

        let host = Url::parse("http://127.0.0.1:11434").unwrap();
        assert_eq!(
            join_path(&host, "api/chat").unwrap().as_str(),
            "http://127.0.0.1:11434/api/chat"
        );
    }
}
