//! HTTP fetch tool: retrieve the body of a URL.
//!
//! Uses `ureq` for synchronous HTTP requests. Enforces a timeout and a
//! maximum body size so a single step cannot hang the run or consume
//! excessive memory.

use std::io::Read;
use std::time::Duration;

use serde_json::{Value, json};

use crate::config::FetcherConfig;
use crate::context::ExecutionContext;
use crate::error::{ToolError, ToolResult};
use crate::tool::{Tool, ToolArgs};

const NAME: &str = "Fetcher";

/// Fetch content from a URL via HTTP GET.
#[derive(Debug, Clone)]
pub struct Fetcher {
    agent: ureq::Agent,
    max_response_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            agent,
            max_response_bytes: config.max_response_bytes,
        }
    }
}

impl Tool for Fetcher {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Fetch a URL via HTTP GET (args: url). Returns {content, url, status}."
    }

    fn run(&self, args: &ToolArgs, _context: &mut ExecutionContext) -> ToolResult<Value> {
        let url = args.require_str("url", NAME)?;

        let parsed = url::Url::parse(url).map_err(|e| ToolError::InvalidArg {
            tool: NAME.into(),
            arg: "url".into(),
            message: format!("\"{url}\" is not a valid URL: {e}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::InvalidArg {
                tool: NAME.into(),
                arg: "url".into(),
                message: format!("\"{url}\" must use http or https"),
            });
        }

        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(ToolError::HttpStatus {
                    url: url.into(),
                    status,
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ToolError::Transport {
                    url: url.into(),
                    message: transport.to_string(),
                });
            }
        };

        let status = response.status();
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(self.max_response_bytes as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| ToolError::Transport {
                url: url.into(),
                message: format!("HTTP {status} but failed to read body: {e}"),
            })?;
        // Replacement characters can push the decoded text past the cap.
        let mut body = String::from_utf8_lossy(&bytes).into_owned();
        truncate_at_char_boundary(&mut body, self.max_response_bytes);
        tracing::debug!(url, status, kept = body.len(), "fetched");

        Ok(json!({ "content": body, "url": url, "status": status }))
    }
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        let tool = Fetcher::new(&FetcherConfig::default());
        let mut ctx = ExecutionContext::new("g");
        let args = ToolArgs::new().with("url", "file:///etc/passwd");
        assert!(matches!(
            tool.run(&args, &mut ctx),
            Err(ToolError::InvalidArg { .. })
        ));
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let tool = Fetcher::new(&FetcherConfig {
            timeout_secs: 2,
            ..Default::default()
        });
        let mut ctx = ExecutionContext::new("g");
        let args = ToolArgs::new().with("url", "http://127.0.0.1:1/");
        assert!(matches!(
            tool.run(&args, &mut ctx),
            Err(ToolError::Transport { .. })
        ));
    }

    /// Serve one HTTP response with a `size`-byte body on a local port.
    fn serve_once(size: usize) -> String {
        use std::io::Write;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {size}\r\nConnection: close\r\n\r\n"
            );
            let _ = stream.write_all(head.as_bytes());
            let chunk = vec![b'a'; 64 * 1024];
            let mut left = size;
            while left > 0 {
                let n = left.min(chunk.len());
                if stream.write_all(&chunk[..n]).is_err() {
                    break;
                }
                left -= n;
            }
        });
        format!("http://{addr}/")
    }

    #[test]
    fn oversized_body_is_cut_at_cap() {
        let url = serve_once(11 * 1024 * 1024);
        let tool = Fetcher::new(&FetcherConfig {
            timeout_secs: 10,
            max_response_bytes: 1024,
        });
        let args = ToolArgs::new().with("url", url.as_str());
        let out = tool.run(&args, &mut ExecutionContext::new("g")).unwrap();
        assert_eq!(out["status"], json!(200));
        assert_eq!(out["content"].as_str().unwrap().len(), 1024);
    }

    #[test]
    fn cap_above_ten_mebibytes_is_honoured() {
        let size = 11 * 1024 * 1024;
        let url = serve_once(size);
        let tool = Fetcher::new(&FetcherConfig {
            timeout_secs: 10,
            max_response_bytes: 12 * 1024 * 1024,
        });
        let args = ToolArgs::new().with("url", url.as_str());
        let out = tool.run(&args, &mut ExecutionContext::new("g")).unwrap();
        assert_eq!(out["content"].as_str().unwrap().len(), size);
    }

    #[test]
    fn small_body_is_returned_whole() {
        let url = serve_once(10);
        let tool = Fetcher::new(&FetcherConfig::default());
        let args = ToolArgs::new().with("url", url.as_str());
        let out = tool.run(&args, &mut ExecutionContext::new("g")).unwrap();
        assert_eq!(out["content"], json!("aaaaaaaaaa"));
    }

    #[test]
    fn scheme_check_is_case_insensitive() {
        let tool = Fetcher::new(&FetcherConfig {
            timeout_secs: 2,
            ..Default::default()
        });
        let args = ToolArgs::new().with("url", "HTTP://127.0.0.1:1/");
        assert!(matches!(
            tool.run(&args, &mut ExecutionContext::new("g")),
            Err(ToolError::Transport { .. })
        ));
    }

    #[test]
    fn truncation_respects_utf8() {
        let mut text = "aé".to_string(); // 'é' is two bytes
        truncate_at_char_boundary(&mut text, 2);
        assert_eq!(text, "a");
        let mut short = "abc".to_string();
        truncate_at_char_boundary(&mut short, 10);
        assert_eq!(short, "abc");
    }
}
