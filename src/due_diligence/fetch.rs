// src/due_diligence/fetch.rs
//! Single outbound GET of a validated staff directory page.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{redirect::Policy, StatusCode};
use std::time::Duration;

use crate::error::{RadarError, RadarResult};
use crate::url_guard::ValidatedUrl;

pub const DEFAULT_USER_AGENT: &str = "lead-radar/0.1 (+due-diligence staff directory reader)";
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_PAGE_CHARS: usize = 1_000_000;

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page body as text, already capped to the fetcher's limit.
    async fn fetch_html(&self, url: &ValidatedUrl) -> RadarResult<String>;
}

/// reqwest-backed fetcher. Connects only to the addresses the guard
/// validated and never follows redirects.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    user_agent: String,
    timeout: Duration,
    max_chars: usize,
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

impl HttpPageFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_chars: DEFAULT_MAX_PAGE_CHARS,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    fn client_for(&self, url: &ValidatedUrl) -> RadarResult<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .redirect(Policy::none())
            // An env-configured proxy would resolve the host itself.
            .no_proxy();
        if url.is_domain() {
            builder = builder.resolve_to_addrs(url.host(), url.addrs());
        }
        builder
            .build()
            .map_err(|e| RadarError::StaffPageUnreachable(format!("http client: {e}")))
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_html(&self, url: &ValidatedUrl) -> RadarResult<String> {
        let client = self.client_for(url)?;
        let mut resp = client
            .get(url.url().clone())
            .header(ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(|e| RadarError::StaffPageUnreachable(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(RadarError::StaffPageRejected {
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !is_markup_content_type(&content_type) {
            return Err(RadarError::StaffPageNotHtml { content_type });
        }

        // A char is at most 4 bytes in UTF-8.
        let max_bytes = self.max_chars.saturating_mul(4);
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| RadarError::StaffPageUnreachable(e.to_string()))?
        {
            let room = max_bytes.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if buf.len() >= max_bytes {
                break;
            }
        }

        Ok(truncate_chars(&String::from_utf8_lossy(&buf), self.max_chars))
    }
}

pub fn is_markup_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("html") || ct.contains("xml")
}

pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_html_and_xml_content_types() {
        assert!(is_markup_content_type("text/html; charset=utf-8"));
        assert!(is_markup_content_type("application/xhtml+xml"));
        assert!(is_markup_content_type("TEXT/XML"));
        assert!(!is_markup_content_type("application/json"));
        assert!(!is_markup_content_type(""));
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("žluťoučký", 4), "žluť");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    mod http {
        use super::*;
        use axum::http::header::LOCATION;
        use axum::response::Html;
        use axum::routing::get;
        use axum::{Json, Router};
        use std::net::SocketAddr;
        use url::Url;

        const STAFF_PAGE: &str = r#"<div class="staff-card"><h3>Ann Lee</h3></div>"#;

        async fn serve() -> SocketAddr {
            let app = Router::new()
                .route("/staff", get(|| async { Html(STAFF_PAGE) }))
                .route(
                    "/moved",
                    get(|| async { (StatusCode::FOUND, [(LOCATION, "/staff")]) }),
                )
                .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
                .route(
                    "/partial",
                    get(|| async { (StatusCode::NON_AUTHORITATIVE_INFORMATION, Html(STAFF_PAGE)) }),
                )
                .route(
                    "/data",
                    get(|| async { Json(serde_json::json!({ "staff": [] })) }),
                )
                .route("/huge", get(|| async { Html("a".repeat(50_000)) }))
                .route("/wide", get(|| async { Html("é".repeat(5_000)) }));

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            addr
        }

        /// A domain URL pinned to the local server, as the guard would produce.
        fn pinned(addr: SocketAddr, path: &str) -> ValidatedUrl {
            let url = Url::parse(&format!("http://staff.test:{}{path}", addr.port())).unwrap();
            ValidatedUrl::pinned(url, vec![addr])
        }

        #[tokio::test]
        async fn fetches_html_through_pinned_address() {
            let addr = serve().await;
            let body = HttpPageFetcher::default()
                .fetch_html(&pinned(addr, "/staff"))
                .await
                .unwrap();
            assert_eq!(body, STAFF_PAGE);
        }

        #[tokio::test]
        async fn redirects_are_not_followed() {
            let addr = serve().await;
            let err = HttpPageFetcher::default()
                .fetch_html(&pinned(addr, "/moved"))
                .await
                .unwrap_err();
            assert!(matches!(err, RadarError::StaffPageRejected { status: 302 }), "{err}");
        }

        #[tokio::test]
        async fn only_status_200_is_accepted() {
            let addr = serve().await;
            let fetcher = HttpPageFetcher::default();
            for (path, code) in [("/missing", 404), ("/partial", 203)] {
                let err = fetcher.fetch_html(&pinned(addr, path)).await.unwrap_err();
                assert!(
                    matches!(err, RadarError::StaffPageRejected { status } if status == code),
                    "{path}: {err}"
                );
            }
        }

        #[tokio::test]
        async fn non_markup_content_type_is_rejected() {
            let addr = serve().await;
            let err = HttpPageFetcher::default()
                .fetch_html(&pinned(addr, "/data"))
                .await
                .unwrap_err();
            match err {
                RadarError::StaffPageNotHtml { content_type } => {
                    assert!(content_type.starts_with("application/json"))
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn oversized_bodies_are_capped() {
            let addr = serve().await;
            let fetcher = HttpPageFetcher::default().with_max_chars(1_000);

            let ascii = fetcher.fetch_html(&pinned(addr, "/huge")).await.unwrap();
            assert_eq!(ascii.len(), 1_000);

            let wide = fetcher.fetch_html(&pinned(addr, "/wide")).await.unwrap();
            assert_eq!(wide.chars().count(), 1_000);
            assert!(wide.chars().all(|c| c == 'é'));
        }

        #[serial_test::serial]
        #[tokio::test]
        async fn env_proxy_is_ignored() {
            let addr = serve().await;
            for key in ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"] {
                std::env::set_var(key, "http://127.0.0.1:9");
            }
            let res = HttpPageFetcher::default()
                .fetch_html(&pinned(addr, "/staff"))
                .await;
            for key in ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"] {
                std::env::remove_var(key);
            }
            assert_eq!(res.unwrap(), STAFF_PAGE);
        }
    }
}
