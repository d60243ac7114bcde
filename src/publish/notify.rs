// src/publish/notify.rs
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_POSTS: usize = 10;
const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Announce freshly generated post files.
    async fn notify(&self, posts: &[PathBuf]) -> Result<()>;
}

/// Posts a digest of new posts to a Telegram chat via the Bot API.
pub struct TelegramNotifier {
    token: Option<String>,
    chat_id: Option<String>,
    site_url: String,
    api_base: String,
    client: Client,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    /// Reads `TELEGRAM_TOKEN`, `TELEGRAM_CHAT_ID` and `SITE_URL`.
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self::new(
            var("TELEGRAM_TOKEN"),
            var("TELEGRAM_CHAT_ID"),
            var("SITE_URL").unwrap_or_default(),
        )
    }

    pub fn new(token: Option<String>, chat_id: Option<String>, site_url: String) -> Self {
        Self {
            token,
            chat_id,
            site_url: site_url.trim_end_matches('/').to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    /// `.../2024-06-01-golden-hour.md` → `<site>/2024/06/01/golden-hour.html`.
    pub fn post_url(&self, path: &Path) -> String {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let parts: Vec<&str> = stem.splitn(4, '-').collect();
        match parts.as_slice() {
            [y, m, d, slug] => format!("{}/{y}/{m}/{d}/{slug}.html", self.site_url),
            _ => self.site_url.clone(),
        }
    }

    /// Digest text, or `None` when there is nothing to announce.
    pub fn build_digest(&self, posts: &[PathBuf]) -> Option<String> {
        let posts: Vec<&PathBuf> = posts
            .iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
            .collect();
        if posts.is_empty() {
            return None;
        }
        let mut lines = vec!["🆕 New posts:".to_string()];
        for p in posts.into_iter().take(MAX_POSTS) {
            lines.push(format!("• {}\n{}", post_title(p), self.post_url(p)));
        }
        Some(lines.join("\n\n"))
    }
}

fn re_title() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"title:\s*"((?:[^"\\]|\\.)+)""#).expect("title regex"))
}

/// Title from a post's front matter, or a generic label.
pub fn post_title(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|txt| {
            re_title()
                .captures(&txt)
                .map(|c| c[1].replace("\\\"", "\"").replace("\\\\", "\\"))
        })
        .unwrap_or_else(|| "New post".to_string())
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, posts: &[PathBuf]) -> Result<()> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            tracing::debug!("Telegram notify disabled (no TELEGRAM_TOKEN/TELEGRAM_CHAT_ID)");
            return Ok(());
        };
        let Some(text) = self.build_digest(posts) else {
            tracing::debug!("no new posts to announce");
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let body = SendMessage {
            chat_id,
            text: &text,
            disable_web_page_preview: true,
        };
        let rsp = self
            .client
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .json(&body)
            .send()
            .await
            .context("telegram sendMessage")?
            .error_for_status()
            .context("telegram sendMessage non-2xx")?;
        tracing::info!(status = rsp.status().as_u16(), "telegram digest sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn notifier() -> TelegramNotifier {
        TelegramNotifier::new(None, None, "https://site.test/".into())
    }

    #[test]
    fn urls_from_post_names() {
        let n = notifier();
        assert_eq!(
            n.post_url(Path::new("docs/_posts/2024-06-01-golden-hour-tips.md")),
            "https://site.test/2024/06/01/golden-hour-tips.html"
        );
        assert_eq!(n.post_url(Path::new("weird.md")), "https://site.test");
    }

    #[test]
    fn digest_reads_titles_and_caps_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut posts = Vec::new();
        for i in 0..12 {
            let p = dir.path().join(format!("2024-06-01-post-{i}.md"));
            fs::write(&p, format!("---\ntitle: \"Post \\\"{i}\\\"\"\n---\n")).unwrap();
            posts.push(p);
        }
        posts.push(dir.path().join("notes.txt"));

        let digest = notifier().build_digest(&posts).unwrap();
        assert!(digest.starts_with("🆕 New posts:"));
        assert!(digest.contains("• Post \"0\"\nhttps://site.test/2024/06/01/post-0.html"));
        assert_eq!(digest.matches('•').count(), MAX_POSTS);
        assert!(notifier().build_digest(&[]).is_none());
    }

    #[test]
    fn missing_file_gets_generic_title() {
        assert_eq!(post_title(Path::new("/nonexistent/2024-01-01-x.md")), "New post");
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let len = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= len
    }

    #[tokio::test]
    async fn digest_is_posted_to_send_message() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            while !request_complete(&buf) {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            sock.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\nConnection: close\r\n\r\n{\"ok\":true}",
            )
            .await
            .unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });

        let dir = tempfile::tempdir().unwrap();
        let post = dir.path().join("2024-06-01-golden-hour.md");
        fs::write(&post, "---\ntitle: \"Golden hour\"\n---\n").unwrap();

        let n = TelegramNotifier::new(Some("TOKEN".into()), Some("42".into()), "https://site.test".into())
            .with_api_base(format!("http://{addr}/"));
        assert!(n.is_enabled());
        n.notify(&[post]).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /botTOKEN/sendMessage "), "{request}");
        assert!(request.contains(r#""chat_id":"42""#));
        assert!(request.contains(r#""disable_web_page_preview":true"#));
        assert!(request.contains("• Golden hour"));
        assert!(request.contains("https://site.test/2024/06/01/golden-hour.html"));
    }

    #[tokio::test]
    async fn disabled_without_credentials() {
        let n = notifier();
        assert!(!n.is_enabled());
        n.notify(&[PathBuf::from("2024-06-01-x.md")]).await.unwrap();
    }
}
