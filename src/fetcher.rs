use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tracing::{error, info};

pub const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Sentinel recording that the one-time download phase completed.
pub const MARKER_FILE: &str = "download_complete.marker";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("request timed out after {}s", FETCH_TIMEOUT.as_secs())]
    Timeout,
    #[error("response exceeded {} bytes", MAX_RESPONSE_BYTES)]
    TooLarge,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .connect_timeout(FETCH_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Fetches the body as text, enforcing the size ceiling as chunks arrive.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let resp = client.get(url).send().await?;
    let mut stream = resp.bytes_stream();
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
            // Dropping the stream aborts the transfer.
            return Err(FetchError::TooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

pub fn subscription_file_name(index: usize) -> String {
    format!("sub_{index:03}.txt")
}

pub async fn marker_exists(work_dir: &Path) -> bool {
    tokio::fs::try_exists(work_dir.join(MARKER_FILE))
        .await
        .unwrap_or(false)
}

/// Downloads every subscription URL into the work directory, then writes the
/// marker. Individual URL failures are logged and skipped.
pub async fn download_all(
    client: &reqwest::Client,
    urls: &[String],
    work_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for (i, url) in urls.iter().enumerate() {
        info!("Fetching subscription {}/{}: {}", i + 1, urls.len(), url);
        match fetch_text(client, url).await {
            Ok(text) => {
                let path = work_dir.join(subscription_file_name(i));
                tokio::fs::write(&path, &text).await?;
                info!("Saved {} bytes to {}", text.len(), path.display());
                files.push(path);
            }
            Err(e) => {
                error!("Failed to fetch {}: {}", url, e);
            }
        }
    }

    let stamp = chrono::Utc::now().to_rfc3339();
    tokio::fs::write(work_dir.join(MARKER_FILE), format!("{stamp}\n")).await?;
    info!("Download phase complete: {}/{} subscriptions saved", files.len(), urls.len());

    Ok(files)
}

pub async fn list_fetched_files(work_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(work_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with("sub_") && name.ends_with(".txt") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn serve_once(response: Vec<u8>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let _ = sock.write_all(&response).await;
            let _ = sock.shutdown().await;
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_oversized_response_aborts_with_too_large() {
        let body = vec![b'x'; MAX_RESPONSE_BYTES + 1024];
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(&body);
        let url = serve_once(response).await;

        let client = build_client().unwrap();
        let err = fetch_text(&client, &url).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge), "got {err:?}");
    }

    #[tokio::test]
    async fn test_body_at_ceiling_is_accepted() {
        let body = vec![b'x'; MAX_RESPONSE_BYTES];
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(&body);
        let url = serve_once(response).await;

        let client = build_client().unwrap();
        let text = fetch_text(&client, &url).await.unwrap();
        assert_eq!(text.len(), MAX_RESPONSE_BYTES);
    }

    #[tokio::test]
    async fn test_stalled_response_maps_to_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            // Hold the connection open without ever responding.
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(sock);
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let err = fetch_text(&client, &format!("http://{addr}/")).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout), "got {err:?}");
    }

    #[tokio::test]
    async fn test_marker_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!marker_exists(dir.path()).await);

        let client = build_client().unwrap();
        let files = download_all(&client, &[], dir.path()).await.unwrap();
        assert!(files.is_empty());
        assert!(marker_exists(dir.path()).await);
    }

    #[tokio::test]
    async fn test_list_fetched_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for i in [2usize, 0, 1] {
            tokio::fs::write(dir.path().join(subscription_file_name(i)), "x")
                .await
                .unwrap();
        }
        tokio::fs::write(dir.path().join("unrelated.json"), "{}")
            .await
            .unwrap();

        let files = list_fetched_files(dir.path()).await.unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["sub_000.txt", "sub_001.txt", "sub_002.txt"]);
    }
}
