use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to download data from {url}: HTTP status {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to download data: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to read {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
    #[error("unsupported source {0:?}, only http/https/file are supported")]
    UnsupportedSource(String),
}

// rust 的 async trait 还没有稳定，可以用async_trait 宏
#[async_trait]
pub trait Fetch {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// 从文件源或者 http 源中获取 CSV 文本
pub async fn retrieve_data(source: impl AsRef<str>) -> Result<String, FetchError> {
    SourceFetcher(source.as_ref()).fetch().await
}

/// 根据 source 的前缀选择具体的 fetcher
pub struct SourceFetcher<'a>(pub &'a str);

#[async_trait]
impl<'a> Fetch for SourceFetcher<'a> {
    async fn fetch(&self) -> Result<String, FetchError> {
        let name = self.0;
        let result = if name.starts_with("http://") || name.starts_with("https://") {
            UrlFetcher(name).fetch().await
        } else if let Some(path) = name.strip_prefix("file://") {
            FileFetcher(path).fetch().await
        } else {
            Err(FetchError::UnsupportedSource(name.to_string()))
        };

        match &result {
            Ok(text) => info!("Data downloaded successfully ({} bytes).", text.len()),
            Err(e) => error!("Error downloading data: {}", e),
        }
        result
    }
}

/// 单次 GET，不重试
pub struct UrlFetcher<'a>(pub &'a str);

#[async_trait]
impl<'a> Fetch for UrlFetcher<'a> {
    async fn fetch(&self) -> Result<String, FetchError> {
        let response = reqwest::get(self.0).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: self.0.to_string(),
                status,
            });
        }
        Ok(response.text().await?)
    }
}

/// 路径部分，不带 `file://`
pub struct FileFetcher<'a>(pub &'a str);

#[async_trait]
impl<'a> Fetch for FileFetcher<'a> {
    async fn fetch(&self) -> Result<String, FetchError> {
        fs::read_to_string(self.0)
            .await
            .map_err(|source| FetchError::File {
                path: self.0.to_string(),
                source,
            })
    }
}
