//! HTTP 客户端封装

use reqwest::{multipart, Client, RequestBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::core::error::{CoreError, CoreResult};

/// 请求选项
#[derive(Debug, Clone)]
pub struct RequestOption {
    pub headers: HashMap<String, String>,
    /// 超时时间，默认 30 秒
    pub timeout: Duration,
    /// 上传文件的字段名，默认 file
    pub file_field_name: String,
    /// 上传文件时附带的其他字段
    pub file_other_field: HashMap<String, String>,
}

impl Default for RequestOption {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            timeout: Duration::from_secs(30),
            file_field_name: "file".to_string(),
            file_other_field: HashMap::new(),
        }
    }
}

impl RequestOption {
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn apply(builder: RequestBuilder, option: &RequestOption) -> RequestBuilder {
        option
            .headers
            .iter()
            .fold(builder.timeout(option.timeout), |b, (k, v)| b.header(k, v))
    }

    /// 发送请求并读取响应体，非 2xx 状态同样返回响应体
    async fn send(builder: RequestBuilder, option: &RequestOption) -> CoreResult<Vec<u8>> {
        let response = Self::apply(builder, option).send().await?;
        debug!("HTTP {} {}", response.status(), response.url());
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn get(&self, url: &str, option: &RequestOption) -> CoreResult<Vec<u8>> {
        Self::send(self.client.get(url), option).await
    }

    /// JSON 格式的 POST 请求
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        option: &RequestOption,
    ) -> CoreResult<Vec<u8>> {
        Self::send(self.client.post(url).json(body), option).await
    }

    /// multipart/form-data 格式的 POST 请求
    pub async fn post_form_data(
        &self,
        url: &str,
        form: &HashMap<String, String>,
        option: &RequestOption,
    ) -> CoreResult<Vec<u8>> {
        let form = form
            .iter()
            .fold(multipart::Form::new(), |f, (k, v)| f.text(k.clone(), v.clone()));
        Self::send(self.client.post(url).multipart(form), option).await
    }

    /// application/x-www-form-urlencoded 格式的 POST 请求
    pub async fn post_form_urlencoded(
        &self,
        url: &str,
        form: &HashMap<String, String>,
        option: &RequestOption,
    ) -> CoreResult<Vec<u8>> {
        Self::send(self.client.post(url).form(form), option).await
    }

    /// 上传本地文件，服务端必须返回 200
    pub async fn post_file(
        &self,
        url: &str,
        file_path: &Path,
        option: &RequestOption,
    ) -> CoreResult<Vec<u8>> {
        let content = tokio::fs::read(file_path).await?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let form = option
            .file_other_field
            .iter()
            .fold(multipart::Form::new(), |f, (k, v)| f.text(k.clone(), v.clone()))
            .part(
                option.file_field_name.clone(),
                multipart::Part::bytes(content).file_name(file_name),
            );

        let response = Self::apply(self.client.post(url).multipart(form), option)
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(CoreError::internal(format!(
                "server returned non-200 status: {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// 下载远程文件到 `save_dir`，返回本地文件路径
    ///
    /// `random_name` 为 true 时使用随机文件名并保留扩展名，否则与远程文件同名。
    pub async fn download_file(
        &self,
        file_url: &str,
        save_dir: &Path,
        random_name: bool,
    ) -> CoreResult<PathBuf> {
        let file_name = download_file_name(file_url, random_name)?;
        tokio::fs::create_dir_all(save_dir).await?;

        let response = self.client.get(file_url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(CoreError::internal(format!(
                "Failed to download the file. Server returned: {}",
                response.status()
            )));
        }
        let content = response.bytes().await?;

        let file_path = save_dir.join(file_name);
        tokio::fs::write(&file_path, &content).await?;
        Ok(file_path)
    }
}

/// 根据 url 计算下载文件名
pub fn download_file_name(file_url: &str, random_name: bool) -> CoreResult<String> {
    let parsed = url::Url::parse(file_url)
        .map_err(|e| CoreError::BadRequest(format!("无效的文件地址: {}", e)))?;
    let base = parsed
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string();

    if !random_name {
        return Ok(base);
    }
    let ext = Path::new(&base)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    Ok(format!("{}{}", uuid::Uuid::new_v4(), ext))
}
