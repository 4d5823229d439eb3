//! 内存中的 zip 打包

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::core::error::CoreResult;
use crate::infrastructure::http_client::{HttpClient, RequestOption};

pub struct ZipObject {
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl Default for ZipObject {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipObject {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    fn options() -> FileOptions {
        FileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    /// 以 `folders/file_name` 写入内容
    pub fn add_bytes(&mut self, file_name: &str, data: &[u8], folders: &[&str]) -> CoreResult<()> {
        self.writer
            .start_file(build_zip_path(file_name, folders), Self::options())?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// `file_name` 为空时使用本地文件名
    pub fn add_local_file(
        &mut self,
        local_path: impl AsRef<Path>,
        file_name: Option<&str>,
        folders: &[&str],
    ) -> CoreResult<()> {
        let local_path = local_path.as_ref();
        let data = std::fs::read(local_path)?;
        let name = match file_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        self.add_bytes(&name, &data, folders)
    }

    /// 下载远程文件写入，`file_name` 为空时取 url 最后一段
    pub async fn add_url_file(
        &mut self,
        client: &HttpClient,
        url: &str,
        file_name: Option<&str>,
        folders: &[&str],
    ) -> CoreResult<()> {
        let data = client.get(url, &RequestOption::default()).await?;
        let name = match file_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => url.rsplit('/').next().unwrap_or(url).to_string(),
        };
        self.add_bytes(&name, &data, folders)
    }

    /// 结束写入并返回压缩包内容
    pub fn finish(mut self) -> CoreResult<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }

    /// 作为附件下载，文件名自动追加 `.zip`
    pub fn into_download(self, filename: &str) -> CoreResult<Response> {
        let data = self.finish()?;
        let escaped: String = url::form_urlencoded::byte_serialize(filename.as_bytes()).collect();
        Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}.zip", escaped),
                ),
            ],
            data,
        )
            .into_response())
    }
}

fn build_zip_path(file_name: &str, folders: &[&str]) -> String {
    if folders.is_empty() {
        return file_name.to_string();
    }
    format!("{}/{}", folders.join("/"), file_name)
}
