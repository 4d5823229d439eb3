//! 对象存储
//!
//! 业务代码只依赖 [`ObjectClient`]，内置本地文件系统实现。

pub mod resource;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::info;

use crate::core::error::{CoreError, CoreResult};
use crate::infrastructure::config::StorageConfig;

pub use resource::{AudioAttr, Resource, ResourceType, VideoAttr, VideoResource};

/// 待上传对象
#[derive(Debug, Clone, Default)]
pub struct Object {
    /// 对象 key，例如 `image/2024/01/a.png`
    pub name: String,
    pub content_type: String,
}

impl Object {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRes {
    pub key: String,
    pub url: String,
    pub size: u64,
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// 上传本地文件
    async fn upload(&self, object: &Object, local_path: &Path) -> CoreResult<UploadRes>;

    async fn upload_bytes(&self, object: &Object, content: &[u8]) -> CoreResult<UploadRes>;

    /// 上传 base64 内容，兼容 `data:image/png;base64,` 前缀
    async fn upload_base64(&self, object: &Object, content: &str) -> CoreResult<UploadRes> {
        let bytes = decode_base64_payload(content)?;
        self.upload_bytes(object, &bytes).await
    }

    async fn delete(&self, key: &str) -> CoreResult<()>;

    /// 完整访问地址
    fn object_url(&self, key: &str) -> String;
}

pub fn decode_base64_payload(content: &str) -> CoreResult<Vec<u8>> {
    let payload = match content.split_once(',') {
        Some((_, data)) => data,
        None => content,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| CoreError::BadRequest(format!("base64解码失败: {}", e)))
}

/// 本地文件系统存储
#[derive(Debug, Clone)]
pub struct LocalObjectClient {
    root_dir: PathBuf,
    base_url: String,
}

impl LocalObjectClient {
    pub fn new(root_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root_dir.clone(), config.base_url.clone())
    }

    /// 将 key 解析为根目录下的路径，只允许普通路径段
    pub fn resolve(&self, key: &str) -> CoreResult<PathBuf> {
        let key = key.trim_start_matches('/');
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(CoreError::BadRequest(format!("非法的对象路径: {}", key)));
        }
        Ok(self.root_dir.join(relative))
    }

    async fn prepare(&self, key: &str) -> CoreResult<PathBuf> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(path)
    }

    fn result(&self, key: &str, size: u64) -> UploadRes {
        UploadRes {
            key: key.trim_start_matches('/').to_string(),
            url: self.object_url(key),
            size,
        }
    }
}

#[async_trait]
impl ObjectClient for LocalObjectClient {
    async fn upload(&self, object: &Object, local_path: &Path) -> CoreResult<UploadRes> {
        let target = self.prepare(&object.name).await?;
        let size = tokio::fs::copy(local_path, &target).await?;
        info!("[Storage]上传文件 {} -> {}", local_path.display(), target.display());
        Ok(self.result(&object.name, size))
    }

    async fn upload_bytes(&self, object: &Object, content: &[u8]) -> CoreResult<UploadRes> {
        let target = self.prepare(&object.name).await?;
        tokio::fs::write(&target, content).await?;
        Ok(self.result(&object.name, content.len() as u64))
    }

    /// 文件不存在时视为删除成功
    async fn delete(&self, key: &str) -> CoreResult<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_upload_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalObjectClient::new(dir.path(), "https://cdn.example.com/");

        let object = Object::new("image/2024/a.txt", "text/plain");
        let res = client.upload_bytes(&object, b"hello").await.unwrap();
        assert_eq!(res.key, "image/2024/a.txt");
        assert_eq!(res.url, "https://cdn.example.com/image/2024/a.txt");
        assert_eq!(res.size, 5);
        assert_eq!(
            std::fs::read(dir.path().join("image/2024/a.txt")).unwrap(),
            b"hello"
        );

        client.delete("image/2024/a.txt").await.unwrap();
        assert!(!dir.path().join("image/2024/a.txt").exists());
        client.delete("image/2024/a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_local_file_and_base64() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, [1u8, 2, 3]).unwrap();

        let client = LocalObjectClient::new(dir.path().join("store"), "/files");
        let res = client
            .upload(&Object::new("file/source.bin", ""), &source)
            .await
            .unwrap();
        assert_eq!(res.size, 3);
        assert_eq!(res.url, "/files/file/source.bin");

        let res = client
            .upload_base64(&Object::new("b.txt", "text/plain"), "data:text/plain;base64,aGk=")
            .await
            .unwrap();
        assert_eq!(res.size, 2);
        assert_eq!(std::fs::read(dir.path().join("store/b.txt")).unwrap(), b"hi");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let client = LocalObjectClient::new("/tmp/store", "/files");
        assert!(client.resolve("../etc/passwd").is_err());
        assert!(client.resolve("a/../../b").is_err());
        assert!(client.resolve("").is_err());
        assert_eq!(
            client.resolve("/a/b.png").unwrap(),
            PathBuf::from("/tmp/store/a/b.png")
        );
    }

    #[test]
    fn test_decode_base64_payload() {
        assert_eq!(decode_base64_payload("aGk=").unwrap(), b"hi");
        assert!(matches!(
            decode_base64_payload("data:,@@@"),
            Err(CoreError::BadRequest(_))
        ));
    }
}
