//! 本地文件工具

use axum::extract::Multipart;
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::core::error::{CoreError, CoreResult};
use crate::utils::time::DATE_FORMAT;

/// 上传文件的字段名
pub const UPLOAD_FIELD: &str = "file";

/// 上传文件信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub mimetype: String,
    /// 带点的扩展名，如 `.png`
    pub extension: String,
    pub size: u64,
    pub realpath: String,
}

/// 目录不存在时创建
pub fn mkdir(dir: impl AsRef<Path>) -> CoreResult<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|e| CoreError::internal(format!("创建目录失败：{}", e)))?;
    Ok(dir.to_path_buf())
}

pub fn save_file(dir: impl AsRef<Path>, file_name: &str, data: &[u8]) -> CoreResult<PathBuf> {
    let target = dir.as_ref().join(file_name);
    std::fs::write(&target, data)
        .map_err(|e| CoreError::internal(format!("保存文件失败：{}", e)))?;
    Ok(target)
}

pub fn read_file_string(path: impl AsRef<Path>) -> CoreResult<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// 存在且不是目录
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// 安全路径不以 `/` 开头且不包含 `..`
pub fn check_file_path(path: &str) -> bool {
    !path.contains("..") && !path.starts_with('/')
}

fn dated_dir(root: &Path) -> PathBuf {
    root.join(Local::now().format(DATE_FORMAT).to_string())
}

/// 复制到 `dst_dir/当天日期/` 下，使用随机文件名并保留扩展名
pub fn file_copy(src: impl AsRef<Path>, dst_dir: impl AsRef<Path>) -> CoreResult<PathBuf> {
    let src = src.as_ref();
    let dir = mkdir(dated_dir(dst_dir.as_ref()))?;
    let target = dir.join(format!("{}{}", uuid::Uuid::new_v4(), extension(src)));
    std::fs::copy(src, &target)?;
    Ok(target)
}

/// 删除相对路径文件，`show_err` 为 false 时忽略删除失败
pub fn file_delete(path: &str, show_err: bool) -> CoreResult<()> {
    if !file_exists(path) || !check_file_path(path) {
        return Ok(());
    }
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if show_err => Err(CoreError::internal(format!("删除文件失败：{}", e))),
        Err(e) => {
            warn!("删除文件失败 {}: {}", path, e);
            Ok(())
        }
    }
}

/// 带点的扩展名，没有扩展名时为空串
pub fn extension(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// 文件名（带扩展名）
pub fn file_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 文件名（不带扩展名）
pub fn file_stem(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `a/test.docx` 改为 `a/test.pdf`，`new_ext` 不带点
pub fn modify_path_ext_name(path: impl AsRef<Path>, new_ext: &str) -> PathBuf {
    path.as_ref().with_extension(new_ext)
}

/// 读取 multipart 中的 `file` 字段，保存到 `root/当天日期/` 下
pub async fn file_upload(root: impl AsRef<Path>, multipart: &mut Multipart) -> CoreResult<FileInfo> {
    let dir = dated_dir(root.as_ref());
    save_upload(multipart, |ext| dir.join(format!("{}{}", uuid::Uuid::new_v4(), ext))).await
}

/// 读取 multipart 中的 `file` 字段，以指定名称保存到 `dir` 下
pub async fn file_upload_set_name(
    dir: impl AsRef<Path>,
    name: &str,
    multipart: &mut Multipart,
) -> CoreResult<FileInfo> {
    let dir = dir.as_ref();
    save_upload(multipart, |ext| dir.join(format!("{}{}", name, ext))).await
}

async fn save_upload<F>(multipart: &mut Multipart, target: F) -> CoreResult<FileInfo>
where
    F: FnOnce(&str) -> PathBuf,
{
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::BadRequest(format!("读取上传文件失败: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let mimetype = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| CoreError::BadRequest(format!("读取上传文件失败: {}", e)))?;

        let ext = extension(&name);
        let path = target(&ext);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;

        return Ok(FileInfo {
            name,
            mimetype,
            extension: ext,
            size: data.len() as u64,
            realpath: path.to_string_lossy().replace('\\', "/"),
        });
    }
    Err(CoreError::BadRequest("未找到上传文件".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_copy_delete() {
        let dir = tempfile::tempdir().unwrap();
        let nested = mkdir(dir.path().join("a/b")).unwrap();
        let saved = save_file(&nested, "x.txt", b"hello").unwrap();
        assert!(file_exists(&saved));
        assert!(!file_exists(&nested));
        assert_eq!(read_file_string(&saved).unwrap(), "hello");

        let copied = file_copy(&saved, dir.path().join("copy")).unwrap();
        assert_eq!(extension(&copied), ".txt");
        assert_eq!(
            file_name(copied.parent().unwrap()),
            Local::now().format(DATE_FORMAT).to_string()
        );
        assert_eq!(std::fs::read(&copied).unwrap(), b"hello");
    }

    #[test]
    fn test_file_delete_rejects_unsafe_paths() {
        assert!(check_file_path("uploads/a.png"));
        assert!(!check_file_path("/etc/passwd"));
        assert!(!check_file_path("uploads/../a.png"));
        assert!(file_delete("/definitely/not/here.txt", true).is_ok());
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(extension("a/b/report.pdf"), ".pdf");
        assert_eq!(extension("a/b/README"), "");
        assert_eq!(file_name("a/b/report.pdf"), "report.pdf");
        assert_eq!(file_stem("a/b/report.pdf"), "report");
        assert_eq!(
            modify_path_ext_name("a/test.docx", "pdf"),
            PathBuf::from("a/test.pdf")
        );
    }
}
