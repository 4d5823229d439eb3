//! 素材资源模型

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::core::error::{CoreError, CoreResult};
use crate::db::page::Limit;
use crate::db::query::Filter;
use crate::utils::time::LocalTime;

pub const RESOURCE_TABLE: &str = "resource";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text", rename_all = "lowercase"))]
pub enum ResourceType {
    Video,
    Audio,
    Image,
    File,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Video => "video",
            ResourceType::Audio => "audio",
            ResourceType::Image => "image",
            ResourceType::File => "file",
        }
    }

    /// 根据 MIME 类型推断，未知类型归为文件
    pub fn from_mime(mime: &str) -> Self {
        let major = mime.split('/').next().unwrap_or_default().trim();
        match major.to_ascii_lowercase().as_str() {
            "video" => ResourceType::Video,
            "audio" => ResourceType::Audio,
            "image" => ResourceType::Image,
            _ => ResourceType::File,
        }
    }

    pub fn has_duration(&self) -> bool {
        matches!(self, ResourceType::Video | ResourceType::Audio)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Resource {
    pub id: i64,
    pub org_id: i64,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "database", sqlx(rename = "type"))]
    pub resource_type: ResourceType,
    /// 引用次数，为 0 时可删除
    pub take_num: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub attr: Value,
    pub created_at: Option<LocalTime>,
    pub updated_at: Option<LocalTime>,
    pub deleted_at: Option<LocalTime>,
}

impl Resource {
    pub fn check_org_id(&self, org_id: i64) -> CoreResult<()> {
        if self.org_id != org_id {
            return Err(CoreError::business("不允许跨组织操作素材"));
        }
        Ok(())
    }

    pub fn is_deletable(&self) -> bool {
        self.take_num == 0
    }

    pub fn video_attr(&self) -> CoreResult<VideoAttr> {
        self.attr_as()
    }

    pub fn audio_attr(&self) -> CoreResult<AudioAttr> {
        self.attr_as()
    }

    fn attr_as<T: DeserializeOwned + Default>(&self) -> CoreResult<T> {
        if self.attr.is_null() {
            return Ok(T::default());
        }
        Ok(serde_json::from_value(self.attr.clone())?)
    }

    /// 音视频时长，其它类型为 0
    pub fn duration(&self) -> i64 {
        if !self.resource_type.has_duration() {
            return 0;
        }
        match self.attr.get("duration") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or_default(),
            _ => 0,
        }
    }

    /// 删除前检查：引用次数为 0，视频未锁定
    pub fn check_deletable(&self) -> CoreResult<()> {
        if !self.is_deletable() {
            return Err(CoreError::business("素材已被引用，禁止删除"));
        }
        if self.resource_type == ResourceType::Video {
            self.video_attr()?.check_video_lock()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoAttr {
    /// 锁定时禁止删除
    pub lock: bool,
    pub cover: String,
    pub duration: i64,
    pub ratio: String,
    pub resource: Vec<VideoResource>,
}

impl VideoAttr {
    pub fn check_video_lock(&self) -> CoreResult<()> {
        if self.lock {
            return Err(CoreError::business("视频正在处理中，禁止删除"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioAttr {
    pub duration: i64,
}

/// 视频转码后的各清晰度文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoResource {
    pub name: String,
    pub ratio: String,
    pub path: String,
}

/// 素材列表查询参数
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceQuery {
    pub page: i64,
    pub size: i64,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub file_name: Option<String>,
}

impl ResourceQuery {
    pub fn limit(&self) -> Limit {
        Limit::new(self.page, self.size)
    }

    pub fn filter(&self, org_id: i64) -> Filter {
        Filter::new()
            .equal("org_id", org_id)
            .eq("type", self.resource_type.clone())
            .like(&["file_name"], self.file_name.as_deref().unwrap_or_default())
            .not_deleted("deleted_at")
    }
}
