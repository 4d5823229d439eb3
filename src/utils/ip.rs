//! IP 归属地查询

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::CoreResult;
use crate::infrastructure::http_client::{HttpClient, RequestOption};

pub const UNKNOWN_COUNTRY: &str = "未知区域";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpInfo {
    pub ip: String,
    pub country: String,
    pub area: String,
}

/// 请求 `{server_url}/?ip={ip}`，响应以 ip 为 key
pub async fn get_ip_info(client: &HttpClient, server_url: &str, ip: &str) -> CoreResult<IpInfo> {
    let url = format!("{}/?ip={}", server_url.trim_end_matches('/'), ip);
    let body = client.get(&url, &RequestOption::default()).await?;
    parse_ip_info(&body, ip)
}

pub fn parse_ip_info(body: &[u8], ip: &str) -> CoreResult<IpInfo> {
    let result: Value = serde_json::from_slice(body)?;
    let mut info: IpInfo = match result.get(ip) {
        Some(entry) => serde_json::from_value(entry.clone())?,
        None => IpInfo::default(),
    };
    if info.ip.is_empty() {
        info.ip = ip.to_string();
    }
    if info.country.is_empty() {
        info.country = UNKNOWN_COUNTRY.to_string();
    }
    Ok(info)
}
