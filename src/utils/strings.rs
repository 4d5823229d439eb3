//! 字符串工具

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::core::error::{CoreError, CoreResult};

pub const MALE: &str = "男";
pub const FEMALE: &str = "女";

/// 包含任意一个非空子串
pub fn contains_or<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    needles
        .iter()
        .map(AsRef::as_ref)
        .any(|n| !n.is_empty() && haystack.contains(n))
}

/// 包含所有非空子串
pub fn contains_and<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    needles
        .iter()
        .map(AsRef::as_ref)
        .all(|n| n.is_empty() || haystack.contains(n))
}

pub fn starts_with_any<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    needles.iter().any(|n| haystack.starts_with(n.as_ref()))
}

pub fn ends_with_any<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    needles.iter().any(|n| haystack.ends_with(n.as_ref()))
}

/// 按字符截取，越界部分自动截断
pub fn substr(s: &str, start: usize, length: usize) -> String {
    s.chars().skip(start).take(length).collect()
}

/// 身份证信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdCardInfo {
    pub id_card: String,
    /// 6 位行政区划代码
    pub region_code: String,
    /// `YYYY-MM-DD`
    pub birthday: String,
    /// 精确到月份的年龄
    pub age: i32,
    /// 按年份计算的年龄
    pub uniform_age: i32,
    pub gender: &'static str,
}

/// 解析 18 位身份证号，`today` 用于计算年龄
pub fn id_card(id: &str, today: NaiveDate) -> CoreResult<IdCardInfo> {
    let bytes = id.as_bytes();
    if bytes.len() != 18 {
        return Err(CoreError::business("身份证号长度不正确"));
    }
    let valid = bytes[..17].iter().all(u8::is_ascii_digit)
        && (bytes[17].is_ascii_digit() || bytes[17] == b'X' || bytes[17] == b'x');
    if !valid {
        return Err(CoreError::business("身份证号格式不正确"));
    }

    let number = |range: std::ops::Range<usize>| -> i32 {
        id[range].parse().unwrap_or_default()
    };
    let year = number(6..10);
    let month = number(10..12) as u32;
    let uniform_age = today.year() - year;
    let age = if today.month() < month {
        uniform_age - 1
    } else {
        uniform_age
    };
    let gender = if (bytes[16] - b'0') % 2 == 0 {
        FEMALE
    } else {
        MALE
    };

    Ok(IdCardInfo {
        id_card: id.to_string(),
        region_code: id[..6].to_string(),
        birthday: format!("{}-{}-{}", &id[6..10], &id[10..12], &id[12..14]),
        age,
        uniform_age,
        gender,
    })
}

/// 字节数转为可读文本，如 `1.50 KB`
pub fn format_bytes(size: i64, precision: usize) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut value = size as f64;
    let mut i = 0;
    while value >= 1024.0 && i < UNITS.len() - 1 {
        value /= 1024.0;
        i += 1;
    }
    format!("{:.*} {}", precision, value, UNITS[i])
}

/// 手机号中间四位加星
pub fn mask_mobile(mobile: &str) -> CoreResult<String> {
    if mobile.len() != 11 || !mobile.is_ascii() {
        return Err(CoreError::business("手机号必须为11位"));
    }
    Ok(format!("{}****{}", &mobile[..3], &mobile[7..]))
}

/// 姓名加星，保留首尾字符；两个字只保留首字
pub fn mask_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    match chars.len() {
        0 => String::new(),
        1 => "*".to_string(),
        2 => format!("{}*", chars[0]),
        n => format!("{}{}{}", chars[0], "*".repeat(n - 2), chars[n - 1]),
    }
}
