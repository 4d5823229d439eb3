//! 序列化、摘要与数值格式化

use ::md5::Md5;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::core::error::CoreResult;

pub fn json_to_string<T: Serialize + ?Sized>(data: &T) -> CoreResult<String> {
    Ok(serde_json::to_string(data)?)
}

pub fn string_to_json<T: DeserializeOwned>(data: &str) -> CoreResult<T> {
    Ok(serde_json::from_str(data)?)
}

/// 经 JSON 中转，把一种结构转换为另一种结构
pub fn custom_output<I, O>(input: &I) -> CoreResult<O>
where
    I: Serialize + ?Sized,
    O: DeserializeOwned,
{
    Ok(serde_json::from_value(serde_json::to_value(input)?)?)
}

/// 小写十六进制 MD5
pub fn md5(text: &str) -> String {
    hex::encode(Md5::digest(text.as_bytes()))
}

pub fn sha256(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// 保留两位小数
pub fn to_decimal(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 金额保留两位小数
pub fn to_money(value: f64) -> f64 {
    to_decimal(value)
}

/// `0.1234` 转为 `12%`
pub fn to_percent_string(value: f64) -> String {
    format!("{}%", (value * 100.0).round())
}

/// 解析失败返回 0
pub fn to_i64(text: &str) -> i64 {
    text.trim().parse().unwrap_or_default()
}

pub fn to_f64(text: &str) -> f64 {
    text.trim().parse().unwrap_or_default()
}

/// `1`/`true`/`yes` 为真，其余为假
pub fn to_bool(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "t" | "y"
    )
}

const CN_DIGITS: [&str; 10] = ["零", "一", "二", "三", "四", "五", "六", "七", "八", "九"];
const CN_UNITS: [&str; 4] = ["", "十", "百", "千"];
const CN_SECTIONS: [&str; 5] = ["", "万", "亿", "万亿", "亿亿"];

fn section_to_chinese(mut section: u64) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut zero = false;
    let mut pos = 0;
    while section > 0 {
        let digit = (section % 10) as usize;
        if digit == 0 {
            if !parts.is_empty() && !zero {
                zero = true;
                parts.push(CN_DIGITS[0].to_string());
            }
        } else {
            zero = false;
            parts.push(format!("{}{}", CN_DIGITS[digit], CN_UNITS[pos]));
        }
        pos += 1;
        section /= 10;
    }
    parts.reverse();
    parts.concat()
}

/// 阿拉伯数字转中文数字，如 `1010` 转为 `一千零一十`
pub fn number_to_chinese(number: i64) -> String {
    if number == 0 {
        return CN_DIGITS[0].to_string();
    }
    let mut rest = number.unsigned_abs();
    let mut sections = Vec::new();
    while rest > 0 {
        sections.push(rest % 10000);
        rest /= 10000;
    }

    let mut result = String::new();
    let highest = sections.len() - 1;
    for (i, section) in sections.iter().enumerate().rev() {
        if *section == 0 {
            continue;
        }
        if i < highest && *section < 1000 && !result.ends_with(CN_DIGITS[0]) {
            result.push_str(CN_DIGITS[0]);
        }
        result.push_str(&section_to_chinese(*section));
        result.push_str(CN_SECTIONS[i]);
    }

    if (10..20).contains(&number.unsigned_abs()) {
        result = result.trim_start_matches(CN_DIGITS[1]).to_string();
    }
    if number < 0 {
        result.insert_str(0, "负");
    }
    result
}
