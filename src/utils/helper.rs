//! 杂项业务工具

use serde::{Deserialize, Serialize};

use crate::core::error::{CoreError, CoreResult};
use crate::utils::convert::md5;

const EARTH_RADIUS_KM: f64 = 6370.996;

/// 增长率百分比，保留两位小数；过去值为 0 时返回 `-`
pub fn compute_grow_rate(now: f64, prev: f64) -> String {
    if now == prev {
        "0.00".to_string()
    } else if prev == 0.0 {
        "-".to_string()
    } else {
        format!("{:.2}", (now - prev) / prev * 100.0)
    }
}

/// 经纬度坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lng: f64,
    pub lat: f64,
}

impl Location {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// 两点间球面距离，`km` 为 false 时单位为米，`decimal` 为保留小数位数
pub fn distance(from: Location, to: Location, km: bool, decimal: i32) -> f64 {
    let from_lat = from.lat.to_radians();
    let to_lat = to.lat.to_radians();
    let d_lat = to_lat - from_lat;
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + from_lat.cos() * to_lat.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    let mut result = EARTH_RADIUS_KM * c * 1000.0;
    if km {
        result /= 1000.0;
    }
    let factor = 10f64.powi(decimal);
    (result * factor).round() / factor
}

/// `md5(md5(text) + salt)`
pub fn password_to_cipher(text: &str, salt: &str) -> String {
    md5(&format!("{}{}", md5(text), salt))
}

/// 密码强度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordLevel {
    /// 只校验长度
    Simple,
    /// 任意两种字符组合
    Medium,
    /// 数字、大写字母、小写字母、特殊符号四种都要有
    Complex,
}

pub fn password_strength(password: &str, level: PasswordLevel) -> CoreResult<()> {
    let length = password.chars().count();
    if !(6..=18).contains(&length) {
        return Err(CoreError::business("密码长度需符合6-18个字符长度要求"));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    let kinds = [has_digit, has_upper, has_lower, has_special]
        .iter()
        .filter(|k| **k)
        .count();

    match level {
        PasswordLevel::Medium if kinds < 2 => Err(CoreError::business(
            "密码需满足两种以上的字符组合（数字、大写字母、小写字母、特殊符号）",
        )),
        PasswordLevel::Complex if kinds < 4 => Err(CoreError::business(
            "密码需满足四种字符组合（数字、大写字母、小写字母、特殊符号）",
        )),
        _ => Ok(()),
    }
}

/// 版本号自增，每段逢十进一，空串返回 `1.0.0`
pub fn increment_version(version: &str) -> CoreResult<String> {
    if version.is_empty() {
        return Ok("1.0.0".to_string());
    }
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 {
        return Err(CoreError::BadRequest(
            "版本号格式不正确，应为 major.minor.patch".to_string(),
        ));
    }
    let parse = |name: &str, text: &str| -> CoreResult<u32> {
        text.parse()
            .map_err(|e| CoreError::BadRequest(format!("{}版本号不正确: {}", name, e)))
    };
    let mut major = parse("major", parts[0])?;
    let mut minor = parse("minor", parts[1])?;
    let mut patch = parse("patch", parts[2])?;

    patch += 1;
    if patch >= 10 {
        patch = 0;
        minor += 1;
        if minor >= 10 {
            minor = 0;
            major += 1;
        }
    }
    Ok(format!("{}.{}.{}", major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_rate() {
        assert_eq!(compute_grow_rate(5.0, 5.0), "0.00");
        assert_eq!(compute_grow_rate(5.0, 0.0), "-");
        assert_eq!(compute_grow_rate(15.0, 10.0), "50.00");
        assert_eq!(compute_grow_rate(5.0, 10.0), "-50.00");
    }

    #[test]
    fn test_distance() {
        let a = Location::new(116.397_128, 39.916_527);
        assert_eq!(distance(a, a, false, 2), 0.0);

        // 经度相差一度（赤道）约 111.19 公里
        let from = Location::new(0.0, 0.0);
        let to = Location::new(1.0, 0.0);
        assert_eq!(distance(from, to, true, 0), 111.0);
        assert_eq!(distance(from, to, true, 0), distance(to, from, true, 0));
    }

    #[test]
    fn test_password() {
        assert_eq!(password_to_cipher("123456", ""), md5("e10adc3949ba59abbe56e057f20f883e"));
        assert!(password_strength("abc", PasswordLevel::Simple).is_err());
        assert!(password_strength("abcdef", PasswordLevel::Simple).is_ok());
        assert!(password_strength("abcdef", PasswordLevel::Medium).is_err());
        assert!(password_strength("abc123", PasswordLevel::Medium).is_ok());
        assert!(password_strength("abc123", PasswordLevel::Complex).is_err());
        assert!(password_strength("Abc12#", PasswordLevel::Complex).is_ok());
    }

    #[test]
    fn test_increment_version() {
        assert_eq!(increment_version("").unwrap(), "1.0.0");
        assert_eq!(increment_version("1.0.0").unwrap(), "1.0.1");
        assert_eq!(increment_version("1.0.9").unwrap(), "1.1.0");
        assert_eq!(increment_version("1.9.9").unwrap(), "2.0.0");
        assert!(increment_version("1.0").is_err());
        assert!(increment_version("a.0.0").is_err());
    }
}
