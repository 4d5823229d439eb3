//! 随机字符串与单号

use chrono::Local;
use rand::{distributions::Alphanumeric, Rng};

use crate::core::error::{CoreError, CoreResult};

const ORDER_TIME_FORMAT: &str = "%Y%m%d%H%M%S";
const ORDER_TIME_LEN: usize = 14;

pub fn uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 大小写字母与数字组成的随机串
pub fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// 纯数字随机串
pub fn random_number(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// 时间 + 随机数组成的单号，`exists` 返回 true 时重新生成
pub fn order_no(length: usize, exists: Option<&dyn Fn(&str) -> bool>) -> CoreResult<String> {
    order_no_prefix("", length, exists)
}

/// 带前缀的单号，`length` 不含前缀长度
pub fn order_no_prefix(
    prefix: &str,
    length: usize,
    exists: Option<&dyn Fn(&str) -> bool>,
) -> CoreResult<String> {
    if length <= ORDER_TIME_LEN {
        return Err(CoreError::business("编号长度不少于15位"));
    }
    loop {
        let no = format!(
            "{}{}{}",
            prefix,
            Local::now().format(ORDER_TIME_FORMAT),
            random_number(length - ORDER_TIME_LEN)
        )
        .to_uppercase();
        match exists {
            Some(check) if check(&no) => continue,
            _ => return Ok(no),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_random() {
        let s = random_string(50);
        assert_eq!(s.len(), 50);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        let n = random_number(8);
        assert_eq!(n.len(), 8);
        assert!(n.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(uuid().len(), 36);
    }

    #[test]
    fn test_order_no() {
        let no = order_no(18, None).unwrap();
        assert_eq!(no.len(), 18);
        assert!(no.chars().all(|c| c.is_ascii_digit()));
        assert!(order_no(14, None).is_err());
    }

    #[test]
    fn test_order_no_prefix_retries() {
        let calls = Cell::new(0);
        let exists = |_: &str| {
            calls.set(calls.get() + 1);
            calls.get() < 3
        };
        let no = order_no_prefix("ab", 16, Some(&exists)).unwrap();
        assert!(no.starts_with("AB"));
        assert_eq!(no.len(), 18);
        assert_eq!(calls.get(), 3);
    }
}
