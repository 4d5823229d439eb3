//! 金额转中文大写

use crate::core::error::{CoreError, CoreResult};

const CN_NUMS: [&str; 10] = ["零", "壹", "贰", "叁", "肆", "伍", "陆", "柒", "捌", "玖"];
const CN_INT_UNITS: [&str; 4] = ["", "拾", "佰", "仟"];
const CN_INT_RADICE: [&str; 4] = ["", "万", "亿", "兆"];

/// 金额字符串转大写，如 `1001.5` 转为 `壹仟零壹点伍元`
pub fn money_to_chinese(number: &str) -> CoreResult<String> {
    let number = number.trim();
    let (integer_part, decimal_part) = number.split_once('.').unwrap_or((number, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (integer_part.is_empty() && decimal_part.is_empty())
        || !is_digits(integer_part)
        || !is_digits(decimal_part)
    {
        return Err(CoreError::BadRequest(format!("金额格式不正确: {}", number)));
    }

    let integer_part = integer_part.trim_start_matches('0');
    if integer_part.len() > CN_INT_UNITS.len() * CN_INT_RADICE.len() {
        return Err(CoreError::BadRequest(format!("金额超出范围: {}", number)));
    }

    let mut result = String::new();
    if integer_part.is_empty() {
        result.push_str(CN_NUMS[0]);
    }
    let len = integer_part.len();
    let mut zero = false;
    let mut section_has_digit = false;
    for (i, b) in integer_part.bytes().enumerate() {
        let pos = len - i - 1;
        let num = (b - b'0') as usize;
        if num == 0 {
            zero = true;
        } else {
            if zero {
                result.push_str(CN_NUMS[0]);
                zero = false;
            }
            result.push_str(CN_NUMS[num]);
            result.push_str(CN_INT_UNITS[pos % 4]);
            section_has_digit = true;
        }
        if pos % 4 == 0 {
            if section_has_digit {
                result.push_str(CN_INT_RADICE[pos / 4]);
            }
            section_has_digit = false;
        }
    }

    if !decimal_part.is_empty() {
        result.push('点');
        for b in decimal_part.bytes() {
            result.push_str(CN_NUMS[(b - b'0') as usize]);
        }
    }
    result.push('元');
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_to_chinese() {
        assert_eq!(money_to_chinese("1234").unwrap(), "壹仟贰佰叁拾肆元");
        assert_eq!(money_to_chinese("1234.56").unwrap(), "壹仟贰佰叁拾肆点伍陆元");
        assert_eq!(money_to_chinese("1001").unwrap(), "壹仟零壹元");
        assert_eq!(money_to_chinese("100000").unwrap(), "壹拾万元");
        assert_eq!(money_to_chinese("100001").unwrap(), "壹拾万零壹元");
        assert_eq!(money_to_chinese("100000000").unwrap(), "壹亿元");
        assert_eq!(money_to_chinese("0.5").unwrap(), "零点伍元");
        assert_eq!(money_to_chinese("0").unwrap(), "零元");
    }

    #[test]
    fn test_invalid_money() {
        assert!(money_to_chinese("").is_err());
        assert!(money_to_chinese("12a").is_err());
        assert!(money_to_chinese("1.2.3").is_err());
        assert!(money_to_chinese("12345678901234567").is_err());
    }
}
