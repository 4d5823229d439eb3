//! 逗号分隔的 ID 字段编解码
//!
//! 数据库中以 `1,2,3` 形式的 TEXT 存储，JSON 中表现为数组。

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{CoreError, CoreResult};

fn split_parse<T: FromStr>(text: &str) -> CoreResult<Vec<T>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|item| {
            item.trim()
                .parse::<T>()
                .map_err(|_| CoreError::BadRequest(format!("无效的ID值: {}", item)))
        })
        .collect()
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

macro_rules! comma_ids {
    ($(#[$meta:meta])* $name:ident, $item:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Vec<$item>);

        impl $name {
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn contains(&self, value: &$item) -> bool {
                self.0.contains(value)
            }

            pub fn into_inner(self) -> Vec<$item> {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                join(f, &self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                split_parse(s).map($name)
            }
        }

        impl From<Vec<$item>> for $name {
            fn from(value: Vec<$item>) -> Self {
                $name(value)
            }
        }

        #[cfg(feature = "database")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "database")]
        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <String as sqlx::Encode<sqlx::Postgres>>::encode(self.to_string(), buf)
            }
        }

        #[cfg(feature = "database")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(text.parse()?)
            }
        }
    };
}

comma_ids!(
    /// 有符号整数 ID 列表
    IntIds,
    i64
);

comma_ids!(
    /// 无符号整数 ID 列表
    UintIds,
    u64
);

comma_ids!(
    /// 字符串列表
    StringSlice,
    String
);

/// 查询参数中的逗号分隔文本，如 `a,b,c`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextString(pub String);

impl TextString {
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }
        self.0.split(',').map(|s| s.trim().to_string()).collect()
    }
}

/// 查询参数中的逗号分隔整数，如 `1,2,3`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntString(pub String);

impl IntString {
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn to_vec(&self) -> CoreResult<Vec<i64>> {
        split_parse(&self.0)
    }

    pub fn to_uint_vec(&self) -> CoreResult<Vec<u64>> {
        split_parse(&self.0)
    }
}

/// 查询参数中的逗号分隔布尔值，支持 `true/false/1/0`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoolString(pub String);

impl BoolString {
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn to_vec(&self) -> CoreResult<Vec<bool>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        self.0
            .split(',')
            .map(|item| match item.trim() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                other => Err(CoreError::BadRequest(format!("无效的布尔值: {}", other))),
            })
            .collect()
    }
}

/// JSON 列包装，读写时整体序列化
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonObject<T>(pub T);

impl<T: Serialize> JsonObject<T> {
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl<T: DeserializeOwned> JsonObject<T> {
    pub fn from_json(text: &str) -> CoreResult<Self> {
        Ok(JsonObject(serde_json::from_str(text)?))
    }
}

#[cfg(feature = "database")]
impl<T> sqlx::Type<sqlx::Postgres> for JsonObject<T> {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <sqlx::types::JsonValue as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <sqlx::types::JsonValue as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "database")]
impl<T: Serialize> sqlx::Encode<'_, sqlx::Postgres> for JsonObject<T> {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <sqlx::types::Json<&T> as sqlx::Encode<sqlx::Postgres>>::encode(
            sqlx::types::Json(&self.0),
            buf,
        )
    }
}

#[cfg(feature = "database")]
impl<'r, T: DeserializeOwned> sqlx::Decode<'r, sqlx::Postgres> for JsonObject<T> {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let sqlx::types::Json(inner) =
            <sqlx::types::Json<T> as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(JsonObject(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let ids: IntIds = "3, -1,7".parse().unwrap();
        assert_eq!(ids.0, vec![3, -1, 7]);
        assert_eq!(ids.to_string(), "3,-1,7");

        let empty: UintIds = "".parse().unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.to_string(), "");

        assert!("1,x".parse::<UintIds>().is_err());
    }

    #[test]
    fn test_json_as_array() {
        let ids = UintIds(vec![1, 2]);
        assert_eq!(serde_json::to_string(&ids).unwrap(), "[1,2]");
        let back: StringSlice = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(back.to_string(), "a,b");
    }

    #[test]
    fn test_query_strings() {
        assert_eq!(TextString("a, b".into()).to_vec(), vec!["a", "b"]);
        assert!(TextString(" ".into()).to_vec().is_empty());
        assert_eq!(IntString("1,2".into()).to_vec().unwrap(), vec![1, 2]);
        assert_eq!(
            BoolString("1,false".into()).to_vec().unwrap(),
            vec![true, false]
        );
        assert!(BoolString("yes".into()).to_vec().is_err());
    }

    #[test]
    fn test_json_object() {
        let obj = JsonObject(vec![1, 2, 3]);
        let text = obj.to_json().unwrap();
        assert_eq!(text, "[1,2,3]");
        let back: JsonObject<Vec<i32>> = JsonObject::from_json(&text).unwrap();
        assert_eq!(back, obj);
    }
}
