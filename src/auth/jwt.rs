//! JWT 签发与校验
//!
//! 开启 `checkTk` 时签发会生成一张票据写入存储，校验时票据不一致即视为登录失效，
//! 同一账号重新登录会使旧 token 失效。

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::{CoreError, CoreResult};
use crate::utils::convert::md5;
use crate::utils::random::random_string;
use crate::utils::time::DAY_SECONDS;

/// 默认有效期（天）
pub const DEFAULT_DAYS: u32 = 90;
const TICKET_LEN: usize = 50;

/// 票据存储
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn save_ticket(&self, key: &str, tk: &str, ttl: Duration) -> CoreResult<()>;
    async fn load_ticket(&self, key: &str) -> CoreResult<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtTicket {
    pub key: String,
    pub tk: String,
}

/// token 载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtBody<T> {
    pub id: String,
    /// 有效期天数，0 表示默认 90 天
    #[serde(default)]
    pub day: u32,
    pub business: T,
    #[serde(rename = "checkTk", default)]
    pub check_tk: bool,
    #[serde(default)]
    pub ticket: Option<JwtTicket>,
}

impl<T> JwtBody<T> {
    pub fn new(id: impl Into<String>, business: T) -> Self {
        Self {
            id: id.into(),
            day: 0,
            business,
            check_tk: false,
            ticket: None,
        }
    }

    pub fn check_tk(mut self, check: bool) -> Self {
        self.check_tk = check;
        self
    }

    pub fn day(mut self, day: u32) -> Self {
        self.day = day;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims<T> {
    #[serde(flatten)]
    body: JwtBody<T>,
    exp: i64,
}

pub struct JwtApi<T> {
    secret: String,
    tickets: Option<Arc<dyn TicketStore>>,
    _business: PhantomData<fn() -> T>,
}

impl<T> JwtApi<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(secret: impl Into<String>, tickets: Option<Arc<dyn TicketStore>>) -> Self {
        Self {
            secret: secret.into(),
            tickets,
            _business: PhantomData,
        }
    }

    fn ticket_store(&self) -> CoreResult<&Arc<dyn TicketStore>> {
        self.tickets
            .as_ref()
            .ok_or_else(|| CoreError::internal("未配置JWT票据存储"))
    }

    /// 票据 key：`md5(secret + id)`
    pub fn ticket_key(&self, id: &str) -> String {
        md5(&format!("{}{}", self.secret, id))
    }

    /// 签发 token，返回 token 与过期时间戳
    pub async fn issued(&self, mut body: JwtBody<T>) -> CoreResult<(String, i64)> {
        if body.day == 0 {
            body.day = DEFAULT_DAYS;
        }
        let ttl = DAY_SECONDS * body.day as i64;
        let exp = chrono::Utc::now().timestamp() + ttl;

        if body.check_tk {
            let ticket = JwtTicket {
                key: self.ticket_key(&body.id),
                tk: random_string(TICKET_LEN),
            };
            self.ticket_store()?
                .save_ticket(&ticket.key, &ticket.tk, Duration::from_secs(ttl as u64))
                .await?;
            body.ticket = Some(ticket);
        }

        let claims = Claims { body, exp };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok((token, exp))
    }

    /// 校验 token，签名错误、过期或票据失效都返回认证错误
    pub async fn check(&self, token: &str) -> CoreResult<JwtBody<T>> {
        let data = decode::<Claims<T>>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        let body = data.claims.body;

        if body.check_tk {
            let ticket = body
                .ticket
                .as_ref()
                .ok_or_else(|| CoreError::Auth("登录已失效".to_string()))?;
            let stored = self.ticket_store()?.load_ticket(&ticket.key).await?;
            if stored.as_deref() != Some(ticket.tk.as_str()) {
                return Err(CoreError::Auth("登录已失效".to_string()));
            }
        }
        Ok(body)
    }
}
