//! 认证：JWT 签发与校验

pub mod jwt;
