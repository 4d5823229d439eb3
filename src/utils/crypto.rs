//! AES-CTR 文本加解密与 base64 工具
//!
//! 密文格式：`URL_SAFE_BASE64(iv || ciphertext)`，密钥为标准 base64 编码的 16/24/32 字节。

use aes::{Aes128, Aes192, Aes256};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine,
};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::{rngs::OsRng, RngCore};

use crate::core::error::{CoreError, CoreResult};

const BLOCK_SIZE: usize = 16;
const DEFAULT_KEY_SIZE: usize = 16;

/// 生成随机密钥，`size` 为 0 时默认 16 字节
pub fn generate_random_key(size: usize) -> String {
    let size = if size == 0 { DEFAULT_KEY_SIZE } else { size };
    let mut key = vec![0u8; size];
    OsRng.fill_bytes(&mut key);
    STANDARD.encode(key)
}

fn xor_stream<C: KeyIvInit + StreamCipher>(key: &[u8], iv: &[u8], data: &mut [u8]) -> CoreResult<()> {
    let mut cipher = C::new_from_slices(key, iv)
        .map_err(|e| CoreError::BadRequest(format!("密钥长度不正确: {}", e)))?;
    cipher.apply_keystream(data);
    Ok(())
}

fn apply_ctr(key: &[u8], iv: &[u8], data: &mut [u8]) -> CoreResult<()> {
    match key.len() {
        16 => xor_stream::<ctr::Ctr128BE<Aes128>>(key, iv, data),
        24 => xor_stream::<ctr::Ctr128BE<Aes192>>(key, iv, data),
        32 => xor_stream::<ctr::Ctr128BE<Aes256>>(key, iv, data),
        n => Err(CoreError::BadRequest(format!("密钥长度不正确: {}", n))),
    }
}

fn decode_key(secret: &str) -> CoreResult<Vec<u8>> {
    STANDARD
        .decode(secret)
        .map_err(|e| CoreError::BadRequest(format!("密钥格式不正确: {}", e)))
}

pub fn text_encrypt(plaintext: &str, secret: &str) -> CoreResult<String> {
    let key = decode_key(secret)?;
    let mut buf = vec![0u8; BLOCK_SIZE + plaintext.len()];
    let (iv, body) = buf.split_at_mut(BLOCK_SIZE);
    OsRng.fill_bytes(iv);
    body.copy_from_slice(plaintext.as_bytes());
    apply_ctr(&key, iv, body)?;
    Ok(URL_SAFE.encode(buf))
}

pub fn text_decrypt(ciphertext: &str, secret: &str) -> CoreResult<String> {
    let key = decode_key(secret)?;
    let mut buf = URL_SAFE
        .decode(ciphertext)
        .map_err(|e| CoreError::BadRequest(format!("密文格式不正确: {}", e)))?;
    if buf.len() < BLOCK_SIZE {
        return Err(CoreError::BadRequest("密文格式不正确".to_string()));
    }
    let (iv, body) = buf.split_at_mut(BLOCK_SIZE);
    apply_ctr(&key, iv, body)?;
    String::from_utf8(body.to_vec())
        .map_err(|_| CoreError::BadRequest("解密结果不是有效文本".to_string()))
}

pub fn base64_encode(text: &str) -> String {
    STANDARD.encode(text)
}

pub fn base64_decode(text: &str) -> CoreResult<String> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|e| CoreError::BadRequest(format!("base64解码失败: {}", e)))?;
    String::from_utf8(bytes).map_err(|_| CoreError::BadRequest("base64内容不是有效文本".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_key() {
        let key = STANDARD.decode(generate_random_key(0)).unwrap();
        assert_eq!(key.len(), 16);
        let key = STANDARD.decode(generate_random_key(32)).unwrap();
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn test_encrypt_decrypt() {
        for size in [16, 24, 32] {
            let secret = generate_random_key(size);
            let encrypted = text_encrypt("你好, world", &secret).unwrap();
            assert_ne!(encrypted, text_encrypt("你好, world", &secret).unwrap());
            assert_eq!(text_decrypt(&encrypted, &secret).unwrap(), "你好, world");
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let bad_key = STANDARD.encode([0u8; 10]);
        assert!(text_encrypt("a", &bad_key).is_err());
        let secret = generate_random_key(16);
        assert!(text_decrypt("AAAA", &secret).is_err());
        assert!(text_decrypt("not base64!", &secret).is_err());
    }

    #[test]
    fn test_base64() {
        assert_eq!(base64_encode("hi"), "aGk=");
        assert_eq!(base64_decode("aGk=").unwrap(), "hi");
        assert!(base64_decode("@@").is_err());
    }
}
