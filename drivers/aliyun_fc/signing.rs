//! Function Compute request signing / 函数计算请求签名
//!
//! StringToSign = VERB + "\n" + Content-MD5 + "\n" + Content-Type + "\n"
//!              + Date + "\n" + CanonicalizedFCHeaders + CanonicalizedResource
//!
//! Authorization: `FC <AccessKeyId>:<base64(hmac-sha256(secret, StringToSign))>`

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{GatewayError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Prefix of headers that take part in the signature / 参与签名的头部前缀
pub const FC_HEADER_PREFIX: &str = "x-fc-";

/// Everything the signature covers / 参与签名的请求要素
#[derive(Debug, Clone)]
pub struct SignedParts<'a> {
    pub method: &'a str,
    pub content_md5: &'a str,
    pub content_type: &'a str,
    pub date: &'a str,
    /// All request headers; only `x-fc-*` are used / 请求头（仅使用x-fc-*）
    pub headers: &'a [(String, String)],
    /// Unescaped path, including the api version / 未转义的路径
    pub path: &'a str,
    pub query: &'a [(String, String)],
}

/// HTTP date used by the `Date` header / HTTP日期格式
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// base64(md5(body)), empty for bodiless requests / 计算Content-MD5
pub fn content_md5(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    BASE64.encode(md5::compute(body).0)
}

fn canonical_headers(headers: &[(String, String)]) -> String {
    let mut fc_headers: Vec<(String, &str)> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim()))
        .filter(|(k, _)| k.starts_with(FC_HEADER_PREFIX))
        .collect();
    fc_headers.sort();
    fc_headers.iter().map(|(k, v)| format!("{}:{}\n", k, v)).collect()
}

fn canonical_resource(path: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let mut params: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    params.sort();
    format!("{}\n{}", path, params.join("\n"))
}

pub fn string_to_sign(parts: &SignedParts<'_>) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}{}",
        parts.method.to_uppercase(),
        parts.content_md5,
        parts.content_type,
        parts.date,
        canonical_headers(parts.headers),
        canonical_resource(parts.path, parts.query)
    )
}

/// `Authorization` header value / 生成Authorization头
pub fn authorization(access_key_id: &str, access_key_secret: &str, parts: &SignedParts<'_>) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(access_key_secret.as_bytes())
        .map_err(|e| GatewayError::InvalidInput(format!("HMAC初始化失败: {}", e)))?;
    mac.update(string_to_sign(parts).as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());
    Ok(format!("FC {}:{}", access_key_id, signature))
}
