//! Provider drivers / 云厂商驱动
//!
//! - `r2`: S3-compatible object store for Cloudflare R2
//! - `cloudflare`: Pages and Workers KV account API
//! - `aliyun_fc`: Aliyun Function Compute OpenAPI

pub mod aliyun_fc;
pub mod cloudflare;
pub mod r2;
