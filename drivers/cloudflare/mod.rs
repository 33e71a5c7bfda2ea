//! Cloudflare Pages / KV API driver / Cloudflare Pages与KV驱动

pub mod api;
pub mod types;

pub use api::CloudflareClient;
pub use types::{CfResponse, KvKey, KvNamespace, KvValue, PagesProject};
