pub mod accounts;
pub mod cache;
pub mod config;
pub mod correlate;
pub mod error;
pub mod models;
pub mod storage;
pub mod utils;

// Provider drivers live at the project root / 驱动模块位于项目根目录
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use error::{GatewayError, Result};
