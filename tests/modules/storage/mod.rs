//! 存储模块测试
//!
//! 包含所有存储后端共享的契约测试


#[allow(unused_imports)]
pub use contract::*;
