// 通用基础模块 / Common base modules

pub mod config;
pub mod tracing;
