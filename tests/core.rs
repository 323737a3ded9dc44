//! 核心工具函数测试

#[path = "core/format_output_path.rs"]
mod format_output_path;
