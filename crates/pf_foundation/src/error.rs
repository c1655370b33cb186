// crates/pf_foundation/src/error.rs

//! 基础错误类型
//!
//! 定义基础设施级别的错误，仅包含 IO、索引、内存等底层概念。
//! 上层错误（配置、稳定性）在 pf_physics 中定义并按需转换到这里。
//!
//! # 设计原则
//!
//! 1. **纯净性**：不出现格子、相场、颗粒等领域概念
//! 2. **零依赖**：仅依赖标准库
//! 3. **易用性**：提供便捷构造函数与校验辅助

use std::{fmt, io};

/// 统一结果类型别名
pub type FoundationResult<T> = Result<T, FoundationError>;

/// 基础层错误
#[derive(Debug)]
pub enum FoundationError {
    /// IO 操作失败
    Io {
        /// 描述性错误信息
        message: String,
        /// 底层 IO 错误源
        source: Option<io::Error>,
    },

    /// 数组或集合大小不匹配
    ///
    /// 在需要严格大小一致性的操作中触发（如场对场拷贝）。
    SizeMismatch {
        /// 数据名称（用于调试）
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引访问越界
    IndexOutOfBounds {
        /// 索引类别（如 "Cell", "Particle"）
        index_type: &'static str,
        /// 访问的索引值
        index: usize,
        /// 容器长度（上界）
        len: usize,
    },

    /// 输入数据验证失败
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 内存分配失败
    Allocation {
        /// 请求的字节数
        bytes: usize,
    },

    /// 内部实现错误
    ///
    /// 程序进入不应到达的状态，通常表示不变量被破坏。
    Internal {
        /// 内部错误描述
        message: String,
    },
}

impl FoundationError {
    /// 创建 IO 错误
    #[inline]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 创建大小不匹配错误
    #[inline]
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 创建索引越界错误
    #[inline]
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 创建无效输入错误
    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 创建内部错误
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 验证数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> FoundationResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 验证索引是否在有效范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> FoundationResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

impl From<io::Error> for FoundationError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: "IO 操作失败".to_string(),
            source: Some(err),
        }
    }
}

impl fmt::Display for FoundationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { message, .. } => write!(f, "IO错误: {}", message),
            Self::SizeMismatch {
                name,
                expected,
                actual,
            } => {
                write!(f, "数组大小不匹配: {} 期望{}, 实际{}", name, expected, actual)
            }
            Self::IndexOutOfBounds {
                index_type,
                index,
                len,
            } => {
                write!(f, "索引越界: {} 索引{} 超出范围 0..{}", index_type, index, len)
            }
            Self::InvalidInput { message } => write!(f, "无效的输入数据: {}", message),
            Self::Allocation { bytes } => write!(f, "内存分配失败: 请求 {} 字节", bytes),
            Self::Internal { message } => write!(f, "内部错误: {}", message),
        }
    }
}

impl std::error::Error for FoundationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => source.as_ref().map(|e| e as _),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_display() {
        let err = FoundationError::io("磁盘已满");
        assert!(err.to_string().contains("IO错误"));
    }

    #[test]
    fn test_size_mismatch() {
        let err = FoundationError::size_mismatch("velocity", 100, 50);
        assert!(err.to_string().contains("velocity"));
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_check_size() {
        assert!(FoundationError::check_size("test", 10, 10).is_ok());
        let result = FoundationError::check_size("test", 10, 5);
        assert!(matches!(
            result.unwrap_err(),
            FoundationError::SizeMismatch { .. }
        ));
    }

    #[test]
    fn test_check_index() {
        assert!(FoundationError::check_index("Cell", 5, 10).is_ok());
        let result = FoundationError::check_index("Cell", 10, 10);
        assert!(matches!(
            result.unwrap_err(),
            FoundationError::IndexOutOfBounds { .. }
        ));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "无权限");
        let err: FoundationError = io_err.into();
        assert!(matches!(err, FoundationError::Io { .. }));
        assert!(err.source().is_some());
    }
}
