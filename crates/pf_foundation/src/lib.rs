// crates/pf_foundation/src/lib.rs

//! 基础层（Layer 1）
//!
//! 为上层求解器提供与业务无关的基础设施：
//! - 基础错误类型 ([`error`])
//! - 对齐连续缓冲区 ([`memory`])
//! - 数值容差与比较 ([`tolerance`])
//! - Kahan 补偿求和 ([`kahan`])
//!
//! 本层禁止引入任何格子、物理或求解器概念。

pub mod error;
pub mod kahan;
pub mod memory;
pub mod tolerance;

pub use error::{FoundationError, FoundationResult};
pub use kahan::KahanSum;
pub use memory::AlignedVec;

/// 全局标量类型
///
/// 求解器内部统一使用双精度；快照导出时转换为 f32。
pub type Scalar = f64;
