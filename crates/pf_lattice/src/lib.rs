// crates/pf_lattice/src/lib.rs

//! 格子层（Layer 2）
//!
//! 定义格子 Boltzmann 求解所需的几何与数据结构：
//! - D3Q19 / D3Q7 离散速度模板 ([`stencil`])
//! - 结构化网格与线性索引 ([`grid`])
//! - 单元标记 ([`tags`])
//! - SoA 宏观场与分布函数双缓冲 ([`fields`])
//! - 物理/格子单位换算 ([`units`])
//!
//! 模板表是整个工程唯一的编译期常量；其余参数全部来自配置记录。

pub mod fields;
pub mod grid;
pub mod stencil;
pub mod tags;
pub mod units;

pub use fields::{CellTagField, DistributionField, MacroFields, MacroView};
pub use grid::GridDims;
pub use stencil::{D3Q19, D3Q7};
pub use tags::CellTag;
pub use units::UnitScales;
