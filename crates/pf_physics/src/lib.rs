// crates/pf_physics/src/lib.rs

//! 手冲咖啡三维 CFD 核心引擎
//!
//! D3Q19 格子 Boltzmann 流体求解器，耦合：
//! - Smagorinsky LES 闭合（嵌入有效松弛时间）([`les`])
//! - Cahn-Hilliard 相场多相与连续表面力 ([`phase`])
//! - Darcy-Forchheimer 多孔阻力（咖啡床与滤纸）([`porous`])
//! - Lagrange 咖啡颗粒双向动量耦合 ([`particles`])
//! - 可选 D3Q7 温度场弱/强耦合 ([`thermal`])
//!
//! 全部子系统通过 [`forcing::ForceAggregator`] 共享体积力，
//! 由 [`engine::Simulation`] 按固定内核流水线逐步推进，
//! 每步末尾通过 Mach/CFL/τ/正性稳定性门限。
//!
//! # 执行模型
//!
//! 批量同步：步内是一串内核（LES、相场、阻力/积分、散布、碰撞、
//! 流动、边界、宏观恢复、门限），内核内部所有单元（或所有颗粒）
//! 相互独立并行，内核之间隐式屏障。跨内核共享的只有分布数组、
//! 宏观场与体积力场；并发写入仅出现在颗粒散布，走原子加法。

pub mod boundary;
pub mod collision;
pub mod config;
pub mod engine;
pub mod error;
pub mod forcing;
pub mod les;
pub mod particles;
pub mod phase;
pub mod porous;
pub mod snapshot;
pub mod streaming;
pub mod thermal;
pub mod types;

// 常用类型重导出
pub use boundary::{BoundaryFluxes, BoundaryHandler, InletField};
pub use config::{
    ParticleConfig, PhaseConfig, PorousConfig, SimulationConfig, ThermalConfig, ThermalMode,
};
pub use engine::diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use engine::Simulation;
pub use error::{
    ConfigError, PreconditionError, ResourceError, SimResult, SimulationError, StabilityError,
    StabilityReason,
};
pub use forcing::ForceAggregator;
pub use les::LesClosure;
pub use particles::{GrindDistribution, ParticleSystem, ParticleView, SeedRegion};
pub use phase::PhaseField;
pub use porous::{ergun_beta, ergun_permeability, FilterPaper, PorousMedium};
pub use thermal::{ThermalBc, ThermalSolver};
pub use types::{Face, NumericalParams};

// 格子层直通
pub use pf_lattice::{CellTag, GridDims, MacroView, UnitScales};
