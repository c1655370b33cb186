// crates/pf_physics/src/error.rs

//! 求解器错误分类
//!
//! 四类错误：
//! - [`ConfigError`]：配置无效，在 `create` / `load_geometry` 阶段抛出
//! - [`StabilityError`]：稳定性门限失败，由 `step` 抛出，之后拒绝继续步进
//! - [`ResourceError`]：分配失败或颗粒池溢出
//! - [`PreconditionError`]：调用顺序错误
//!
//! 内核内部不做局部恢复；所有失败通过步末门限统一上浮。

use crate::engine::diagnostics::DiagnosticsSnapshot;

/// 稳定性失败的机器可读原因码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityReason {
    /// 出现非有限的密度或速度
    NonFinite,
    /// 密度降至非正值
    NonPositiveDensity,
    /// 速度超过 0.3 c_s 硬上限
    VelocityLimit,
    /// CFL 数超过 0.1
    CflLimit,
    /// 有效松弛时间 τ_eff ≤ 0.5
    TauUnderflow,
}

impl StabilityReason {
    /// 简短原因码（用于日志与外部判别）
    pub fn code(&self) -> &'static str {
        match self {
            Self::NonFinite => "non_finite",
            Self::NonPositiveDensity => "rho_nonpositive",
            Self::VelocityLimit => "velocity_limit",
            Self::CflLimit => "cfl_limit",
            Self::TauUnderflow => "tau_underflow",
        }
    }
}

impl std::fmt::Display for StabilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 网格尺寸无效
    #[error("网格尺寸无效: {0}")]
    InvalidExtents(String),

    /// 松弛时间必须大于 0.5
    #[error("松弛时间无效 '{name}': {value}，必须 > 0.5")]
    InvalidTau {
        /// 参数名称
        name: &'static str,
        /// 实际值
        value: f64,
    },

    /// 渗透率必须为正
    #[error("渗透率无效: {0}，必须 > 0")]
    InvalidPermeability(f64),

    /// 热耦合参数不一致
    #[error("热耦合参数不一致: {0}")]
    InconsistentThermal(String),

    /// 其他无效配置值
    #[error("无效配置 '{key}': {reason}")]
    InvalidValue {
        /// 配置项名称
        key: &'static str,
        /// 拒绝原因
        reason: String,
    },
}

/// 稳定性错误
///
/// 携带机器可读原因码与失败前最后一次诊断快照；
/// `macro_view` 仍然有效并返回步前状态。
#[derive(Debug, thiserror::Error)]
#[error("稳定性门限失败 [{reason}] @ step {}", .diagnostics.step_count)]
pub struct StabilityError {
    /// 原因码
    pub reason: StabilityReason,
    /// 失败时的诊断快照
    pub diagnostics: DiagnosticsSnapshot,
}

/// 资源错误
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// 颗粒池溢出
    #[error("颗粒池溢出: 请求 {requested}，容量 {capacity}")]
    ParticlePoolOverflow {
        /// 请求的颗粒数
        requested: usize,
        /// 池容量
        capacity: usize,
    },

    /// 分配失败
    #[error("分配失败: 请求 {bytes} 字节")]
    Allocation {
        /// 请求的字节数
        bytes: usize,
    },
}

/// 前置条件错误（调用顺序）
#[derive(Debug, thiserror::Error)]
pub enum PreconditionError {
    /// 几何尚未加载
    #[error("调用顺序错误: {operation} 之前必须先调用 load_geometry")]
    GeometryNotLoaded {
        /// 被拒绝的操作
        operation: &'static str,
    },

    /// 引擎已进入致命状态
    #[error("引擎处于致命状态，step 已拒绝；调用 reset 后重试")]
    EngineFatal,

    /// 输入场大小与网格不符
    #[error("输入场大小不匹配: {name} 期望 {expected}，实际 {actual}")]
    FieldSizeMismatch {
        /// 场名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },
}

/// 统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 稳定性错误
    #[error(transparent)]
    Stability(#[from] StabilityError),

    /// 资源错误
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// 前置条件错误
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

/// 统一结果类型别名
pub type SimResult<T> = Result<T, SimulationError>;
