// crates/pf_physics/src/types.rs

//! 数值守护参数
//!
//! 集中定义稳定性门限与钳位区间。这些值构成 LBM 的标定工作区：
//! Mach ≤ 0.1、CFL ≤ 0.1、τ_eff ∈ (0.5, 2.0]，超出即判定失稳。

use pf_lattice::stencil::D3Q19;
use serde::{Deserialize, Serialize};

/// 计算域面（轴对齐平面）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Face {
    /// x = 0 平面
    XMin,
    /// x = nx-1 平面
    XMax,
    /// y = 0 平面
    YMin,
    /// y = ny-1 平面
    YMax,
    /// z = 0 平面
    ZMin,
    /// z = nz-1 平面
    ZMax,
}

impl Face {
    /// 面的轴索引（0=x, 1=y, 2=z）
    #[inline]
    pub fn axis(&self) -> usize {
        match self {
            Self::XMin | Self::XMax => 0,
            Self::YMin | Self::YMax => 1,
            Self::ZMin | Self::ZMax => 2,
        }
    }

    /// 指向计算域内部的法向符号
    #[inline]
    pub fn inward_sign(&self) -> i32 {
        match self {
            Self::XMin | Self::YMin | Self::ZMin => 1,
            Self::XMax | Self::YMax | Self::ZMax => -1,
        }
    }

    /// 指向域内的单位法向量
    #[inline]
    pub fn inward_normal(&self) -> [i32; 3] {
        let mut n = [0i32; 3];
        n[self.axis()] = self.inward_sign();
        n
    }
}

/// 数值守护参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NumericalParams {
    /// Mach 门限：max|u|/c_s 超过即失稳
    pub mach_limit: f64,
    /// 速度硬上限（相对 c_s），超过立即判定致命
    pub velocity_hard_limit: f64,
    /// CFL 门限
    pub cfl_limit: f64,
    /// τ_eff 钳位下限
    pub tau_clip_min: f64,
    /// τ_eff 钳位上限
    pub tau_clip_max: f64,
    /// 亚格子涡粘性上限 [lu²/ts]
    pub nu_sgs_max: f64,
    /// 低剪切抑制阈值：|S| 低于此值时 νₛ 置零
    pub strain_floor: f64,
    /// 界面带判别阈值：|φ| 低于此值视为界面带
    pub interface_band: f64,
}

impl Default for NumericalParams {
    fn default() -> Self {
        Self {
            mach_limit: 0.1,
            velocity_hard_limit: 0.3,
            cfl_limit: 0.1,
            tau_clip_min: 0.51,
            tau_clip_max: 2.0,
            nu_sgs_max: 0.1,
            strain_floor: 1e-3,
            interface_band: 0.9,
        }
    }
}

impl NumericalParams {
    /// Mach 门限对应的速度上限 [lu/ts]
    #[inline]
    pub fn velocity_gate(&self) -> f64 {
        self.mach_limit * D3Q19::CS2.sqrt()
    }

    /// 速度硬上限 [lu/ts]
    #[inline]
    pub fn velocity_cap(&self) -> f64 {
        self.velocity_hard_limit * D3Q19::CS2.sqrt()
    }

    /// 钳位 τ_eff 并报告是否发生钳位
    #[inline]
    pub fn clip_tau(&self, tau: f64) -> (f64, bool) {
        if tau < self.tau_clip_min {
            (self.tau_clip_min, true)
        } else if tau > self.tau_clip_max {
            (self.tau_clip_max, true)
        } else {
            (tau, false)
        }
    }
}
