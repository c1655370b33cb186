// crates/pf_physics/src/les.rs

//! Smagorinsky 亚格子湍流闭合
//!
//! ```text
//! νₛ = (C_s Δ)² |S|,  |S| = √(2 S_ij S_ij)
//! S_ij = ½(∂u_i/∂x_j + ∂u_j/∂x_i)
//! ```
//!
//! 速度梯度在内部流体单元用二阶中心差分，紧邻固体或域边缘时
//! 退化为单侧差分。滤波器宽度 Δ = (ΔxΔyΔz)^{1/3} = 1（格子单位）。
//!
//! 为避免非物理阻尼，νₛ 在三类区域被抑制为零：
//! - 多孔单元（阻力由 Darcy-Forchheimer 模型承担）
//! - 界面带 |φ| < 0.9（表面张力区不加涡粘）
//! - 低剪切单元 |S| < 10⁻³
//!
//! 抑制与钳位都是自动恢复事件，只计数不中止。

use pf_lattice::fields::{CellTagField, MacroFields};
use pf_lattice::grid::GridDims;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::NumericalParams;

/// Smagorinsky 常数的默认值
pub const DEFAULT_SMAGORINSKY_CONSTANT: f64 = 0.18;

/// LES 闭合求解器
#[derive(Debug)]
pub struct LesClosure {
    /// Smagorinsky 常数 C_s
    pub cs: f64,
    /// 是否启用
    pub enabled: bool,
    /// 低剪切抑制计数（整个运行期累计）
    pub suppression_count: AtomicU64,
}

impl LesClosure {
    /// 创建闭合求解器
    pub fn new(cs: f64, enabled: bool) -> Self {
        Self {
            cs,
            enabled,
            suppression_count: AtomicU64::new(0),
        }
    }

    /// 更新亚格子涡粘性场
    ///
    /// 读取速度与相场，写 `macros.nu_sgs`。
    pub fn update(&self, macros: &mut MacroFields, tags: &CellTagField, params: &NumericalParams) {
        let dims = macros.dims;

        if !self.enabled {
            macros.nu_sgs.par_fill(0.0);
            return;
        }

        let suppressed = AtomicU64::new(0);
        let cs_delta_sq = (self.cs * 1.0) * (self.cs * 1.0);

        let MacroFields {
            ux,
            uy,
            uz,
            phi,
            nu_sgs,
            ..
        } = macros;
        let (ux, uy, uz, phi) = (ux.as_slice(), uy.as_slice(), uz.as_slice(), phi.as_slice());

        nu_sgs.par_iter_mut().enumerate().for_each(|(cell, out)| {
            let tag = tags.get(cell);
            if !tag.collides() {
                *out = 0.0;
                return;
            }
            // 多孔单元与界面带抑制
            if tag.is_porous() || phi[cell].abs() < params.interface_band {
                *out = 0.0;
                return;
            }

            let (x, y, z) = dims.cell_coords(cell);

            // 速度梯度张量 ∂u_i/∂x_j
            let dudx = gradient(ux, tags, dims, x, y, z, 0);
            let dudy = gradient(ux, tags, dims, x, y, z, 1);
            let dudz = gradient(ux, tags, dims, x, y, z, 2);
            let dvdx = gradient(uy, tags, dims, x, y, z, 0);
            let dvdy = gradient(uy, tags, dims, x, y, z, 1);
            let dvdz = gradient(uy, tags, dims, x, y, z, 2);
            let dwdx = gradient(uz, tags, dims, x, y, z, 0);
            let dwdy = gradient(uz, tags, dims, x, y, z, 1);
            let dwdz = gradient(uz, tags, dims, x, y, z, 2);

            // 应变率张量 S_ij = ½(∂u_i/∂x_j + ∂u_j/∂x_i)
            let s11 = dudx;
            let s22 = dvdy;
            let s33 = dwdz;
            let s12 = 0.5 * (dudy + dvdx);
            let s13 = 0.5 * (dudz + dwdx);
            let s23 = 0.5 * (dvdz + dwdy);

            let strain_mag = (2.0
                * (s11 * s11
                    + s22 * s22
                    + s33 * s33
                    + 2.0 * (s12 * s12 + s13 * s13 + s23 * s23)))
                .sqrt();

            // 低剪切抑制
            if strain_mag < params.strain_floor {
                suppressed.fetch_add(1, Ordering::Relaxed);
                *out = 0.0;
                return;
            }

            *out = (cs_delta_sq * strain_mag).min(params.nu_sgs_max);
        });

        let n = suppressed.load(Ordering::Relaxed);
        if n > 0 {
            self.suppression_count.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// 低剪切抑制累计计数
    pub fn suppressions(&self) -> u64 {
        self.suppression_count.load(Ordering::Relaxed)
    }
}

/// 单分量速度导数
///
/// 两侧邻居均可用时取中心差分，仅一侧可用时退化为单侧差分，
/// 两侧都不可用时梯度视为零。固体邻居视为不可用。
#[inline]
fn gradient(
    field: &[f64],
    tags: &CellTagField,
    dims: GridDims,
    x: usize,
    y: usize,
    z: usize,
    axis: usize,
) -> f64 {
    let mut e_plus = [0i32; 3];
    e_plus[axis] = 1;
    let mut e_minus = [0i32; 3];
    e_minus[axis] = -1;

    let center = dims.cell_index(x, y, z);
    let plus = dims
        .neighbor(x, y, z, e_plus)
        .map(|(a, b, c)| dims.cell_index(a, b, c))
        .filter(|&c| !tags.get(c).is_solid());
    let minus = dims
        .neighbor(x, y, z, e_minus)
        .map(|(a, b, c)| dims.cell_index(a, b, c))
        .filter(|&c| !tags.get(c).is_solid());

    match (plus, minus) {
        (Some(p), Some(m)) => (field[p] - field[m]) * 0.5,
        (Some(p), None) => field[p] - field[center],
        (None, Some(m)) => field[center] - field[m],
        (None, None) => 0.0,
    }
}
