// crates/pf_physics/src/collision.rs

//! BGK 碰撞与 Guo 体积力
//!
//! # 平衡分布
//!
//! ```text
//! f_q^eq(ρ,u) = w_q ρ [1 + (e_q·u)/c_s² + (e_q·u)²/(2c_s⁴) − (u·u)/(2c_s²)]
//! ```
//!
//! # Guo 体积力项
//!
//! ```text
//! F_q = w_q (1 − 1/(2τ_eff)) [(e_q − u)/c_s² + (e_q·u) e_q / c_s⁴] · F
//! ```
//!
//! # 宏观量恢复（Guo 半力修正）
//!
//! ```text
//! ρ = Σ f_q,   ρu = Σ f_q e_q + (Δt/2) F
//! ```
//!
//! 碰撞读 f 写 f_next；宏观量恢复与 τ_eff 计算在碰撞前完成，
//! 碰撞内核本身按方向分块并行，块内再按单元并行。

use glam::DVec3;
use pf_foundation::memory::AlignedVec;
use pf_foundation::tolerance::RHO_FLOOR;
use pf_lattice::fields::{CellTagField, DistributionField, MacroFields};
use pf_lattice::stencil::D3Q19;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::forcing::ForceAggregator;
use crate::types::NumericalParams;

/// 平衡分布函数 f_q^eq
#[inline]
pub fn equilibrium(q: usize, rho: f64, u: DVec3) -> f64 {
    let e = D3Q19::E[q];
    let eu = e[0] as f64 * u.x + e[1] as f64 * u.y + e[2] as f64 * u.z;
    let uu = u.length_squared();
    D3Q19::W[q]
        * rho
        * (1.0 + D3Q19::INV_CS2 * eu + 0.5 * D3Q19::INV_CS4 * eu * eu - 0.5 * D3Q19::INV_CS2 * uu)
}

/// Guo 体积力项 F_q
#[inline]
pub fn guo_force_term(q: usize, u: DVec3, force: DVec3, tau_eff: f64) -> f64 {
    let e = D3Q19::e(q);
    let e = DVec3::new(e[0], e[1], e[2]);
    let eu = e.dot(u);
    let bracket = (e - u) * D3Q19::INV_CS2 + e * (eu * D3Q19::INV_CS4);
    D3Q19::W[q] * (1.0 - 0.5 / tau_eff) * bracket.dot(force)
}

/// 宏观量恢复内核
///
/// 从当前分布 f 与聚合体积力恢复 ρ 与 u（含 Guo 半力修正），
/// 写入宏观场。固体单元跳过，其 ρ、u 不被消费。
pub fn recover_macro(
    f: &DistributionField,
    force: &ForceAggregator,
    tags: &CellTagField,
    macros: &mut MacroFields,
) {
    let n = f.n_cells();
    let curr = f.curr_slice();

    let MacroFields {
        rho, ux, uy, uz, ..
    } = macros;

    rho.par_iter_mut()
        .zip(ux.par_iter_mut())
        .zip(uy.par_iter_mut())
        .zip(uz.par_iter_mut())
        .enumerate()
        .for_each(|(cell, (((rho_c, ux_c), uy_c), uz_c))| {
            if !tags.get(cell).collides() {
                return;
            }

            let mut m0 = 0.0;
            let mut mx = 0.0;
            let mut my = 0.0;
            let mut mz = 0.0;
            for q in 0..D3Q19::Q {
                let fq = curr[q * n + cell];
                let e = D3Q19::E[q];
                m0 += fq;
                mx += fq * e[0] as f64;
                my += fq * e[1] as f64;
                mz += fq * e[2] as f64;
            }

            *rho_c = m0;
            if m0 > RHO_FLOOR {
                let fc = force.get(cell);
                let inv = 1.0 / m0;
                *ux_c = (mx + 0.5 * fc.x) * inv;
                *uy_c = (my + 0.5 * fc.y) * inv;
                *uz_c = (mz + 0.5 * fc.z) * inv;
            } else {
                *ux_c = 0.0;
                *uy_c = 0.0;
                *uz_c = 0.0;
            }
        });
}

/// 计算有效松弛时间场
///
/// τ_eff = τ_mol + 3 νₛ，钳位到 [τ_min, τ_max]；
/// 每次钳位递增计数器（自动恢复事件，不中止）。
pub fn update_tau_eff(
    tau_mol: &[f64],
    nu_sgs: &[f64],
    params: &NumericalParams,
    tau_eff: &mut AlignedVec<f64>,
    clip_counter: &AtomicU64,
) {
    let clips = AtomicU64::new(0);

    tau_eff
        .par_iter_mut()
        .enumerate()
        .for_each(|(cell, out)| {
            let tau = tau_mol[cell] + 3.0 * nu_sgs[cell];
            let (clipped, was_clipped) = params.clip_tau(tau);
            if was_clipped {
                clips.fetch_add(1, Ordering::Relaxed);
            }
            *out = clipped;
        });

    let n = clips.load(Ordering::Relaxed);
    if n > 0 {
        let total = clip_counter.fetch_add(n, Ordering::Relaxed);
        if total == 0 {
            log::warn!("τ_eff 发生钳位（本步 {} 个单元），后续钳位仅计数", n);
        }
    }
}

/// BGK 碰撞内核（含 Guo 体积力）
///
/// 读 f 与宏观场，写 f_next。固体单元的分布原样拷贝，
/// 供后续反弹边界取用。
pub fn collide(
    f: &mut DistributionField,
    macros: &MacroFields,
    tau_eff: &[f64],
    force: &ForceAggregator,
    tags: &CellTagField,
) {
    let n = f.n_cells();
    let (curr, next) = f.buffers();

    next.par_chunks_mut(n).enumerate().for_each(|(q, block)| {
        let src = &curr[q * n..(q + 1) * n];
        block.par_iter_mut().enumerate().for_each(|(cell, out)| {
            if !tags.get(cell).collides() {
                *out = src[cell];
                return;
            }

            let rho = macros.rho[cell];
            let u = macros.velocity(cell);
            let tau = tau_eff[cell];

            let feq = equilibrium(q, rho, u);
            let fq = src[cell];
            let forcing = guo_force_term(q, u, force.get(cell), tau);

            *out = fq - (fq - feq) / tau + forcing;
        });
    });
}

/// 将单元初始化为平衡态
///
/// 仅用于初始化阶段；允许直接写入密度（状态方程此时尚未生效）。
pub fn set_equilibrium(f: &mut DistributionField, cell: usize, rho: f64, u: DVec3) {
    for q in 0..D3Q19::Q {
        let feq = equilibrium(q, rho, u);
        f.set(q, cell, feq);
        f.set_next(q, cell, feq);
    }
}
