// crates/pf_physics/src/engine/diagnostics.rs

//! 运行诊断与稳定性门限
//!
//! 每步结束后评估：
//! - max|u|、Mach = max|u|/c_s、CFL = max|u|·Δt/Δx
//! - ρ 的正性与有限性
//! - 质量漂移（Kahan 审计，扣除开边界净通量）
//! - 动能、τ_eff 钳位计数、LES 低剪切抑制计数
//!
//! 门限失败把当步标记为致命；内核从不局部恢复。
//! 并行归约使用 f64 按位 AtomicU64 的 max/min 技巧。

use pf_foundation::kahan::KahanSum;
use pf_lattice::fields::{CellTagField, MacroFields};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StabilityReason;
use crate::types::NumericalParams;

/// 诊断快照（对外只读拷贝）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    /// 已完成步数
    pub step_count: u64,
    /// 最大速度模 [lu/ts]
    pub max_velocity: f64,
    /// 最大 CFL 数
    pub cfl: f64,
    /// 最大 Mach 数
    pub mach: f64,
    /// τ_eff 钳位累计次数
    pub tau_clip_count: u64,
    /// LES 低剪切抑制累计次数
    pub les_suppression_count: u64,
    /// 相对质量漂移（扣除净通量）
    pub mass_drift: f64,
    /// 总动能
    pub kinetic_energy: f64,
    /// ∫φ dV
    pub phi_total: f64,
}

/// 诊断状态
#[derive(Debug)]
pub struct Diagnostics {
    /// 已完成步数
    pub step_count: u64,
    /// τ_eff 钳位计数（碰撞内核共享）
    pub tau_clip_count: AtomicU64,
    /// 初始总质量
    pub initial_mass: Option<f64>,
    /// 累计入流质量
    pub net_mass_in: f64,
    /// 累计出流质量
    pub net_mass_out: f64,
    /// 最近一次快照
    pub last: DiagnosticsSnapshot,
}

impl Diagnostics {
    /// 创建空诊断
    pub fn new() -> Self {
        Self {
            step_count: 0,
            tau_clip_count: AtomicU64::new(0),
            initial_mass: None,
            net_mass_in: 0.0,
            net_mass_out: 0.0,
            last: DiagnosticsSnapshot::default(),
        }
    }

    /// 记录初始质量（几何加载后、首步之前）
    pub fn record_initial_mass(&mut self, macros: &MacroFields, tags: &CellTagField) {
        self.initial_mass = Some(total_mass(macros, tags));
    }

    /// 累加本步开边界通量
    pub fn record_fluxes(&mut self, mass_in: f64, mass_out: f64) {
        self.net_mass_in += mass_in;
        self.net_mass_out += mass_out;
    }

    /// 质量漂移：(Σρ − Σρ⁰ − 净流入)/Σρ⁰
    pub fn mass_drift(&self, macros: &MacroFields, tags: &CellTagField) -> f64 {
        match self.initial_mass {
            Some(m0) if m0 > 0.0 => {
                let m = total_mass(macros, tags);
                let net = self.net_mass_in - self.net_mass_out;
                (m - m0 - net) / m0
            }
            _ => 0.0,
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

/// 门限量测
#[derive(Debug, Clone, Copy)]
pub struct GateMetrics {
    /// 最大速度模
    pub max_velocity: f64,
    /// 最小密度
    pub min_rho: f64,
}

/// 稳定性门限评估
///
/// 顺序：非有限 → ρ ≤ 0 → 硬速度上限 0.3c_s → Mach/CFL 门限。
pub fn evaluate_gate(
    macros: &MacroFields,
    tags: &CellTagField,
    params: &NumericalParams,
) -> Result<GateMetrics, (StabilityReason, GateMetrics)> {
    let n = macros.n_cells();

    let max_u_bits = AtomicU64::new(0u64);
    let min_rho_bits = AtomicU64::new(f64::MAX.to_bits());
    let non_finite = AtomicU64::new(0);
    let non_positive = AtomicU64::new(0);

    (0..n).into_par_iter().for_each(|cell| {
        if !tags.get(cell).collides() {
            return;
        }
        let rho = macros.rho[cell];
        let u_sq = macros.velocity_sq(cell);

        if !rho.is_finite() || !u_sq.is_finite() {
            non_finite.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if rho <= 0.0 {
            non_positive.fetch_add(1, Ordering::Relaxed);
        }

        max_u_bits.fetch_max(u_sq.to_bits(), Ordering::Relaxed);
        min_rho_bits.fetch_min(rho.max(0.0).to_bits(), Ordering::Relaxed);
    });

    let max_velocity = f64::from_bits(max_u_bits.load(Ordering::Relaxed)).sqrt();
    let min_rho = f64::from_bits(min_rho_bits.load(Ordering::Relaxed));
    let metrics = GateMetrics {
        max_velocity,
        min_rho,
    };

    if non_finite.load(Ordering::Relaxed) > 0 {
        return Err((StabilityReason::NonFinite, metrics));
    }
    if non_positive.load(Ordering::Relaxed) > 0 {
        return Err((StabilityReason::NonPositiveDensity, metrics));
    }
    if max_velocity > params.velocity_cap() {
        return Err((StabilityReason::VelocityLimit, metrics));
    }
    // Δx = Δt = 1：CFL 数值上等于 max|u|
    if max_velocity > params.velocity_gate() {
        return Err((StabilityReason::CflLimit, metrics));
    }

    Ok(metrics)
}

/// 流体类单元的总质量（并行 Kahan）
pub fn total_mass(macros: &MacroFields, tags: &CellTagField) -> f64 {
    const CHUNK: usize = 1 << 14;
    let partials: Vec<f64> = macros
        .rho
        .as_slice()
        .par_chunks(CHUNK)
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            let mut k = KahanSum::new();
            for (i, &rho) in chunk.iter().enumerate() {
                let cell = chunk_idx * CHUNK + i;
                if tags.get(cell).collides() {
                    k.add(rho);
                }
            }
            k.value()
        })
        .collect();
    KahanSum::sum_slice(&partials)
}

/// 总动能 Σ ½ρ|u|²
pub fn kinetic_energy(macros: &MacroFields, tags: &CellTagField) -> f64 {
    const CHUNK: usize = 1 << 14;
    let n = macros.n_cells();
    let partials: Vec<f64> = (0..n.div_ceil(CHUNK))
        .into_par_iter()
        .map(|chunk_idx| {
            let mut k = KahanSum::new();
            let end = ((chunk_idx + 1) * CHUNK).min(n);
            for cell in chunk_idx * CHUNK..end {
                if tags.get(cell).collides() {
                    k.add(0.5 * macros.rho[cell] * macros.velocity_sq(cell));
                }
            }
            k.value()
        })
        .collect();
    KahanSum::sum_slice(&partials)
}
