// crates/pf_physics/src/thermal.rs

//! D3Q7 温度场求解器
//!
//! 温度分布 g_j 的 BGK 演化：
//!
//! ```text
//! g_j^eq = w_j T (1 + e_j·u / c_{s,T}²),   α = c_{s,T}²(τ_T − ½)
//! ```
//!
//! 对流由 g 的流动步骤天然承载；与流体的其余耦合有两条：
//! - Vogel 型粘度关联 μ(T) = μ₀ exp(E_a/R (1/T − 1/T₀)) 更新 τ_mol
//! - Boussinesq 浮力 F_b = −ρ₀ β_T (T − T_ref) g（热升冷降），
//!   幅值钳位后进入体积力聚合器
//!
//! 弱耦合：对流 + 粘度更新，无浮力；强耦合：三条全开，
//! CFL_T ≤ 0.1 与 Ra ≤ 10⁶ 在配置校验时强制。
//!
//! 热边界：入流 Dirichlet（热水），外壁 Robin(h, T_env)，
//! 出流零梯度；固体内壁按绝热反弹处理。多孔单元用有效热容
//! ερ_w c_{p,w} + (1−ε)ρ_c c_{p,c} 折算出局部 τ_T。

use glam::DVec3;
use pf_foundation::memory::AlignedVec;
use pf_lattice::fields::{CellTagField, DistributionField, MacroFields};
use pf_lattice::grid::GridDims;
use pf_lattice::stencil::D3Q7;
use pf_lattice::tags::CellTag;
use rayon::prelude::*;

use crate::config::{ThermalConfig, ThermalMode};
use crate::forcing::ForceAggregator;

/// 热边界类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThermalBc {
    /// 内部单元
    Interior = 0,
    /// 定温
    Dirichlet = 1,
    /// 零热流
    Neumann = 2,
    /// 对流换热 Robin(h, T_env)
    Robin = 3,
}

impl ThermalBc {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Dirichlet,
            2 => Self::Neumann,
            3 => Self::Robin,
            _ => Self::Interior,
        }
    }
}

/// D3Q7 平衡分布
#[inline]
pub fn thermal_equilibrium(j: usize, temperature: f64, u: DVec3) -> f64 {
    let e = D3Q7::E[j];
    let eu = e[0] as f64 * u.x + e[1] as f64 * u.y + e[2] as f64 * u.z;
    D3Q7::W[j] * temperature * (1.0 + D3Q7::INV_CS2 * eu)
}

/// 温度场求解器
#[derive(Debug)]
pub struct ThermalSolver {
    dims: GridDims,
    /// 配置
    pub config: ThermalConfig,
    /// 温度分布 g（双缓冲）
    pub g: DistributionField,
    /// 逐单元 τ_T（多孔有效热容折算后）
    pub tau_t: AlignedVec<f64>,
    bc_kind: AlignedVec<u8>,
    bc_value: AlignedVec<f64>,
}

impl ThermalSolver {
    /// 创建求解器并初始化为均匀温度
    pub fn new(dims: GridDims, config: ThermalConfig) -> Self {
        let n = dims.n_cells();
        let mut g = DistributionField::new(dims, D3Q7::Q);
        for cell in 0..n {
            for j in 0..D3Q7::Q {
                let geq = thermal_equilibrium(j, config.t_initial, DVec3::ZERO);
                g.set(j, cell, geq);
                g.set_next(j, cell, geq);
            }
        }
        let mut tau_t = AlignedVec::zeros(n);
        tau_t.par_fill(config.tau_thermal);
        let mut bc_value = AlignedVec::zeros(n);
        bc_value.par_fill(config.t_initial);

        Self {
            dims,
            config,
            g,
            tau_t,
            bc_kind: AlignedVec::zeros(n),
            bc_value,
        }
    }

    /// 按单元标记布置热边界
    ///
    /// 入流面 Dirichlet（热水温度）、出流面零梯度、
    /// 其余域边缘 Robin(h, T_env)。
    pub fn setup_boundaries(&mut self, tags: &CellTagField) {
        let dims = self.dims;

        for cell in 0..dims.n_cells() {
            let (x, y, z) = dims.cell_coords(cell);
            match tags.get(cell) {
                CellTag::Inlet => {
                    self.bc_kind[cell] = ThermalBc::Dirichlet as u8;
                    self.bc_value[cell] = self.config.t_inlet;
                }
                CellTag::Outlet => {
                    self.bc_kind[cell] = ThermalBc::Neumann as u8;
                }
                CellTag::Solid => {
                    // 内壁绝热反弹；位于域缘的外壁走 Robin
                    if dims.is_domain_boundary(x, y, z) {
                        self.bc_kind[cell] = ThermalBc::Robin as u8;
                        self.bc_value[cell] = self.config.t_env;
                    }
                }
                _ => {
                    if dims.is_domain_boundary(x, y, z) {
                        self.bc_kind[cell] = ThermalBc::Robin as u8;
                        self.bc_value[cell] = self.config.t_env;
                    }
                }
            }
        }
    }

    /// 多孔有效热容折算：α_eff = α · (ρc_p)_w/(ρc_p)_eff
    pub fn apply_porous_heat_capacity(&mut self, tags: &CellTagField) {
        let base_alpha = D3Q7::CS2 * (self.config.tau_thermal - 0.5);
        let ratio = self.config.porous_heat_capacity_ratio;
        let alpha_eff = base_alpha * ratio;
        let tau_porous = (alpha_eff / D3Q7::CS2 + 0.5).max(0.505);

        for cell in 0..self.dims.n_cells() {
            if tags.get(cell).is_porous() {
                self.tau_t[cell] = tau_porous;
            }
        }
    }

    /// 指定单元的 Dirichlet 温度（初始化/测试路径）
    pub fn set_dirichlet(&mut self, cell: usize, temperature: f64) {
        self.bc_kind[cell] = ThermalBc::Dirichlet as u8;
        self.bc_value[cell] = temperature;
    }

    /// 单元温度 T = Σ_j g_j
    #[inline]
    pub fn temperature(&self, cell: usize) -> f64 {
        let mut t = 0.0;
        for j in 0..D3Q7::Q {
            t += self.g.get(j, cell);
        }
        t
    }

    /// BGK 碰撞（对流平衡含流体速度）
    pub fn collide(&mut self, macros: &MacroFields, tags: &CellTagField) {
        let n = self.dims.n_cells();
        let tau_t = self.tau_t.as_slice();
        let (curr, next) = self.g.buffers();

        next.par_chunks_mut(n).enumerate().for_each(|(j, block)| {
            block.par_iter_mut().enumerate().for_each(|(cell, out)| {
                if tags.get(cell).is_solid() {
                    *out = curr[j * n + cell];
                    return;
                }
                let mut t = 0.0;
                for jj in 0..D3Q7::Q {
                    t += curr[jj * n + cell];
                }
                let u = macros.velocity(cell);
                let geq = thermal_equilibrium(j, t, u);
                let gj = curr[j * n + cell];
                *out = gj - (gj - geq) / tau_t[cell];
            });
        });
    }

    /// 流动（拉取式；固体源绝热反弹）
    pub fn stream(&mut self, tags: &CellTagField) {
        let dims = self.dims;
        let n = dims.n_cells();
        let (dst, src) = self.g.stream_buffers();

        dst.par_chunks_mut(n).enumerate().for_each(|(j, block)| {
            let e = D3Q7::E[j];
            let opp = D3Q7::OPP[j];
            block.par_iter_mut().enumerate().for_each(|(cell, out)| {
                if tags.get(cell).is_solid() {
                    *out = src[j * n + cell];
                    return;
                }
                let (x, y, z) = dims.cell_coords(cell);
                let source = dims.neighbor(x, y, z, [-e[0], -e[1], -e[2]]);
                match source {
                    Some((sx, sy, sz)) => {
                        let s = dims.cell_index(sx, sy, sz);
                        if tags.get(s).is_solid() {
                            // 绝热反弹
                            *out = src[opp * n + cell];
                        } else {
                            *out = src[j * n + s];
                        }
                    }
                    None => *out = src[j * n + cell],
                }
            });
        });
    }

    /// 施加热边界条件（Dirichlet / Neumann / Robin）
    pub fn apply_boundary_conditions(&mut self, macros: &MacroFields) {
        let dims = self.dims;
        let h = self.config.h_env;

        for cell in 0..dims.n_cells() {
            let kind = ThermalBc::from_u8(self.bc_kind[cell]);
            if kind == ThermalBc::Interior {
                continue;
            }

            let (x, y, z) = dims.cell_coords(cell);
            let interior = interior_neighbor(dims, x, y, z);
            let u = macros.velocity(cell);

            let t_target = match kind {
                ThermalBc::Dirichlet => self.bc_value[cell],
                ThermalBc::Neumann => {
                    // 零梯度：取内侧温度
                    interior.map(|c| self.cell_temperature(c)).unwrap_or_else(|| self.cell_temperature(cell))
                }
                ThermalBc::Robin => {
                    // 离散 Robin：T_b = (T_int + h Δx T_env)/(1 + h Δx)
                    let t_int = interior
                        .map(|c| self.cell_temperature(c))
                        .unwrap_or_else(|| self.cell_temperature(cell));
                    (t_int + h * self.bc_value[cell]) / (1.0 + h)
                }
                ThermalBc::Interior => unreachable!(),
            };

            for j in 0..D3Q7::Q {
                let geq = thermal_equilibrium(j, t_target, u);
                self.g.set(j, cell, geq);
            }
        }
    }

    #[inline]
    fn cell_temperature(&self, cell: usize) -> f64 {
        let mut t = 0.0;
        for j in 0..D3Q7::Q {
            t += self.g.get(j, cell);
        }
        t
    }

    /// 温度写回宏观场
    pub fn write_to_macro(&self, macros: &mut MacroFields) {
        let n = self.dims.n_cells();
        let curr = self.g.curr_slice();
        macros
            .temperature
            .par_iter_mut()
            .enumerate()
            .for_each(|(cell, out)| {
                let mut t = 0.0;
                for j in 0..D3Q7::Q {
                    t += curr[j * n + cell];
                }
                *out = t;
            });
    }

    /// Boussinesq 浮力累加（热升冷降，幅值钳位）
    pub fn accumulate_buoyancy(
        &self,
        macros: &MacroFields,
        gravity: DVec3,
        rho_ref: f64,
        force: &mut ForceAggregator,
    ) {
        if !self.config.mode.buoyancy_enabled() {
            return;
        }
        let beta = self.config.beta_t;
        let t_ref = self.config.t_ref;
        let cap = self.config.max_buoyancy;
        let temperature = macros.temperature.as_slice();

        force.par_accumulate(|cell| {
            let dt = temperature[cell] - t_ref;
            let mut f = -gravity * (rho_ref * beta * dt);
            let mag = f.length();
            if mag > cap {
                f *= cap / mag;
            }
            f
        });
    }
}

/// 域边缘单元指向内部的最近邻
fn interior_neighbor(dims: GridDims, x: usize, y: usize, z: usize) -> Option<usize> {
    let mut e = [0i32; 3];
    if x == 0 {
        e[0] = 1;
    } else if x == dims.nx - 1 {
        e[0] = -1;
    }
    if y == 0 {
        e[1] = 1;
    } else if y == dims.ny - 1 {
        e[1] = -1;
    }
    if z == 0 {
        e[2] = 1;
    } else if z == dims.nz - 1 {
        e[2] = -1;
    }
    if e == [0, 0, 0] {
        return None;
    }
    dims.neighbor(x, y, z, e)
        .map(|(a, b, c)| dims.cell_index(a, b, c))
}

/// 更新分子松弛时间 τ_mol
///
/// 相混合：τ = τ_air + (φ+1)/2 · (τ_w(T) − τ_air)；
/// 热耦合开启时 τ_w 按 Vogel 关联随温度缩放
/// （ν ∝ τ − ½，μ(T)/μ₀ = exp(E_a/R (1/T − 1/T₀))）。
pub fn update_tau_mol(
    macros: &mut MacroFields,
    tau_fluid: f64,
    tau_air: f64,
    thermal: Option<&ThermalConfig>,
) {
    let vogel = thermal.filter(|t| t.mode != ThermalMode::Off).map(|t| {
        (t.vogel_activation, t.vogel_t0)
    });

    let MacroFields {
        phi,
        temperature,
        tau_mol,
        ..
    } = macros;
    let (phi, temperature) = (phi.as_slice(), temperature.as_slice());

    tau_mol.par_iter_mut().enumerate().for_each(|(cell, out)| {
        let tau_w = match vogel {
            Some((ea_r, t0)) => {
                let t = temperature[cell].max(1.0);
                let ratio = (ea_r * (1.0 / t - 1.0 / t0)).clamp(-10.0, 10.0).exp();
                0.5 + (tau_fluid - 0.5) * ratio
            }
            None => tau_fluid,
        };
        let water_frac = 0.5 * (phi[cell] + 1.0);
        *out = tau_air + water_frac * (tau_w - tau_air);
    });
}
