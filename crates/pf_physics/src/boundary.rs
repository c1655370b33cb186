// crates/pf_physics/src/boundary.rs

//! 开边界处理
//!
//! 流动结束后按单元标记施加边界规则：
//! - 固体：半步反弹已在流动内核中就地完成
//! - 入流：Zou-He 速度入口，ρ 由非平衡反弹关系推出
//! - 出流：沿法向二阶外推 + 向 p_out = ρ_out c_s² 的压力修正
//! - 界面带：按普通流体处理，无额外规则
//!
//! # Zou-He 入口
//!
//! 设 n 为指向域内的单位法向，u_n = u·n 为入流法向分量。
//! 平面内与出向分布为已知，入向分布缺失，密度由
//!
//! ```text
//! ρ = (Σ_{e·n=0} f + 2 Σ_{e·n<0} f) / (1 − u_n)
//! ```
//!
//! 给出，缺失分布用非平衡反弹闭合：
//! `f_q = f_q^eq(ρ,u_in) + (f_q̄ − f_q̄^eq(ρ,u_in))`。
//!
//! 入流速度场由注水协作方每步更新；本模块只接受速度，
//! 不接受密度调制。

use glam::DVec3;
use pf_foundation::memory::AlignedVec;
use pf_lattice::fields::{CellTagField, DistributionField};
use pf_lattice::grid::GridDims;
use pf_lattice::stencil::D3Q19;
use pf_lattice::tags::CellTag;

use crate::collision::equilibrium;
use crate::types::Face;

/// 入流速度场
///
/// 全网格存储，仅入流单元被读取；可由注水协作方逐步更新。
#[derive(Debug, Clone)]
pub struct InletField {
    /// x 分量 [lu/ts]
    pub ux: AlignedVec<f64>,
    /// y 分量
    pub uy: AlignedVec<f64>,
    /// z 分量
    pub uz: AlignedVec<f64>,
}

impl InletField {
    /// 创建零入流场
    pub fn new(dims: GridDims) -> Self {
        let n = dims.n_cells();
        Self {
            ux: AlignedVec::zeros(n),
            uy: AlignedVec::zeros(n),
            uz: AlignedVec::zeros(n),
        }
    }

    /// 读取单元入流速度
    #[inline]
    pub fn get(&self, cell: usize) -> DVec3 {
        DVec3::new(self.ux[cell], self.uy[cell], self.uz[cell])
    }

    /// 写入单元入流速度
    #[inline]
    pub fn set(&mut self, cell: usize, u: DVec3) {
        self.ux[cell] = u.x;
        self.uy[cell] = u.y;
        self.uz[cell] = u.z;
    }
}

/// 单步开边界质量通量
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryFluxes {
    /// 入流质量 [lu³·ρ/ts]
    pub mass_in: f64,
    /// 出流质量
    pub mass_out: f64,
}

/// 开边界处理器
#[derive(Debug, Clone)]
pub struct BoundaryHandler {
    /// 入流面
    pub inlet_face: Face,
    /// 出流面
    pub outlet_face: Face,
    /// 出流参考密度
    pub outlet_rho: f64,
}

impl BoundaryHandler {
    /// 创建边界处理器
    pub fn new(inlet_face: Face, outlet_face: Face, outlet_rho: f64) -> Self {
        Self {
            inlet_face,
            outlet_face,
            outlet_rho,
        }
    }

    /// 施加全部开边界规则，返回本步质量通量
    pub fn apply(
        &self,
        f: &mut DistributionField,
        tags: &CellTagField,
        dims: GridDims,
        inlet: &InletField,
    ) -> BoundaryFluxes {
        let mut fluxes = BoundaryFluxes::default();

        for cell in 0..dims.n_cells() {
            match tags.get(cell) {
                CellTag::Inlet => {
                    fluxes.mass_in += self.apply_zou_he(f, cell, inlet.get(cell));
                }
                CellTag::Outlet => {
                    fluxes.mass_out += self.apply_outlet(f, tags, dims, cell);
                }
                _ => {}
            }
        }

        fluxes
    }

    /// Zou-He 速度入口，返回该单元的入流质量通量
    fn apply_zou_he(&self, f: &mut DistributionField, cell: usize, u_in: DVec3) -> f64 {
        let normal = self.inlet_face.inward_normal();
        let axis = self.inlet_face.axis();
        let sign = self.inlet_face.inward_sign();

        let u_comps = [u_in.x, u_in.y, u_in.z];
        let u_n = sign as f64 * u_comps[axis];

        // 平面内与出向分布求和
        let mut sum_par = 0.0;
        let mut sum_out = 0.0;
        for q in 0..D3Q19::Q {
            let en = D3Q19::E[q][0] * normal[0]
                + D3Q19::E[q][1] * normal[1]
                + D3Q19::E[q][2] * normal[2];
            let fq = f.get(q, cell);
            if en == 0 {
                sum_par += fq;
            } else if en < 0 {
                sum_out += fq;
            }
        }

        let rho = (sum_par + 2.0 * sum_out) / (1.0 - u_n).max(1e-12);

        // 非平衡反弹闭合缺失（入向）分布
        for q in 0..D3Q19::Q {
            let en = D3Q19::E[q][0] * normal[0]
                + D3Q19::E[q][1] * normal[1]
                + D3Q19::E[q][2] * normal[2];
            if en > 0 {
                let opp = D3Q19::OPP[q];
                let feq_q = equilibrium(q, rho, u_in);
                let feq_opp = equilibrium(opp, rho, u_in);
                let value = feq_q + (f.get(opp, cell) - feq_opp);
                f.set(q, cell, value);
            }
        }

        rho * u_n
    }

    /// 出流外推 + 压力修正，返回该单元的出流质量通量
    fn apply_outlet(
        &self,
        f: &mut DistributionField,
        tags: &CellTagField,
        dims: GridDims,
        cell: usize,
    ) -> f64 {
        // 出流面的内向法向指向内部第一、第二层
        let normal = self.outlet_face.inward_normal();
        let (x, y, z) = dims.cell_coords(cell);

        let n1 = match dims.neighbor(x, y, z, normal) {
            Some((x1, y1, z1)) => dims.cell_index(x1, y1, z1),
            None => return 0.0,
        };
        let (x1, y1, z1) = dims.cell_coords(n1);
        let n2 = match dims.neighbor(x1, y1, z1, normal) {
            Some((x2, y2, z2)) => dims.cell_index(x2, y2, z2),
            None => n1,
        };

        // 只从流体类内部单元外推
        if !tags.get(n1).is_fluid_like() {
            return 0.0;
        }

        // 二阶外推
        let mut rho_ext = 0.0;
        for q in 0..D3Q19::Q {
            let value = 2.0 * f.get(q, n1) - f.get(q, n2);
            f.set(q, cell, value);
            rho_ext += value;
        }

        // 压力修正：把密度拉向 ρ_out
        let delta = self.outlet_rho - rho_ext;
        for q in 0..D3Q19::Q {
            let corrected = f.get(q, cell) + D3Q19::W[q] * delta;
            f.set(q, cell, corrected);
        }

        // 出向质量通量（沿外向法向）
        let mut momentum_out = 0.0;
        for q in 0..D3Q19::Q {
            let en = D3Q19::E[q][0] * normal[0]
                + D3Q19::E[q][1] * normal[1]
                + D3Q19::E[q][2] * normal[2];
            momentum_out -= en as f64 * f.get(q, cell);
        }
        momentum_out.max(0.0)
    }
}
