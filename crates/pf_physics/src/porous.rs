// crates/pf_physics/src/porous.rs

//! 多孔介质阻力
//!
//! 咖啡粉床与滤纸都表现为多孔阻力，对多孔单元施加
//! Darcy + Forchheimer 体积力：
//!
//! ```text
//! F_por = −(μ/K) u − (ρ β/√K) |u| u
//! ```
//!
//! K 与 β 是逐单元场，由几何加载时给定；缺省值用 Ergun 估计：
//!
//! ```text
//! K = ε³ d_p² / (180 (1−ε)²),   β = 1.75 / ε³
//! ```
//!
//! |u|→0 时二次项消失，还原为纯 Darcy 定律。

use glam::DVec3;
use pf_foundation::memory::AlignedVec;
use pf_lattice::fields::{CellTagField, MacroFields};
use pf_lattice::grid::GridDims;
use pf_lattice::stencil::D3Q19;
use pf_lattice::tags::CellTag;

use crate::config::PorousConfig;
use crate::forcing::ForceAggregator;
use crate::types::Face;

/// Ergun 渗透率估计 K = ε³ d_p²/(180(1−ε)²)
#[inline]
pub fn ergun_permeability(porosity: f64, particle_diameter: f64) -> f64 {
    let one_minus = 1.0 - porosity;
    porosity.powi(3) * particle_diameter * particle_diameter / (180.0 * one_minus * one_minus)
}

/// Ergun 惯性系数估计 β = 1.75/ε³
#[inline]
pub fn ergun_beta(porosity: f64) -> f64 {
    1.75 / porosity.powi(3)
}

/// 多孔介质参数场
#[derive(Debug, Clone)]
pub struct PorousMedium {
    /// 逐单元渗透率 K（格子单位）
    pub permeability: AlignedVec<f64>,
    /// 逐单元 Ergun 系数 β
    pub beta: AlignedVec<f64>,
    /// 逐单元孔隙率 ε
    pub porosity: AlignedVec<f64>,
}

impl PorousMedium {
    /// 用默认参数创建（所有单元同值；实际生效与否由标记决定）
    pub fn new(dims: GridDims, defaults: &PorousConfig) -> Self {
        let n = dims.n_cells();
        let mut permeability = AlignedVec::zeros(n);
        let mut beta = AlignedVec::zeros(n);
        let mut porosity = AlignedVec::zeros(n);
        permeability.par_fill(defaults.permeability);
        beta.par_fill(defaults.ergun_beta);
        porosity.par_fill(defaults.porosity);
        Self {
            permeability,
            beta,
            porosity,
        }
    }

    /// 写入逐单元参数（几何加载路径）
    pub fn set_cell(&mut self, cell: usize, permeability: f64, beta: f64, porosity: f64) {
        self.permeability[cell] = permeability;
        self.beta[cell] = beta;
        self.porosity[cell] = porosity;
    }

    /// 计算多孔单元的阻力并累加进聚合器
    ///
    /// μ = ρ ν_mol，ν_mol = c_s²(τ_mol − ½)。
    pub fn accumulate_resistance(
        &self,
        macros: &MacroFields,
        tags: &CellTagField,
        force: &mut ForceAggregator,
    ) {
        let permeability = self.permeability.as_slice();
        let beta = self.beta.as_slice();

        force.par_accumulate(|cell| {
            if !tags.get(cell).is_porous() {
                return DVec3::ZERO;
            }
            let k = permeability[cell];
            if k <= 0.0 {
                return DVec3::ZERO;
            }

            let rho = macros.rho[cell];
            let u = macros.velocity(cell);
            let nu = D3Q19::CS2 * (macros.tau_mol[cell] - 0.5);
            let mu = rho * nu;

            // Darcy 项
            let mut f = u * (-mu / k);
            // Forchheimer 惯性修正
            let speed = u.length();
            if speed > 0.0 {
                f += u * (-rho * beta[cell] / k.sqrt() * speed);
            }
            f
        });
    }
}

/// 滤纸层预设
///
/// 在出流面内侧铺一层薄多孔带，用纸张孔隙率与纤维直径
/// 的 Ergun 估计给出 (K, β)。复用多孔单元的通用阻力路径，
/// 无专门的滤纸物理。
#[derive(Debug, Clone, Copy)]
pub struct FilterPaper {
    /// 层厚 [格]
    pub thickness: usize,
    /// 纸张孔隙率
    pub porosity: f64,
    /// 等效纤维直径 [lu]
    pub fiber_diameter: f64,
}

impl FilterPaper {
    /// 典型滤纸参数
    pub fn standard() -> Self {
        Self {
            thickness: 2,
            porosity: 0.7,
            fiber_diameter: 0.2,
        }
    }

    /// 把滤纸层写入标记与多孔参数场
    ///
    /// 只覆盖原为流体的单元；固体与开边界单元保持不变。
    pub fn apply(
        &self,
        dims: GridDims,
        face: Face,
        tags: &mut CellTagField,
        porous: &mut PorousMedium,
    ) {
        let k = ergun_permeability(self.porosity, self.fiber_diameter);
        let beta = ergun_beta(self.porosity);
        let axis = face.axis();
        let extent = [dims.nx, dims.ny, dims.nz][axis];

        for z in 0..dims.nz {
            for y in 0..dims.ny {
                for x in 0..dims.nx {
                    let coord = [x, y, z][axis];
                    // 面内侧第 1..=thickness 层
                    let depth = match face.inward_sign() {
                        1 => coord,
                        _ => extent - 1 - coord,
                    };
                    if depth == 0 || depth > self.thickness {
                        continue;
                    }
                    let cell = dims.cell_index(x, y, z);
                    if tags.get(cell) == CellTag::Fluid {
                        tags.set(cell, CellTag::Porous);
                        porous.set_cell(cell, k, beta, self.porosity);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PorousConfig;

    #[test]
    fn test_ergun_estimates() {
        // ε=0.45, d_p=1 lu
        let k = ergun_permeability(0.45, 1.0);
        let expected = 0.45f64.powi(3) / (180.0 * 0.55 * 0.55);
        assert!((k - expected).abs() < 1e-15);

        let b = ergun_beta(0.45);
        assert!((b - 1.75 / 0.45f64.powi(3)).abs() < 1e-12);
    }

    fn setup(dims: GridDims) -> (MacroFields, CellTagField, PorousMedium) {
        let mut macros = MacroFields::new(dims);
        macros.rho.par_fill(1.0);
        macros.tau_mol.par_fill(0.8);
        let tags = CellTagField::new(dims);
        let porous = PorousMedium::new(dims, &PorousConfig::default());
        (macros, tags, porous)
    }

    /// |u|→0 极限还原为纯 Darcy：F = −(μ/K)u
    #[test]
    fn test_darcy_limit() {
        let dims = GridDims::new(4, 4, 4);
        let (mut macros, mut tags, porous) = setup(dims);
        let cell = dims.cell_index(2, 2, 2);
        tags.set(cell, CellTag::Porous);

        let u_small = 1e-9;
        macros.ux[cell] = u_small;

        let mut force = ForceAggregator::new(dims);
        porous.accumulate_resistance(&macros, &tags, &mut force);

        let nu = (0.8 - 0.5) / 3.0;
        let k = PorousConfig::default().permeability;
        let darcy = -nu * 1.0 / k * u_small;
        let f = force.get(cell);
        // 二次项量级 u² 可忽略
        assert!((f.x - darcy).abs() / darcy.abs() < 1e-6);
        assert_eq!(f.y, 0.0);
        assert_eq!(f.z, 0.0);
    }

    /// Forchheimer 项随速度二次增长
    #[test]
    fn test_forchheimer_grows_quadratically() {
        let dims = GridDims::new(4, 4, 4);
        let (mut macros, mut tags, porous) = setup(dims);
        let cell = dims.cell_index(1, 1, 1);
        tags.set(cell, CellTag::Porous);

        let measure = |macros: &mut MacroFields, u: f64| {
            macros.ux[cell] = u;
            let mut force = ForceAggregator::new(dims);
            porous.accumulate_resistance(macros, &tags, &mut force);
            force.get(cell).x
        };

        let k = PorousConfig::default().permeability;
        let nu = (0.8 - 0.5) / 3.0;
        let beta = PorousConfig::default().ergun_beta;

        for &u in &[0.001, 0.01, 0.05] {
            let f = measure(&mut macros, u);
            let expected = -(nu / k) * u - beta / k.sqrt() * u * u;
            assert!(
                (f - expected).abs() / expected.abs() < 1e-12,
                "u={}: f={}, 期望 {}",
                u,
                f,
                expected
            );
        }
    }

    /// 非多孔单元不受力
    #[test]
    fn test_fluid_cells_unaffected() {
        let dims = GridDims::new(4, 4, 4);
        let (mut macros, tags, porous) = setup(dims);
        macros.ux.par_fill(0.05);

        let mut force = ForceAggregator::new(dims);
        porous.accumulate_resistance(&macros, &tags, &mut force);
        assert!(force.fx.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_filter_paper_layers() {
        let dims = GridDims::new(4, 4, 8);
        let mut tags = CellTagField::new(dims);
        let mut porous = PorousMedium::new(dims, &PorousConfig::default());
        // z=0 是出流面
        tags.set(dims.cell_index(1, 1, 0), CellTag::Outlet);

        let paper = FilterPaper::standard();
        paper.apply(dims, Face::ZMin, &mut tags, &mut porous);

        // z=1、z=2 变为多孔，z=0（出流）与 z=3 不变
        assert_eq!(tags.get(dims.cell_index(1, 1, 1)), CellTag::Porous);
        assert_eq!(tags.get(dims.cell_index(1, 1, 2)), CellTag::Porous);
        assert_eq!(tags.get(dims.cell_index(1, 1, 0)), CellTag::Outlet);
        assert_eq!(tags.get(dims.cell_index(1, 1, 3)), CellTag::Fluid);

        let k_paper = ergun_permeability(0.7, 0.2);
        let cell = dims.cell_index(1, 1, 1);
        assert!((porous.permeability[cell] - k_paper).abs() < 1e-15);
    }
}
