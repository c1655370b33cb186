// crates/pf_physics/src/engine/mod.rs

//! 步进编排器
//!
//! [`Simulation`] 独占持有格子与宏观场，按固定次序驱动各内核：
//!
//! 1. 体积力清零
//! 2. LES 涡粘性；τ_mol 更新（热耦合开启时含 μ(T)）
//! 3. 相场演化；法向/曲率；累加表面张力
//! 4. 累加重力、驱动力、多孔阻力、浮力
//! 5. 颗粒插值-积分-散布反作用力
//! 6. 宏观量恢复（Guo 半力修正）；τ_eff；BGK 碰撞；g 碰撞
//! 7. f 与 g 流动
//! 8. f 开边界；T 边界条件
//! 9. 宏观场写回（ρ、u、φ、T）
//! 10. 稳定性门限：失败则标记致命并恢复步前宏观场
//!
//! 一步从调用方视角是原子的：要么通过门限返回成功，要么返回
//! [`StabilityError`] 且引擎拒绝继续步进（直到 `reset`）。
//! 失败后 `macro_view` 仍返回步前状态，便于外部可视化临界场。

pub mod diagnostics;

use glam::DVec3;
use pf_foundation::memory::AlignedVec;
use pf_lattice::fields::{CellTagField, DistributionField, MacroFields, MacroView};
use pf_lattice::grid::GridDims;
use pf_lattice::stencil::D3Q19;
use pf_lattice::tags::CellTag;

use crate::boundary::{BoundaryHandler, InletField};
use crate::collision;
use crate::config::{SimulationConfig, ThermalMode};
use crate::error::{
    ConfigError, PreconditionError, SimResult, StabilityError, StabilityReason,
};
use crate::forcing::ForceAggregator;
use crate::les::LesClosure;
use crate::particles::{GrindDistribution, ParticleSystem, ParticleView, SeedRegion};
use crate::phase::PhaseField;
use crate::porous::{FilterPaper, PorousMedium};
use crate::streaming;
use crate::thermal::{update_tau_mol, ThermalSolver};

use diagnostics::{evaluate_gate, kinetic_energy, Diagnostics, DiagnosticsSnapshot};
use std::sync::atomic::Ordering;

/// 引擎生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// 已创建，几何未加载
    Created,
    /// 可以步进
    Ready,
    /// 稳定性失败，拒绝步进
    Fatal,
}

/// 不透明模拟句柄
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    dims: GridDims,

    macros: MacroFields,
    prev_macros: MacroFields,
    f: DistributionField,
    tags: CellTagField,
    force: ForceAggregator,
    tau_eff: AlignedVec<f64>,

    les: LesClosure,
    phase: PhaseField,
    porous: PorousMedium,
    particles: ParticleSystem,
    thermal: Option<ThermalSolver>,

    boundary: BoundaryHandler,
    inlet: InletField,

    diagnostics: Diagnostics,
    state: Lifecycle,
    fatal_reason: Option<StabilityReason>,
}

impl Simulation {
    /// 创建模拟（校验配置并分配全部场）
    pub fn create(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let dims = config.dims();

        let mut sim = Self {
            dims,
            macros: MacroFields::new(dims),
            prev_macros: MacroFields::new(dims),
            f: DistributionField::new(dims, D3Q19::Q),
            tags: CellTagField::new(dims),
            force: ForceAggregator::new(dims),
            tau_eff: AlignedVec::zeros(dims.n_cells()),
            les: LesClosure::new(config.smagorinsky_constant, config.les_enabled),
            phase: PhaseField::new(dims, config.phase.clone(), config.multiphase_enabled),
            porous: PorousMedium::new(dims, &config.porous),
            particles: ParticleSystem::new(dims, config.particles.clone()),
            thermal: match config.thermal.mode {
                ThermalMode::Off => None,
                _ => Some(ThermalSolver::new(dims, config.thermal.clone())),
            },
            boundary: BoundaryHandler::new(
                config.inlet_face,
                config.outlet_face,
                config.outlet_density,
            ),
            inlet: InletField::new(dims),
            diagnostics: Diagnostics::new(),
            state: Lifecycle::Created,
            fatal_reason: None,
            config,
        };

        // 初始相态：多相从干燥气相起步，单相视为全水
        let (phi0, rho0) = if sim.config.multiphase_enabled {
            (-1.0, sim.config.phase.rho_air)
        } else {
            (1.0, 1.0)
        };
        sim.phase.fill(phi0);
        sim.phase.write_to_macro(&mut sim.macros);
        sim.initialize_uniform(rho0, DVec3::ZERO);

        log::debug!("模拟创建完成: 网格 {}", dims);
        Ok(sim)
    }

    /// 把全场初始化为给定密度与速度的平衡态
    ///
    /// 仅限步进开始前使用：时间步进期间禁止密度调制式驱动。
    pub fn initialize_uniform(&mut self, rho: f64, u: DVec3) {
        for cell in 0..self.dims.n_cells() {
            self.macros.rho[cell] = rho;
            self.macros.set_velocity(cell, u);
            collision::set_equilibrium(&mut self.f, cell, rho, u);
        }
        if let Some(thermal) = &self.thermal {
            let t0 = thermal.config.t_initial;
            self.macros.temperature.par_fill(t0);
        }
        update_tau_mol(
            &mut self.macros,
            self.config.tau_fluid,
            self.config.tau_air,
            self.thermal.as_ref().map(|t| &t.config),
        );
    }

    /// 按单元函数初始化密度与速度的平衡态
    ///
    /// 仅限步进开始前使用（Taylor-Green 等解析初始场）。
    pub fn initialize_with(&mut self, field: impl Fn(usize, usize, usize) -> (f64, DVec3)) {
        let dims = self.dims;
        for z in 0..dims.nz {
            for y in 0..dims.ny {
                for x in 0..dims.nx {
                    let cell = dims.cell_index(x, y, z);
                    let (rho, u) = field(x, y, z);
                    self.macros.rho[cell] = rho;
                    self.macros.set_velocity(cell, u);
                    collision::set_equilibrium(&mut self.f, cell, rho, u);
                }
            }
        }
    }

    /// 初始化球形水滴相场
    pub fn init_phase_sphere(&mut self, center: DVec3, radius: f64) {
        self.phase.init_sphere(center, radius);
        self.phase.write_to_macro(&mut self.macros);
        update_tau_mol(
            &mut self.macros,
            self.config.tau_fluid,
            self.config.tau_air,
            self.thermal.as_ref().map(|t| &t.config),
        );
    }

    /// 初始化水平水层相场（z ≥ z_level 为水）
    pub fn init_phase_slab(&mut self, z_level: f64) {
        self.phase.init_slab(z_level);
        self.phase.write_to_macro(&mut self.macros);
        update_tau_mol(
            &mut self.macros,
            self.config.tau_fluid,
            self.config.tau_air,
            self.thermal.as_ref().map(|t| &t.config),
        );
    }

    /// 指定单元的热 Dirichlet 边界（热耦合开启时有效）
    pub fn set_thermal_dirichlet(&mut self, x: usize, y: usize, z: usize, temperature: f64) {
        let cell = self.dims.cell_index(x, y, z);
        if let Some(thermal) = &mut self.thermal {
            thermal.set_dirichlet(cell, temperature);
        }
    }

    /// 加载几何掩码与逐单元多孔参数
    ///
    /// `mask` 为位级精确的单元标记字节；`porous_k`/`porous_beta`
    /// 为可选的逐单元渗透率与 Ergun 系数（None 用配置默认值）。
    pub fn load_geometry(
        &mut self,
        mask: &[u8],
        porous_k: Option<&[f64]>,
        porous_beta: Option<&[f64]>,
    ) -> SimResult<()> {
        let n = self.dims.n_cells();
        let tags = CellTagField::from_bytes(self.dims, mask).ok_or(ConfigError::InvalidValue {
            key: "mask",
            reason: format!("长度或标记值非法（期望 {} 字节）", n),
        })?;

        if let Some(k) = porous_k {
            if k.len() != n {
                return Err(PreconditionError::FieldSizeMismatch {
                    name: "porous_k",
                    expected: n,
                    actual: k.len(),
                }
                .into());
            }
            if k.iter().any(|&v| v <= 0.0) {
                return Err(ConfigError::InvalidPermeability(
                    k.iter().cloned().fold(f64::MAX, f64::min),
                )
                .into());
            }
        }
        if let Some(b) = porous_beta {
            if b.len() != n {
                return Err(PreconditionError::FieldSizeMismatch {
                    name: "porous_beta",
                    expected: n,
                    actual: b.len(),
                }
                .into());
            }
        }

        self.tags = tags;
        for cell in 0..n {
            let k = porous_k.map(|k| k[cell]).unwrap_or(self.config.porous.permeability);
            let beta = porous_beta
                .map(|b| b[cell])
                .unwrap_or(self.config.porous.ergun_beta);
            self.porous
                .set_cell(cell, k, beta, self.config.porous.porosity);
        }

        if let Some(thermal) = &mut self.thermal {
            thermal.setup_boundaries(&self.tags);
            thermal.apply_porous_heat_capacity(&self.tags);
        }

        self.diagnostics.record_initial_mass(&self.macros, &self.tags);
        self.state = Lifecycle::Ready;
        log::debug!(
            "几何加载完成: 固体 {} / 多孔 {} / 入流 {} / 出流 {}",
            self.tags.count(CellTag::Solid),
            self.tags.count(CellTag::Porous),
            self.tags.count(CellTag::Inlet),
            self.tags.count(CellTag::Outlet)
        );
        Ok(())
    }

    /// 以程序方式逐单元打标记（测试与简单几何路径）
    pub fn load_geometry_with(&mut self, tag_of: impl Fn(usize, usize, usize) -> CellTag) -> SimResult<()> {
        let dims = self.dims;
        let mut mask = vec![0u8; dims.n_cells()];
        for z in 0..dims.nz {
            for y in 0..dims.ny {
                for x in 0..dims.nx {
                    mask[dims.cell_index(x, y, z)] = tag_of(x, y, z).as_u8();
                }
            }
        }
        self.load_geometry(&mask, None, None)
    }

    /// 在出流面内侧铺设滤纸层
    pub fn apply_filter_paper(&mut self, paper: FilterPaper) -> SimResult<()> {
        if self.state == Lifecycle::Created {
            return Err(PreconditionError::GeometryNotLoaded {
                operation: "apply_filter_paper",
            }
            .into());
        }
        paper.apply(
            self.dims,
            self.config.outlet_face,
            &mut self.tags,
            &mut self.porous,
        );
        Ok(())
    }

    /// 播种颗粒云
    pub fn seed_particles(
        &mut self,
        count: usize,
        distribution: &GrindDistribution,
        region: &SeedRegion,
    ) -> SimResult<()> {
        let seed = self.config.seed;
        self.particles
            .seed(count, distribution, region, seed)
            .map_err(Into::into)
    }

    /// 写入入流速度场（注水协作方每步可更新）
    pub fn set_inlet_velocity(&mut self, ux: &[f64], uy: &[f64], uz: &[f64]) -> SimResult<()> {
        let n = self.dims.n_cells();
        for (name, field) in [("inlet_ux", ux), ("inlet_uy", uy), ("inlet_uz", uz)] {
            if field.len() != n {
                return Err(PreconditionError::FieldSizeMismatch {
                    name,
                    expected: n,
                    actual: field.len(),
                }
                .into());
            }
        }
        self.inlet.ux.as_mut_slice().copy_from_slice(ux);
        self.inlet.uy.as_mut_slice().copy_from_slice(uy);
        self.inlet.uz.as_mut_slice().copy_from_slice(uz);
        Ok(())
    }

    /// 入流面均匀速度（便捷路径）
    pub fn set_inlet_uniform(&mut self, u: DVec3) {
        for cell in 0..self.dims.n_cells() {
            if self.tags.get(cell) == CellTag::Inlet {
                self.inlet.set(cell, u);
            }
        }
    }

    /// 推进一个格子时间步
    pub fn step(&mut self) -> SimResult<()> {
        match self.state {
            Lifecycle::Created => {
                return Err(PreconditionError::GeometryNotLoaded { operation: "step" }.into())
            }
            Lifecycle::Fatal => return Err(PreconditionError::EngineFatal.into()),
            Lifecycle::Ready => {}
        }

        // 步前快照：门限失败时恢复
        self.prev_macros.copy_from(&self.macros);

        // 1. 体积力清零
        self.force.reset();

        // 2. LES 涡粘性与 τ_mol
        self.les
            .update(&mut self.macros, &self.tags, &self.config.numerics);
        update_tau_mol(
            &mut self.macros,
            self.config.tau_fluid,
            self.config.tau_air,
            self.thermal.as_ref().map(|t| &t.config),
        );

        // 3. 相场演化与表面张力；刷新界面带标记
        self.phase.step(&self.macros, &self.tags);
        self.phase
            .update_interface_tags(&mut self.tags, self.config.numerics.interface_band);
        self.phase.accumulate_surface_tension(&mut self.force);

        // 4. 重力（力密度 ρg）、恒定驱动、多孔阻力、浮力
        let gravity = self.config.gravity;
        let drive = self.config.drive_force;
        if gravity != DVec3::ZERO {
            let tags = &self.tags;
            let rho = self.macros.rho.as_slice();
            self.force.par_accumulate(|cell| {
                if tags.get(cell).collides() {
                    gravity * rho[cell]
                } else {
                    DVec3::ZERO
                }
            });
        }
        if drive != DVec3::ZERO {
            let tags = &self.tags;
            self.force
                .par_accumulate_constant(drive, |cell| tags.get(cell).collides());
        }
        self.porous
            .accumulate_resistance(&self.macros, &self.tags, &mut self.force);
        if let Some(thermal) = &self.thermal {
            thermal.accumulate_buoyancy(&self.macros, gravity, 1.0, &mut self.force);
        }

        // 5. 颗粒：插值-积分-散布
        let particle_gravity = self.config.particles.gravity_override.unwrap_or(gravity);
        self.particles
            .step(&self.macros, &self.tags, particle_gravity, &mut self.force);

        // 6. 宏观量恢复 + τ_eff + 碰撞
        collision::recover_macro(&self.f, &self.force, &self.tags, &mut self.macros);
        collision::update_tau_eff(
            self.macros.tau_mol.as_slice(),
            self.macros.nu_sgs.as_slice(),
            &self.config.numerics,
            &mut self.tau_eff,
            &self.diagnostics.tau_clip_count,
        );
        collision::collide(
            &mut self.f,
            &self.macros,
            self.tau_eff.as_slice(),
            &self.force,
            &self.tags,
        );
        if let Some(thermal) = &mut self.thermal {
            thermal.collide(&self.macros, &self.tags);
        }

        // 7. 流动
        streaming::stream(
            &mut self.f,
            &self.tags,
            self.macros.rho.as_slice(),
            self.dims,
            self.config.periodic,
            self.config.wall_velocity,
        );
        if let Some(thermal) = &mut self.thermal {
            thermal.stream(&self.tags);
        }

        // 8. 边界
        let fluxes = self
            .boundary
            .apply(&mut self.f, &self.tags, self.dims, &self.inlet);
        self.diagnostics.record_fluxes(fluxes.mass_in, fluxes.mass_out);
        if let Some(thermal) = &mut self.thermal {
            thermal.apply_boundary_conditions(&self.macros);
        }

        // 9. 宏观场写回
        collision::recover_macro(&self.f, &self.force, &self.tags, &mut self.macros);
        self.phase.write_to_macro(&mut self.macros);
        if let Some(thermal) = &self.thermal {
            thermal.write_to_macro(&mut self.macros);
        }

        // 10. 稳定性门限
        match evaluate_gate(&self.macros, &self.tags, &self.config.numerics) {
            Ok(metrics) => {
                self.diagnostics.step_count += 1;
                let cs = D3Q19::CS2.sqrt();
                self.diagnostics.last = DiagnosticsSnapshot {
                    step_count: self.diagnostics.step_count,
                    max_velocity: metrics.max_velocity,
                    cfl: metrics.max_velocity,
                    mach: metrics.max_velocity / cs,
                    tau_clip_count: self.diagnostics.tau_clip_count.load(Ordering::Relaxed),
                    les_suppression_count: self.les.suppressions(),
                    mass_drift: self.diagnostics.mass_drift(&self.macros, &self.tags),
                    kinetic_energy: kinetic_energy(&self.macros, &self.tags),
                    phi_total: self.phase.total_phi(),
                };
                Ok(())
            }
            Err((reason, metrics)) => {
                // 恢复步前宏观场，保持只读视图可用
                self.macros.copy_from(&self.prev_macros);
                self.state = Lifecycle::Fatal;
                self.fatal_reason = Some(reason);

                let cs = D3Q19::CS2.sqrt();
                let snapshot = DiagnosticsSnapshot {
                    step_count: self.diagnostics.step_count,
                    max_velocity: metrics.max_velocity,
                    cfl: metrics.max_velocity,
                    mach: metrics.max_velocity / cs,
                    tau_clip_count: self.diagnostics.tau_clip_count.load(Ordering::Relaxed),
                    les_suppression_count: self.les.suppressions(),
                    mass_drift: self.diagnostics.last.mass_drift,
                    kinetic_energy: self.diagnostics.last.kinetic_energy,
                    phi_total: self.diagnostics.last.phi_total,
                };
                log::warn!(
                    "步进失稳 [{}] @ step {}: max|u|={:.4e}",
                    reason.code(),
                    self.diagnostics.step_count,
                    metrics.max_velocity
                );
                Err(StabilityError {
                    reason,
                    diagnostics: snapshot,
                }
                .into())
            }
        }
    }

    /// 连续推进多步，按间隔回调快照钩子
    ///
    /// 外部 IO（快照、绘图）只在完整步之间、按配置的间隔触发，
    /// 从不进入内核。任何一步失稳立即返回错误。
    pub fn run(
        &mut self,
        steps: u64,
        snapshot_every: Option<u64>,
        mut hook: impl FnMut(&Simulation),
    ) -> SimResult<()> {
        for i in 1..=steps {
            self.step()?;
            if let Some(every) = snapshot_every {
                if every > 0 && i % every == 0 {
                    hook(self);
                }
            }
        }
        Ok(())
    }

    /// 致命状态复位
    ///
    /// 把分布函数重置为当前宏观场（步前状态）的平衡态后恢复步进。
    pub fn reset(&mut self) {
        if self.state != Lifecycle::Fatal {
            return;
        }
        for cell in 0..self.dims.n_cells() {
            let rho = self.macros.rho[cell].max(1e-3);
            let u = self.macros.velocity(cell);
            collision::set_equilibrium(&mut self.f, cell, rho, u);
        }
        self.fatal_reason = None;
        self.state = Lifecycle::Ready;
    }

    // ========== 只读访问 ==========

    /// 宏观场只读视图（有效至下一次 `step`）
    pub fn macro_view(&self) -> MacroView<'_> {
        self.macros.view()
    }

    /// 颗粒只读视图
    pub fn particle_view(&self) -> ParticleView<'_> {
        self.particles.view()
    }

    /// 最近一次诊断快照
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.last
    }

    /// 单元标记（快照位级保存用）
    pub fn tag_mask(&self) -> &[u8] {
        self.tags.as_bytes()
    }

    /// 网格尺寸
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// 配置
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// 失稳原因（致命状态时）
    pub fn fatal_reason(&self) -> Option<StabilityReason> {
        self.fatal_reason
    }

    // ========== 快照编码 ==========

    /// 宏观场快照（小端 f32 原始数组 + 头部）
    pub fn encode_macro_snapshot(&self) -> Vec<u8> {
        crate::snapshot::encode_macro(&self.macros.view())
    }

    /// 颗粒快照
    pub fn encode_particle_snapshot(&self) -> Vec<u8> {
        crate::snapshot::encode_particles(&self.particles.view())
    }

    /// 标记掩码快照（位级精确可恢复）
    pub fn encode_mask_snapshot(&self) -> Vec<u8> {
        crate::snapshot::encode_mask(self.dims, self.tags.as_bytes())
    }
}
