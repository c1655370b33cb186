// crates/pf_physics/src/config.rs

//! 求解器配置
//!
//! 单一不可变配置记录：所有运行期参数在 `create` 时一次性给定，
//! 之后不再修改。未识别的配置项由 serde 的 `deny_unknown_fields` 拒绝。
//!
//! 配置全部使用 f64 存储，便于 JSON 序列化与跨精度构建。

use glam::DVec3;
use pf_lattice::grid::GridDims;
use pf_lattice::stencil::{D3Q19, D3Q7};
use pf_lattice::units::UnitScales;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Face, NumericalParams};

// ============================================================
// 热耦合配置
// ============================================================

/// 热耦合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThermalMode {
    /// 关闭：不演化温度场
    #[default]
    Off,
    /// 弱耦合：仅对流输运与粘度更新，无浮力
    Weak,
    /// 强耦合：对流 + 粘度更新 + Boussinesq 浮力
    Strong,
}

impl ThermalMode {
    /// 温度场是否演化
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Off)
    }

    /// 是否启用浮力
    #[inline]
    pub fn buoyancy_enabled(&self) -> bool {
        matches!(self, Self::Strong)
    }
}

/// 热耦合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThermalConfig {
    /// 耦合模式
    #[serde(default)]
    pub mode: ThermalMode,
    /// 温度分布松弛时间 τ_T
    #[serde(default = "default_tau_thermal")]
    pub tau_thermal: f64,
    /// 入流热水温度 [K]
    #[serde(default = "default_t_inlet")]
    pub t_inlet: f64,
    /// 初始温度 [K]
    #[serde(default = "default_t_initial")]
    pub t_initial: f64,
    /// 环境温度 [K]（Robin 边界）
    #[serde(default = "default_t_env")]
    pub t_env: f64,
    /// 壁面换热系数（格子单位，Robin 边界）
    #[serde(default = "default_h_env")]
    pub h_env: f64,
    /// 体积膨胀系数 β_T [1/K]
    #[serde(default = "default_beta_t")]
    pub beta_t: f64,
    /// Boussinesq 参考温度 [K]
    #[serde(default = "default_t_ref")]
    pub t_ref: f64,
    /// 浮力幅值上限（格子单位）
    #[serde(default = "default_max_buoyancy")]
    pub max_buoyancy: f64,
    /// Vogel 粘度关联活化温度 E_a/R [K]
    #[serde(default = "default_vogel_activation")]
    pub vogel_activation: f64,
    /// Vogel 关联参考温度 T₀ [K]
    #[serde(default = "default_vogel_t0")]
    pub vogel_t0: f64,
    /// 多孔区有效热容比 (ρc_p)_w / (ρc_p)_eff
    #[serde(default = "default_porous_heat_ratio")]
    pub porous_heat_capacity_ratio: f64,
}

fn default_tau_thermal() -> f64 {
    0.8
}
fn default_t_inlet() -> f64 {
    366.15 // 93°C
}
fn default_t_initial() -> f64 {
    298.15 // 25°C
}
fn default_t_env() -> f64 {
    298.15
}
fn default_h_env() -> f64 {
    0.01
}
fn default_beta_t() -> f64 {
    2.1e-4
}
fn default_t_ref() -> f64 {
    363.15 // 90°C
}
fn default_max_buoyancy() -> f64 {
    0.1
}
fn default_vogel_activation() -> f64 {
    1828.0
}
fn default_vogel_t0() -> f64 {
    363.15
}
fn default_porous_heat_ratio() -> f64 {
    1.0
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            mode: ThermalMode::Off,
            tau_thermal: default_tau_thermal(),
            t_inlet: default_t_inlet(),
            t_initial: default_t_initial(),
            t_env: default_t_env(),
            h_env: default_h_env(),
            beta_t: default_beta_t(),
            t_ref: default_t_ref(),
            max_buoyancy: default_max_buoyancy(),
            vogel_activation: default_vogel_activation(),
            vogel_t0: default_vogel_t0(),
            porous_heat_capacity_ratio: default_porous_heat_ratio(),
        }
    }
}

// ============================================================
// 相场配置
// ============================================================

/// 相场配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseConfig {
    /// 表面张力系数 σ（格子单位）
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// 相场迁移率 M
    #[serde(default = "default_mobility")]
    pub mobility: f64,
    /// 界面厚度参数 ξ（数值界面带约 4ξ 格）
    #[serde(default = "default_interface_width")]
    pub interface_width: f64,
    /// 水相格子密度
    #[serde(default = "default_rho_water")]
    pub rho_water: f64,
    /// 气相格子密度
    #[serde(default = "default_rho_air")]
    pub rho_air: f64,
}

fn default_sigma() -> f64 {
    0.01
}
fn default_mobility() -> f64 {
    0.001
}
fn default_interface_width() -> f64 {
    1.0
}
fn default_rho_water() -> f64 {
    1.0
}
fn default_rho_air() -> f64 {
    0.1
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            sigma: default_sigma(),
            mobility: default_mobility(),
            interface_width: default_interface_width(),
            rho_water: default_rho_water(),
            rho_air: default_rho_air(),
        }
    }
}

// ============================================================
// 多孔介质配置
// ============================================================

/// 多孔介质默认参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PorousConfig {
    /// 默认渗透率 K（格子单位）
    #[serde(default = "default_permeability")]
    pub permeability: f64,
    /// 默认 Ergun 系数 β
    #[serde(default = "default_ergun_beta")]
    pub ergun_beta: f64,
    /// 默认孔隙率 ε
    #[serde(default = "default_porosity")]
    pub porosity: f64,
}

fn default_permeability() -> f64 {
    1e-4
}
fn default_ergun_beta() -> f64 {
    19.2 // 1.75/ε³ @ ε=0.45
}
fn default_porosity() -> f64 {
    0.45
}

impl Default for PorousConfig {
    fn default() -> Self {
        Self {
            permeability: default_permeability(),
            ergun_beta: default_ergun_beta(),
            porosity: default_porosity(),
        }
    }
}

// ============================================================
// 颗粒配置
// ============================================================

/// 颗粒系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticleConfig {
    /// 颗粒池容量 P_max
    #[serde(default = "default_particle_capacity")]
    pub capacity: usize,
    /// 颗粒材料密度（格子单位，相对水）
    #[serde(default = "default_particle_density")]
    pub density: f64,
    /// 阻力欠松弛因子 α ∈ [0.5, 0.8]
    #[serde(default = "default_drag_relaxation")]
    pub drag_relaxation: f64,
    /// 接触法向刚度 k_n
    #[serde(default = "default_contact_stiffness")]
    pub contact_stiffness: f64,
    /// 接触法向阻尼 γ_n
    #[serde(default = "default_contact_damping")]
    pub contact_damping: f64,
    /// 壁面恢复系数 ∈ [0, 1]
    #[serde(default = "default_restitution")]
    pub wall_restitution: f64,
    /// 颗粒专用重力（None 时沿用全局重力）
    ///
    /// 静水沉降类算例用它把重力只作用于颗粒，
    /// 避免周期域内流体整体加速。
    #[serde(default)]
    pub gravity_override: Option<glam::DVec3>,
}

fn default_particle_capacity() -> usize {
    500_000
}
fn default_particle_density() -> f64 {
    1.24 // 中烘焙咖啡豆 1200 kg/m³ 相对 90°C 水
}
fn default_drag_relaxation() -> f64 {
    0.65
}
fn default_contact_stiffness() -> f64 {
    0.1
}
fn default_contact_damping() -> f64 {
    0.01
}
fn default_restitution() -> f64 {
    0.3
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            capacity: default_particle_capacity(),
            density: default_particle_density(),
            drag_relaxation: default_drag_relaxation(),
            contact_stiffness: default_contact_stiffness(),
            contact_damping: default_contact_damping(),
            wall_restitution: default_restitution(),
            gravity_override: None,
        }
    }
}

// ============================================================
// 主配置
// ============================================================

/// 求解器配置（不可变记录）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// x 方向格点数
    pub nx: usize,
    /// y 方向格点数
    pub ny: usize,
    /// z 方向格点数
    pub nz: usize,

    /// 水相松弛时间 τ_fluid
    #[serde(default = "default_tau_fluid")]
    pub tau_fluid: f64,
    /// 气相松弛时间 τ_air
    #[serde(default = "default_tau_air")]
    pub tau_air: f64,

    /// 重力加速度向量（格子单位）
    #[serde(default = "default_gravity")]
    pub gravity: DVec3,

    /// 可选恒定体积力驱动（格子单位）
    #[serde(default)]
    pub drive_force: DVec3,

    /// 固壁切向速度（Ladd 动壁修正；静壁保持零）
    #[serde(default)]
    pub wall_velocity: DVec3,

    /// 单位比例因子
    #[serde(default)]
    pub scales: UnitScales,

    /// 各轴周期性
    #[serde(default)]
    pub periodic: [bool; 3],

    /// 入流面
    #[serde(default = "default_inlet_face")]
    pub inlet_face: Face,
    /// 出流面
    #[serde(default = "default_outlet_face")]
    pub outlet_face: Face,
    /// 出流参考密度 ρ_out
    #[serde(default = "default_outlet_density")]
    pub outlet_density: f64,

    /// Smagorinsky 常数 C_s
    #[serde(default = "default_smagorinsky")]
    pub smagorinsky_constant: f64,
    /// 是否启用 LES 闭合
    #[serde(default = "default_les_enabled")]
    pub les_enabled: bool,

    /// 相场配置
    #[serde(default)]
    pub phase: PhaseConfig,
    /// 是否启用相场多相
    #[serde(default = "default_multiphase_enabled")]
    pub multiphase_enabled: bool,

    /// 多孔介质默认参数
    #[serde(default)]
    pub porous: PorousConfig,

    /// 颗粒系统配置
    #[serde(default)]
    pub particles: ParticleConfig,

    /// 热耦合配置
    #[serde(default)]
    pub thermal: ThermalConfig,

    /// 数值守护参数
    #[serde(default)]
    pub numerics: NumericalParams,

    /// 随机种子（颗粒播种）
    #[serde(default)]
    pub seed: u64,
}

fn default_tau_fluid() -> f64 {
    0.55
}
fn default_tau_air() -> f64 {
    0.8
}
fn default_gravity() -> DVec3 {
    DVec3::new(0.0, 0.0, -1e-5)
}
fn default_inlet_face() -> Face {
    Face::ZMax
}
fn default_outlet_face() -> Face {
    Face::ZMin
}
fn default_outlet_density() -> f64 {
    1.0
}
fn default_smagorinsky() -> f64 {
    0.18
}
fn default_les_enabled() -> bool {
    true
}
fn default_multiphase_enabled() -> bool {
    true
}

impl SimulationConfig {
    /// 创建指定网格尺寸的默认配置
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            nx,
            ny,
            nz,
            tau_fluid: default_tau_fluid(),
            tau_air: default_tau_air(),
            gravity: default_gravity(),
            drive_force: DVec3::ZERO,
            wall_velocity: DVec3::ZERO,
            scales: UnitScales::default(),
            periodic: [false; 3],
            inlet_face: default_inlet_face(),
            outlet_face: default_outlet_face(),
            outlet_density: default_outlet_density(),
            smagorinsky_constant: default_smagorinsky(),
            les_enabled: default_les_enabled(),
            phase: PhaseConfig::default(),
            multiphase_enabled: default_multiphase_enabled(),
            porous: PorousConfig::default(),
            particles: ParticleConfig::default(),
            thermal: ThermalConfig::default(),
            numerics: NumericalParams::default(),
            seed: 0,
        }
    }

    /// 网格尺寸
    #[inline]
    pub fn dims(&self) -> GridDims {
        GridDims::new(self.nx, self.ny, self.nz)
    }

    /// 校验配置
    ///
    /// 在任何步进开始之前拒绝无效配置。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nx < 3 || self.ny < 3 || self.nz < 3 {
            return Err(ConfigError::InvalidExtents(format!(
                "{}×{}×{}，每个方向至少 3 格",
                self.nx, self.ny, self.nz
            )));
        }

        if self.tau_fluid <= 0.5 {
            return Err(ConfigError::InvalidTau {
                name: "tau_fluid",
                value: self.tau_fluid,
            });
        }
        if self.tau_air <= 0.5 {
            return Err(ConfigError::InvalidTau {
                name: "tau_air",
                value: self.tau_air,
            });
        }

        if self.porous.permeability <= 0.0 {
            return Err(ConfigError::InvalidPermeability(self.porous.permeability));
        }
        if !(0.0 < self.porous.porosity && self.porous.porosity < 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "porous.porosity",
                reason: format!("{}，必须位于 (0, 1)", self.porous.porosity),
            });
        }

        if self.phase.sigma < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "phase.sigma",
                reason: format!("{}，不能为负", self.phase.sigma),
            });
        }
        if self.phase.interface_width <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "phase.interface_width",
                reason: "必须为正".to_string(),
            });
        }

        if !(0.5..=0.8).contains(&self.particles.drag_relaxation) {
            return Err(ConfigError::InvalidValue {
                key: "particles.drag_relaxation",
                reason: format!("{}，必须位于 [0.5, 0.8]", self.particles.drag_relaxation),
            });
        }
        if !(0.0..=1.0).contains(&self.particles.wall_restitution) {
            return Err(ConfigError::InvalidValue {
                key: "particles.wall_restitution",
                reason: format!("{}，必须位于 [0, 1]", self.particles.wall_restitution),
            });
        }

        self.validate_thermal()?;

        Ok(())
    }

    /// 热耦合一致性校验
    fn validate_thermal(&self) -> Result<(), ConfigError> {
        let t = &self.thermal;
        if !t.mode.is_active() {
            return Ok(());
        }

        if t.tau_thermal <= 0.5 {
            return Err(ConfigError::InvalidTau {
                name: "thermal.tau_thermal",
                value: t.tau_thermal,
            });
        }
        if t.t_inlet <= 0.0 || t.t_initial <= 0.0 {
            return Err(ConfigError::InconsistentThermal(
                "温度必须为正（Kelvin）".to_string(),
            ));
        }

        if matches!(t.mode, ThermalMode::Strong) {
            // 强耦合要求 CFL_T = α Δt/Δx² ≤ 0.1
            let alpha = D3Q7::CS2 * (t.tau_thermal - 0.5);
            if alpha > 0.1 {
                return Err(ConfigError::InconsistentThermal(format!(
                    "CFL_T = {:.4} > 0.1，请减小 tau_thermal",
                    alpha
                )));
            }

            // Rayleigh 数上限 Ra ≤ 1e6
            let nu = D3Q19::CS2 * (self.tau_fluid - 0.5);
            let delta_t = (t.t_inlet - t.t_initial).abs();
            let l = self.nz as f64;
            let g = self.gravity.length();
            let ra = t.beta_t * g * delta_t * l * l * l / (nu * alpha).max(1e-30);
            if ra > 1e6 {
                return Err(ConfigError::InconsistentThermal(format!(
                    "Rayleigh 数 {:.3e} > 1e6，强耦合不可用",
                    ra
                )));
            }
        }

        Ok(())
    }
}
