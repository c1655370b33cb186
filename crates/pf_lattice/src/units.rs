// crates/pf_lattice/src/units.rs

//! 物理单位与格子单位换算
//!
//! 格子内部 Δx = Δt = 1，物理单位只通过一组固定比例因子进入：
//! 长度 [m/lu]、时间 [s/ts]、密度 [kg/m³ per lu]、温度 [K per lu]。
//! 全部换算在此集中完成，内核不出现带量纲常数。

use serde::{Deserialize, Serialize};

/// 单位比例因子
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitScales {
    /// 长度比例 [m/lu]
    pub length: f64,
    /// 时间比例 [s/ts]
    pub time: f64,
    /// 密度比例 [kg/m³ 对应格子密度 1]
    pub density: f64,
    /// 温度比例 [K 对应格子温度 1]
    pub temperature: f64,
}

impl Default for UnitScales {
    fn default() -> Self {
        // V60 尺度的标定：8.5cm 杯高对应 90 格，0.1ms 时间步
        Self {
            length: 0.085 / 90.0,
            time: 1e-4,
            density: 965.3,
            temperature: 1.0,
        }
    }
}

impl UnitScales {
    /// 速度：物理 [m/s] → 格子 [lu/ts]
    #[inline]
    pub fn velocity_to_lattice(&self, v: f64) -> f64 {
        v * self.time / self.length
    }

    /// 速度：格子 → 物理
    #[inline]
    pub fn velocity_to_physical(&self, v: f64) -> f64 {
        v * self.length / self.time
    }

    /// 运动粘度：物理 [m²/s] → 格子
    #[inline]
    pub fn viscosity_to_lattice(&self, nu: f64) -> f64 {
        nu * self.time / (self.length * self.length)
    }

    /// 热扩散率：物理 [m²/s] → 格子（与运动粘度同量纲）
    #[inline]
    pub fn diffusivity_to_lattice(&self, alpha: f64) -> f64 {
        self.viscosity_to_lattice(alpha)
    }

    /// 加速度：物理 [m/s²] → 格子
    #[inline]
    pub fn acceleration_to_lattice(&self, a: f64) -> f64 {
        a * self.time * self.time / self.length
    }

    /// 表面张力：物理 [N/m] → 格子
    ///
    /// σ 的量纲为质量/时间²；质量比例为 ρ_scale·Δx³。
    #[inline]
    pub fn surface_tension_to_lattice(&self, sigma: f64) -> f64 {
        sigma * self.time * self.time / (self.density * self.length * self.length * self.length)
    }

    /// 压强：格子 → 物理 [Pa]
    #[inline]
    pub fn pressure_to_physical(&self, p: f64) -> f64 {
        p * self.density * self.length * self.length / (self.time * self.time)
    }

    /// 时间：格子步数 → 物理 [s]
    #[inline]
    pub fn time_to_physical(&self, steps: f64) -> f64 {
        steps * self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_round_trip() {
        let scales = UnitScales::default();
        let v_phys = 1.8;
        let v_lu = scales.velocity_to_lattice(v_phys);
        assert!((scales.velocity_to_physical(v_lu) - v_phys).abs() < 1e-12);
    }

    #[test]
    fn test_gravity_scale_magnitude() {
        // 默认标定下格子重力应远小于 1，否则时间步标定有误
        let scales = UnitScales::default();
        let g_lu = scales.acceleration_to_lattice(9.81);
        assert!(g_lu > 0.0 && g_lu < 1e-3, "g_lu = {}", g_lu);
    }

    #[test]
    fn test_viscosity_conversion() {
        let scales = UnitScales::default();
        // 90°C 水的运动粘度
        let nu_lu = scales.viscosity_to_lattice(3.15e-7);
        assert!(nu_lu > 0.0);
        // 对应的 τ = 3ν + 0.5 必须大于稳定下限
        let tau = 3.0 * nu_lu + 0.5;
        assert!(tau > 0.5);
    }

    #[test]
    fn test_surface_tension_dimension() {
        let scales = UnitScales::default();
        let sigma_lu = scales.surface_tension_to_lattice(0.063);
        assert!(sigma_lu.is_finite() && sigma_lu > 0.0);
    }
}
