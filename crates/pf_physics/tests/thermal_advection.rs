// crates/pf_physics/tests/thermal_advection.rs

//! 热对流-扩散前沿验证（弱耦合模式）
//!
//! 均匀柱塞流 u = (U, 0, 0)，x=0 平面定温 T_hot，其余初始 T_cold。
//! 解析解为误差函数前沿：
//! ```text
//! T(x,t) = T_cold + ΔT/2 · erfc((x − Ut)/(2√(αt)))
//! ```
//! 在 t = L/(2U) 时刻检验前沿位置（T 过中值点）与前沿宽度。

use glam::DVec3;
use pf_physics::{CellTag, Simulation, SimulationConfig, ThermalMode};

const T_COLD: f64 = 1.0;
const T_HOT: f64 = 2.0;

fn plug_flow_config(nx: usize, ny: usize, nz: usize, tau_t: f64) -> SimulationConfig {
    let mut config = SimulationConfig::new(nx, ny, nz);
    config.tau_fluid = 0.8;
    config.gravity = DVec3::ZERO;
    config.multiphase_enabled = false;
    config.les_enabled = false;
    config.periodic = [false, true, true];
    config.thermal.mode = ThermalMode::Weak;
    config.thermal.tau_thermal = tau_t;
    config.thermal.t_initial = T_COLD;
    config.thermal.t_inlet = T_HOT;
    config.thermal.h_env = 0.0; // 侧壁零梯度
    config.thermal.vogel_activation = 0.0; // 隔离输运本身
    config
}

/// 误差函数（Abramowitz-Stegun 7.1.26 有理逼近）
fn erf(x: f64) -> f64 {
    if x < 0.0 {
        return -erf(-x);
    }
    let p = 0.327_591_1;
    let a = [
        0.254_829_592,
        -0.284_496_736,
        1.421_413_741,
        -1.453_152_027,
        1.061_405_429,
    ];
    let t = 1.0 / (1.0 + p * x);
    let poly = t * (a[0] + t * (a[1] + t * (a[2] + t * (a[3] + t * a[4]))));
    1.0 - poly * (-x * x).exp()
}

/// 缩放互补误差函数 erfcx(x) = e^{x²} erfc(x)（x ≥ 0）
fn erfcx(x: f64) -> f64 {
    if x > 2.5 {
        // 渐近展开，避免下溢后再放大
        let inv = 1.0 / (x * x);
        (1.0 - 0.5 * inv + 0.75 * inv * inv) / (x * std::f64::consts::PI.sqrt())
    } else {
        (1.0 - erf(x)) * (x * x).exp()
    }
}

/// 半无限域定温边界 + 柱塞流的解析解（Ogata-Banks）
///
/// θ(x,t) = ½[erfc((x−Ut)/(2√(αt))) + e^{Ux/α} erfc((x+Ut)/(2√(αt)))]
fn analytic_theta(x: f64, t: f64, u: f64, alpha: f64) -> f64 {
    let denom = 2.0 * (alpha * t).sqrt();
    let eta1 = (x - u * t) / denom;
    let eta2 = (x + u * t) / denom;
    let term1 = 1.0 - erf(eta1);
    // 指数合并计算 e^{Ux/α − η₂²}·erfcx(η₂)，避免中间量溢出
    let term2 = (u * x / alpha - eta2 * eta2).exp() * erfcx(eta2.max(0.0));
    0.5 * (term1 + term2)
}

/// 沿 x 的温度剖面中找 T = level 的插值交点
fn crossing(profile: &[f64], level: f64) -> Option<f64> {
    for i in 0..profile.len() - 1 {
        let (a, b) = (profile[i], profile[i + 1]);
        if (a - level) * (b - level) <= 0.0 && a != b {
            return Some(i as f64 + (a - level) / (a - b));
        }
    }
    None
}

#[test]
fn thermal_front_advects_and_diffuses() {
    let (nx, ny, nz) = (64, 8, 8);
    let u0 = 0.04;
    let tau_t = 0.8;
    let alpha = 0.25 * (tau_t - 0.5);

    let mut sim = Simulation::create(plug_flow_config(nx, ny, nz, tau_t)).unwrap();
    sim.load_geometry_with(|_, _, _| CellTag::Fluid).unwrap();
    sim.initialize_uniform(1.0, DVec3::new(u0, 0.0, 0.0));

    // x=0 平面定温热源
    for z in 0..nz {
        for y in 0..ny {
            sim.set_thermal_dirichlet(0, y, z, T_HOT);
        }
    }

    // 运行到前沿抵达域中点：t = L/(2U)
    let steps = (nx as f64 / (2.0 * u0)) as usize;
    for _ in 0..steps {
        sim.step().unwrap();
    }

    let view = sim.macro_view();
    let dims = sim.dims();
    let profile: Vec<f64> = (0..nx)
        .map(|x| view.temperature[dims.cell_index(x, ny / 2, nz / 2)])
        .collect();

    // 整条剖面与解析解逐点比较（出流端附近除外）
    let t = steps as f64;
    let dt_range = T_HOT - T_COLD;
    let mut max_err = 0.0f64;
    for (x, &temp) in profile.iter().enumerate().take(nx - 3) {
        let theta = analytic_theta(x as f64, t, u0, alpha);
        let expected = T_COLD + dt_range * theta;
        max_err = max_err.max((temp - expected).abs() / dt_range);
    }
    assert!(max_err < 0.03, "剖面最大偏差 {:.4}", max_err);

    // 前沿位置：测量交点对比解析交点
    let mid = 0.5 * (T_HOT + T_COLD);
    let x_front = crossing(&profile, mid).expect("前沿未进入域内");
    let analytic_profile: Vec<f64> = (0..nx)
        .map(|x| T_COLD + dt_range * analytic_theta(x as f64, t, u0, alpha))
        .collect();
    let x_front_analytic = crossing(&analytic_profile, mid).unwrap();
    assert!(
        (x_front - x_front_analytic).abs() < 0.01 * nx as f64,
        "前沿位置 {:.2}，解析 {:.2}",
        x_front,
        x_front_analytic
    );

    // 前沿宽度：θ=0.75 与 θ=0.25 交点间距对比解析宽度
    let level_75 = T_COLD + 0.75 * dt_range;
    let level_25 = T_COLD + 0.25 * dt_range;
    let width = crossing(&profile, level_25).unwrap() - crossing(&profile, level_75).unwrap();
    let width_analytic = crossing(&analytic_profile, level_25).unwrap()
        - crossing(&analytic_profile, level_75).unwrap();
    assert!(
        (width - width_analytic).abs() / width_analytic < 0.03,
        "前沿宽度 {:.2}，解析 {:.2}",
        width,
        width_analytic
    );

    // 上游完全加热、下游尚未触及
    assert!((profile[1] - T_HOT).abs() < 0.05 * dt_range);
    assert!((profile[nx - 3] - T_COLD).abs() < 0.05 * dt_range);
}

#[test]
fn pure_diffusion_spreads_symmetrically() {
    let n = 32;
    let tau_t = 0.9;
    let mut sim = Simulation::create(plug_flow_config(n, 6, 6, tau_t)).unwrap();
    sim.load_geometry_with(|_, _, _| CellTag::Fluid).unwrap();
    sim.initialize_uniform(1.0, DVec3::ZERO);

    // 中央平面热源
    for z in 0..6 {
        for y in 0..6 {
            sim.set_thermal_dirichlet(n / 2, y, z, T_HOT);
        }
    }

    for _ in 0..200 {
        sim.step().unwrap();
    }

    let view = sim.macro_view();
    let dims = sim.dims();
    // 静止流体中扩散左右对称
    for d in 1..8 {
        let left = view.temperature[dims.cell_index(n / 2 - d, 3, 3)];
        let right = view.temperature[dims.cell_index(n / 2 + d, 3, 3)];
        assert!(
            (left - right).abs() < 1e-9,
            "扩散不对称 d={}: {} vs {}",
            d,
            left,
            right
        );
        // 单调衰减
        assert!(left < T_HOT);
        assert!(left > T_COLD - 1e-12);
    }
}

#[test]
fn weak_coupling_does_not_stir_fluid() {
    let n = 16;
    let mut sim = Simulation::create(plug_flow_config(n, 8, 8, 0.8)).unwrap();
    sim.load_geometry_with(|_, _, _| CellTag::Fluid).unwrap();
    sim.initialize_uniform(1.0, DVec3::ZERO);

    for z in 0..8 {
        for y in 0..8 {
            sim.set_thermal_dirichlet(0, y, z, T_HOT);
        }
    }
    for _ in 0..100 {
        sim.step().unwrap();
    }

    // 弱耦合无浮力：温度梯度不得驱动流动
    let diag = sim.diagnostics();
    assert!(diag.max_velocity < 1e-12, "弱耦合下流体被搅动: {:.3e}", diag.max_velocity);
}
