// crates/pf_physics/tests/porous_darcy.rs

//! 多孔介质 Darcy 流动验证
//!
//! 全多孔周期域内恒定体积力 F 与 Darcy 阻力平衡，
//! 稳态速度 u* = F K/μ。等价于柱状算例的压降关系
//! ΔP = (μ/K) U L（体积力即单位长度压降）。

use glam::DVec3;
use pf_physics::{CellTag, Simulation, SimulationConfig};

fn porous_config(n: usize, k: f64, fx: f64) -> SimulationConfig {
    let mut config = SimulationConfig::new(n, n, n);
    config.tau_fluid = 0.8;
    config.gravity = DVec3::ZERO;
    config.drive_force = DVec3::new(fx, 0.0, 0.0);
    config.multiphase_enabled = false;
    config.les_enabled = false;
    config.periodic = [true; 3];
    config.porous.permeability = k;
    config
}

#[test]
fn porous_column_darcy_balance() {
    let n = 12;
    let k = 10.0;
    let fx = 1e-6;
    let tau = 0.8;
    let nu = (tau - 0.5) / 3.0;

    let mut sim = Simulation::create(porous_config(n, k, fx)).unwrap();

    // 全域多孔，β 显式置零隔离 Darcy 项
    let dims = sim.dims();
    let mask = vec![CellTag::Porous.as_u8(); dims.n_cells()];
    let beta = vec![0.0; dims.n_cells()];
    let kfield = vec![k; dims.n_cells()];
    sim.load_geometry(&mask, Some(&kfield), Some(&beta)).unwrap();

    // 松弛时间常数 K/ν = 100 步，跑 12 个时间常数
    for _ in 0..1200 {
        sim.step().unwrap();
    }

    let view = sim.macro_view();
    let cell = dims.cell_index(n / 2, n / 2, n / 2);
    let u = view.ux[cell];

    // 稳态：F = (μ/K)u → u = F·K/(ρν)
    let expected = fx * k / (1.0 * nu);
    let err = (u - expected).abs() / expected;
    assert!(
        err < 0.02,
        "Darcy 稳态速度 {:.4e}，期望 {:.4e}，误差 {:.4}",
        u,
        expected,
        err
    );

    // 横向速度保持为零
    assert!(view.uy[cell].abs() < 1e-12);
    assert!(view.uz[cell].abs() < 1e-12);
}

#[test]
fn forchheimer_reduces_steady_velocity() {
    let n = 10;
    let k = 10.0;
    let fx = 5e-6;

    let steady_u = |beta_value: f64| -> f64 {
        let mut sim = Simulation::create(porous_config(n, k, fx)).unwrap();
        let dims = sim.dims();
        let mask = vec![CellTag::Porous.as_u8(); dims.n_cells()];
        let beta = vec![beta_value; dims.n_cells()];
        let kfield = vec![k; dims.n_cells()];
        sim.load_geometry(&mask, Some(&kfield), Some(&beta)).unwrap();
        for _ in 0..1500 {
            sim.step().unwrap();
        }
        sim.macro_view().ux[dims.cell_index(n / 2, n / 2, n / 2)]
    };

    let u_darcy = steady_u(0.0);
    let u_forch = steady_u(50.0);
    // 惯性项增加阻力，稳态速度下降
    assert!(u_forch < u_darcy, "{} !< {}", u_forch, u_darcy);
    assert!(u_forch > 0.0);
}

#[test]
fn porous_region_damps_flow_versus_open_channel() {
    let n = 12;
    let fx = 1e-6;

    // 同样的驱动下，多孔域的稳态速度远低于自由域
    let mut porous_sim = Simulation::create(porous_config(n, 1.0, fx)).unwrap();
    let dims = porous_sim.dims();
    let mask = vec![CellTag::Porous.as_u8(); dims.n_cells()];
    porous_sim.load_geometry(&mask, None, None).unwrap();

    let mut open_sim = Simulation::create(porous_config(n, 1.0, fx)).unwrap();
    open_sim.load_geometry_with(|_, _, _| CellTag::Fluid).unwrap();

    for _ in 0..300 {
        porous_sim.step().unwrap();
        open_sim.step().unwrap();
    }

    let cell = dims.cell_index(n / 2, n / 2, n / 2);
    let u_porous = porous_sim.macro_view().ux[cell];
    let u_open = open_sim.macro_view().ux[cell];
    assert!(u_porous < u_open * 0.2, "porous {} vs open {}", u_porous, u_open);
}
