// crates/pf_physics/src/streaming.rs

//! 流动步骤
//!
//! 拉取式传播：`f_q(x, t+1) = f*_q(x − e_q, t)`。
//! 碰撞写入 next 缓冲，流动从 next 读取写回 curr，无需拷贝交换。
//!
//! 半步反弹在拉取时就地完成：当拉取源为固体单元时，
//! 取本单元反向方向的碰撞后分布，并叠加 Ladd 动壁修正
//! `+2 w_q ρ (e_q·u_wall)/c_s²`。壁面位于流体与固体格点的中点。
//!
//! 周期方向按轴回绕；非周期的域边缘拉取缺失时保持碰撞后值，
//! 由随后的边界阶段（入流/出流/固壁标记）负责覆盖。

use glam::DVec3;
use pf_lattice::fields::{CellTagField, DistributionField};
use pf_lattice::grid::GridDims;
use pf_lattice::stencil::D3Q19;
use rayon::prelude::*;

/// 流动内核
///
/// `wall_velocity` 为动壁速度（静壁传 `DVec3::ZERO`）。
pub fn stream(
    f: &mut DistributionField,
    tags: &CellTagField,
    rho: &[f64],
    dims: GridDims,
    periodic: [bool; 3],
    wall_velocity: DVec3,
) {
    let n = dims.n_cells();
    let (dst, src) = f.stream_buffers();

    dst.par_chunks_mut(n).enumerate().for_each(|(q, block)| {
        let e = D3Q19::E[q];
        let opp = D3Q19::OPP[q];
        let e_dot_uw = e[0] as f64 * wall_velocity.x
            + e[1] as f64 * wall_velocity.y
            + e[2] as f64 * wall_velocity.z;

        block.par_iter_mut().enumerate().for_each(|(cell, out)| {
            if tags.get(cell).is_solid() {
                // 固体单元仅保留镜像值
                *out = src[q * n + cell];
                return;
            }

            let (x, y, z) = dims.cell_coords(cell);
            match pull_source(dims, periodic, x, y, z, e) {
                Some(source) => {
                    if tags.get(source).is_solid() {
                        // 半步反弹 + Ladd 动壁修正
                        *out = src[opp * n + cell]
                            + 2.0 * D3Q19::W[q] * rho[cell] * e_dot_uw * D3Q19::INV_CS2;
                    } else {
                        *out = src[q * n + source];
                    }
                }
                None => {
                    // 域边缘缺失拉取：保持碰撞后值，边界阶段覆盖
                    *out = src[q * n + cell];
                }
            }
        });
    });
}

/// 逆流动内核
///
/// `f_q(x) ← f_q(x + e_q)`，仅用于传播置换性质的验证。
pub fn stream_inverse(f: &mut DistributionField, dims: GridDims, periodic: [bool; 3]) {
    let n = dims.n_cells();
    // 先把 curr 移入 next 作为源
    f.swap();
    let (dst, src) = f.stream_buffers();

    dst.par_chunks_mut(n).enumerate().for_each(|(q, block)| {
        let e = D3Q19::E[q];
        let e_inv = [-e[0], -e[1], -e[2]];
        block.par_iter_mut().enumerate().for_each(|(cell, out)| {
            let (x, y, z) = dims.cell_coords(cell);
            match pull_source(dims, periodic, x, y, z, e_inv) {
                Some(source) => *out = src[q * n + source],
                None => *out = src[q * n + cell],
            }
        });
    });
}

/// 计算拉取源单元：x − e（按轴处理周期回绕）
#[inline]
fn pull_source(
    dims: GridDims,
    periodic: [bool; 3],
    x: usize,
    y: usize,
    z: usize,
    e: [i32; 3],
) -> Option<usize> {
    let extents = [dims.nx as i64, dims.ny as i64, dims.nz as i64];
    let mut c = [x as i64 - e[0] as i64, y as i64 - e[1] as i64, z as i64 - e[2] as i64];

    for a in 0..3 {
        if c[a] < 0 || c[a] >= extents[a] {
            if periodic[a] {
                c[a] = c[a].rem_euclid(extents[a]);
            } else {
                return None;
            }
        }
    }
    Some(dims.cell_index(c[0] as usize, c[1] as usize, c[2] as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_lattice::tags::CellTag;

    fn make_fields(dims: GridDims) -> (DistributionField, CellTagField, Vec<f64>) {
        let f = DistributionField::new(dims, 19);
        let tags = CellTagField::new(dims);
        let rho = vec![1.0; dims.n_cells()];
        (f, tags, rho)
    }

    /// 周期域上流动是置换：正向 + 逆向 = 恒等
    #[test]
    fn test_streaming_permutation_round_trip() {
        let dims = GridDims::new(6, 5, 4);
        let periodic = [true; 3];
        let (mut f, tags, rho) = make_fields(dims);

        // 每个 (q, cell) 唯一取值
        for q in 0..19 {
            for cell in 0..dims.n_cells() {
                f.set_next(q, cell, (q * dims.n_cells() + cell) as f64);
            }
        }
        let original: Vec<f64> = (0..19)
            .flat_map(|q| (0..dims.n_cells()).map(move |c| (q * dims.n_cells() + c) as f64))
            .collect();

        stream(&mut f, &tags, &rho, dims, periodic, DVec3::ZERO);
        stream_inverse(&mut f, dims, periodic);

        for q in 0..19 {
            for cell in 0..dims.n_cells() {
                assert_eq!(f.get(q, cell), original[q * dims.n_cells() + cell]);
            }
        }
    }

    /// 流动把分布沿自身方向移动一格
    #[test]
    fn test_streaming_shifts_along_direction() {
        let dims = GridDims::new(5, 4, 4);
        let (mut f, tags, rho) = make_fields(dims);

        let cell = dims.cell_index(2, 1, 1);
        f.set_next(1, cell, 0.7); // 方向 1 = (1,0,0)

        stream(&mut f, &tags, &rho, dims, [true; 3], DVec3::ZERO);

        let dst = dims.cell_index(3, 1, 1);
        assert_eq!(f.get(1, dst), 0.7);
        assert_eq!(f.get(1, cell), 0.0);
    }

    /// 周期域上流动保持总质量
    #[test]
    fn test_streaming_conserves_mass_periodic() {
        let dims = GridDims::new(4, 4, 4);
        let (mut f, tags, rho) = make_fields(dims);
        for q in 0..19 {
            for cell in 0..dims.n_cells() {
                f.set_next(q, cell, 0.01 + 0.001 * (q as f64) + 1e-5 * cell as f64);
            }
        }
        let before: f64 = (0..19)
            .flat_map(|q| (0..dims.n_cells()).map(move |c| (q, c)))
            .map(|(q, c)| f.get_next(q, c))
            .sum();

        stream(&mut f, &tags, &rho, dims, [true; 3], DVec3::ZERO);

        let after: f64 = (0..19)
            .flat_map(|q| (0..dims.n_cells()).map(move |c| (q, c)))
            .map(|(q, c)| f.get(q, c))
            .sum();
        assert!((before - after).abs() / before < 1e-12);
    }

    /// 静壁反弹：拉取源为固体时取反向分布
    #[test]
    fn test_bounce_back_from_solid_neighbor() {
        let dims = GridDims::new(4, 4, 4);
        let (mut f, mut tags, rho) = make_fields(dims);

        // z=0 层全部固体
        for y in 0..4 {
            for x in 0..4 {
                tags.set(dims.cell_index(x, y, 0), CellTag::Solid);
            }
        }

        for q in 0..19 {
            for cell in 0..dims.n_cells() {
                f.set_next(q, cell, 0.1 + q as f64);
            }
        }

        stream(&mut f, &tags, &rho, dims, [true, true, false], DVec3::ZERO);

        // 方向 5 = (0,0,1)：z=1 单元从 z=0（固体）拉取，应得到方向 6 的碰撞后值
        let cell = dims.cell_index(1, 1, 1);
        assert_eq!(f.get(5, cell), 0.1 + 6.0);
    }

    /// Ladd 动壁修正的符号：壁沿 +x 运动时，带 +x 分量的反弹分布增大
    #[test]
    fn test_ladd_moving_wall_correction() {
        let dims = GridDims::new(4, 4, 4);
        let (mut f, mut tags, rho) = make_fields(dims);
        for y in 0..4 {
            for x in 0..4 {
                tags.set(dims.cell_index(x, y, 3), CellTag::Solid);
            }
        }
        for q in 0..19 {
            for cell in 0..dims.n_cells() {
                f.set_next(q, cell, 0.05);
            }
        }

        let u_wall = DVec3::new(0.01, 0.0, 0.0);
        stream(&mut f, &tags, &rho, dims, [true, true, false], u_wall);

        // 方向 13 = (1,0,-1)：z=2 单元从 z=3（固体）拉取
        let cell = dims.cell_index(1, 1, 2);
        let expected = 0.05 + 2.0 * D3Q19::W[13] * 1.0 * 0.01 * D3Q19::INV_CS2;
        assert!((f.get(13, cell) - expected).abs() < 1e-15);

        // 方向 14 = (-1,0,-1)：修正为负
        let expected_neg = 0.05 - 2.0 * D3Q19::W[14] * 1.0 * 0.01 * D3Q19::INV_CS2;
        assert!((f.get(14, cell) - expected_neg).abs() < 1e-15);
    }
}
