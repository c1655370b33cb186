// crates/pf_physics/src/forcing.rs

//! 体积力聚合器
//!
//! 每步开始时清零，随后由各贡献者累加：
//! 重力、恒定驱动、表面张力、多孔阻力、颗粒反作用力、浮力。
//!
//! # 并发约定
//!
//! - 聚合器必须在任何贡献者写入前完成清零
//! - 逐单元的场贡献（重力、表面张力等）使用并行 zip 累加，
//!   每个单元只有一个写者
//! - 颗粒散布是唯一的跨单元并发写入，走原子加法路径
//!   （f64 按位转 u64 后 CAS 循环）
//!
//! 密度调制式驱动仅允许在初始化阶段使用；时间步进期间一律
//! 通过体积力驱动，以保持状态方程不变。

use glam::DVec3;
use pf_foundation::memory::AlignedVec;
use pf_lattice::grid::GridDims;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// f64 原子加法（按位 CAS 循环）
#[inline]
pub fn atomic_add_f64(cell: &AtomicU64, value: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let new = (f64::from_bits(current) + value).to_bits();
        match cell.compare_exchange_weak(current, new, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}

/// 体积力聚合器
#[derive(Debug)]
pub struct ForceAggregator {
    dims: GridDims,
    /// x 分量 [lu/ts²·ρ]
    pub fx: AlignedVec<f64>,
    /// y 分量
    pub fy: AlignedVec<f64>,
    /// z 分量
    pub fz: AlignedVec<f64>,
}

impl ForceAggregator {
    /// 创建零力场
    pub fn new(dims: GridDims) -> Self {
        let n = dims.n_cells();
        Self {
            dims,
            fx: AlignedVec::zeros(n),
            fy: AlignedVec::zeros(n),
            fz: AlignedVec::zeros(n),
        }
    }

    /// 单元数量
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.dims.n_cells()
    }

    /// 清零（每步开始时调用，先于所有贡献者）
    pub fn reset(&mut self) {
        self.fx.par_fill(0.0);
        self.fy.par_fill(0.0);
        self.fz.par_fill(0.0);
    }

    /// 读取单元力向量
    #[inline]
    pub fn get(&self, cell: usize) -> DVec3 {
        DVec3::new(self.fx[cell], self.fy[cell], self.fz[cell])
    }

    /// 累加单元力向量（单写者路径）
    #[inline]
    pub fn add(&mut self, cell: usize, f: DVec3) {
        self.fx[cell] += f.x;
        self.fy[cell] += f.y;
        self.fz[cell] += f.z;
    }

    /// 并行逐单元累加
    ///
    /// 闭包返回单元的力贡献；每个单元恰好被一个线程处理。
    pub fn par_accumulate<F>(&mut self, contribution: F)
    where
        F: Fn(usize) -> DVec3 + Send + Sync,
    {
        self.fx
            .par_iter_mut()
            .zip(self.fy.par_iter_mut())
            .zip(self.fz.par_iter_mut())
            .enumerate()
            .for_each(|(cell, ((fx, fy), fz))| {
                let f = contribution(cell);
                *fx += f.x;
                *fy += f.y;
                *fz += f.z;
            });
    }

    /// 向所有满足条件的单元并行累加常数力（重力、驱动力）
    pub fn par_accumulate_constant<P>(&mut self, force: DVec3, predicate: P)
    where
        P: Fn(usize) -> bool + Send + Sync,
    {
        self.par_accumulate(|cell| if predicate(cell) { force } else { DVec3::ZERO });
    }

    /// 原子累加视图（颗粒散布专用）
    pub fn atomic_view(&mut self) -> AtomicForceView<'_> {
        AtomicForceView {
            fx: as_atomic_slice(self.fx.as_mut_slice()),
            fy: as_atomic_slice(self.fy.as_mut_slice()),
            fz: as_atomic_slice(self.fz.as_mut_slice()),
        }
    }
}

/// 把独占的 f64 切片重解释为原子 u64 切片
///
/// 独占借用保证没有其他非原子访问；f64 与 AtomicU64 大小对齐一致。
fn as_atomic_slice(slice: &mut [f64]) -> &[AtomicU64] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const AtomicU64, slice.len()) }
}

/// 原子力场视图
///
/// 多个线程可对同一单元并发累加；生命周期内禁止非原子访问。
pub struct AtomicForceView<'a> {
    fx: &'a [AtomicU64],
    fy: &'a [AtomicU64],
    fz: &'a [AtomicU64],
}

impl<'a> AtomicForceView<'a> {
    /// 原子累加单元力向量
    #[inline]
    pub fn add(&self, cell: usize, f: DVec3) {
        atomic_add_f64(&self.fx[cell], f.x);
        atomic_add_f64(&self.fy[cell], f.y);
        atomic_add_f64(&self.fz[cell], f.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_all() {
        let mut agg = ForceAggregator::new(GridDims::new(4, 4, 4));
        agg.add(10, DVec3::new(1.0, 2.0, 3.0));
        agg.reset();
        assert_eq!(agg.get(10), DVec3::ZERO);
    }

    #[test]
    fn test_accumulation_is_additive() {
        let mut agg = ForceAggregator::new(GridDims::new(2, 2, 2));
        agg.add(3, DVec3::new(0.5, 0.0, -0.5));
        agg.add(3, DVec3::new(0.5, 1.0, -0.5));
        let f = agg.get(3);
        assert_eq!(f, DVec3::new(1.0, 1.0, -1.0));
    }

    #[test]
    fn test_par_accumulate_constant() {
        let mut agg = ForceAggregator::new(GridDims::new(4, 4, 4));
        let g = DVec3::new(0.0, 0.0, -1e-5);
        agg.par_accumulate_constant(g, |cell| cell % 2 == 0);
        assert_eq!(agg.get(0), g);
        assert_eq!(agg.get(1), DVec3::ZERO);
    }

    #[test]
    fn test_atomic_add_concurrent() {
        let mut agg = ForceAggregator::new(GridDims::new(4, 4, 4));
        {
            let view = agg.atomic_view();
            // 64 个线程任务向同一单元并发累加
            (0..64).into_par_iter().for_each(|_| {
                view.add(5, DVec3::new(1.0, 0.5, -0.25));
            });
        }
        let f = agg.get(5);
        assert!((f.x - 64.0).abs() < 1e-12);
        assert!((f.y - 32.0).abs() < 1e-12);
        assert!((f.z + 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_atomic_add_f64_bits() {
        let cell = AtomicU64::new(0f64.to_bits());
        atomic_add_f64(&cell, 1.5);
        atomic_add_f64(&cell, -0.5);
        assert_eq!(f64::from_bits(cell.load(Ordering::Relaxed)), 1.0);
    }
}
