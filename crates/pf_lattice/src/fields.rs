// crates/pf_lattice/src/fields.rs

//! 宏观场与分布函数存储
//!
//! # 布局设计
//!
//! 全部采用 SoA (Structure of Arrays) 布局：
//! ```text
//! rho: [ρ_0,  ρ_1,  ρ_2,  ...]
//! ux:  [ux_0, ux_1, ux_2, ...]
//! uy:  [uy_0, uy_1, uy_2, ...]
//! uz:  [uz_0, uz_1, uz_2, ...]
//! ```
//!
//! 分布函数按方向主序：方向 q 的所有单元构成一个连续块，
//! `idx = q * n_cells + cell`。碰撞按单元遍历、流动按方向遍历时
//! 都能保持较好的访存局部性。
//!
//! 分布函数使用双缓冲：碰撞读 f 写 f_next，流动读 f_next 写 f，
//! 通过指针交换避免拷贝。

use glam::DVec3;
use pf_foundation::memory::AlignedVec;
use serde::{Deserialize, Serialize};

use crate::grid::GridDims;
use crate::stencil::D3Q19;
use crate::tags::CellTag;

// ============================================================
// 宏观场
// ============================================================

/// 宏观场集合（SoA）
///
/// 由步进编排器独占持有；各物理组件仅获得只读视图，
/// 自有状态（相场 φ、温度 T）由组件写回对应数组。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroFields {
    /// 网格尺寸
    pub dims: GridDims,
    /// 密度 [lu]
    pub rho: AlignedVec<f64>,
    /// x 方向速度 [lu/ts]
    pub ux: AlignedVec<f64>,
    /// y 方向速度 [lu/ts]
    pub uy: AlignedVec<f64>,
    /// z 方向速度 [lu/ts]
    pub uz: AlignedVec<f64>,
    /// 相场序参量 φ ∈ [-1, 1]
    pub phi: AlignedVec<f64>,
    /// 温度 [K]（热耦合关闭时保持初值）
    pub temperature: AlignedVec<f64>,
    /// 亚格子涡粘性 [lu²/ts]
    pub nu_sgs: AlignedVec<f64>,
    /// 分子松弛时间 τ_mol（按相与温度更新）
    pub tau_mol: AlignedVec<f64>,
}

impl MacroFields {
    /// 创建全零宏观场
    pub fn new(dims: GridDims) -> Self {
        let n = dims.n_cells();
        Self {
            dims,
            rho: AlignedVec::zeros(n),
            ux: AlignedVec::zeros(n),
            uy: AlignedVec::zeros(n),
            uz: AlignedVec::zeros(n),
            phi: AlignedVec::zeros(n),
            temperature: AlignedVec::zeros(n),
            nu_sgs: AlignedVec::zeros(n),
            tau_mol: AlignedVec::zeros(n),
        }
    }

    /// 单元数量
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.dims.n_cells()
    }

    /// 单元速度向量
    #[inline]
    pub fn velocity(&self, cell: usize) -> DVec3 {
        DVec3::new(self.ux[cell], self.uy[cell], self.uz[cell])
    }

    /// 写入单元速度向量
    #[inline]
    pub fn set_velocity(&mut self, cell: usize, u: DVec3) {
        self.ux[cell] = u.x;
        self.uy[cell] = u.y;
        self.uz[cell] = u.z;
    }

    /// 速度模长平方
    #[inline]
    pub fn velocity_sq(&self, cell: usize) -> f64 {
        let (ux, uy, uz) = (self.ux[cell], self.uy[cell], self.uz[cell]);
        ux * ux + uy * uy + uz * uz
    }

    /// 压力 p = ρ c_s²（理想气体状态方程）
    #[inline]
    pub fn pressure(&self, cell: usize) -> f64 {
        self.rho[cell] * D3Q19::CS2
    }

    /// 从另一宏观场整体拷贝（尺寸必须一致）
    pub fn copy_from(&mut self, other: &MacroFields) {
        debug_assert_eq!(self.dims, other.dims);
        self.rho.as_mut_slice().copy_from_slice(other.rho.as_slice());
        self.ux.as_mut_slice().copy_from_slice(other.ux.as_slice());
        self.uy.as_mut_slice().copy_from_slice(other.uy.as_slice());
        self.uz.as_mut_slice().copy_from_slice(other.uz.as_slice());
        self.phi.as_mut_slice().copy_from_slice(other.phi.as_slice());
        self.temperature
            .as_mut_slice()
            .copy_from_slice(other.temperature.as_slice());
        self.nu_sgs
            .as_mut_slice()
            .copy_from_slice(other.nu_sgs.as_slice());
        self.tau_mol
            .as_mut_slice()
            .copy_from_slice(other.tau_mol.as_slice());
    }

    /// 只读视图
    pub fn view(&self) -> MacroView<'_> {
        MacroView {
            dims: self.dims,
            rho: &self.rho,
            ux: &self.ux,
            uy: &self.uy,
            uz: &self.uz,
            phi: &self.phi,
            temperature: &self.temperature,
            nu_sgs: &self.nu_sgs,
        }
    }
}

/// 宏观场只读视图
///
/// 供可视化与诊断使用，有效期到下一次 `step` 为止。
#[derive(Debug, Clone, Copy)]
pub struct MacroView<'a> {
    /// 网格尺寸
    pub dims: GridDims,
    /// 密度
    pub rho: &'a [f64],
    /// x 方向速度
    pub ux: &'a [f64],
    /// y 方向速度
    pub uy: &'a [f64],
    /// z 方向速度
    pub uz: &'a [f64],
    /// 相场
    pub phi: &'a [f64],
    /// 温度
    pub temperature: &'a [f64],
    /// 亚格子涡粘性
    pub nu_sgs: &'a [f64],
}

impl<'a> MacroView<'a> {
    /// 单元速度向量
    #[inline]
    pub fn velocity(&self, cell: usize) -> DVec3 {
        DVec3::new(self.ux[cell], self.uy[cell], self.uz[cell])
    }

    /// 压力 p = ρ c_s²
    #[inline]
    pub fn pressure(&self, cell: usize) -> f64 {
        self.rho[cell] * D3Q19::CS2
    }
}

// ============================================================
// 单元标记场
// ============================================================

/// 单元标记场
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellTagField {
    dims: GridDims,
    data: AlignedVec<u8>,
}

impl CellTagField {
    /// 创建全流体标记场
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            data: AlignedVec::zeros(dims.n_cells()),
        }
    }

    /// 从原始字节恢复（位级精确）
    pub fn from_bytes(dims: GridDims, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != dims.n_cells() {
            return None;
        }
        if bytes.iter().any(|&b| CellTag::from_u8(b).is_none()) {
            return None;
        }
        Some(Self {
            dims,
            data: AlignedVec::from_slice(bytes),
        })
    }

    /// 网格尺寸
    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// 读取单元标记
    #[inline]
    pub fn get(&self, cell: usize) -> CellTag {
        // data 仅通过 set/from_bytes 写入，值域受控
        CellTag::from_u8(self.data[cell]).unwrap_or(CellTag::Fluid)
    }

    /// 写入单元标记
    #[inline]
    pub fn set(&mut self, cell: usize, tag: CellTag) {
        self.data[cell] = tag.as_u8();
    }

    /// 原始字节（位级精确保存）
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// 统计指定标记的单元数
    pub fn count(&self, tag: CellTag) -> usize {
        let v = tag.as_u8();
        self.data.iter().filter(|&&b| b == v).count()
    }
}

// ============================================================
// 分布函数双缓冲
// ============================================================

/// 分布函数双缓冲场
///
/// 同时服务于 D3Q19 流体分布 f 与 D3Q7 温度分布 g
/// （方向数 q 在构造时确定）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionField {
    dims: GridDims,
    q: usize,
    /// 当前分布
    curr: AlignedVec<f64>,
    /// 碰撞输出缓冲
    next: AlignedVec<f64>,
}

impl DistributionField {
    /// 创建全零分布场
    pub fn new(dims: GridDims, q: usize) -> Self {
        let len = dims.n_cells() * q;
        Self {
            dims,
            q,
            curr: AlignedVec::zeros(len),
            next: AlignedVec::zeros(len),
        }
    }

    /// 方向数量
    #[inline]
    pub fn q(&self) -> usize {
        self.q
    }

    /// 单元数量
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.dims.n_cells()
    }

    /// 分布索引（方向主序）
    #[inline]
    pub fn index(&self, q: usize, cell: usize) -> usize {
        debug_assert!(q < self.q);
        q * self.dims.n_cells() + cell
    }

    /// 读当前分布
    #[inline]
    pub fn get(&self, q: usize, cell: usize) -> f64 {
        self.curr[self.index(q, cell)]
    }

    /// 写当前分布
    #[inline]
    pub fn set(&mut self, q: usize, cell: usize, value: f64) {
        let idx = self.index(q, cell);
        self.curr[idx] = value;
    }

    /// 读碰撞输出缓冲
    #[inline]
    pub fn get_next(&self, q: usize, cell: usize) -> f64 {
        self.next[self.index(q, cell)]
    }

    /// 写碰撞输出缓冲
    #[inline]
    pub fn set_next(&mut self, q: usize, cell: usize, value: f64) {
        let idx = self.index(q, cell);
        self.next[idx] = value;
    }

    /// 当前分布的只读切片
    #[inline]
    pub fn curr_slice(&self) -> &[f64] {
        self.curr.as_slice()
    }

    /// 当前分布的可变切片
    #[inline]
    pub fn curr_slice_mut(&mut self) -> &mut [f64] {
        self.curr.as_mut_slice()
    }

    /// 碰撞输出缓冲的可变切片
    #[inline]
    pub fn next_slice_mut(&mut self) -> &mut [f64] {
        self.next.as_mut_slice()
    }

    /// 同时借出当前（只读）与输出（可变）缓冲
    ///
    /// 碰撞内核的标准访问模式：读 curr、写 next。
    #[inline]
    pub fn buffers(&mut self) -> (&[f64], &mut [f64]) {
        (self.curr.as_slice(), self.next.as_mut_slice())
    }

    /// 同时借出当前（可变）与输出（只读）缓冲
    ///
    /// 流动内核的标准访问模式：读 next（碰撞输出）、写 curr。
    #[inline]
    pub fn stream_buffers(&mut self) -> (&mut [f64], &[f64]) {
        (self.curr.as_mut_slice(), self.next.as_slice())
    }

    /// 交换双缓冲
    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.curr, &mut self.next);
    }

    /// 读取单元全部方向的分布
    #[inline]
    pub fn load_cell<const Q: usize>(&self, cell: usize) -> [f64; Q] {
        debug_assert_eq!(Q, self.q);
        let n = self.dims.n_cells();
        std::array::from_fn(|q| self.curr[q * n + cell])
    }

    /// 将单元全部方向写入当前缓冲
    #[inline]
    pub fn store_cell<const Q: usize>(&mut self, cell: usize, values: &[f64; Q]) {
        debug_assert_eq!(Q, self.q);
        let n = self.dims.n_cells();
        for q in 0..Q {
            self.curr[q * n + cell] = values[q];
        }
    }
}
