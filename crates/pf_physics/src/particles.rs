// crates/pf_physics/src/particles.rs

//! 咖啡颗粒系统
//!
//! SoA 颗粒池，容量 P_max，运行期只增不减（active 标记）。
//! 每个活动颗粒按牛顿第二定律积分：
//!
//! ```text
//! m_p dv_p/dt = F_drag + F_grav + F_buoy + F_contact
//! F_drag = ½ C_D(Re_p) ρ_f A_p |u_f − v_p| (u_f − v_p)
//! ```
//!
//! 阻力系数分三段（Schiller-Naumann 过渡区）：
//!
//! ```text
//! C_D = 24/Re                      Re < 0.1
//! C_D = (24/Re)(1 + 0.15 Re^0.687) 0.1 ≤ Re < 1000
//! C_D = 0.44                       Re ≥ 1000
//! ```
//!
//! 流体速度由周围 8 个单元三线性插值获得；反作用力 −F_drag 用
//! 相同的三线性权重原子累加回体积力场，构成双向动量耦合。
//!
//! 阻力引起的 Δv 施加欠松弛因子 α ∈ [0.5, 0.8]，并以
//! |Δv| ≤ 0.1 c_s 为界自适应细分子步，保证耦合不把流体推出
//! Mach 工作区。
//!
//! 颗粒间接触用软球法向弹簧（无切向摩擦），近邻搜索用
//! 均匀网格链表（27 邻域）。固壁按可配置恢复系数弹性反射。

use glam::DVec3;
use pf_lattice::fields::{CellTagField, MacroFields};
use pf_lattice::grid::GridDims;
use pf_lattice::stencil::D3Q19;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::ParticleConfig;
use crate::error::ResourceError;
use crate::forcing::ForceAggregator;

/// 研磨粒径分布（三峰：细粉 / 主体 / 粗粒）
#[derive(Debug, Clone, Copy)]
pub struct GrindDistribution {
    /// 质量分数（和为 1）
    pub mass_fractions: [f64; 3],
    /// 对应粒径 [lu]
    pub diameters: [f64; 3],
}

impl Default for GrindDistribution {
    fn default() -> Self {
        // 手冲中粗研磨：细粉 0.2mm / 主体 0.65mm / 粗粒 1.0mm，
        // 以默认长度标度折算为格子单位
        let scale = 0.085 / 90.0;
        Self {
            mass_fractions: [0.1, 0.8, 0.1],
            diameters: [2.0e-4 / scale, 6.5e-4 / scale, 1.0e-3 / scale],
        }
    }
}

impl GrindDistribution {
    /// 把质量分数换算为颗粒数量（n_i ∝ frac_i / d_i³）
    pub fn counts(&self, total: usize) -> [usize; 3] {
        let weights: Vec<f64> = self
            .mass_fractions
            .iter()
            .zip(self.diameters.iter())
            .map(|(&f, &d)| f / (d * d * d))
            .collect();
        let sum: f64 = weights.iter().sum();
        let mut counts = [0usize; 3];
        let mut assigned = 0;
        for i in 0..2 {
            counts[i] = ((weights[i] / sum) * total as f64).round() as usize;
            assigned += counts[i];
        }
        counts[2] = total.saturating_sub(assigned);
        counts
    }
}

/// 播种区域（圆柱段，贴合滤杯内腔）
#[derive(Debug, Clone, Copy)]
pub struct SeedRegion {
    /// 轴心 x
    pub center_x: f64,
    /// 轴心 y
    pub center_y: f64,
    /// 半径 [lu]
    pub radius: f64,
    /// 底部 z
    pub z_min: f64,
    /// 顶部 z
    pub z_max: f64,
}

/// SoA 颗粒池
#[derive(Debug)]
pub struct ParticlePool {
    /// 容量 P_max
    pub capacity: usize,
    /// 当前颗粒数
    pub count: usize,
    /// 位置
    pub x: Vec<f64>,
    /// 位置 y
    pub y: Vec<f64>,
    /// 位置 z
    pub z: Vec<f64>,
    /// 速度
    pub vx: Vec<f64>,
    /// 速度 y
    pub vy: Vec<f64>,
    /// 速度 z
    pub vz: Vec<f64>,
    /// 半径 [lu]
    pub radius: Vec<f64>,
    /// 质量（格子单位）
    pub mass: Vec<f64>,
    /// 材料密度
    pub density: Vec<f64>,
    /// 活动标记
    pub active: Vec<bool>,
    /// 缓存的单元索引（散布用）
    pub cell: Vec<u32>,
}

impl ParticlePool {
    /// 创建空池
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            count: 0,
            x: vec![0.0; capacity],
            y: vec![0.0; capacity],
            z: vec![0.0; capacity],
            vx: vec![0.0; capacity],
            vy: vec![0.0; capacity],
            vz: vec![0.0; capacity],
            radius: vec![0.0; capacity],
            mass: vec![0.0; capacity],
            density: vec![0.0; capacity],
            active: vec![false; capacity],
            cell: vec![0; capacity],
        }
    }

    /// 位置向量
    #[inline]
    pub fn position(&self, p: usize) -> DVec3 {
        DVec3::new(self.x[p], self.y[p], self.z[p])
    }

    /// 速度向量
    #[inline]
    pub fn velocity(&self, p: usize) -> DVec3 {
        DVec3::new(self.vx[p], self.vy[p], self.vz[p])
    }
}

/// 颗粒只读视图
#[derive(Debug, Clone, Copy)]
pub struct ParticleView<'a> {
    /// 颗粒数
    pub count: usize,
    /// 位置
    pub x: &'a [f64],
    /// 位置 y
    pub y: &'a [f64],
    /// 位置 z
    pub z: &'a [f64],
    /// 速度
    pub vx: &'a [f64],
    /// 速度 y
    pub vy: &'a [f64],
    /// 速度 z
    pub vz: &'a [f64],
    /// 半径
    pub radius: &'a [f64],
    /// 活动标记
    pub active: &'a [bool],
}

/// Schiller-Naumann 三段阻力系数
#[inline]
pub fn drag_coefficient(re: f64) -> f64 {
    if re < 0.1 {
        24.0 / re.max(1e-12)
    } else if re < 1000.0 {
        24.0 / re * (1.0 + 0.15 * re.powf(0.687))
    } else {
        0.44
    }
}

/// 三线性插值权重与基底单元
///
/// 返回基底格点 (i,j,k) 与 8 个权重，顺序为
/// (000, 100, 010, 110, 001, 101, 011, 111)。
#[inline]
pub fn trilinear_weights(dims: GridDims, p: DVec3) -> ((usize, usize, usize), [f64; 8]) {
    let clamp = |v: f64, n: usize| v.clamp(0.0, (n - 2) as f64 + 0.999_999);
    let px = clamp(p.x, dims.nx);
    let py = clamp(p.y, dims.ny);
    let pz = clamp(p.z, dims.nz);

    let i = px.floor() as usize;
    let j = py.floor() as usize;
    let k = pz.floor() as usize;
    let fx = px - i as f64;
    let fy = py - j as f64;
    let fz = pz - k as f64;

    let w = [
        (1.0 - fx) * (1.0 - fy) * (1.0 - fz),
        fx * (1.0 - fy) * (1.0 - fz),
        (1.0 - fx) * fy * (1.0 - fz),
        fx * fy * (1.0 - fz),
        (1.0 - fx) * (1.0 - fy) * fz,
        fx * (1.0 - fy) * fz,
        (1.0 - fx) * fy * fz,
        fx * fy * fz,
    ];
    ((i, j, k), w)
}

/// 8 个角点的单元索引（与权重同序）
#[inline]
fn corner_cells(dims: GridDims, base: (usize, usize, usize)) -> [usize; 8] {
    let (i, j, k) = base;
    [
        dims.cell_index(i, j, k),
        dims.cell_index(i + 1, j, k),
        dims.cell_index(i, j + 1, k),
        dims.cell_index(i + 1, j + 1, k),
        dims.cell_index(i, j, k + 1),
        dims.cell_index(i + 1, j, k + 1),
        dims.cell_index(i, j + 1, k + 1),
        dims.cell_index(i + 1, j + 1, k + 1),
    ]
}

/// 均匀网格近邻链表
#[derive(Debug)]
struct NeighborGrid {
    bin_size: f64,
    nx: usize,
    ny: usize,
    nz: usize,
    head: Vec<i32>,
    next: Vec<i32>,
}

impl NeighborGrid {
    fn build(pool: &ParticlePool, dims: GridDims, bin_size: f64) -> Self {
        let nx = ((dims.nx as f64 / bin_size).ceil() as usize).max(1);
        let ny = ((dims.ny as f64 / bin_size).ceil() as usize).max(1);
        let nz = ((dims.nz as f64 / bin_size).ceil() as usize).max(1);
        let mut grid = Self {
            bin_size,
            nx,
            ny,
            nz,
            head: vec![-1; nx * ny * nz],
            next: vec![-1; pool.count],
        };
        for p in 0..pool.count {
            if !pool.active[p] {
                continue;
            }
            let bin = grid.bin_of(pool.position(p));
            grid.next[p] = grid.head[bin];
            grid.head[bin] = p as i32;
        }
        grid
    }

    #[inline]
    fn bin_of(&self, p: DVec3) -> usize {
        let bx = ((p.x / self.bin_size) as usize).min(self.nx - 1);
        let by = ((p.y / self.bin_size) as usize).min(self.ny - 1);
        let bz = ((p.z / self.bin_size) as usize).min(self.nz - 1);
        bx + self.nx * (by + self.ny * bz)
    }

    /// 遍历颗粒 p 的 27 邻域中所有其他颗粒
    fn for_neighbors(&self, p: usize, pos: DVec3, mut visit: impl FnMut(usize)) {
        let bx = ((pos.x / self.bin_size) as i64).clamp(0, self.nx as i64 - 1);
        let by = ((pos.y / self.bin_size) as i64).clamp(0, self.ny as i64 - 1);
        let bz = ((pos.z / self.bin_size) as i64).clamp(0, self.nz as i64 - 1);

        for dz in -1..=1i64 {
            for dy in -1..=1i64 {
                for dx in -1..=1i64 {
                    let (cx, cy, cz) = (bx + dx, by + dy, bz + dz);
                    if cx < 0
                        || cy < 0
                        || cz < 0
                        || cx >= self.nx as i64
                        || cy >= self.ny as i64
                        || cz >= self.nz as i64
                    {
                        continue;
                    }
                    let bin = cx as usize + self.nx * (cy as usize + self.ny * cz as usize);
                    let mut q = self.head[bin];
                    while q >= 0 {
                        if q as usize != p {
                            visit(q as usize);
                        }
                        q = self.next[q as usize];
                    }
                }
            }
        }
    }
}

/// 颗粒系统
#[derive(Debug)]
pub struct ParticleSystem {
    dims: GridDims,
    /// 配置
    pub config: ParticleConfig,
    /// 颗粒池
    pub pool: ParticlePool,
    /// 接触力缓冲
    contact_fx: Vec<f64>,
    contact_fy: Vec<f64>,
    contact_fz: Vec<f64>,
}

impl ParticleSystem {
    /// 创建空系统
    pub fn new(dims: GridDims, config: ParticleConfig) -> Self {
        let capacity = config.capacity;
        Self {
            dims,
            config,
            pool: ParticlePool::new(capacity),
            contact_fx: vec![0.0; capacity],
            contact_fy: vec![0.0; capacity],
            contact_fz: vec![0.0; capacity],
        }
    }

    /// 按粒径分布播种颗粒云
    ///
    /// 同一种子给出完全确定的颗粒云。
    pub fn seed(
        &mut self,
        count: usize,
        distribution: &GrindDistribution,
        region: &SeedRegion,
        seed: u64,
    ) -> Result<(), ResourceError> {
        if self.pool.count + count > self.pool.capacity {
            return Err(ResourceError::ParticlePoolOverflow {
                requested: self.pool.count + count,
                capacity: self.pool.capacity,
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let counts = distribution.counts(count);
        let density = self.config.density;

        for (mode, &mode_count) in counts.iter().enumerate() {
            let radius = distribution.diameters[mode] * 0.5;
            for _ in 0..mode_count {
                let p = self.pool.count;
                // 圆盘内均匀采样（拒绝法）
                let (px, py) = loop {
                    let dx = rng.gen_range(-1.0..1.0) * region.radius;
                    let dy = rng.gen_range(-1.0..1.0) * region.radius;
                    if dx * dx + dy * dy <= region.radius * region.radius {
                        break (region.center_x + dx, region.center_y + dy);
                    }
                };
                let pz = rng.gen_range(region.z_min..region.z_max);

                self.pool.x[p] = px;
                self.pool.y[p] = py;
                self.pool.z[p] = pz;
                self.pool.vx[p] = 0.0;
                self.pool.vy[p] = 0.0;
                self.pool.vz[p] = 0.0;
                self.pool.radius[p] = radius;
                self.pool.density[p] = density;
                self.pool.mass[p] = density * 4.0 / 3.0 * std::f64::consts::PI * radius.powi(3);
                self.pool.active[p] = true;
                self.pool.cell[p] = 0;
                self.pool.count += 1;
            }
        }

        Ok(())
    }

    /// 只读视图
    pub fn view(&self) -> ParticleView<'_> {
        ParticleView {
            count: self.pool.count,
            x: &self.pool.x[..self.pool.count],
            y: &self.pool.y[..self.pool.count],
            z: &self.pool.z[..self.pool.count],
            vx: &self.pool.vx[..self.pool.count],
            vy: &self.pool.vy[..self.pool.count],
            vz: &self.pool.vz[..self.pool.count],
            radius: &self.pool.radius[..self.pool.count],
            active: &self.pool.active[..self.pool.count],
        }
    }

    /// 推进颗粒一个时间步并散布反作用力
    ///
    /// 读上一步的宏观流场，把 −F_drag 原子累加进本步体积力。
    pub fn step(
        &mut self,
        macros: &MacroFields,
        tags: &CellTagField,
        gravity: DVec3,
        force: &mut ForceAggregator,
    ) {
        if self.pool.count == 0 {
            return;
        }

        self.compute_contact_forces();
        self.integrate_and_scatter(macros, tags, gravity, force);
    }

    /// 软球接触力（27 邻域搜索）
    fn compute_contact_forces(&mut self) {
        let n = self.pool.count;
        let r_max = self.pool.radius[..n]
            .iter()
            .cloned()
            .fold(0.0f64, f64::max);
        let bin_size = (2.0 * r_max).max(1.0);
        let grid = NeighborGrid::build(&self.pool, self.dims, bin_size);

        let pool = &self.pool;
        let k_n = self.config.contact_stiffness;
        let gamma_n = self.config.contact_damping;

        self.contact_fx[..n]
            .par_iter_mut()
            .zip(self.contact_fy[..n].par_iter_mut())
            .zip(self.contact_fz[..n].par_iter_mut())
            .enumerate()
            .for_each(|(p, ((fx, fy), fz))| {
                *fx = 0.0;
                *fy = 0.0;
                *fz = 0.0;
                if !pool.active[p] {
                    return;
                }

                let pos_p = pool.position(p);
                let vel_p = pool.velocity(p);
                let r_p = pool.radius[p];
                let mut f = DVec3::ZERO;

                grid.for_neighbors(p, pos_p, |q| {
                    let d = pos_p - pool.position(q);
                    let dist = d.length();
                    let overlap = r_p + pool.radius[q] - dist;
                    if overlap > 0.0 && dist > 1e-12 {
                        let normal = d / dist;
                        let v_rel = vel_p - pool.velocity(q);
                        // 法向弹簧 + 阻尼，无切向摩擦
                        f += normal * (k_n * overlap) - normal * (gamma_n * v_rel.dot(normal));
                    }
                });

                *fx = f.x;
                *fy = f.y;
                *fz = f.z;
            });
    }

    /// 阻力积分 + 位置推进 + 反作用力散布
    fn integrate_and_scatter(
        &mut self,
        macros: &MacroFields,
        tags: &CellTagField,
        gravity: DVec3,
        force: &mut ForceAggregator,
    ) {
        let n = self.pool.count;
        let dims = self.dims;
        let alpha = self.config.drag_relaxation;
        let restitution = self.config.wall_restitution;
        let dv_cap = 0.1 * D3Q19::CS2.sqrt();

        let atomic_force = force.atomic_view();
        let contact_fx = &self.contact_fx;
        let contact_fy = &self.contact_fy;
        let contact_fz = &self.contact_fz;

        let ParticlePool {
            x,
            y,
            z,
            vx,
            vy,
            vz,
            radius,
            mass,
            density,
            active,
            cell,
            ..
        } = &mut self.pool;
        let (radius, mass, density, active) =
            (&radius[..], &mass[..], &density[..], &active[..]);

        x[..n]
            .par_iter_mut()
            .zip(y[..n].par_iter_mut())
            .zip(z[..n].par_iter_mut())
            .zip(vx[..n].par_iter_mut())
            .zip(vy[..n].par_iter_mut())
            .zip(vz[..n].par_iter_mut())
            .zip(cell[..n].par_iter_mut())
            .enumerate()
            .for_each(|(p, ((((((px, py), pz), pvx), pvy), pvz), pcell))| {
                if !active[p] {
                    return;
                }

                let mut pos = DVec3::new(*px, *py, *pz);
                let mut vel = DVec3::new(*pvx, *pvy, *pvz);
                let r_p = radius[p];
                let m_p = mass[p];
                let rho_p = density[p];
                let area = std::f64::consts::PI * r_p * r_p;

                // 流体场三线性插值
                let (base, w) = trilinear_weights(dims, pos);
                let cells = corner_cells(dims, base);
                let mut u_f = DVec3::ZERO;
                let mut rho_f = 0.0;
                let mut nu_f = 0.0;
                for (idx, &c) in cells.iter().enumerate() {
                    u_f += macros.velocity(c) * w[idx];
                    rho_f += macros.rho[c] * w[idx];
                    nu_f += D3Q19::CS2 * (macros.tau_mol[c] - 0.5) * w[idx];
                }

                // 重力 + 浮力（阿基米德）
                let body_acc = gravity * (1.0 - rho_f / rho_p);
                let contact_acc =
                    DVec3::new(contact_fx[p], contact_fy[p], contact_fz[p]) / m_p;

                // 阻力：欠松弛 + 自适应子步
                let mut total_drag_force = DVec3::ZERO;
                let rel = u_f - vel;
                let rel_speed = rel.length();
                let mut substeps = 1usize;
                if rel_speed > 0.0 && nu_f > 1e-12 {
                    let re = rel_speed * 2.0 * r_p / nu_f;
                    let cd = drag_coefficient(re);
                    let f_drag = rel * (0.5 * cd * rho_f * area * rel_speed);
                    let dv_est = (f_drag / m_p * alpha).length();
                    substeps = ((dv_est / dv_cap).ceil() as usize).clamp(1, 8);
                }

                let sub_dt = 1.0 / substeps as f64;
                for _ in 0..substeps {
                    let rel = u_f - vel;
                    let rel_speed = rel.length();
                    if rel_speed > 0.0 && nu_f > 1e-12 {
                        let re = rel_speed * 2.0 * r_p / nu_f;
                        let cd = drag_coefficient(re);
                        let f_drag = rel * (0.5 * cd * rho_f * area * rel_speed);
                        let mut dv = f_drag / m_p * sub_dt * alpha;
                        // 子步内仍超界则硬性截断
                        let dv_mag = dv.length();
                        if dv_mag > dv_cap {
                            dv *= dv_cap / dv_mag;
                        }
                        vel += dv;
                        // 动量守恒：颗粒实得冲量的反号散布回流体（Δt = 1）
                        total_drag_force += dv * m_p;
                    }
                    vel += (body_acc + contact_acc) * sub_dt;
                }

                // 位置推进与固壁弹性反射（逐轴）
                let half = 0.5;
                let hi = DVec3::new(
                    dims.nx as f64 - 1.5,
                    dims.ny as f64 - 1.5,
                    dims.nz as f64 - 1.5,
                );
                let mut new_pos = pos;
                for axis in 0..3 {
                    let mut trial = new_pos;
                    trial[axis] += vel[axis];
                    trial[axis] = trial[axis].clamp(half, hi[axis]);

                    // 以颗粒表面探测固壁（壁面位于格点中点）
                    let mut probe = trial;
                    probe[axis] += vel[axis].signum() * r_p;
                    let cx = (probe.x.round().max(0.0) as usize).min(dims.nx - 1);
                    let cy = (probe.y.round().max(0.0) as usize).min(dims.ny - 1);
                    let cz = (probe.z.round().max(0.0) as usize).min(dims.nz - 1);
                    let c = dims.cell_index(cx, cy, cz);
                    if tags.get(c).is_solid() {
                        vel[axis] = -restitution * vel[axis];
                    } else {
                        new_pos[axis] = trial[axis];
                    }
                }
                pos = new_pos;

                // 反作用力散布：−F_drag，与插值同权重
                let (base, w) = trilinear_weights(dims, pos);
                let cells = corner_cells(dims, base);
                let reaction = -total_drag_force;
                for (idx, &c) in cells.iter().enumerate() {
                    if w[idx] > 0.0 {
                        atomic_force.add(c, reaction * w[idx]);
                    }
                }

                *px = pos.x;
                *py = pos.y;
                *pz = pos.z;
                *pvx = vel.x;
                *pvy = vel.y;
                *pvz = vel.z;
                *pcell = cells[0] as u32;
            });
    }
}
