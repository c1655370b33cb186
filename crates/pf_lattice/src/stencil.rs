// crates/pf_lattice/src/stencil.rs

//! 离散速度模板
//!
//! D3Q19 用于流体动量输运，D3Q7 用于温度标量输运。
//!
//! # D3Q19
//!
//! 19 个离散速度：1 个静止速度、6 个面心单位向量、12 个棱心对角向量。
//! 权重 w₀=1/3, w₁..₆=1/18, w₇..₁₈=1/36，声速平方 c_s²=1/3。
//!
//! # D3Q7
//!
//! 7 个离散速度：静止速度加 6 个面心向量。
//! 权重 w₀=1/4, w₁..₆=1/8，标量声速平方 c_{s,T}²=1/4。
//!
//! 每个方向 q 都有反向索引 q̄ 满足 e_q̄ = -e_q，供反弹边界使用。

/// D3Q19 模板
pub struct D3Q19;

impl D3Q19 {
    /// 离散速度数量
    pub const Q: usize = 19;

    /// 声速平方 c_s²
    pub const CS2: f64 = 1.0 / 3.0;

    /// 1 / c_s²
    pub const INV_CS2: f64 = 3.0;

    /// 1 / c_s⁴
    pub const INV_CS4: f64 = 9.0;

    /// 离散速度向量 [ex, ey, ez]
    pub const E: [[i32; 3]; 19] = [
        [0, 0, 0], // 0: 静止
        [1, 0, 0], // 1-6: 面心
        [-1, 0, 0],
        [0, 1, 0],
        [0, -1, 0],
        [0, 0, 1],
        [0, 0, -1],
        [1, 1, 0], // 7-18: 棱心
        [-1, 1, 0],
        [1, -1, 0],
        [-1, -1, 0],
        [1, 0, 1],
        [-1, 0, 1],
        [1, 0, -1],
        [-1, 0, -1],
        [0, 1, 1],
        [0, -1, 1],
        [0, 1, -1],
        [0, -1, -1],
    ];

    /// 权重系数
    pub const W: [f64; 19] = [
        1.0 / 3.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
    ];

    /// 反向索引：e_OPP[q] = -e_q
    pub const OPP: [usize; 19] = [
        0, 2, 1, 4, 3, 6, 5, 10, 9, 8, 7, 14, 13, 12, 11, 18, 17, 16, 15,
    ];

    /// 方向 q 的速度向量（浮点）
    #[inline]
    pub fn e(q: usize) -> [f64; 3] {
        let e = Self::E[q];
        [e[0] as f64, e[1] as f64, e[2] as f64]
    }

    /// 零阶矩：Σ_q f_q
    #[inline]
    pub fn moment0(f: &[f64; 19]) -> f64 {
        let mut m = 0.0;
        for q in 0..19 {
            m += f[q];
        }
        m
    }

    /// 一阶矩：Σ_q f_q e_q
    #[inline]
    pub fn moment1(f: &[f64; 19]) -> [f64; 3] {
        let mut m = [0.0; 3];
        for q in 0..19 {
            let e = Self::E[q];
            m[0] += f[q] * e[0] as f64;
            m[1] += f[q] * e[1] as f64;
            m[2] += f[q] * e[2] as f64;
        }
        m
    }
}

/// D3Q7 模板（标量输运）
pub struct D3Q7;

impl D3Q7 {
    /// 离散速度数量
    pub const Q: usize = 7;

    /// 标量声速平方 c_{s,T}²
    pub const CS2: f64 = 1.0 / 4.0;

    /// 1 / c_{s,T}²
    pub const INV_CS2: f64 = 4.0;

    /// 离散速度向量 [ex, ey, ez]
    pub const E: [[i32; 3]; 7] = [
        [0, 0, 0],
        [1, 0, 0],
        [-1, 0, 0],
        [0, 1, 0],
        [0, -1, 0],
        [0, 0, 1],
        [0, 0, -1],
    ];

    /// 权重系数
    pub const W: [f64; 7] = [
        1.0 / 4.0,
        1.0 / 8.0,
        1.0 / 8.0,
        1.0 / 8.0,
        1.0 / 8.0,
        1.0 / 8.0,
        1.0 / 8.0,
    ];

    /// 反向索引
    pub const OPP: [usize; 7] = [0, 2, 1, 4, 3, 6, 5];

    /// 零阶矩：Σ_q g_q（即温度）
    #[inline]
    pub fn moment0(g: &[f64; 7]) -> f64 {
        g[0] + g[1] + g[2] + g[3] + g[4] + g[5] + g[6]
    }
}
