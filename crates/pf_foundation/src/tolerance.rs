// crates/pf_foundation/src/tolerance.rs

//! 数值容差
//!
//! 集中定义引擎范围内的容差常量与浮点比较辅助函数，
//! 避免魔法数字散落在各个内核中。

/// 单步封闭域质量守恒相对容差
pub const MASS_REL_TOL_PER_STEP: f64 = 1e-9;

/// 全程积分质量守恒相对容差
pub const MASS_REL_TOL_TOTAL: f64 = 1e-6;

/// 平衡分布矩检验容差
pub const MOMENT_TOL: f64 = 1e-12;

/// 界面法向安全阈值：|∇φ| 低于此值时法向量置零
pub const INTERFACE_GRAD_EPS: f64 = 1e-10;

/// 密度下限保护（除法安全）
pub const RHO_FLOOR: f64 = 1e-12;

/// 相对误差比较
///
/// 当参考值接近零时退化为绝对比较。
#[inline]
pub fn approx_eq_rel(a: f64, b: f64, rel_tol: f64) -> bool {
    let scale = a.abs().max(b.abs());
    if scale < rel_tol {
        (a - b).abs() < rel_tol
    } else {
        (a - b).abs() / scale < rel_tol
    }
}

/// 绝对误差比较
#[inline]
pub fn approx_eq_abs(a: f64, b: f64, abs_tol: f64) -> bool {
    (a - b).abs() < abs_tol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_eq_rel() {
        assert!(approx_eq_rel(1.0, 1.0 + 1e-13, 1e-12));
        assert!(!approx_eq_rel(1.0, 1.1, 1e-3));
        // 接近零时退化为绝对比较
        assert!(approx_eq_rel(0.0, 1e-13, 1e-12));
    }

    #[test]
    fn test_approx_eq_abs() {
        assert!(approx_eq_abs(3.0, 3.0 + 1e-9, 1e-8));
        assert!(!approx_eq_abs(3.0, 3.1, 1e-8));
    }
}
