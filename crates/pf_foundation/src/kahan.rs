// crates/pf_foundation/src/kahan.rs

//! Kahan 补偿求和
//!
//! 质量与相场守恒审计需要对数百万单元求和，朴素累加的舍入误差
//! 会淹没 1e-9 量级的守恒判据，因此统一使用补偿求和。
//! 大场求和走分块并行路径：块内补偿、块间再补偿。

use rayon::prelude::*;

/// Kahan 求和器
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// 创建新的求和器
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            compensation: 0.0,
        }
    }

    /// 添加一个值
    #[inline]
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 获取当前求和值
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum
    }

    /// 从迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = f64>>(iter: I) -> f64 {
        let mut kahan = Self::new();
        for v in iter {
            kahan.add(v);
        }
        kahan.value()
    }

    /// 对切片求和
    pub fn sum_slice(values: &[f64]) -> f64 {
        Self::sum_iter(values.iter().copied())
    }

    /// 并行分块补偿求和
    pub fn par_sum_slice(values: &[f64]) -> f64 {
        const CHUNK: usize = 1 << 16;
        if values.len() <= CHUNK {
            return Self::sum_slice(values);
        }
        let partials: Vec<f64> = values
            .par_chunks(CHUNK)
            .map(Self::sum_slice)
            .collect();
        Self::sum_slice(&partials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_sum() {
        let mut k = KahanSum::new();
        k.add(1.0);
        k.add(2.0);
        k.add(3.0);
        assert_eq!(k.value(), 6.0);
    }

    #[test]
    fn test_par_sum_matches_serial() {
        let values: Vec<f64> = (0..200_000).map(|i| (i as f64).sin() * 1e-3).collect();
        let serial = KahanSum::sum_slice(&values);
        let parallel = KahanSum::par_sum_slice(&values);
        assert!((serial - parallel).abs() < 1e-12);
    }

    #[test]
    fn test_compensation_beats_naive() {
        // 大数夹小数：朴素求和丢失精度，补偿求和保留
        let values: Vec<f64> = std::iter::once(1e16)
            .chain(std::iter::repeat(1.0).take(10_000))
            .chain(std::iter::once(-1e16))
            .collect();

        let naive: f64 = values.iter().sum();
        let kahan = KahanSum::sum_slice(&values);

        assert!((kahan - 10_000.0).abs() < 1e-6);
        assert!((naive - 10_000.0).abs() > (kahan - 10_000.0).abs());
    }
}
