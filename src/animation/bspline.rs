//! 三次均匀 B 样条
//!
//! 控制点按固定帧间隔（knot spacing）排列。第 f 帧落在第 k = f / S 段，
//! 段内参数 t = (f mod S) / S，由控制点 k-1 .. k+2 四个权重决定。

use glam::Vec3;
use nalgebra::DMatrix;

use crate::math::truncated_svd_solve;
use crate::{EditError, Result};

/// 三次均匀 B 样条（帧 → 控制点映射）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformCubicBSpline {
    frame_count: usize,
    knot_spacing: usize,
    control_count: usize,
}

impl UniformCubicBSpline {
    /// 创建覆盖 `frame_count` 帧的样条，控制点数 = frame_count / spacing + 1
    pub fn new(frame_count: usize, knot_spacing: usize) -> Result<Self> {
        if knot_spacing == 0 {
            return Err(EditError::InvalidConfig("knot spacing must be at least 1".to_string()));
        }
        Ok(Self {
            frame_count,
            knot_spacing,
            control_count: frame_count / knot_spacing + 1,
        })
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[inline]
    pub fn knot_spacing(&self) -> usize {
        self.knot_spacing
    }

    #[inline]
    pub fn control_count(&self) -> usize {
        self.control_count
    }

    /// 帧所在的段号 k 与段内参数 t
    #[inline]
    pub fn knot(&self, frame: usize) -> (usize, f32) {
        let k = frame / self.knot_spacing;
        let t = (frame % self.knot_spacing) as f32 / self.knot_spacing as f32;
        (k, t)
    }

    /// 控制点 k-1, k, k+1, k+2 的基函数权重
    #[inline]
    pub fn basis(t: f32) -> [f32; 4] {
        let t2 = t * t;
        let t3 = t2 * t;
        let it = 1.0 - t;
        [
            it * it * it / 6.0,
            (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
            (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
            t3 / 6.0,
        ]
    }

    /// 该帧能否作为拟合约束（1 <= k <= n-4）
    pub fn can_fit(&self, frame: usize) -> bool {
        let (k, _) = self.knot(frame);
        frame < self.frame_count && k >= 1 && k + 4 <= self.control_count
    }

    /// 该帧能否求值（1 <= k <= n-3）
    pub fn can_evaluate(&self, frame: usize) -> bool {
        let (k, _) = self.knot(frame);
        frame < self.frame_count && k >= 1 && k + 3 <= self.control_count
    }

    /// 基矩阵 B，形状 control_count × frames.len()；不能拟合的帧对应列为零
    pub fn basis_matrix(&self, frames: &[usize]) -> DMatrix<f32> {
        let mut basis = DMatrix::<f32>::zeros(self.control_count, frames.len());
        for (j, &frame) in frames.iter().enumerate() {
            if !self.can_fit(frame) {
                continue;
            }
            let (k, t) = self.knot(frame);
            for (offset, w) in Self::basis(t).into_iter().enumerate() {
                basis[(k - 1 + offset, j)] = w;
            }
        }
        basis
    }

    /// 最小二乘拟合控制点，使样条在各约束帧处逼近对应样本
    ///
    /// 求解 `Bᵀ · X ≈ P`（截断 SVD 伪逆），返回每个控制点的三维坐标。
    pub fn fit(&self, frames: &[usize], samples: &[Vec3], threshold: f32) -> Result<Vec<Vec3>> {
        if frames.len() != samples.len() {
            return Err(EditError::Solver(format!(
                "{} constraint frames but {} samples",
                frames.len(),
                samples.len()
            )));
        }

        let lhs = self.basis_matrix(frames).transpose();
        let mut rhs = DMatrix::<f32>::zeros(samples.len(), 3);
        for (j, (&frame, sample)) in frames.iter().zip(samples).enumerate() {
            if !self.can_fit(frame) {
                continue;
            }
            rhs[(j, 0)] = sample.x;
            rhs[(j, 1)] = sample.y;
            rhs[(j, 2)] = sample.z;
        }

        let x = truncated_svd_solve(&lhs, &rhs, threshold)?;
        Ok((0..self.control_count)
            .map(|i| Vec3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)]))
            .collect())
    }

    /// 在指定帧求值；超出支撑范围或控制点不足时返回 None
    pub fn evaluate(&self, control_points: &[Vec3], frame: usize) -> Option<Vec3> {
        if !self.can_evaluate(frame) || control_points.len() < self.control_count {
            return None;
        }
        let (k, t) = self.knot(frame);
        let w = Self::basis(t);
        Some(
            control_points[k - 1] * w[0]
                + control_points[k] * w[1]
                + control_points[k + 1] * w[2]
                + control_points[k + 2] * w[3],
        )
    }
}
