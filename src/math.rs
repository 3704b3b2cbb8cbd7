//! 四元数指数 / 对数映射
//!
//! 约定：`log(q)` 返回半角轴向量 `θ/2 · axis`，
//! `exp(v)` 为其逆映射，因此 `exp(log(q)) == q`（取主值分支）。

use glam::{Quat, Vec3};
use nalgebra::DMatrix;

use crate::{EditError, Result};

const SMALL_ANGLE: f32 = 1.0e-8;
const SVD_MAX_ITERATIONS: usize = 500;

/// 单位四元数对数（主值分支，w < 0 时先取反）
pub fn quat_log(q: Quat) -> Vec3 {
    let q = if q.w < 0.0 { -q } else { q };
    let v = Vec3::new(q.x, q.y, q.z);
    let s = v.length();
    if s < SMALL_ANGLE {
        return v;
    }
    v * (s.atan2(q.w) / s)
}

/// 纯四元数 `(0, v)` 的指数映射
pub fn quat_exp(v: Vec3) -> Quat {
    let half = v.length();
    if half < SMALL_ANGLE {
        return Quat::from_xyzw(v.x, v.y, v.z, 1.0).normalize();
    }
    let k = half.sin() / half;
    Quat::from_xyzw(v.x * k, v.y * k, v.z * k, half.cos())
}

/// 一阶小角度近似 `quat(1, v)`，归一化后返回
pub fn small_angle_quat(v: Vec3) -> Quat {
    Quat::from_xyzw(v.x, v.y, v.z, 1.0).normalize()
}

/// 四元数近似相等（忽略 q / -q 的符号歧义）
#[cfg(test)]
pub(crate) fn quat_near(a: Quat, b: Quat, eps: f32) -> bool {
    (a - b).length() < eps || (a + b).length() < eps
}

/// 截断 SVD 最小二乘解 `A · X ≈ B`
///
/// 小于 `threshold × 最大奇异值` 的奇异方向直接置零，近奇异时不会放大误差。
pub fn truncated_svd_solve(a: &DMatrix<f32>, b: &DMatrix<f32>, threshold: f32) -> Result<DMatrix<f32>> {
    if a.nrows() != b.nrows() {
        return Err(EditError::Solver(format!(
            "row mismatch: lhs has {} rows, rhs has {}",
            a.nrows(),
            b.nrows()
        )));
    }
    if !a.iter().chain(b.iter()).all(|v| v.is_finite()) {
        return Err(EditError::Solver("non-finite input".to_string()));
    }
    if a.is_empty() {
        return Ok(DMatrix::zeros(a.ncols(), b.ncols()));
    }

    let svd = a
        .clone()
        .try_svd(true, true, f32::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| EditError::Solver("SVD did not converge".to_string()))?;
    let largest = svd.singular_values.max();
    if largest <= 0.0 {
        return Ok(DMatrix::zeros(a.ncols(), b.ncols()));
    }
    svd.solve(b, threshold * largest)
        .map_err(|e| EditError::Solver(e.to_string()))
}
