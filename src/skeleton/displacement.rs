//! 位移编码
//!
//! 记录编辑后姿态相对参考姿态的差异，作为时域平滑的输入信号：
//! - 第 0 行：根平移差，转到参考根的局部坐标系
//! - 第 i 行：第 i-1 个关节的 `log(inverse(q_origin) * q_edited)`
//!
//! 差异都表达在参考姿态的局部坐标系中，与参考姿态自身朝向无关，
//! 不同帧的位移可以直接线性插值。

use nalgebra::DMatrix;

use crate::math::quat_log;
use crate::{EditError, Result};
use super::body::Body;

/// 计算 `edited` 相对 `origin` 的位移矩阵，形状为 (links + 1) × 3
pub fn encode_displacement(origin: &Body, edited: &Body) -> Result<DMatrix<f32>> {
    if origin.len() != edited.len() {
        return Err(EditError::TopologyMismatch {
            expected: origin.len(),
            found: edited.len(),
        });
    }
    if origin.is_empty() {
        return Err(EditError::InvalidTopology("body has no links".to_string()));
    }

    let mut d = DMatrix::<f32>::zeros(origin.len() + 1, 3);

    let origin_root = origin.root();
    let delta = edited.root().world_position() - origin_root.world_position();
    let t = origin_root.world_rotation().inverse() * delta;
    d[(0, 0)] = t.x;
    d[(0, 1)] = t.y;
    d[(0, 2)] = t.z;

    for (i, (o, e)) in origin.links().iter().zip(edited.links()).enumerate() {
        let dq = quat_log(o.local_rotation.inverse() * e.local_rotation);
        d[(i + 1, 0)] = dq.x;
        d[(i + 1, 1)] = dq.y;
        d[(i + 1, 2)] = dq.z;
    }

    Ok(d)
}

impl Body {
    /// 以 `origin` 为参考，重写自身的位移矩阵（不修改旋转）
    pub fn record_displacement(&mut self, origin: &Body) -> Result<()> {
        let d = encode_displacement(origin, self)?;
        self.set_displacement(d);
        Ok(())
    }
}
