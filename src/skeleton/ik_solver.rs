//! IK 求解器 - 雅可比伪逆迭代
//!
//! 设计原则：
//! - 每个祖先关节按世界 X/Y/Z 三个轴各贡献一个自由度
//! - 截断 SVD 求伪逆，近奇异方向直接忽略
//! - 固定步长阻尼，旋转全程用四元数累积，不经过欧拉角
//! - 未收敛时不回退，保留当前最优努力结果

use glam::Vec3;
use nalgebra::DMatrix;

use crate::config::EditConfig;
use crate::math::{quat_exp, truncated_svd_solve};
use super::body::{Body, FkScope};

/// 三个世界坐标轴
const AXES: [Vec3; 3] = [Vec3::X, Vec3::Y, Vec3::Z];

/// 单次求解结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IkOutcome {
    /// 残差是否落入收敛半径
    pub converged: bool,
    /// 实际执行的迭代次数（无操作时为 0）
    pub iterations: u32,
    /// 末端到目标的最终距离
    pub residual: f32,
}

// ============================================================================
// IK 求解器
// ============================================================================

/// 雅可比 IK 求解器
#[derive(Clone, Debug)]
pub struct IkSolver {
    /// 最大迭代次数
    pub max_iterations: u32,
    /// 收敛半径
    pub tolerance: f32,
    /// SVD 截断阈值（相对最大奇异值）
    pub svd_threshold: f32,
    /// 固定阻尼步长
    pub step_size: f32,
    /// 逐迭代调试日志
    pub debug_log: bool,
}

impl Default for IkSolver {
    fn default() -> Self {
        Self::new(&EditConfig::default())
    }
}

impl IkSolver {
    pub fn new(config: &EditConfig) -> Self {
        Self {
            max_iterations: config.ik_max_iterations,
            tolerance: config.ik_tolerance,
            svd_threshold: config.ik_svd_threshold,
            step_size: config.ik_step_size,
            debug_log: config.debug_log,
        }
    }

    /// 把关节 `target_joint` 拉向世界坐标 `target`
    ///
    /// 只修改祖先链（不含根）上关节的局部旋转。根关节或越界索引为无操作。
    pub fn solve(&self, body: &mut Body, target_joint: usize, target: Vec3) -> IkOutcome {
        let Some(end) = body.link(target_joint) else {
            return IkOutcome { converged: false, iterations: 0, residual: f32::INFINITY };
        };
        let mut residual = (target - end.world_position()).length();

        let ancestors = body.ancestor_chain(target_joint);
        if ancestors.is_empty() {
            return IkOutcome { converged: residual < self.tolerance, iterations: 0, residual };
        }

        let dof = ancestors.len() * AXES.len();
        let mut jacobian = DMatrix::<f32>::zeros(3, dof);
        let mut rhs = DMatrix::<f32>::zeros(3, 1);
        let mut iterations = 0;
        let mut converged = false;

        for iteration in 0..self.max_iterations {
            let end_pos = body.links()[target_joint].world_position();
            let err = target - end_pos;
            residual = err.length();
            if residual < self.tolerance {
                converged = true;
                break;
            }

            // J(:, 3i+j) = axis_j × (p_end - p_i)
            for (i, &ancestor) in ancestors.iter().enumerate() {
                let arm = end_pos - body.links()[ancestor].world_position();
                for (j, axis) in AXES.iter().enumerate() {
                    let v = axis.cross(arm);
                    let col = i * AXES.len() + j;
                    jacobian[(0, col)] = v.x;
                    jacobian[(1, col)] = v.y;
                    jacobian[(2, col)] = v.z;
                }
            }
            rhs[(0, 0)] = err.x;
            rhs[(1, 0)] = err.y;
            rhs[(2, 0)] = err.z;

            let d_theta = match truncated_svd_solve(&jacobian, &rhs, self.svd_threshold) {
                Ok(d) => d,
                Err(e) => {
                    log::warn!("[IK] 关节 {} 伪逆求解失败，保留当前姿态: {}", target_joint, e);
                    break;
                }
            };

            // 世界轴先换到父坐标系，再左乘到局部旋转上
            for (i, &ancestor) in ancestors.iter().enumerate() {
                let Some(link) = body.link_mut(ancestor) else {
                    continue;
                };
                if link.is_root() {
                    continue;
                }
                let to_parent = link.parent_global_rotation().inverse();
                for (j, axis) in AXES.iter().enumerate() {
                    let angle = self.step_size * d_theta[(i * AXES.len() + j, 0)];
                    link.rotate(quat_exp(to_parent * *axis * (0.5 * angle)));
                }
                link.local_rotation = link.local_rotation.normalize();
            }

            body.forward_kinematics(FkScope::Full);
            iterations = iteration + 1;

            if self.debug_log {
                log::debug!("[IK] 关节 {} 第 {} 次迭代, 残差 {:.5}", target_joint, iteration, residual);
            }
        }

        if !converged {
            residual = (target - body.links()[target_joint].world_position()).length();
            converged = residual < self.tolerance;
        }

        log::debug!(
            "[IK] 关节 {}: {} 次迭代, 残差 {:.4}, {}",
            target_joint,
            iterations,
            residual,
            if converged { "收敛" } else { "未收敛" }
        );

        IkOutcome { converged, iterations, residual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use crate::skeleton::Link;

    /// 平面两关节链：根 → 肩 → 肘(弯 60°) → 手，另挂一个不相关的分支
    fn planar_arm() -> Body {
        let links = vec![
            Link::root("Root", Vec3::ZERO, Quat::IDENTITY),
            Link::child("Shoulder", 0, Vec3::ZERO, Quat::IDENTITY),
            Link::child("Elbow", 1, Vec3::X, Quat::from_rotation_z(60f32.to_radians())),
            Link::child("Hand", 2, Vec3::X, Quat::IDENTITY).with_end_site(),
            Link::child("Other", 0, Vec3::Y, Quat::from_rotation_x(0.3)),
        ];
        Body::new(links).unwrap()
    }

    fn rotations(body: &Body) -> Vec<Quat> {
        body.links().iter().map(|l| l.local_rotation).collect()
    }

    #[test]
    fn test_small_offset_within_single_pass() {
        let mut body = planar_arm();
        let start = body.link(3).unwrap().world_position();
        let target = start + Vec3::new(-0.06, 0.08, 0.0);

        let outcome = IkSolver::default().solve(&mut body, 3, target);

        let end = body.link(3).unwrap().world_position();
        assert!((end - target).length() < 0.05);
        assert!(outcome.iterations <= 100);
        assert!((outcome.residual - (end - target).length()).abs() < 1e-5);
    }

    #[test]
    fn test_converges_with_larger_step() {
        let mut body = planar_arm();
        let target = Vec3::new(0.5, 1.5, 0.0);
        let solver = IkSolver { step_size: 0.2, ..IkSolver::default() };

        let outcome = solver.solve(&mut body, 3, target);

        assert!(outcome.converged);
        assert!(outcome.iterations < 100);
        assert!((body.link(3).unwrap().world_position() - target).length() < 0.05);
    }

    #[test]
    fn test_repeated_passes_converge() {
        // 拖动时每个输入事件都跑一遍求解
        let mut body = planar_arm();
        let target = Vec3::new(0.2, 1.6, 0.3);
        let solver = IkSolver::default();

        let mut outcome = solver.solve(&mut body, 3, target);
        for _ in 0..60 {
            if outcome.converged {
                break;
            }
            outcome = solver.solve(&mut body, 3, target);
        }
        assert!(outcome.converged);
        assert!((body.link(3).unwrap().world_position() - target).length() < 0.05);
    }

    #[test]
    fn test_drag_event_stream_reaches_distant_target() {
        // 链长 2，目标距起点约 1（半个链长）
        let mut body = planar_arm();
        let start = body.link(3).unwrap().world_position();
        let offset = Vec3::new(-0.8, 0.6, 0.0);
        let target = start + offset;
        assert!((offset.length() - 1.0).abs() < 1e-6);
        assert!(target.length() < 2.0);

        // 默认参数：前 20 个事件逐步移动目标，之后保持
        let solver = IkSolver::default();
        let mut outcome = solver.solve(&mut body, 3, start);
        for event in 0..60 {
            let ramp = ((event + 1) as f32 / 20.0).min(1.0);
            outcome = solver.solve(&mut body, 3, start + offset * ramp);
        }

        assert!(outcome.residual < 0.05);
        assert!((body.link(3).unwrap().world_position() - target).length() < 0.05);
    }

    #[test]
    fn test_root_is_noop() {
        let mut body = planar_arm();
        let before = rotations(&body);
        let outcome = IkSolver::default().solve(&mut body, 0, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(outcome.iterations, 0);
        assert_eq!(rotations(&body), before);
    }

    #[test]
    fn test_out_of_range_is_noop() {
        let mut body = planar_arm();
        let before = rotations(&body);
        let outcome = IkSolver::default().solve(&mut body, 42, Vec3::ONE);
        assert_eq!(outcome.iterations, 0);
        assert!(!outcome.converged);
        assert_eq!(rotations(&body), before);
    }

    #[test]
    fn test_only_ancestors_rotate() {
        let mut body = planar_arm();
        let before = rotations(&body);
        IkSolver::default().solve(&mut body, 3, Vec3::new(1.2, 1.0, 0.2));
        let after = rotations(&body);

        assert_eq!(after[0], before[0]);
        assert_eq!(after[3], before[3]);
        assert_eq!(after[4], before[4]);
        assert_ne!(after[1], before[1]);
        for q in &after {
            assert!((q.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_already_at_target() {
        let mut body = planar_arm();
        let target = body.link(3).unwrap().world_position();
        let before = rotations(&body);
        let outcome = IkSolver::default().solve(&mut body, 3, target);
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(rotations(&body), before);
    }
}
