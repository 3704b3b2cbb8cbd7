//! 约束式动作编辑（时域平滑）
//!
//! 收集所有被 IK 编辑过的约束帧，对每个关节独立拟合一条三次均匀 B 样条，
//! 再在整段动作上重新采样，把稀疏的单帧编辑平滑地分摊到相邻帧。
//!
//! 参考序列只读，编辑序列只写自身帧，逐帧之间没有数据依赖。

use glam::Vec3;
use rayon::prelude::*;

use crate::config::EditConfig;
use crate::math::small_angle_quat;
use crate::skeleton::{Body, FkScope};
use crate::{EditError, Result};
use super::bspline::UniformCubicBSpline;

/// 单次平滑的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmoothingReport {
    /// 参与拟合的约束帧
    pub applied_frames: Vec<usize>,
    /// 因靠近序列边界、样条支撑不足而丢弃的约束帧
    pub skipped_frames: Vec<usize>,
    /// 拟合的关节曲线数
    pub joints: usize,
}

impl SmoothingReport {
    /// 是否有任何约束生效
    pub fn is_empty(&self) -> bool {
        self.applied_frames.is_empty()
    }
}

/// 时域平滑器
#[derive(Debug, Clone)]
pub struct MotionEditor {
    /// 节点间隔（每段帧数）
    pub knot_spacing: usize,
    /// 拟合 SVD 截断阈值
    pub fit_svd_threshold: f32,
    /// 是否并行
    pub parallel: bool,
}

impl Default for MotionEditor {
    fn default() -> Self {
        Self::new(&EditConfig::default())
    }
}

impl MotionEditor {
    pub fn new(config: &EditConfig) -> Self {
        Self {
            knot_spacing: config.knot_spacing,
            fit_svd_threshold: config.fit_svd_threshold,
            parallel: config.parallel_smoothing,
        }
    }

    /// 执行一次平滑
    ///
    /// 消费 `edited` 中所有约束标记；支撑范围内的帧旋转被重写为
    /// `reference * dq(spline(f))`，被丢弃的约束帧回到参考旋转，
    /// 随后所有帧重新执行正向运动学。每次平滑只取决于本次的约束帧。
    pub fn apply(&self, reference: &[Body], edited: &mut [Body]) -> Result<SmoothingReport> {
        check_sequences(reference, edited)?;

        let constrained: Vec<usize> = edited
            .iter()
            .enumerate()
            .filter(|(_, body)| body.is_constrained())
            .map(|(f, _)| f)
            .collect();
        for &f in &constrained {
            edited[f].set_constrained(false);
        }
        if constrained.is_empty() {
            return Ok(SmoothingReport::default());
        }

        let spline = UniformCubicBSpline::new(edited.len(), self.knot_spacing)?;
        let (applied, skipped): (Vec<usize>, Vec<usize>) =
            constrained.into_iter().partition(|&f| spline.can_fit(f));

        for &f in &skipped {
            log::warn!(
                "[MotionEdit] 约束帧 {} 靠近序列边界（B 样条支撑不足），已丢弃",
                f
            );
        }

        // 第一步：逐关节拟合控制点（只读快照）
        let snapshot: &[Body] = &*edited;
        let joint_count = snapshot[0].len();
        let fit_joint = |link: usize| -> Result<Vec<Vec3>> {
            let row = link + 1;
            let samples: Vec<Vec3> = applied
                .iter()
                .map(|&f| {
                    let d = snapshot[f].displacement();
                    Vec3::new(d[(row, 0)], d[(row, 1)], d[(row, 2)])
                })
                .collect();
            spline.fit(&applied, &samples, self.fit_svd_threshold)
        };
        let curves: Vec<Vec<Vec3>> = if applied.is_empty() {
            log::warn!("[MotionEdit] 没有可用的约束帧，支撑范围内的帧回到参考姿态");
            vec![vec![Vec3::ZERO; spline.control_count()]; joint_count]
        } else if self.parallel {
            (0..joint_count).into_par_iter().map(fit_joint).collect::<Result<_>>()?
        } else {
            (0..joint_count).map(fit_joint).collect::<Result<_>>()?
        };

        // 第二步：逐帧重采样并回写旋转
        if self.parallel {
            edited
                .par_iter_mut()
                .enumerate()
                .for_each(|(f, body)| {
                    resample_frame(&spline, &curves, &reference[f], f, skipped.contains(&f), body)
                });
        } else {
            for (f, body) in edited.iter_mut().enumerate() {
                resample_frame(&spline, &curves, &reference[f], f, skipped.contains(&f), body);
            }
        }

        log::info!(
            "[MotionEdit] 平滑完成: {} 个约束帧生效, {} 个被丢弃, {} 条关节曲线",
            applied.len(),
            skipped.len(),
            curves.len()
        );

        Ok(SmoothingReport {
            applied_frames: applied,
            skipped_frames: skipped,
            joints: curves.len(),
        })
    }
}

/// 用拟合曲线重写一帧的旋转：`reference * dq(spline(f))`，再刷新世界姿态
///
/// 样条值为零时 dq 为单位四元数，该帧回到参考旋转。样条无法求值的帧保持原样，
/// 但被丢弃的约束帧同样回到参考旋转。
fn resample_frame(
    spline: &UniformCubicBSpline,
    curves: &[Vec<Vec3>],
    reference: &Body,
    frame: usize,
    dropped: bool,
    body: &mut Body,
) {
    if spline.can_evaluate(frame) {
        for (link, control_points) in curves.iter().enumerate() {
            let Some(v) = spline.evaluate(control_points, frame) else {
                continue;
            };
            let base = reference.links()[link].local_rotation;
            if let Some(target) = body.link_mut(link) {
                target.local_rotation = base * small_angle_quat(v);
            }
        }
    } else if dropped {
        for (link, origin) in reference.links().iter().enumerate() {
            if let Some(target) = body.link_mut(link) {
                target.local_rotation = origin.local_rotation;
            }
        }
    }
    body.forward_kinematics(FkScope::Full);
}

/// 参考序列与编辑序列必须帧数相同、每帧关节数相同
fn check_sequences(reference: &[Body], edited: &[Body]) -> Result<()> {
    if reference.len() != edited.len() {
        return Err(EditError::SequenceMismatch {
            expected: reference.len(),
            found: edited.len(),
        });
    }
    let Some(first) = reference.first() else {
        return Ok(());
    };
    for body in reference.iter().chain(edited.iter()) {
        if body.len() != first.len() {
            return Err(EditError::TopologyMismatch {
                expected: first.len(),
                found: body.len(),
            });
        }
    }
    Ok(())
}
