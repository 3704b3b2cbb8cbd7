//! 动作编辑会话
//!
//! 持有参考序列、编辑序列、选中关节、播放时钟和配置。一次拖动事件
//! 对应一次 IK 求解，位移随即记录到该帧；调用 [`AnimationSession::apply_motion_edit`]
//! 后把所有约束帧平滑到整段动作。
//!
//! 会话不做任何输入输出，表现层只读取 [`AnimationSession::edited`] 的世界位置。

use glam::Vec3;

use crate::config::EditConfig;
use crate::skeleton::{Body, FkScope, IkOutcome, IkSolver};
use crate::{EditError, Result};
use super::motion_editor::{MotionEditor, SmoothingReport};
use super::pose_source::PoseSource;

/// 当前选中的关节
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// 拾取时所在帧
    pub frame: usize,
    /// 关节索引
    pub joint: usize,
    /// 拾取瞬间关节的世界位置
    pub grab_point: Vec3,
    /// 最近一次拖动的目标位置
    pub target: Vec3,
}

/// 动作编辑会话
pub struct AnimationSession {
    config: EditConfig,
    reference: Vec<Body>,
    edited: Vec<Body>,
    current_frame: usize,
    frame_clock: f32,
    playing: bool,
    selection: Option<Selection>,
    solver: IkSolver,
    editor: MotionEditor,
}

impl AnimationSession {
    /// 从姿态来源载入整段动作，参考序列与编辑序列初始相同
    pub fn from_source(source: &dyn PoseSource, config: EditConfig) -> Result<Self> {
        config.validate()?;

        let count = source.frame_count();
        if count == 0 {
            return Err(EditError::EmptyMotion);
        }
        let reference = (0..count).map(|f| source.pose(f)).collect::<Result<Vec<_>>>()?;
        let joints = reference[0].len();
        if let Some(body) = reference.iter().find(|b| b.len() != joints) {
            return Err(EditError::TopologyMismatch {
                expected: joints,
                found: body.len(),
            });
        }

        log::info!("[Session] 载入 {} 帧, 每帧 {} 个关节", count, joints);

        Ok(Self {
            solver: IkSolver::new(&config),
            editor: MotionEditor::new(&config),
            edited: reference.clone(),
            reference,
            config,
            current_frame: 0,
            frame_clock: 0.0,
            playing: false,
            selection: None,
        })
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.reference.len()
    }

    #[inline]
    pub fn reference(&self, frame: usize) -> Option<&Body> {
        self.reference.get(frame)
    }

    #[inline]
    pub fn edited(&self, frame: usize) -> Option<&Body> {
        self.edited.get(frame)
    }

    #[inline]
    pub fn frames(&self) -> &[Body] {
        &self.edited
    }

    #[inline]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// 带约束标记、尚未平滑的帧
    pub fn constrained_frames(&self) -> Vec<usize> {
        self.edited
            .iter()
            .enumerate()
            .filter(|(_, body)| body.is_constrained())
            .map(|(f, _)| f)
            .collect()
    }

    // ========================================
    // 播放时钟
    // ========================================

    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_current_frame(&mut self, frame: usize) -> Result<()> {
        self.check_frame(frame)?;
        self.current_frame = frame;
        self.frame_clock = 0.0;
        Ok(())
    }

    pub fn toggle_playback(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }

    /// 推进时钟：每累积 `frame_time` 秒前进一帧，到末尾回绕。返回当前帧
    ///
    /// 非有限或非正的 `dt` 不推进。
    pub fn advance(&mut self, dt: f32) -> usize {
        if !self.playing || !(dt > 0.0) || !dt.is_finite() {
            return self.current_frame;
        }
        let frame_time = self.config.frame_time;
        let clock = self.frame_clock + dt;
        let steps = (clock / frame_time).floor();
        if steps >= 1.0 {
            let count = self.frame_count() as u64;
            let steps = steps as u64 % count;
            self.current_frame = ((self.current_frame as u64 + steps) % count) as usize;
        }
        self.frame_clock = clock.rem_euclid(frame_time);
        self.current_frame
    }

    // ========================================
    // 拾取与拖动
    // ========================================

    /// 在当前帧中拾取离 `point` 最近、且在拾取半径内的关节
    pub fn pick(&mut self, point: Vec3) -> Option<Selection> {
        let body = &self.edited[self.current_frame];
        let hit = body
            .links()
            .iter()
            .enumerate()
            .map(|(i, link)| (i, link.world_position(), link.world_position().distance(point)))
            .filter(|(_, _, d)| *d <= self.config.pick_radius)
            .min_by(|a, b| a.2.total_cmp(&b.2));

        self.selection = hit.map(|(joint, position, _)| Selection {
            frame: self.current_frame,
            joint,
            grab_point: position,
            target: position,
        });
        if let Some(sel) = &self.selection {
            log::debug!("[Session] 选中帧 {} 关节 {}", sel.frame, sel.joint);
        }
        self.selection
    }

    /// 把选中关节拖到 `grab_point + offset`，无选中时返回 None
    pub fn drag_selection(&mut self, offset: Vec3) -> Result<Option<IkOutcome>> {
        let Some(sel) = self.selection.as_mut() else {
            return Ok(None);
        };
        sel.target = sel.grab_point + offset;
        let (frame, joint, target) = (sel.frame, sel.joint, sel.target);
        self.drag_joint(frame, joint, target).map(Some)
    }

    /// 一次拖动事件：IK 求解、关节所在区域的正向运动学、记录位移、打约束标记
    pub fn drag_joint(&mut self, frame: usize, joint: usize, target: Vec3) -> Result<IkOutcome> {
        self.check_frame(frame)?;
        let body = &mut self.edited[frame];
        let Some(link) = body.link(joint) else {
            return Err(EditError::JointOutOfRange {
                joint,
                count: body.len(),
            });
        };
        let region = link.region.clone();

        let outcome = self.solver.solve(body, joint, target);
        match region.as_deref() {
            Some(region) => body.forward_kinematics(FkScope::Region(region)),
            None => body.forward_kinematics(FkScope::Full),
        }
        body.record_displacement(&self.reference[frame])?;

        if !body.ancestor_chain(joint).is_empty() {
            body.set_constrained(true);
        }

        log::debug!(
            "[Session] 帧 {} 关节 {} 拖动: 残差 {:.4}, {} 次迭代",
            frame,
            joint,
            outcome.residual,
            outcome.iterations
        );
        Ok(outcome)
    }

    /// 松开选中关节
    pub fn release(&mut self) {
        self.selection = None;
    }

    /// 丢弃所有编辑：编辑序列回到参考序列
    pub fn reset(&mut self) {
        self.edited = self.reference.clone();
        self.selection = None;
        log::info!("[Session] 已重置为参考动作");
    }

    /// 把所有约束帧平滑到整段动作
    pub fn apply_motion_edit(&mut self) -> Result<SmoothingReport> {
        self.editor.apply(&self.reference, &mut self.edited)
    }

    fn check_frame(&self, frame: usize) -> Result<()> {
        if frame >= self.frame_count() {
            return Err(EditError::FrameOutOfRange {
                frame,
                count: self.frame_count(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::procedural::{WalkCycle, LEFT_TOE};
    use crate::animation::MotionClip;
    use crate::skeleton::SkeletonTopology;

    fn session(frames: usize) -> AnimationSession {
        let walk = WalkCycle::new(frames).unwrap();
        AnimationSession::from_source(&walk, EditConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_source_rejected() {
        let clip = MotionClip::new(WalkCycle::build_topology().unwrap());
        assert!(matches!(
            AnimationSession::from_source(&clip, EditConfig::default()),
            Err(EditError::EmptyMotion)
        ));

        let walk = WalkCycle::new(10).unwrap();
        let bad = EditConfig { knot_spacing: 0, ..Default::default() };
        assert!(matches!(
            AnimationSession::from_source(&walk, bad),
            Err(EditError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_playback_wraps() {
        let mut s = session(10);
        assert_eq!(s.advance(1.0), 0);
        assert!(s.toggle_playback());
        // 0.03 秒一帧
        assert_eq!(s.advance(0.095), 3);
        assert_eq!(s.advance(0.21), 0);
        s.set_current_frame(9).unwrap();
        assert!(s.set_current_frame(10).is_err());
    }

    #[test]
    fn test_advance_with_huge_or_invalid_dt() {
        let mut s = session(10);
        s.toggle_playback();

        let frame = s.advance(1.0e6);
        assert!(frame < 10);
        assert!(s.frame_clock >= 0.0 && s.frame_clock < s.config().frame_time);

        assert_eq!(s.advance(f32::INFINITY), frame);
        assert_eq!(s.advance(f32::NAN), frame);
        assert_eq!(s.advance(-1.0), frame);
        assert!(s.frame_clock.is_finite());

        // 时钟仍可正常推进
        s.set_current_frame(0).unwrap();
        assert_eq!(s.advance(0.045), 1);
    }

    #[test]
    fn test_pick_nearest_joint() {
        let mut s = session(10);
        let toe = s.edited(0).unwrap().link(LEFT_TOE).unwrap().world_position();

        let sel = s.pick(toe + Vec3::new(0.2, 0.0, 0.0)).unwrap();
        assert_eq!(sel.joint, LEFT_TOE);
        assert_eq!(sel.grab_point, toe);

        assert!(s.pick(Vec3::new(100.0, 100.0, 100.0)).is_none());
        assert!(s.selection().is_none());
    }

    #[test]
    fn test_drag_records_constraint() {
        let mut s = session(60);
        s.set_current_frame(30).unwrap();
        let toe = s.edited(30).unwrap().link(LEFT_TOE).unwrap().world_position();
        s.pick(toe).unwrap();

        for _ in 0..20 {
            s.drag_selection(Vec3::new(0.0, 0.5, 0.0)).unwrap().unwrap();
        }
        let moved = s.edited(30).unwrap().link(LEFT_TOE).unwrap().world_position();
        assert!((moved - (toe + Vec3::new(0.0, 0.5, 0.0))).length() < 0.1);
        assert_eq!(s.constrained_frames(), vec![30]);

        let d = s.edited(30).unwrap().displacement();
        assert!(d.row(3).iter().any(|v| v.abs() > 1e-4));
        // 右腿未动
        assert!(d.row(7).iter().all(|v| v.abs() < 1e-6));

        s.release();
        assert_eq!(s.drag_selection(Vec3::Y).unwrap(), None);
    }

    #[test]
    fn test_drag_root_not_constrained() {
        let mut s = session(20);
        let root = s.edited(5).unwrap().root().world_position();
        let outcome = s.drag_joint(5, 0, root + Vec3::Y).unwrap();
        assert_eq!(outcome.iterations, 0);
        assert!(s.constrained_frames().is_empty());
    }

    #[test]
    fn test_drag_out_of_range() {
        let mut s = session(20);
        assert!(matches!(
            s.drag_joint(20, 1, Vec3::ZERO),
            Err(EditError::FrameOutOfRange { frame: 20, count: 20 })
        ));
        assert!(matches!(
            s.drag_joint(3, 19, Vec3::ZERO),
            Err(EditError::JointOutOfRange { joint: 19, count: 19 })
        ));
    }

    #[test]
    fn test_reset_discards_edits() {
        let mut s = session(20);
        let toe = s.edited(10).unwrap().link(LEFT_TOE).unwrap().world_position();
        s.drag_joint(10, LEFT_TOE, toe + Vec3::Z).unwrap();
        assert_eq!(s.constrained_frames(), vec![10]);

        s.reset();
        assert!(s.constrained_frames().is_empty());
        assert_eq!(
            s.edited(10).unwrap().world_positions(),
            s.reference(10).unwrap().world_positions()
        );
    }

    #[test]
    fn test_apply_consumes_constraints() {
        let mut s = session(100);
        let toe = s.edited(50).unwrap().link(LEFT_TOE).unwrap().world_position();
        for _ in 0..5 {
            s.drag_joint(50, LEFT_TOE, toe + Vec3::new(0.0, 0.3, 0.0)).unwrap();
        }
        let report = s.apply_motion_edit().unwrap();
        assert_eq!(report.applied_frames, vec![50]);
        assert!(s.constrained_frames().is_empty());

        let neighbour = s.edited(48).unwrap().link(LEFT_TOE).unwrap().world_position();
        let original = s.reference(48).unwrap().link(LEFT_TOE).unwrap().world_position();
        assert!((neighbour - original).length() > 1e-3);
    }

    #[test]
    fn test_unlabelled_joint_uses_full_sweep() {
        let mut topo = SkeletonTopology::new();
        let root = topo.add_root("Root", None).unwrap();
        let a = topo.add_joint("A", root, Vec3::Y, None).unwrap();
        topo.add_end_site("Tip", a, Vec3::Y, None).unwrap();
        let frames = (0..3).map(|_| crate::skeleton::FramePose::rest(3, Vec3::ZERO)).collect();
        let clip = MotionClip::with_frames(topo, frames).unwrap();

        let mut s = AnimationSession::from_source(&clip, EditConfig::default()).unwrap();
        let tip = s.edited(1).unwrap().link(2).unwrap().world_position();
        s.drag_joint(1, 2, tip + Vec3::new(0.05, 0.0, 0.0)).unwrap();
        assert!(s.edited(1).unwrap().link(2).unwrap().world_position().x > 0.0);
    }
}
