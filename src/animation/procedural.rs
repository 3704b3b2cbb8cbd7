//! 程序化步行动作
//!
//! 生成一段周期性的双足步行：19 个关节（髋为根，两条腿带趾尖末端点，
//! 脊柱 / 颈 / 头，两条手臂），按身体区域打标签，膝关节始终保持弯曲。

use std::f32::consts::TAU;

use glam::{Quat, Vec3};

use crate::skeleton::{Body, FramePose, SkeletonTopology};
use crate::{EditError, Result};
use super::pose_source::{MotionClip, PoseSource};

/// 左趾尖末端点索引
pub const LEFT_TOE: usize = 4;
/// 右趾尖末端点索引
pub const RIGHT_TOE: usize = 8;
/// 头顶末端点索引
pub const HEAD: usize = 12;

const LEFT_UP_LEG: usize = 1;
const LEFT_LEG: usize = 2;
const LEFT_FOOT: usize = 3;
const RIGHT_UP_LEG: usize = 5;
const RIGHT_LEG: usize = 6;
const RIGHT_FOOT: usize = 7;
const SPINE: usize = 9;
const LEFT_ARM: usize = 13;
const LEFT_FORE_ARM: usize = 14;
const RIGHT_ARM: usize = 16;
const RIGHT_FORE_ARM: usize = 17;

/// 步行参数
#[derive(Debug, Clone)]
pub struct WalkCycle {
    topology: SkeletonTopology,
    /// 总帧数
    pub frame_count: usize,
    /// 一个完整步态周期的帧数
    pub period: usize,
    /// 每帧前进距离（+Z）
    pub speed: f32,
    /// 髋部高度
    pub hip_height: f32,
    /// 大腿前后摆幅（弧度）
    pub hip_swing: f32,
    /// 膝关节最小弯曲角（弧度）
    pub knee_bend: f32,
    /// 膝关节额外弯曲幅度（弧度）
    pub knee_swing: f32,
    /// 手臂摆幅（弧度）
    pub arm_swing: f32,
}

impl WalkCycle {
    pub fn new(frame_count: usize) -> Result<Self> {
        Ok(Self {
            topology: Self::build_topology()?,
            frame_count,
            period: 40,
            speed: 0.3,
            hip_height: 22.0,
            hip_swing: 0.4,
            knee_bend: 0.4,
            knee_swing: 0.5,
            arm_swing: 0.3,
        })
    }

    /// 19 关节双足骨架
    pub fn build_topology() -> Result<SkeletonTopology> {
        let mut topo = SkeletonTopology::new();
        let hips = topo.add_root("Hips", Some("core"))?;

        for (side, x) in [("Left", 3.0), ("Right", -3.0)] {
            let region = if x > 0.0 { "left_leg" } else { "right_leg" };
            let up = topo.add_joint(format!("{side}UpLeg"), hips, Vec3::new(x, 0.0, 0.0), Some(region))?;
            let leg = topo.add_joint(format!("{side}Leg"), up, Vec3::new(0.0, -10.0, 0.0), Some(region))?;
            let foot = topo.add_joint(format!("{side}Foot"), leg, Vec3::new(0.0, -10.0, 0.0), Some(region))?;
            topo.add_end_site(format!("{side}Toe"), foot, Vec3::new(0.0, -2.0, 3.0), Some(region))?;
        }

        let spine = topo.add_joint("Spine", hips, Vec3::new(0.0, 5.0, 0.0), Some("upper_body"))?;
        let chest = topo.add_joint("Chest", spine, Vec3::new(0.0, 5.0, 0.0), Some("upper_body"))?;
        let neck = topo.add_joint("Neck", chest, Vec3::new(0.0, 4.0, 0.0), Some("upper_body"))?;
        topo.add_end_site("Head", neck, Vec3::new(0.0, 3.0, 0.0), Some("upper_body"))?;

        for (side, x) in [("Left", 4.0), ("Right", -4.0)] {
            let arm = topo.add_joint(format!("{side}Arm"), chest, Vec3::new(x, 3.0, 0.0), Some("upper_body"))?;
            let fore = topo.add_joint(format!("{side}ForeArm"), arm, Vec3::new(0.0, -7.0, 0.0), Some("upper_body"))?;
            topo.add_end_site(format!("{side}Hand"), fore, Vec3::new(0.0, -6.0, 0.0), Some("upper_body"))?;
        }

        if topo.len() != 19 {
            return Err(EditError::InvalidTopology(format!("walk skeleton has {} joints", topo.len())));
        }
        Ok(topo)
    }

    #[inline]
    pub fn topology(&self) -> &SkeletonTopology {
        &self.topology
    }

    /// 指定帧的根平移与局部旋转
    pub fn frame(&self, frame: usize) -> FramePose {
        let period = self.period.max(1) as f32;
        let phase = TAU * (frame as f32 / period);
        let (s, c) = phase.sin_cos();

        let mut pose = FramePose::rest(
            self.topology.len(),
            Vec3::new(0.0, self.hip_height + 0.3 * (2.0 * phase).cos(), self.speed * frame as f32),
        );
        let r = &mut pose.rotations;

        // 两腿反相；膝关节弯曲角 >= knee_bend
        r[LEFT_UP_LEG] = Quat::from_rotation_x(-self.hip_swing * s);
        r[RIGHT_UP_LEG] = Quat::from_rotation_x(self.hip_swing * s);
        r[LEFT_LEG] = Quat::from_rotation_x(self.knee_bend + self.knee_swing * (0.5 + 0.5 * c));
        r[RIGHT_LEG] = Quat::from_rotation_x(self.knee_bend + self.knee_swing * (0.5 - 0.5 * c));
        r[LEFT_FOOT] = Quat::from_rotation_x(-0.2 * s);
        r[RIGHT_FOOT] = Quat::from_rotation_x(0.2 * s);

        r[SPINE] = Quat::from_rotation_y(0.05 * s);

        // 手臂与同侧腿反向摆动
        r[LEFT_ARM] = Quat::from_rotation_x(self.arm_swing * s);
        r[RIGHT_ARM] = Quat::from_rotation_x(-self.arm_swing * s);
        r[LEFT_FORE_ARM] = Quat::from_rotation_x(-0.3);
        r[RIGHT_FORE_ARM] = Quat::from_rotation_x(-0.3);

        pose
    }

    /// 展开为内存帧表
    pub fn to_clip(&self) -> Result<MotionClip> {
        let frames = (0..self.frame_count).map(|f| self.frame(f)).collect();
        MotionClip::with_frames(self.topology.clone(), frames)
    }
}

impl PoseSource for WalkCycle {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn pose(&self, frame: usize) -> Result<Body> {
        if frame >= self.frame_count {
            return Err(EditError::FrameOutOfRange {
                frame,
                count: self.frame_count,
            });
        }
        self.topology.build_body(&self.frame(frame))
    }
}
