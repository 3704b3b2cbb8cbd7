//! 姿态来源
//!
//! 会话只通过 [`PoseSource`] 读取逐帧姿态，不关心数据来自文件、
//! 内存帧表还是程序化生成。

use crate::skeleton::{Body, FramePose, SkeletonTopology};
use crate::{EditError, Result};

/// 逐帧姿态来源
pub trait PoseSource {
    /// 总帧数
    fn frame_count(&self) -> usize;

    /// 构建指定帧的完整姿态（已执行正向运动学，位移为零）
    fn pose(&self, frame: usize) -> Result<Body>;

    /// 是否没有任何帧
    fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }
}

/// 内存帧表：一份拓扑 + 每帧的根平移与局部旋转
#[derive(Debug, Clone)]
pub struct MotionClip {
    topology: SkeletonTopology,
    frames: Vec<FramePose>,
}

impl MotionClip {
    pub fn new(topology: SkeletonTopology) -> Self {
        Self {
            topology,
            frames: Vec::new(),
        }
    }

    /// 由拓扑和帧表构建，逐帧校验关节数
    pub fn with_frames(topology: SkeletonTopology, frames: Vec<FramePose>) -> Result<Self> {
        let mut clip = Self::new(topology);
        for pose in frames {
            clip.push_frame(pose)?;
        }
        Ok(clip)
    }

    /// 追加一帧
    pub fn push_frame(&mut self, pose: FramePose) -> Result<()> {
        if pose.rotations.len() != self.topology.len() {
            return Err(EditError::TopologyMismatch {
                expected: self.topology.len(),
                found: pose.rotations.len(),
            });
        }
        self.frames.push(pose);
        Ok(())
    }

    #[inline]
    pub fn topology(&self) -> &SkeletonTopology {
        &self.topology
    }

    #[inline]
    pub fn frames(&self) -> &[FramePose] {
        &self.frames
    }
}

impl PoseSource for MotionClip {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn pose(&self, frame: usize) -> Result<Body> {
        let pose = self.frames.get(frame).ok_or(EditError::FrameOutOfRange {
            frame,
            count: self.frames.len(),
        })?;
        self.topology.build_body(pose)
    }
}
