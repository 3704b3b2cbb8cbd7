//! 约束式动作编辑引擎
//!
//! 在单帧内拖动末端关节到新的世界位置，再把这次编辑平滑地传播到整段动作：
//!
//! ```text
//! PoseSource ──► Body[帧] ──► IkSolver ──► 位移编码 ──► MotionEditor (B 样条) ──► Body[帧]
//! ```
//!
//! - [`skeleton`]: 运动链（Link / Body）、正向运动学、雅可比 IK、位移编码
//! - [`animation`]: 三次均匀 B 样条、时域平滑、姿态来源、编辑会话

pub mod animation;
pub mod config;
pub mod math;
pub mod skeleton;

pub use animation::{
    AnimationSession, MotionClip, MotionEditor, PoseSource, SmoothingReport, UniformCubicBSpline, WalkCycle,
};
pub use config::EditConfig;
pub use skeleton::{Body, FkScope, FramePose, IkOutcome, IkSolver, Link, SkeletonTopology};

/// 引擎错误类型
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("topology mismatch: expected {expected} links, found {found}")]
    TopologyMismatch { expected: usize, found: usize },

    #[error("sequence length mismatch: expected {expected} frames, found {found}")]
    SequenceMismatch { expected: usize, found: usize },

    #[error("frame {frame} out of range (frame count {count})")]
    FrameOutOfRange { frame: usize, count: usize },

    #[error("joint {joint} out of range (joint count {count})")]
    JointOutOfRange { joint: usize, count: usize },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pose source produced no frames")]
    EmptyMotion,

    #[error("linear solve failed: {0}")]
    Solver(String),
}

pub type Result<T> = std::result::Result<T, EditError>;
