//! 动作编辑
//!
//! - bspline: 三次均匀 B 样条（基函数、拟合、求值）
//! - motion_editor: 把稀疏的单帧约束平滑到整段动作
//! - pose_source: 逐帧姿态来源
//! - procedural: 程序化步行动作
//! - session: 编辑会话（播放、拾取、拖动、平滑）

mod bspline;
mod motion_editor;
mod pose_source;
pub mod procedural;
mod session;

pub use bspline::UniformCubicBSpline;
pub use motion_editor::{MotionEditor, SmoothingReport};
pub use pose_source::{MotionClip, PoseSource};
pub use procedural::WalkCycle;
pub use session::{AnimationSession, Selection};
