//! 运动链 - 参考 nphysics Multibody 设计
//!
//! 核心设计思想：
//! - Link: 单个关节，缓存父关节世界姿态
//! - Body: 一帧的全部关节，负责正向运动学与祖先链查询
//! - IkSolver: 雅可比伪逆 IK
//! - 位移编码: 编辑姿态相对参考姿态的逐关节差异

mod body;
mod displacement;
mod ik_solver;
mod link;
mod topology;

pub use body::{Body, FkScope};
pub use displacement::encode_displacement;
pub use ik_solver::{IkOutcome, IkSolver};
pub use link::Link;
pub use topology::{FramePose, JointDef, SkeletonTopology};
