//! 动作编辑配置
//!
//! 所有参数扁平化，显式传入会话 / 求解器，不使用全局实例。

use crate::{EditError, Result};

/// 动作编辑配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct EditConfig {
    // ========== IK ==========
    /// 单次求解的最大迭代次数，默认 100
    pub ik_max_iterations: u32,
    /// 收敛半径（长度单位），默认 0.01
    pub ik_tolerance: f32,
    /// 雅可比 SVD 截断阈值（相对最大奇异值），默认 0.01
    pub ik_svd_threshold: f32,
    /// 固定阻尼步长，默认 0.01
    /// 每次迭代只走 dθ 的这一比例，拖动时由连续的输入事件累积
    pub ik_step_size: f32,

    // ========== B 样条平滑 ==========
    /// 节点间隔（每段帧数），默认 5
    pub knot_spacing: usize,
    /// 拟合 SVD 截断阈值（相对最大奇异值），默认 0.01
    pub fit_svd_threshold: f32,
    /// 是否用 rayon 并行拟合各关节曲线，默认 true
    pub parallel_smoothing: bool,

    // ========== 交互 ==========
    /// 播放时每帧时长（秒），默认 0.03
    pub frame_time: f32,
    /// 关节拾取半径（世界单位），默认 1.5
    pub pick_radius: f32,

    // ========== 调试 ==========
    /// 是否输出逐迭代调试日志，默认 false
    pub debug_log: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            // ====== IK ======
            ik_max_iterations: 100,
            ik_tolerance: 0.01,
            ik_svd_threshold: 0.01,
            ik_step_size: 0.01,

            // ====== B 样条平滑 ======
            knot_spacing: 5,
            fit_svd_threshold: 0.01,
            parallel_smoothing: true,

            // ====== 交互 ======
            frame_time: 0.03,
            pick_radius: 1.5,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

impl EditConfig {
    /// 检查参数合法性
    pub fn validate(&self) -> Result<()> {
        if self.knot_spacing == 0 {
            return Err(EditError::InvalidConfig("knot_spacing must be at least 1".to_string()));
        }
        let positive = [
            ("ik_tolerance", self.ik_tolerance),
            ("ik_step_size", self.ik_step_size),
            ("frame_time", self.frame_time),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(EditError::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }
        let non_negative = [
            ("ik_svd_threshold", self.ik_svd_threshold),
            ("fit_svd_threshold", self.fit_svd_threshold),
            ("pick_radius", self.pick_radius),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(EditError::InvalidConfig(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        Ok(())
    }
}
