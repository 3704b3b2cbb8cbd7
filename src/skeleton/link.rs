//! 关节节点 - 参考 nphysics MultibodyLink 设计
//!
//! Link 是运动链的基本单元。世界姿态不逐级重算，而是缓存父关节的
//! 世界姿态（parent_global_*），由正向运动学统一刷新。

use glam::{Quat, Vec3};

/// 关节节点
///
/// - 静态数据：名称、父子关系、骨长偏移、区域标签
/// - 动态数据：局部旋转、父关节世界姿态缓存
/// - 世界姿态：position = parent_rot * local_offset + parent_pos
#[derive(Clone, Debug)]
pub struct Link {
    // ========================================
    // 静态数据（拓扑建立后不变）
    // ========================================

    /// 关节名称
    pub name: String,

    /// 身体区域标签（用于局部正向运动学）
    pub region: Option<String>,

    /// 父关节索引 (-1 表示根)
    pub parent_index: i32,

    /// 首个子关节索引 (-1 表示叶节点)
    pub child_index: i32,

    /// 是否为末端标记点（End Site，无自身旋转）
    pub is_end_site: bool,

    /// 相对父关节的偏移（父关节局部坐标系，即骨长向量）
    /// 根关节存放的是根平移
    pub local_offset: Vec3,

    // ========================================
    // 动态数据
    // ========================================

    /// 相对父关节的旋转
    pub local_rotation: Quat,

    /// 父关节世界位置（缓存）
    pub(crate) parent_global_position: Vec3,

    /// 父关节世界旋转（缓存）
    pub(crate) parent_global_rotation: Quat,
}

impl Link {
    /// 创建根关节
    pub fn root(name: impl Into<String>, translation: Vec3, rotation: Quat) -> Self {
        Self {
            name: name.into(),
            region: None,
            parent_index: -1,
            child_index: -1,
            is_end_site: false,
            local_offset: translation,
            local_rotation: rotation,
            parent_global_position: Vec3::ZERO,
            parent_global_rotation: Quat::IDENTITY,
        }
    }

    /// 创建子关节（父关节缓存姿态待正向运动学刷新）
    pub fn child(name: impl Into<String>, parent: usize, offset: Vec3, rotation: Quat) -> Self {
        Self {
            parent_index: parent as i32,
            local_offset: offset,
            local_rotation: rotation,
            ..Self::root(name, Vec3::ZERO, Quat::IDENTITY)
        }
    }

    /// 设为末端标记点（旋转固定为单位四元数）
    pub fn with_end_site(mut self) -> Self {
        self.is_end_site = true;
        self.local_rotation = Quat::IDENTITY;
        self
    }

    /// 设置区域标签
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    // ========================================
    // 访问器
    // ========================================

    /// 父关节索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 首个子关节索引
    #[inline]
    pub fn child_id(&self) -> Option<usize> {
        if self.child_index >= 0 {
            Some(self.child_index as usize)
        } else {
            None
        }
    }

    /// 是否为根关节
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// 是否属于指定区域
    #[inline]
    pub fn in_region(&self, region: &str) -> bool {
        self.region.as_deref() == Some(region)
    }

    /// 世界位置
    #[inline]
    pub fn world_position(&self) -> Vec3 {
        self.parent_global_rotation * self.local_offset + self.parent_global_position
    }

    /// 世界旋转
    #[inline]
    pub fn world_rotation(&self) -> Quat {
        self.parent_global_rotation * self.local_rotation
    }

    /// 父关节世界位置（缓存值）
    #[inline]
    pub fn parent_global_position(&self) -> Vec3 {
        self.parent_global_position
    }

    /// 父关节世界旋转（缓存值）
    #[inline]
    pub fn parent_global_rotation(&self) -> Quat {
        self.parent_global_rotation
    }

    // ========================================
    // 变换修改
    // ========================================

    /// 在父坐标系中左乘增量旋转
    #[inline]
    pub fn rotate(&mut self, rotation: Quat) {
        self.local_rotation = rotation * self.local_rotation;
    }

    /// 刷新父关节世界姿态缓存
    #[inline]
    pub fn update_parent_pose(&mut self, position: Vec3, rotation: Quat) {
        self.parent_global_position = position;
        self.parent_global_rotation = rotation;
    }
}
