//! 单帧骨架姿态 - 参考 nphysics Multibody 设计
//!
//! Body 持有一帧内全部 Link（索引 0 为根），以及该帧相对参考姿态的
//! 位移矩阵和约束标记。

use glam::Vec3;
use nalgebra::DMatrix;

use crate::{EditError, Result};
use super::link::Link;

/// 正向运动学范围
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FkScope<'a> {
    /// 整条链
    Full,
    /// 只刷新带该区域标签的关节
    Region(&'a str),
}

/// 单帧骨架姿态
#[derive(Clone, Debug)]
pub struct Body {
    links: Vec<Link>,
    /// (links + 1) × 3：第 0 行为根平移差，第 i 行为第 i-1 个关节的旋转对数差
    displacement: DMatrix<f32>,
    /// 被 IK 编辑过、位移尚未被平滑器消费
    constrained: bool,
}

impl Body {
    /// 由关节列表构建，校验拓扑并执行一次完整正向运动学
    pub fn new(links: Vec<Link>) -> Result<Self> {
        let rows = links.len() + 1;
        let mut body = Self {
            links,
            displacement: DMatrix::zeros(rows, 3),
            constrained: false,
        };
        body.validate()?;
        body.forward_kinematics(FkScope::Full);
        Ok(body)
    }

    /// 校验拓扑不变量
    pub fn validate(&self) -> Result<()> {
        let Some(root) = self.links.first() else {
            return Err(EditError::InvalidTopology("body has no links".to_string()));
        };
        if !root.is_root() {
            return Err(EditError::InvalidTopology("link 0 must be the root".to_string()));
        }
        for (i, link) in self.links.iter().enumerate().skip(1) {
            match link.parent_id() {
                Some(parent) if parent < i => {}
                Some(parent) => {
                    return Err(EditError::InvalidTopology(format!(
                        "link {} ('{}') has parent {} which does not precede it",
                        i, link.name, parent
                    )));
                }
                None => {
                    return Err(EditError::InvalidTopology(format!(
                        "link {} ('{}') is a second root",
                        i, link.name
                    )));
                }
            }
        }
        if self.displacement.nrows() != self.links.len() + 1 || self.displacement.ncols() != 3 {
            return Err(EditError::InvalidTopology(format!(
                "displacement is {}x{}, expected {}x3",
                self.displacement.nrows(),
                self.displacement.ncols(),
                self.links.len() + 1
            )));
        }
        Ok(())
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[inline]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    #[inline]
    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    /// 可变访问。修改旋转后必须重新执行正向运动学
    #[inline]
    pub fn link_mut(&mut self, index: usize) -> Option<&mut Link> {
        self.links.get_mut(index)
    }

    #[inline]
    pub fn root(&self) -> &Link {
        &self.links[0]
    }

    /// 所有关节的世界位置（供表现层读取）
    pub fn world_positions(&self) -> Vec<Vec3> {
        self.links.iter().map(Link::world_position).collect()
    }

    /// 按名称查找关节索引
    pub fn find(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|link| link.name == name)
    }

    #[inline]
    pub fn displacement(&self) -> &DMatrix<f32> {
        &self.displacement
    }

    #[inline]
    pub(crate) fn set_displacement(&mut self, displacement: DMatrix<f32>) {
        self.displacement = displacement;
    }

    #[inline]
    pub fn is_constrained(&self) -> bool {
        self.constrained
    }

    #[inline]
    pub fn set_constrained(&mut self, constrained: bool) {
        self.constrained = constrained;
    }

    // ========================================
    // 运动学
    // ========================================

    /// 正向运动学
    ///
    /// 按索引递增顺序刷新每个关节的父姿态缓存，父关节总在子关节之前处理。
    /// 局部旋转不变；根关节没有父关节，不参与刷新。
    pub fn forward_kinematics(&mut self, scope: FkScope<'_>) {
        for i in 1..self.links.len() {
            if let FkScope::Region(region) = scope {
                if !self.links[i].in_region(region) {
                    continue;
                }
            }
            let Some(parent) = self.links[i].parent_id() else {
                continue;
            };
            let Some(parent_link) = self.links.get(parent) else {
                continue;
            };
            let (position, rotation) = (parent_link.world_position(), parent_link.world_rotation());
            self.links[i].update_parent_pose(position, rotation);
        }
    }

    /// 祖先链：从直接父关节向上，不含根。根关节或越界索引返回空
    pub fn ancestor_chain(&self, joint: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let Some(mut link) = self.links.get(joint) else {
            return chain;
        };
        while let Some(parent) = link.parent_id() {
            let Some(parent_link) = self.links.get(parent) else {
                break;
            };
            if parent_link.is_root() || chain.len() >= self.links.len() {
                break;
            }
            chain.push(parent);
            link = parent_link;
        }
        chain
    }

    /// 所有出现过的区域标签（按首次出现顺序）
    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = Vec::new();
        for region in self.links.iter().filter_map(|link| link.region.as_deref()) {
            if !regions.contains(&region) {
                regions.push(region);
            }
        }
        regions
    }
}
