//! 骨架拓扑
//!
//! 所有帧共享的静态结构：关节名、父子关系、骨长偏移、区域标签。
//! 每帧的变化部分（根平移 + 各关节局部旋转）由 [`FramePose`] 提供。

use glam::{Quat, Vec3};

use crate::{EditError, Result};
use super::body::Body;
use super::link::Link;

/// 关节定义
#[derive(Clone, Debug)]
pub struct JointDef {
    pub name: String,
    pub parent: Option<usize>,
    /// 相对父关节的偏移（根关节忽略）
    pub offset: Vec3,
    pub end_site: bool,
    pub region: Option<String>,
}

/// 单帧姿态数据
#[derive(Clone, Debug)]
pub struct FramePose {
    pub root_translation: Vec3,
    /// 每个关节一个局部旋转（末端标记点的值会被忽略）
    pub rotations: Vec<Quat>,
}

impl FramePose {
    /// 全部为单位旋转的姿态
    pub fn rest(joint_count: usize, root_translation: Vec3) -> Self {
        Self {
            root_translation,
            rotations: vec![Quat::IDENTITY; joint_count],
        }
    }
}

/// 骨架拓扑
#[derive(Clone, Debug, Default)]
pub struct SkeletonTopology {
    joints: Vec<JointDef>,
}

impl SkeletonTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加根关节，返回索引
    pub fn add_root(&mut self, name: impl Into<String>, region: Option<&str>) -> Result<usize> {
        if !self.joints.is_empty() {
            return Err(EditError::InvalidTopology("root must be the first joint".to_string()));
        }
        self.joints.push(JointDef {
            name: name.into(),
            parent: None,
            offset: Vec3::ZERO,
            end_site: false,
            region: region.map(str::to_string),
        });
        Ok(0)
    }

    /// 添加关节，父关节必须已存在
    pub fn add_joint(
        &mut self,
        name: impl Into<String>,
        parent: usize,
        offset: Vec3,
        region: Option<&str>,
    ) -> Result<usize> {
        self.push_child(name.into(), parent, offset, false, region)
    }

    /// 添加末端标记点
    pub fn add_end_site(
        &mut self,
        name: impl Into<String>,
        parent: usize,
        offset: Vec3,
        region: Option<&str>,
    ) -> Result<usize> {
        self.push_child(name.into(), parent, offset, true, region)
    }

    fn push_child(
        &mut self,
        name: String,
        parent: usize,
        offset: Vec3,
        end_site: bool,
        region: Option<&str>,
    ) -> Result<usize> {
        match self.joints.get(parent) {
            None => {
                return Err(EditError::InvalidTopology(format!(
                    "joint '{}' refers to missing parent {}",
                    name, parent
                )));
            }
            Some(p) if p.end_site => {
                return Err(EditError::InvalidTopology(format!(
                    "joint '{}' cannot hang below end site '{}'",
                    name, p.name
                )));
            }
            Some(_) => {}
        }
        self.joints.push(JointDef {
            name,
            parent: Some(parent),
            offset,
            end_site,
            region: region.map(str::to_string),
        });
        Ok(self.joints.len() - 1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    #[inline]
    pub fn joints(&self) -> &[JointDef] {
        &self.joints
    }

    /// 首个子关节
    pub fn first_child(&self, joint: usize) -> Option<usize> {
        self.joints.iter().position(|j| j.parent == Some(joint))
    }

    /// 由单帧姿态构建 Body（含完整正向运动学）
    pub fn build_body(&self, pose: &FramePose) -> Result<Body> {
        if pose.rotations.len() != self.joints.len() {
            return Err(EditError::TopologyMismatch {
                expected: self.joints.len(),
                found: pose.rotations.len(),
            });
        }

        let mut links = Vec::with_capacity(self.joints.len());
        for (i, (def, rotation)) in self.joints.iter().zip(&pose.rotations).enumerate() {
            let mut link = match def.parent {
                None => Link::root(def.name.clone(), pose.root_translation, rotation.normalize()),
                Some(parent) => Link::child(def.name.clone(), parent, def.offset, rotation.normalize()),
            };
            if def.end_site {
                link = link.with_end_site();
            }
            if let Some(ref region) = def.region {
                link = link.with_region(region.clone());
            }
            link.child_index = self.first_child(i).map_or(-1, |c| c as i32);
            links.push(link);
        }

        Body::new(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm() -> SkeletonTopology {
        let mut topo = SkeletonTopology::new();
        let root = topo.add_root("Root", None).unwrap();
        let shoulder = topo.add_joint("Shoulder", root, Vec3::ZERO, Some("arm")).unwrap();
        let elbow = topo.add_joint("Elbow", shoulder, Vec3::X, Some("arm")).unwrap();
        topo.add_end_site("Hand", elbow, Vec3::X, Some("arm")).unwrap();
        topo
    }

    #[test]
    fn test_build_body_links_children() {
        let topo = arm();
        let body = topo.build_body(&FramePose::rest(topo.len(), Vec3::ZERO)).unwrap();

        assert_eq!(body.len(), 4);
        assert_eq!(body.link(0).unwrap().child_id(), Some(1));
        assert_eq!(body.link(2).unwrap().child_id(), Some(3));
        assert_eq!(body.link(3).unwrap().child_id(), None);
        assert!(body.link(3).unwrap().is_end_site);
        assert!((body.link(3).unwrap().world_position() - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_end_site_rotation_ignored() {
        let topo = arm();
        let mut pose = FramePose::rest(topo.len(), Vec3::ZERO);
        pose.rotations[3] = Quat::from_rotation_z(1.0);
        let body = topo.build_body(&pose).unwrap();
        assert_eq!(body.link(3).unwrap().local_rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_pose_size_mismatch() {
        let topo = arm();
        let pose = FramePose::rest(2, Vec3::ZERO);
        assert!(matches!(
            topo.build_body(&pose),
            Err(EditError::TopologyMismatch { expected: 4, found: 2 })
        ));
    }

    #[test]
    fn test_invalid_parents() {
        let mut topo = arm();
        assert!(topo.add_joint("Orphan", 42, Vec3::X, None).is_err());
        assert!(topo.add_joint("BelowSite", 3, Vec3::X, None).is_err());
        assert!(topo.add_root("Second", None).is_err());
    }
}
