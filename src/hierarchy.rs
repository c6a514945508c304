use crate::error::{Error, Result};
use crate::types::*;

/// Static topology of a skeleton. Joints are stored in topological order, so iterating
/// them by index always visits a parent before any of its children.
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: Vec<Joint>,
}

impl Skeleton {
    /// Validate and build a hierarchy.
    ///
    /// Every parent index must be `-1` or strictly smaller than the joint's own index, and
    /// exactly one joint may be the root. `rotation_orders` holds either one order per joint
    /// or a single order shared by the whole skeleton.
    pub fn build<S: AsRef<str>>(
        parent_indices: &[ParentIndex],
        local_offsets: &[Position],
        rotation_orders: &[S],
    ) -> Result<Self> {
        let num_joints = parent_indices.len();
        if num_joints == 0 {
            return Err(Error::InvalidHierarchy("skeleton has no joints".to_string()));
        }
        if local_offsets.len() != num_joints {
            return Err(Error::InvalidHierarchy(format!(
                "{} parent indices but {} local offsets",
                num_joints,
                local_offsets.len()
            )));
        }
        if rotation_orders.len() != num_joints && rotation_orders.len() != 1 {
            return Err(Error::InvalidHierarchy(format!(
                "{} joints but {} rotation orders",
                num_joints,
                rotation_orders.len()
            )));
        }

        let mut joints: Vec<Joint> = Vec::with_capacity(num_joints);
        let mut num_roots = 0;

        for (index, &parent_index) in parent_indices.iter().enumerate() {
            let order_str = if rotation_orders.len() == 1 {
                rotation_orders[0].as_ref()
            } else {
                rotation_orders[index].as_ref()
            };
            let rotation_order: RotationOrder = order_str
                .parse()
                .map_err(|e| Error::InvalidHierarchy(format!("joint {}: {}", index, e)))?;

            let depth = match parent_index {
                -1 => {
                    num_roots += 1;
                    0
                }
                p if p < -1 => {
                    return Err(Error::InvalidHierarchy(format!(
                        "joint {} has invalid parent index {}",
                        index, p
                    )));
                }
                p if p as Index >= index => {
                    return Err(Error::InvalidHierarchy(format!(
                        "joint {} references parent {} which does not precede it",
                        index, p
                    )));
                }
                p => joints[p as Index].depth + 1,
            };

            if parent_index != -1 {
                joints[parent_index as Index].children.push(index);
            }

            joints.push(Joint {
                name: format!("joint_{}", index),
                index,
                parent_index,
                depth,
                children: Vec::new(),
                local_offset: local_offsets[index],
                rotation_order,
            });
        }

        if num_roots != 1 {
            return Err(Error::InvalidHierarchy(format!(
                "expected exactly one root, found {}",
                num_roots
            )));
        }

        Ok(Skeleton { joints })
    }

    /// Replace the generated joint names. Extra names are ignored, missing ones keep the default.
    pub fn with_names<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        for (joint, name) in self.joints.iter_mut().zip(names) {
            joint.name = name;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Joints in index order (parents before children).
    pub fn iter(&self) -> std::slice::Iter<'_, Joint> {
        self.joints.iter()
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, index: Index) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn joint_by_name(&self, name: &str) -> Option<&Joint> {
        self.joints.iter().find(|joint| joint.name == name)
    }

    /// The root is always joint 0 in a topologically sorted hierarchy.
    pub fn root(&self) -> &Joint {
        &self.joints[0]
    }

    pub fn children(&self, index: Index) -> &[Index] {
        self.joints
            .get(index)
            .map(|joint| joint.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn depth(&self, index: Index) -> Option<Depth> {
        self.joints.get(index).map(|joint| joint.depth)
    }
}

impl<'a> IntoIterator for &'a Skeleton {
    type Item = &'a Joint;
    type IntoIter = std::slice::Iter<'a, Joint>;

    fn into_iter(self) -> Self::IntoIter {
        self.joints.iter()
    }
}
