use cgmath::{Decomposed, One};

use crate::error::{Error, Result};
use crate::hierarchy::Skeleton;
use crate::types::*;
use crate::utils::euler_to_quat;

/// Global transforms of every joint for one pose frame. Basically forward kinematics.
pub fn resolve(skeleton: &Skeleton, frame: &PoseFrame) -> Result<Vec<GlobalTransform>> {
    let mut transforms = Vec::with_capacity(skeleton.len());
    resolve_into(skeleton, frame, &mut transforms)?;
    Ok(transforms)
}

/// Same as [`resolve`], but writes into `out` so a per-tick caller can reuse the allocation.
/// On error `out` is left untouched.
pub fn resolve_into(
    skeleton: &Skeleton,
    frame: &PoseFrame,
    out: &mut Vec<GlobalTransform>,
) -> Result<()> {
    if frame.rotations.len() < skeleton.len() {
        return Err(Error::FrameIndexOutOfRange {
            expected: skeleton.len(),
            found: frame.rotations.len(),
        });
    }

    out.clear();
    for joint in skeleton.iter() {
        let local_rotation = euler_to_quat(&frame.rotations[joint.index], &joint.rotation_order);

        let transform = match joint.parent() {
            None => GlobalTransform {
                position: frame.root_position,
                orientation: local_rotation,
            },
            Some(parent) => {
                let parent_transform = out[parent].to_decomposed();
                let local = Decomposed {
                    scale: 1.0,
                    rot: local_rotation,
                    disp: joint.local_offset,
                };
                (parent_transform * local).into()
            }
        };
        out.push(transform);
    }
    Ok(())
}

/// Global transforms of the rest pose: every angle at zero, the root placed at its own offset.
pub fn resolve_rest_pose(skeleton: &Skeleton) -> Vec<GlobalTransform> {
    let mut out: Vec<GlobalTransform> = Vec::with_capacity(skeleton.len());
    for joint in skeleton.iter() {
        let transform = match joint.parent() {
            None => GlobalTransform {
                position: joint.local_offset,
                orientation: Quaternion::one(),
            },
            Some(parent) => GlobalTransform {
                position: out[parent].position + joint.local_offset,
                orientation: Quaternion::one(),
            },
        };
        out.push(transform);
    }
    out
}
