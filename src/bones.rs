use cgmath::{InnerSpace, Matrix4, Rotation, SquareMatrix};

use crate::config::SceneConfig;
use crate::error::Error;
use crate::hierarchy::Skeleton;
use crate::render::{MeshData, MeshHandle, RenderAdapter, Renderable};
use crate::types::*;
use crate::utils::try_normalize;

/// Orthonormal frame of a bone. `x_axis` points from the parent joint to the child joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneBasis {
    pub x_axis: Position,
    pub y_axis: Position,
    pub z_axis: Position,
    pub origin: Position,
    pub length: f64,
}

impl BoneBasis {
    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_cols(
            self.x_axis.extend(0.0),
            self.y_axis.extend(0.0),
            self.z_axis.extend(0.0),
            self.origin.extend(1.0),
        )
    }
}

/// Build the basis of the bone spanning `par_pos` -> `pos`.
///
/// The up reference is world up rotated into the parent's frame. When the bone runs parallel
/// to it, the parent's rotated forward axis is used instead. Returns `None` when the bone is
/// shorter than `epsilon`.
pub fn bone_basis(
    par_pos: Position,
    pos: Position,
    parent_orientation: Quaternion,
    epsilon: f64,
) -> Option<BoneBasis> {
    let delta = pos - par_pos;
    let length = delta.magnitude();
    let x_axis = try_normalize(delta, epsilon)?;

    let up = parent_orientation.rotate_vector(Position::unit_y());
    let z_axis = try_normalize(x_axis.cross(up), epsilon).or_else(|| {
        let forward = parent_orientation.rotate_vector(Position::unit_z());
        try_normalize(x_axis.cross(forward), epsilon)
    })?;
    let y_axis = z_axis.cross(x_axis);

    Some(BoneBasis {
        x_axis,
        y_axis,
        z_axis,
        origin: (par_pos + pos) * 0.5,
        length,
    })
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// The box drawn between a joint and its parent. The vertex data is created once per load;
/// every frame only the model transform changes.
#[derive(Debug)]
pub struct BoneSegment {
    joint: Index,
    parent: Index,
    mesh: MeshHandle,
    model: Matrix4<f64>,
    basis: Option<BoneBasis>,
}

impl BoneSegment {
    pub fn new(
        joint: &Joint,
        config: &SceneConfig,
        renderer: &mut dyn RenderAdapter,
    ) -> Option<Self> {
        let parent = joint.parent()?;
        let mesh = renderer.create_mesh(MeshData::bone_box(
            joint.local_offset.magnitude(),
            config.bone_thickness,
            config.bone_color,
        ));
        Some(BoneSegment {
            joint: joint.index,
            parent,
            mesh,
            model: Matrix4::identity(),
            basis: None,
        })
    }

    pub fn joint(&self) -> Index {
        self.joint
    }

    pub fn parent(&self) -> Index {
        self.parent
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn model(&self) -> &Matrix4<f64> {
        &self.model
    }

    /// Basis of the last successful update.
    pub fn basis(&self) -> Option<&BoneBasis> {
        self.basis.as_ref()
    }

    /// Place the bone from the current global transforms.
    ///
    /// A degenerate bone still follows its joints (the origin moves) but keeps the orientation
    /// from its last valid update, and `Error::DegenerateBone` is returned.
    pub fn apply(&mut self, transforms: &[GlobalTransform], epsilon: f64) -> Result<(), Error> {
        let parent = &transforms[self.parent];
        let child = &transforms[self.joint];

        match bone_basis(parent.position, child.position, parent.orientation, epsilon) {
            Some(basis) => {
                self.update(basis.to_matrix());
                self.basis = Some(basis);
                Ok(())
            }
            None => {
                let origin = (parent.position + child.position) * 0.5;
                let mut model = self.model;
                model.w = origin.extend(1.0);
                self.update(model);
                Err(Error::DegenerateBone {
                    joint: self.joint,
                    length: (child.position - parent.position).magnitude(),
                })
            }
        }
    }
}

impl Renderable for BoneSegment {
    fn update(&mut self, model: Matrix4<f64>) {
        self.model = model;
    }

    fn render(&self, renderer: &mut dyn RenderAdapter) {
        renderer.draw(self.mesh, &self.model);
    }

    fn release(self, renderer: &mut dyn RenderAdapter) {
        renderer.release_mesh(self.mesh);
    }
}

/// One bone per non-root joint, in joint order.
pub fn build_bones(
    skeleton: &Skeleton,
    config: &SceneConfig,
    renderer: &mut dyn RenderAdapter,
) -> Vec<BoneSegment> {
    skeleton
        .iter()
        .filter_map(|joint| BoneSegment::new(joint, config, &mut *renderer))
        .collect()
}

/// Update every bone and return the joints whose bones were degenerate this frame.
pub fn update_bones(
    bones: &mut [BoneSegment],
    transforms: &[GlobalTransform],
    epsilon: f64,
) -> Vec<Index> {
    let mut degenerate = Vec::new();
    for bone in bones.iter_mut() {
        if let Err(Error::DegenerateBone { joint, length }) = bone.apply(transforms, epsilon) {
            tracing::debug!("Bone of joint {} is degenerate (length {:e}), keeping its orientation", joint, length);
            degenerate.push(joint);
        }
    }
    degenerate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::resolve;
    use crate::render::{HeadlessRenderer, ViewUniforms};
    use cgmath::{Deg, One, Rotation3, Vector4};

    fn close(a: Position, b: Position) -> bool {
        (a - b).magnitude() < 1e-9
    }

    fn assert_orthonormal(basis: &BoneBasis) {
        assert!((basis.x_axis.magnitude() - 1.0).abs() < 1e-9);
        assert!((basis.y_axis.magnitude() - 1.0).abs() < 1e-9);
        assert!((basis.z_axis.magnitude() - 1.0).abs() < 1e-9);
        assert!(basis.x_axis.dot(basis.y_axis).abs() < 1e-9);
        assert!(basis.x_axis.dot(basis.z_axis).abs() < 1e-9);
        assert!(basis.y_axis.dot(basis.z_axis).abs() < 1e-9);
        // right handed
        assert!(close(basis.x_axis.cross(basis.y_axis), basis.z_axis));
    }

    #[test]
    fn basis_of_sideways_bone() {
        let basis = bone_basis(
            Position::new(0.0, 1.0, 0.0),
            Position::new(2.0, 1.0, 0.0),
            Quaternion::one(),
            1e-6,
        )
        .unwrap();
        assert!(close(basis.x_axis, Position::new(1.0, 0.0, 0.0)));
        assert!(close(basis.z_axis, Position::new(0.0, 0.0, 1.0)));
        assert!(close(basis.y_axis, Position::new(0.0, 1.0, 0.0)));
        assert!(close(basis.origin, Position::new(1.0, 1.0, 0.0)));
        assert!((basis.length - 2.0).abs() < 1e-12);
        assert_orthonormal(&basis);
    }

    #[test]
    fn basis_uses_parent_up() {
        // parent turned 90 degrees about x: its up is world +z
        let parent = Quaternion::from_angle_x(Deg(90.0));
        let basis = bone_basis(
            Position::new(0.0, 0.0, 0.0),
            Position::new(1.0, 0.0, 0.0),
            parent,
            1e-6,
        )
        .unwrap();
        assert!(close(basis.z_axis, Position::new(0.0, -1.0, 0.0)));
        assert_orthonormal(&basis);
    }

    #[test]
    fn bone_parallel_to_up_falls_back_to_forward() {
        let basis = bone_basis(
            Position::new(0.0, 0.0, 0.0),
            Position::new(0.0, -0.1, 0.0),
            Quaternion::one(),
            1e-6,
        )
        .unwrap();
        assert!(close(basis.x_axis, Position::new(0.0, -1.0, 0.0)));
        assert!(basis.z_axis.x.is_finite() && basis.y_axis.x.is_finite());
        assert_orthonormal(&basis);
    }

    #[test]
    fn zero_length_bone_has_no_basis() {
        let p = Position::new(0.3, 0.2, 0.1);
        assert!(bone_basis(p, p, Quaternion::one(), 1e-6).is_none());
    }

    #[test]
    fn degenerate_bone_keeps_orientation() {
        let skeleton = Skeleton::build(
            &[-1, 0],
            &[Position::new(0.0, 0.0, 0.0), Position::new(0.5, 0.0, 0.0)],
            &["zxy"],
        )
        .unwrap();
        let mut renderer = HeadlessRenderer::new();
        let mut bones = build_bones(&skeleton, &SceneConfig::default(), &mut renderer);
        assert_eq!(bones.len(), 1);

        let frame = PoseFrame::zeroed(Position::new(0.0, 0.0, 0.0), 2);
        let transforms = resolve(&skeleton, &frame).unwrap();
        assert!(update_bones(&mut bones, &transforms, 1e-6).is_empty());
        let model = *bones[0].model();

        // collapse the child onto the parent, somewhere else in the world
        let collapsed = vec![
            GlobalTransform {
                position: Position::new(3.0, 0.0, 0.0),
                orientation: Quaternion::one(),
            },
            GlobalTransform {
                position: Position::new(3.0, 0.0, 0.0),
                orientation: Quaternion::one(),
            },
        ];
        assert_eq!(update_bones(&mut bones, &collapsed, 1e-6), vec![1]);
        let degenerate_model = bones[0].model();
        assert_eq!(degenerate_model.x, model.x);
        assert_eq!(degenerate_model.y, model.y);
        assert_eq!(degenerate_model.z, model.z);
        assert_eq!(degenerate_model.w, Vector4::new(3.0, 0.0, 0.0, 1.0));
        assert!(bones[0].basis().is_some());
    }

    #[test]
    fn bones_render_their_model() {
        let skeleton = Skeleton::build(
            &[-1, 0, 0],
            &[
                Position::new(0.0, 0.0, 0.0),
                Position::new(0.0, 0.0, 0.4),
                Position::new(0.2, 0.0, 0.0),
            ],
            &["xyz"],
        )
        .unwrap();
        let mut renderer = HeadlessRenderer::new();
        let mut bones = build_bones(&skeleton, &SceneConfig::default(), &mut renderer);
        let transforms = resolve(&skeleton, &PoseFrame::zeroed(Position::new(0.0, 0.0, 0.0), 3)).unwrap();
        update_bones(&mut bones, &transforms, 1e-6);

        renderer.begin_frame(&ViewUniforms::default());
        for bone in &bones {
            bone.render(&mut renderer);
        }
        assert_eq!(renderer.draws().len(), 2);
        let (mesh, model) = renderer.draws()[0];
        assert_eq!(mesh, bones[0].mesh());
        assert_eq!(model.w, Vector4::new(0.0, 0.0, 0.2, 1.0));
        let extents = renderer.meshes().get(mesh).unwrap().extents();
        assert!((extents[0] - 0.4).abs() < 1e-6);

        for bone in bones {
            bone.release(&mut renderer);
        }
        assert!(renderer.meshes().is_empty());
    }
}
