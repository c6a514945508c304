//! Render-side seam: mesh data handed to a backend, the backend trait itself and the
//! objects the scene draws through it.

use cgmath::{Matrix4, SquareMatrix, Vector3};
use generational_arena::Arena;

use crate::config::SceneConfig;

/// Opaque handle to a mesh owned by a [`RenderAdapter`]. Handles are generational: once a mesh is
/// released its handle never resolves again, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(generational_arena::Index);

/// Static vertex data for one object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Box centered on the origin, spanning `length` along x and `thickness` along y and z.
    pub fn bone_box(length: f64, thickness: f64, color: [f32; 3]) -> Self {
        let hx = (length * 0.5) as f32;
        let ht = (thickness * 0.5) as f32;

        // (normal, tangent u, tangent v) per face, u x v == normal
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];
        let half = [hx, ht, ht];

        let mut mesh = MeshData::default();
        for (normal, u, v) in FACES.iter() {
            let base = mesh.positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let mut p = [0.0f32; 3];
                for axis in 0..3 {
                    p[axis] = (normal[axis] + su * u[axis] + sv * v[axis]) * half[axis];
                }
                mesh.positions.push(p);
                mesh.normals.push(*normal);
                mesh.colors.push(color);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        mesh
    }

    /// Flat quad on the y = 0 plane facing up. The checker pattern itself is up to the backend.
    pub fn checkerboard_plane(width: f64, depth: f64, color1: [f32; 3], color2: [f32; 3]) -> Self {
        let w = (width * 0.5) as f32;
        let d = (depth * 0.5) as f32;
        MeshData {
            positions: vec![[-w, 0.0, -d], [w, 0.0, -d], [w, 0.0, d], [-w, 0.0, d]],
            normals: vec![[0.0, 1.0, 0.0]; 4],
            colors: vec![color1, color2, color1, color2],
            indices: vec![0, 2, 1, 2, 0, 3],
        }
    }

    /// Size of the axis aligned bounding box of the vertices.
    pub fn extents(&self) -> [f32; 3] {
        if self.positions.is_empty() {
            return [0.0; 3];
        }
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in &self.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        [max[0] - min[0], max[1] - min[1], max[2] - min[2]]
    }
}

/// Per-frame camera data forwarded to the backend. Only used for shading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewUniforms {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub view_pos: Vector3<f32>,
}

impl Default for ViewUniforms {
    fn default() -> Self {
        ViewUniforms {
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            view_pos: Vector3::new(0.0, 0.0, 0.0),
        }
    }
}

/// A rendering backend. It owns every vertex buffer; callers only keep handles.
pub trait RenderAdapter {
    /// Called once per tick before any draw.
    fn begin_frame(&mut self, uniforms: &ViewUniforms);

    fn create_mesh(&mut self, mesh: MeshData) -> MeshHandle;

    fn draw(&mut self, mesh: MeshHandle, model: &Matrix4<f64>);

    /// Returns `false` if the handle was already released.
    fn release_mesh(&mut self, mesh: MeshHandle) -> bool;
}

/// Something the scene can place and draw: a bone segment or the ground plane.
pub trait Renderable {
    fn update(&mut self, model: Matrix4<f64>);

    fn render(&self, renderer: &mut dyn RenderAdapter);

    fn release(self, renderer: &mut dyn RenderAdapter)
    where
        Self: Sized;
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// Mesh storage shared by backends.
#[derive(Debug, Default)]
pub struct MeshStore {
    meshes: Arena<MeshData>,
}

impl MeshStore {
    pub fn insert(&mut self, mesh: MeshData) -> MeshHandle {
        MeshHandle(self.meshes.insert(mesh))
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.meshes.get(handle.0)
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<MeshData> {
        self.meshes.remove(handle.0)
    }

    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.meshes.contains(handle.0)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshEvent {
    Created(MeshHandle),
    Released(MeshHandle),
}

/// Backend without a window. Keeps meshes and records what would have been drawn.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    store: MeshStore,
    uniforms: ViewUniforms,
    draws: Vec<(MeshHandle, Matrix4<f64>)>,
    events: Vec<MeshEvent>,
    frames: usize,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meshes(&self) -> &MeshStore {
        &self.store
    }

    /// Draw calls issued since the last `begin_frame`.
    pub fn draws(&self) -> &[(MeshHandle, Matrix4<f64>)] {
        &self.draws
    }

    /// Every mesh creation and release, in order.
    pub fn events(&self) -> &[MeshEvent] {
        &self.events
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn uniforms(&self) -> &ViewUniforms {
        &self.uniforms
    }
}

impl RenderAdapter for HeadlessRenderer {
    fn begin_frame(&mut self, uniforms: &ViewUniforms) {
        self.uniforms = *uniforms;
        self.draws.clear();
        self.frames += 1;
    }

    fn create_mesh(&mut self, mesh: MeshData) -> MeshHandle {
        let handle = self.store.insert(mesh);
        self.events.push(MeshEvent::Created(handle));
        handle
    }

    fn draw(&mut self, mesh: MeshHandle, model: &Matrix4<f64>) {
        if self.store.contains(mesh) {
            self.draws.push((mesh, *model));
        } else {
            tracing::warn!("Draw call for a released mesh");
        }
    }

    fn release_mesh(&mut self, mesh: MeshHandle) -> bool {
        let released = self.store.remove(mesh).is_some();
        if released {
            self.events.push(MeshEvent::Released(mesh));
        }
        released
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// Checkerboard ground plane under the skeleton.
#[derive(Debug)]
pub struct GroundPlane {
    mesh: MeshHandle,
    model: Matrix4<f64>,
}

impl GroundPlane {
    pub fn new(config: &SceneConfig, renderer: &mut dyn RenderAdapter) -> Self {
        let mesh = renderer.create_mesh(MeshData::checkerboard_plane(
            config.ground_width,
            config.ground_depth,
            config.checker_color1,
            config.checker_color2,
        ));
        GroundPlane {
            mesh,
            model: Matrix4::identity(),
        }
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn model(&self) -> &Matrix4<f64> {
        &self.model
    }
}

impl Renderable for GroundPlane {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bone_box_dimensions() {
        let mesh = MeshData::bone_box(0.5, 0.04, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.positions.len(), 24);
        assert_eq!(mesh.normals.len(), 24);
        assert_eq!(mesh.colors.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        let [x, y, z] = mesh.extents();
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 0.04).abs() < 1e-6);
        assert!((z - 0.04).abs() < 1e-6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.positions.len()));
    }

    #[test]
    fn bone_box_faces_wind_outwards() {
        let mesh = MeshData::bone_box(2.0, 1.0, [1.0; 3]);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vector3::from(mesh.positions[i as usize]));
            let n = Vector3::from(mesh.normals[tri[0] as usize]);
            let face_normal = (b - a).cross(c - a);
            assert!(cgmath::dot(face_normal, n) > 0.0);
        }
    }

    #[test]
    fn plane_is_flat() {
        let mesh = MeshData::checkerboard_plane(100.0, 50.0, [0.9; 3], [0.2; 3]);
        assert_eq!(mesh.extents(), [100.0, 0.0, 50.0]);
        assert!(mesh.normals.iter().all(|n| *n == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn released_handles_never_resolve() {
        let mut store = MeshStore::default();
        let first = store.insert(MeshData::default());
        assert!(store.remove(first).is_some());
        let second = store.insert(MeshData::default());
        assert_ne!(first, second);
        assert!(store.get(first).is_none());
        assert!(store.get(second).is_some());
        assert!(store.remove(first).is_none());
    }

    #[test]
    fn ground_plane_draws_and_releases() {
        let mut renderer = HeadlessRenderer::new();
        let mut ground = GroundPlane::new(&SceneConfig::default(), &mut renderer);
        let model = Matrix4::from_translation(Vector3::new(0.0, -1.0, 0.0));
        ground.update(model);

        renderer.begin_frame(&ViewUniforms::default());
        ground.render(&mut renderer);
        assert_eq!(renderer.draws(), &[(ground.mesh(), model)]);

        let mesh = ground.mesh();
        ground.release(&mut renderer);
        assert!(!renderer.meshes().contains(mesh));
        assert_eq!(renderer.events(), &[MeshEvent::Created(mesh), MeshEvent::Released(mesh)]);
    }
}
