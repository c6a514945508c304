use bevy::prelude::*;
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

use crate::render::{MeshData, MeshHandle, MeshStore, RenderAdapter, ViewUniforms};
use crate::scene::Scene;
use crate::types::{GlobalTransform as JointTransform, Position, Quaternion};
use crate::utils::to_f32_cols;

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Render backend drawing every mesh as a gizmo cuboid sized to its bounding box.
/// Draw calls are queued during `Scene::render` and flushed once `Gizmos` is available.
#[derive(Debug, Default)]
pub struct GizmoRenderer {
    store: MeshStore,
    queue: Vec<(MeshHandle, Mat4)>,
}

impl GizmoRenderer {
    fn flush(&mut self, gizmos: &mut Gizmos) {
        for (mesh, model) in self.queue.drain(..) {
            let Some(data) = self.store.get(mesh) else {
                continue;
            };
            // flat meshes would give a singular matrix
            let [x, y, z] = data.extents().map(|e| e.max(1e-3));
            let color = data
                .colors
                .first()
                .map(|c| Color::rgb(c[0], c[1], c[2]))
                .unwrap_or(Color::WHITE);
            let transform = Transform::from_matrix(model * Mat4::from_scale(Vec3::new(x, y, z)));
            gizmos.cuboid(transform, color);
        }
    }
}

impl RenderAdapter for GizmoRenderer {
    fn begin_frame(&mut self, _uniforms: &ViewUniforms) {
        self.queue.clear();
    }

    fn create_mesh(&mut self, mesh: MeshData) -> MeshHandle {
        self.store.insert(mesh)
    }

    fn draw(&mut self, mesh: MeshHandle, model: &cgmath::Matrix4<f64>) {
        self.queue.push((mesh, Mat4::from_cols_array(&to_f32_cols(model))));
    }

    fn release_mesh(&mut self, mesh: MeshHandle) -> bool {
        self.store.remove(mesh).is_some()
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Resource)]
pub struct AppGlobalData {
    pub scene: Scene,
    pub renderer: GizmoRenderer,
    pub debug_text: bool,
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub fn visualize_scene(scene: Scene, renderer: GizmoRenderer) {
    App::new()
        .insert_resource(AppGlobalData {
            scene,
            renderer,
            debug_text: false,
        })
        .add_plugins(DefaultPlugins)
        .add_plugins(PanOrbitCameraPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, (update_main, draw_skeleton, update_debug_text).chain())
        .run();
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

// A unit struct to help identify the debug UI component, since there may be many Text components
#[derive(Component)]
struct DebugText;

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn setup(mut commands: Commands) {
    //// Orbit camera
    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_xyz(0., 1.5, 6.).looking_at(Vec3::new(0., 1., 0.), Vec3::Y),
            ..default()
        },
        PanOrbitCamera::default(),
    ));

    // draw instructions
    commands.spawn(
        TextBundle::from_section(
            "Press 'Space' to play / pause, 'S' to stop\n\
            Press 'Left' or 'Right' to step frames\n\
            Press 'Up' or 'Down' to change playback speed\n\
            Press 'R' to toggle rest pose mode\n\
            Press 'D' to toggle debug text\n",
            TextStyle {
                font_size: 15.,
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            bottom: Val::Px(12.0),
            right: Val::Px(12.0),
            ..default()
        }),
    );

    // draw debug text
    commands.spawn((
        TextBundle::from_section(
            "",
            TextStyle {
                font_size: 17.,
                color: Color::rgba(1.0, 1.0, 1.0, 0.5),
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        }),
        DebugText,
    ));
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Draw joint axes (red, green, blue) at the joint position.
fn draw_joint_axes(gizmos: &mut Gizmos, rotation: &Quaternion, position: &Position, length: f32) {
    let position = Vec3::new(position.x as f32, position.y as f32, position.z as f32);
    let rotation: cgmath::Matrix3<f64> = cgmath::Matrix3::from(*rotation);
    let axis = |v: cgmath::Vector3<f64>| Vec3::new(v.x as f32, v.y as f32, v.z as f32) * length + position;

    gizmos.line(position, axis(rotation.x), Color::RED);
    gizmos.line(position, axis(rotation.y), Color::GREEN);
    gizmos.line(position, axis(rotation.z), Color::BLUE);
}

/// Checker lines of the ground plane, every `checker_size` meters.
fn draw_ground_grid(gizmos: &mut Gizmos, width: f32, depth: f32, checker_size: f32) {
    if checker_size <= 0.0 {
        return;
    }
    let (w, d) = (width * 0.5, depth * 0.5);
    let color = Color::rgba(0.6, 0.6, 0.6, 0.3);
    let mut x = -w;
    while x <= w {
        gizmos.line(Vec3::new(x, 0.0, -d), Vec3::new(x, 0.0, d), color);
        x += checker_size;
    }
    let mut z = -d;
    while z <= d {
        gizmos.line(Vec3::new(-w, 0.0, z), Vec3::new(w, 0.0, z), color);
        z += checker_size;
    }
}

fn draw_skeleton(
    mut gizmos: Gizmos,
    camera: Query<&bevy::prelude::GlobalTransform, With<PanOrbitCamera>>,
    mut appdata: ResMut<AppGlobalData>,
) {
    let AppGlobalData { scene, renderer, .. } = &mut *appdata;

    let mut uniforms = ViewUniforms::default();
    if let Ok(camera) = camera.get_single() {
        let view = camera.compute_matrix().inverse();
        uniforms.view = cgmath::Matrix4::from(view.to_cols_array_2d());
        let eye = camera.translation();
        uniforms.view_pos = cgmath::Vector3::new(eye.x, eye.y, eye.z);
    }

    scene.render(&mut *renderer, &uniforms);
    renderer.flush(&mut gizmos);

    let config = scene.config();
    draw_ground_grid(
        &mut gizmos,
        config.ground_width as f32,
        config.ground_depth as f32,
        config.checker_size as f32,
    );

    //// Draw the axes of the joints
    for transform in scene.transforms() {
        let JointTransform {
            position,
            orientation,
        } = transform;
        draw_joint_axes(&mut gizmos, orientation, position, 0.05);
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn update_main(keyboard: Res<ButtonInput<KeyCode>>, time: Res<Time>, mut appdata: ResMut<AppGlobalData>) {
    let scene = &mut appdata.scene;

    if keyboard.just_released(KeyCode::KeyR) {
        let rest = scene.rest_pose_mode();
        scene.set_rest_pose_mode(!rest);
    }

    let playback = scene.playback_mut();
    if keyboard.just_released(KeyCode::Space) {
        playback.toggle();
    }
    if keyboard.just_released(KeyCode::KeyS) {
        playback.stop();
    }
    if keyboard.just_released(KeyCode::ArrowRight) {
        playback.pause();
        playback.next();
    }
    if keyboard.just_released(KeyCode::ArrowLeft) {
        playback.pause();
        playback.prev();
    }
    if keyboard.just_released(KeyCode::ArrowUp) {
        let speed = playback.speed();
        playback.set_speed(speed * 2.0);
    }
    if keyboard.just_released(KeyCode::ArrowDown) {
        let speed = playback.speed();
        playback.set_speed(speed * 0.5);
    }

    scene.tick(time.delta_seconds_f64());

    if keyboard.just_released(KeyCode::KeyD) {
        appdata.debug_text = !appdata.debug_text;
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn update_debug_text(mut query: Query<&mut Text, With<DebugText>>, appdata: Res<AppGlobalData>) {
    let scene = &appdata.scene;
    let playback = scene.playback();

    // Update the debug text with current global position and rotation data for each joint
    let mut t = String::new();
    if appdata.debug_text {
        t += &format!(
            "Frame: {} / {}   speed: {:.2}x   {:?}\n",
            playback.current_frame() + 1,
            playback.num_frames(),
            playback.speed(),
            playback.state()
        );
        t += "=============== GLOBAL POSITIONS AND ROTATIONS ===============\n";
        if let Some(skeleton) = scene.skeleton() {
            for (joint, transform) in skeleton.iter().zip(scene.transforms()) {
                // create 3 column table with joint name, position, rotation
                t += &format!(
                    "{:.<20} {: ^40} {: ^40}\n",
                    joint.name,
                    format!("{:6.2?}", transform.position),
                    format!("{:6.2?}", transform.orientation)
                );
            }
        }
    }
    for mut text in &mut query {
        text.sections[0].value = t.clone();
    }
}
