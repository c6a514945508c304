use std::path::Path;

use cgmath::Matrix4;
use tracing::{info, warn};

use crate::bones::{build_bones, update_bones, BoneSegment};
use crate::config::{LoadOptions, SceneConfig};
use crate::error::{Error, Result};
use crate::hierarchy::Skeleton;
use crate::kinematics::{resolve_into, resolve_rest_pose};
use crate::parse::{load_bvh_from_file, Motion};
use crate::playback::PlaybackController;
use crate::render::{GroundPlane, RenderAdapter, Renderable, ViewUniforms};
use crate::types::*;

/// Skeleton, pose data and the bone resources derived from them. Replaced as a whole on reload.
#[derive(Debug)]
struct LoadedMotion {
    skeleton: Skeleton,
    frames: Vec<PoseFrame>,
    rest_pose: Vec<GlobalTransform>,
    transforms: Vec<GlobalTransform>,
    bones: Vec<BoneSegment>,
    /// Result of the latest bone update.
    degenerate_bones: Vec<Index>,
}

/// What happened during one [`Scene::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub frame: usize,
    pub frame_changed: bool,
    /// Joints whose bones were too short to orient this tick.
    pub degenerate_bones: Vec<Index>,
}

/// Everything the player owns: the ground, the loaded motion and the playback clock.
#[derive(Debug)]
pub struct Scene {
    config: SceneConfig,
    ground: GroundPlane,
    playback: PlaybackController,
    loaded: Option<LoadedMotion>,
    rest_pose_mode: bool,
}

impl Scene {
    pub fn new(config: SceneConfig, renderer: &mut dyn RenderAdapter) -> Self {
        let ground = GroundPlane::new(&config, renderer);
        Scene {
            config,
            ground,
            playback: PlaybackController::default(),
            loaded: None,
            rest_pose_mode: false,
        }
    }

    /// Read a motion file and [`load`](Scene::load) it. On failure the current motion keeps
    /// playing untouched.
    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        options: &LoadOptions,
        renderer: &mut dyn RenderAdapter,
    ) -> Result<()> {
        let motion = load_bvh_from_file(path, options)?;
        self.load(motion, renderer)
    }

    /// Replace the current motion.
    ///
    /// Everything is validated first, so an error leaves the previous motion and playback state
    /// as they were. On success the old bones are released before any new bone is created, and
    /// playback restarts stopped at frame 0 with speed 1.0.
    pub fn load(&mut self, motion: Motion, renderer: &mut dyn RenderAdapter) -> Result<()> {
        let Motion {
            names,
            parent_indices,
            local_offsets,
            rotation_orders,
            frames,
            frame_time,
        } = motion;

        let skeleton =
            Skeleton::build(&parent_indices, &local_offsets, &rotation_orders)?.with_names(names);

        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.rotations.len() != skeleton.len())
        {
            warn!("Pose frame {} does not match the skeleton", index);
            return Err(Error::FrameIndexOutOfRange {
                expected: skeleton.len(),
                found: frame.rotations.len(),
            });
        }

        let rest_pose = resolve_rest_pose(&skeleton);
        let mut transforms = Vec::with_capacity(skeleton.len());
        match frames.first() {
            Some(frame) => resolve_into(&skeleton, frame, &mut transforms)?,
            None => transforms.extend_from_slice(&rest_pose),
        }

        if let Some(previous) = self.loaded.take() {
            let released = previous.bones.len();
            for bone in previous.bones {
                bone.release(renderer);
            }
            info!("Released {} bones of the previous motion", released);
        }

        let mut bones = build_bones(&skeleton, &self.config, renderer);
        let degenerate = update_bones(&mut bones, &transforms, self.config.degenerate_epsilon);
        if !degenerate.is_empty() {
            let names: Vec<&str> = degenerate
                .iter()
                .filter_map(|&joint| skeleton.joint(joint))
                .map(|joint| joint.name.as_str())
                .collect();
            warn!("{} bones have no length in the first frame: {:?}", degenerate.len(), names);
        }

        info!(
            "Loaded skeleton with {} joints, {} bones and {} frames",
            skeleton.len(),
            bones.len(),
            frames.len()
        );

        self.playback.reset(frames.len(), frame_time);
        self.loaded = Some(LoadedMotion {
            skeleton,
            frames,
            rest_pose,
            transforms,
            bones,
            degenerate_bones: degenerate,
        });
        Ok(())
    }

    /// One frame update: advance the clock, resolve the pose and move the bones.
    pub fn tick(&mut self, delta_time: f64) -> TickReport {
        let frame_changed = self.playback.tick(delta_time);
        let frame = self.playback.current_frame();

        let Some(loaded) = self.loaded.as_mut() else {
            return TickReport {
                frame,
                frame_changed,
                degenerate_bones: Vec::new(),
            };
        };

        if self.rest_pose_mode || loaded.frames.is_empty() {
            loaded.transforms.clear();
            loaded.transforms.extend_from_slice(&loaded.rest_pose);
        } else if let Err(err) = resolve_into(&loaded.skeleton, &loaded.frames[frame], &mut loaded.transforms) {
            // frames are validated at load, keep the previous pose if this ever happens
            warn!("Could not resolve frame {}: {}", frame, err);
        }

        loaded.degenerate_bones = update_bones(
            &mut loaded.bones,
            &loaded.transforms,
            self.config.degenerate_epsilon,
        );

        TickReport {
            frame,
            frame_changed,
            degenerate_bones: loaded.degenerate_bones.clone(),
        }
    }

    pub fn render(&self, renderer: &mut dyn RenderAdapter, uniforms: &ViewUniforms) {
        renderer.begin_frame(uniforms);
        self.ground.render(renderer);
        if let Some(loaded) = &self.loaded {
            for bone in &loaded.bones {
                bone.render(renderer);
            }
        }
    }

    /// Release every render resource the scene holds.
    pub fn teardown(self, renderer: &mut dyn RenderAdapter) {
        if let Some(loaded) = self.loaded {
            for bone in loaded.bones {
                bone.release(renderer);
            }
        }
        self.ground.release(renderer);
        info!("Scene torn down");
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController {
        &mut self.playback
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.loaded.as_ref().map(|loaded| &loaded.skeleton)
    }

    /// Global transforms of the last tick (or of frame 0 right after a load).
    pub fn transforms(&self) -> &[GlobalTransform] {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.transforms.as_slice())
            .unwrap_or(&[])
    }

    pub fn bones(&self) -> &[BoneSegment] {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.bones.as_slice())
            .unwrap_or(&[])
    }

    /// Joints whose bones could not be oriented by the last load or tick.
    pub fn degenerate_bones(&self) -> &[Index] {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.degenerate_bones.as_slice())
            .unwrap_or(&[])
    }

    pub fn rest_pose_mode(&self) -> bool {
        self.rest_pose_mode
    }

    /// Show the rest pose instead of the animation. Takes effect on the next tick.
    pub fn set_rest_pose_mode(&mut self, enabled: bool) {
        self.rest_pose_mode = enabled;
    }

    pub fn set_ground_transform(&mut self, model: Matrix4<f64>) {
        self.ground.update(model);
    }

    pub fn ground(&self) -> &GroundPlane {
        &self.ground
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;
    use cgmath::{InnerSpace, Vector3};

    fn chain_motion(num_frames: usize) -> Motion {
        Motion {
            names: vec!["Hips".into(), "Spine".into(), "Head".into()],
            parent_indices: vec![-1, 0, 1],
            local_offsets: vec![
                Position::new(0.0, 0.0, 0.0),
                Position::new(0.0, -0.10, 0.0),
                Position::new(0.0, -0.10, 0.0),
            ],
            rotation_orders: vec!["zxy".into()],
            frames: (0..num_frames)
                .map(|i| PoseFrame::new(Position::new(i as f64, 0.0, 0.0), vec![[0.0; 3]; 3]))
                .collect(),
            frame_time: 0.1,
        }
    }

    #[test]
    fn zero_length_bones_are_reported_at_load() {
        let mut motion = chain_motion(2);
        motion.local_offsets[2] = Position::new(0.0, 0.0, 0.0);

        let mut renderer = HeadlessRenderer::new();
        let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
        assert!(scene.degenerate_bones().is_empty());
        scene.load(motion, &mut renderer).unwrap();
        assert_eq!(scene.degenerate_bones(), &[2]);

        let report = scene.tick(0.0);
        assert_eq!(report.degenerate_bones, vec![2]);
        assert_eq!(scene.degenerate_bones(), report.degenerate_bones.as_slice());
    }

    #[test]
    fn three_joint_chain_end_to_end() {
        let mut renderer = HeadlessRenderer::new();
        let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
        scene.load(chain_motion(1), &mut renderer).unwrap();
        let report = scene.tick(0.0);
        assert!(report.degenerate_bones.is_empty());

        let transforms = scene.transforms();
        assert_eq!(transforms[0].position, Position::new(0.0, 0.0, 0.0));
        assert!((transforms[1].position - Position::new(0.0, -0.10, 0.0)).magnitude() < 1e-12);
        assert!((transforms[2].position - Position::new(0.0, -0.20, 0.0)).magnitude() < 1e-12);

        assert_eq!(scene.bones().len(), 2);
        for bone in scene.bones() {
            let basis = bone.basis().unwrap();
            assert!((basis.length - 0.10).abs() < 1e-12);
            assert!((basis.x_axis - Vector3::new(0.0, -1.0, 0.0)).magnitude() < 1e-12);
        }

        scene.render(&mut renderer, &ViewUniforms::default());
        // ground plane + two bones
        assert_eq!(renderer.draws().len(), 3);
    }

    #[test]
    fn invalid_load_keeps_previous_motion() {
        let mut renderer = HeadlessRenderer::new();
        let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
        scene.load(chain_motion(4), &mut renderer).unwrap();
        scene.playback_mut().seek(2);
        scene.playback_mut().play();
        let bone_meshes: Vec<_> = scene.bones().iter().map(|bone| bone.mesh()).collect();

        let mut broken = chain_motion(4);
        broken.parent_indices = vec![-1, 2, 1];
        assert!(matches!(
            scene.load(broken, &mut renderer),
            Err(Error::InvalidHierarchy(_))
        ));

        let mut short = chain_motion(4);
        short.frames[3].rotations.pop();
        assert!(matches!(
            scene.load(short, &mut renderer),
            Err(Error::FrameIndexOutOfRange { expected: 3, found: 2 })
        ));

        assert!(matches!(
            scene.load_file("/no/such/file.bvh", &LoadOptions::default(), &mut renderer),
            Err(Error::MotionLoad(_))
        ));

        assert_eq!(scene.playback().current_frame(), 2);
        assert!(scene.playback().is_playing());
        let still: Vec<_> = scene.bones().iter().map(|bone| bone.mesh()).collect();
        assert_eq!(bone_meshes, still);
        assert!(still.iter().all(|&mesh| renderer.meshes().contains(mesh)));
    }

    #[test]
    fn tick_follows_playback() {
        let mut renderer = HeadlessRenderer::new();
        let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
        scene.load(chain_motion(3), &mut renderer).unwrap();

        // stopped: the pose holds
        let report = scene.tick(1.0);
        assert_eq!(report.frame, 0);
        assert!(!report.frame_changed);

        scene.playback_mut().play();
        let report = scene.tick(0.1);
        assert_eq!(report.frame, 1);
        assert_eq!(scene.transforms()[0].position, Position::new(1.0, 0.0, 0.0));

        scene.tick(0.1);
        let report = scene.tick(0.1);
        assert_eq!(report.frame, 0);
        assert_eq!(scene.transforms()[0].position, Position::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn rest_pose_mode_ignores_frames() {
        let mut renderer = HeadlessRenderer::new();
        let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
        scene.load(chain_motion(3), &mut renderer).unwrap();
        scene.playback_mut().seek(2);
        scene.set_rest_pose_mode(true);
        scene.tick(0.0);
        assert_eq!(scene.transforms()[0].position, Position::new(0.0, 0.0, 0.0));

        scene.set_rest_pose_mode(false);
        scene.tick(0.0);
        assert_eq!(scene.transforms()[0].position, Position::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn teardown_releases_everything() {
        let mut renderer = HeadlessRenderer::new();
        let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
        scene.load(chain_motion(2), &mut renderer).unwrap();
        assert_eq!(renderer.meshes().len(), 3);
        scene.teardown(&mut renderer);
        assert!(renderer.meshes().is_empty());
    }

    #[test]
    fn empty_scene_ticks_and_renders() {
        let mut renderer = HeadlessRenderer::new();
        let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
        let report = scene.tick(0.5);
        assert_eq!(report, TickReport::default());
        scene.render(&mut renderer, &ViewUniforms::default());
        assert_eq!(renderer.draws().len(), 1);
        assert!(scene.transforms().is_empty());
    }
}
