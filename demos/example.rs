use bvh_player::config::{LoadOptions, SceneConfig};
use bvh_player::hierarchy::Skeleton;
use bvh_player::kinematics::resolve;
use bvh_player::parse::{load_bvh_from_file, load_bvh_from_string, Motion};
use bvh_player::render::{HeadlessRenderer, ViewUniforms};
use bvh_player::scene::Scene;
use bvh_player::types::{GlobalTransform, Joint};

fn main() {
    ////////////////////////////// loading .bvh ///////////////////////////////////////////
    // load bvh from a file
    let motion: Motion = load_bvh_from_file("./tests/data/walk.bvh", &LoadOptions::default())
        .expect("walk.bvh should load");

    // or from a string
    // (`include_str` works at compile time and so has a different base path than `load_bvh_from_file` - ignore the difference)
    let bvh_string: &str = include_str!("../tests/data/walk.bvh");
    let same_motion = load_bvh_from_string(bvh_string, &LoadOptions::default()).unwrap();
    assert_eq!(motion, same_motion);

    //////////////////////////////// fields of Motion ////////////////
    {
        let fps: u32 = motion.fps();
        let frame_time: f64 = motion.frame_time;
        let num_frames: usize = motion.num_frames();

        assert_eq!(fps, 30);
        assert_eq!((1.0 / frame_time - fps as f64).round() as i32, 0);
        assert_eq!(num_frames, 4);
    }

    //////////////////////////////// the skeleton ////////////////
    let skeleton = Skeleton::build(
        &motion.parent_indices,
        &motion.local_offsets,
        &motion.rotation_orders,
    )
    .unwrap()
    .with_names(motion.names.clone());
    {
        // joint with index 7 is "Spine"
        let joint: &Joint = skeleton.joint(7).unwrap();
        assert_eq!(joint.name, "Spine");
        assert_eq!(joint.parent_index, 0);
        assert_eq!(joint.depth, 1);
        assert_eq!(joint.children, vec![8]);
        assert_eq!(joint.rotation_order.to_string(), "zxy");
    }

    //////////////////////////////// forward kinematics of one frame ////////////////
    let transforms: Vec<GlobalTransform> = resolve(&skeleton, &motion.frames[1]).unwrap();
    for (joint, transform) in skeleton.iter().zip(&transforms) {
        println!(
            "{:.<20} {: ^40} {: ^40}",
            joint.name,
            format!("{:6.3?}", transform.position),
            format!("{:6.3?}", transform.orientation)
        );
    }

    //////////////////////////////// playing it through a scene ////////////////
    let mut renderer = HeadlessRenderer::new();
    let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
    scene.load(motion, &mut renderer).unwrap();
    scene.playback_mut().play();
    let interval = scene.playback().frame_interval();
    for _ in 0..10 {
        let report = scene.tick(interval);
        scene.render(&mut renderer, &ViewUniforms::default());
        println!(
            "frame {} - {} draw calls, degenerate bones {:?}",
            report.frame,
            renderer.draws().len(),
            report.degenerate_bones
        );
    }
    scene.teardown(&mut renderer);
}
