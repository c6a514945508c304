use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use bvh_player::config::{LengthUnit, LoadOptions, SceneConfig};
use bvh_player::render::{HeadlessRenderer, ViewUniforms};
use bvh_player::scene::Scene;

#[derive(clap::Parser)]
struct Opts {
    /// Path to the .bvh file to play.
    path: PathBuf,

    /// Unit the lengths in the file are written in.
    #[arg(long, value_enum, default_value_t = LengthUnit::Centimeters)]
    unit: LengthUnit,

    /// Playback speed factor.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Frame to start playing from.
    #[arg(long, default_value_t = 0)]
    start_frame: usize,

    /// Number of frame ticks to run without a window.
    #[arg(long, default_value_t = 0)]
    ticks: usize,

    /// Do not turn End Site blocks into leaf joints.
    #[arg(long)]
    no_end_sites: bool,

    /// Open an interactive window instead of running headless.
    #[cfg(feature = "visualize")]
    #[arg(long)]
    window: bool,
}

fn run_headless(opts: &Opts, options: &LoadOptions) -> bvh_player::Result<()> {
    let mut renderer = HeadlessRenderer::new();
    let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
    scene.load_file(&opts.path, options, &mut renderer)?;

    let playback = scene.playback_mut();
    playback.set_speed(opts.speed);
    playback.seek(opts.start_frame);
    playback.play();
    let interval = playback.frame_interval();

    let mut degenerate = 0;
    for _ in 0..opts.ticks {
        let report = scene.tick(interval);
        degenerate += report.degenerate_bones.len();
        scene.render(&mut renderer, &ViewUniforms::default());
        if let Some(root) = scene.transforms().first() {
            debug!(
                "frame {:>5} root {:6.3?} draws {}",
                report.frame,
                root.position,
                renderer.draws().len()
            );
        }
    }

    info!(
        "Ran {} ticks, now at frame {} of {} ({} degenerate bone updates)",
        opts.ticks,
        scene.playback().current_frame(),
        scene.playback().num_frames(),
        degenerate
    );
    scene.teardown(&mut renderer);
    Ok(())
}

#[cfg(feature = "visualize")]
fn run_window(opts: &Opts, options: &LoadOptions) -> bvh_player::Result<()> {
    use bvh_player::visualize::{visualize_scene, GizmoRenderer};

    let mut renderer = GizmoRenderer::default();
    let mut scene = Scene::new(SceneConfig::default(), &mut renderer);
    scene.load_file(&opts.path, options, &mut renderer)?;
    scene.playback_mut().set_speed(opts.speed);
    scene.playback_mut().seek(opts.start_frame);
    scene.playback_mut().play();
    visualize_scene(scene, renderer);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse();
    let options = LoadOptions {
        unit: opts.unit,
        include_end_sites: !opts.no_end_sites,
    };

    #[cfg(feature = "visualize")]
    let result = if opts.window {
        run_window(&opts, &options)
    } else {
        run_headless(&opts, &options)
    };
    #[cfg(not(feature = "visualize"))]
    let result = run_headless(&opts, &options);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
