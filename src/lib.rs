//! Forward kinematics playback of .bvh motion capture skeletons.
//!
//! A [`parse::Motion`] loaded from a file is validated into a [`hierarchy::Skeleton`], resolved
//! frame by frame into global joint transforms by [`kinematics`] and turned into oriented bone
//! boxes by [`bones`]. [`scene::Scene`] owns all of it together with the
//! [`playback::PlaybackController`] and drives a [`render::RenderAdapter`].

pub mod bones;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod kinematics;
pub mod parse;
pub mod playback;
pub mod render;
pub mod scene;
pub mod types;
pub mod utils;
#[cfg(feature = "visualize")]
pub mod visualize;

pub use error::{Error, MotionLoadError, Result};
