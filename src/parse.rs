use std::path::Path;
use std::str::Lines;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::LoadOptions;
use crate::error::MotionLoadError;
use crate::types::*;

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Everything a motion file provides, already converted to meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    pub names: Vec<String>,
    pub parent_indices: Vec<ParentIndex>,
    pub local_offsets: Vec<Position>,
    /// One axis order per joint, e.g. "zxy".
    pub rotation_orders: Vec<String>,
    pub frames: Vec<PoseFrame>,
    /// Seconds per frame.
    pub frame_time: f64,
}

impl Motion {
    pub fn num_joints(&self) -> usize {
        self.parent_indices.len()
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Reciprocal of the frame time, rounded down.
    pub fn fps(&self) -> u32 {
        if self.frame_time > 0.0 {
            (1.0 / self.frame_time) as u32
        } else {
            0
        }
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A ROOT, JOINT or End Site block while the hierarchy is being read.
struct JointDecl {
    name: String,
    depth: Depth,
    parent_index: ParentIndex,
    offset: Position,
    is_end_site: bool,
    /// (axis, column in a motion line)
    rotation_channels: Vec<(Axis, Index)>,
    position_channels: Vec<(Axis, Index)>,
}

/// Used during joint creation to fill in its parent index.
/// Algorithm: searches backwards for the joint with depth 1 less than the current joint's depth.
fn find_parent_joint_index_by_depth(depth: Depth, joints: &[JointDecl]) -> Option<ParentIndex> {
    if depth == 0 {
        return Some(-1);
    }
    joints
        .iter()
        .rposition(|joint| joint.depth == depth - 1)
        .map(|i| i as ParentIndex)
}

fn parse_floats(s: &str, line: usize) -> Result<Vec<f64>, MotionLoadError> {
    s.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| MotionLoadError::parse(line, format!("\"{}\" is not a number", token)))
        })
        .collect()
}

fn channel_axis(name: &str) -> Option<(Axis, bool)> {
    let lower = name.to_ascii_lowercase();
    let axis = match lower.chars().next()? {
        'x' => Axis::X,
        'y' => Axis::Y,
        'z' => Axis::Z,
        _ => return None,
    };
    match &lower[1..] {
        "rotation" => Some((axis, true)),
        "position" => Some((axis, false)),
        _ => None,
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn parse_bvh(lines: Lines, options: &LoadOptions) -> Result<Motion, MotionLoadError> {
    let scale = options.unit.to_meters();

    let mut joints: Vec<JointDecl> = Vec::new();
    let mut num_frames: Option<usize> = None;
    let mut frame_time: Option<f64> = None;

    let mut skipping_endsite = false;
    let mut channels_index: Index = 0;
    let mut depth: Depth = 0;

    let re_joint = Regex::new(r"^(ROOT|JOINT)\s+(\S+)").expect("valid regex");
    let re_offset = Regex::new(r"^OFFSET\s+(.+)").expect("valid regex");
    let re_channels = Regex::new(r"^CHANNELS\s+(\d+)\s*(.*)").expect("valid regex");

    //// PARSING HIERARCHY LINE BY LINE
    let mut it = lines.enumerate().map(|(i, line)| (i + 1, line.trim()));
    loop {
        let (line_no, line) = it.next().ok_or(MotionLoadError::MissingMotion)?;

        if line.is_empty() || line.starts_with("HIERARCHY") || line.starts_with("MOTION") {
            continue;
        } else if let Some(captures) = re_joint.captures(line) {
            //// Create joint
            let parent_index = find_parent_joint_index_by_depth(depth, &joints)
                .ok_or_else(|| MotionLoadError::parse(line_no, "joint has no enclosing parent"))?;
            joints.push(JointDecl {
                name: captures[2].to_string(),
                depth,
                parent_index,
                offset: Position::new(0.0, 0.0, 0.0),
                is_end_site: false,
                rotation_channels: Vec::new(),
                position_channels: Vec::new(),
            });
        } else if line.to_lowercase().starts_with("end") {
            //// Create endsite
            if joints.is_empty() {
                return Err(MotionLoadError::parse(line_no, "End Site before any joint"));
            }
            if depth == 0 {
                return Err(MotionLoadError::parse(line_no, "End Site outside any joint"));
            }
            if options.include_end_sites {
                let parent_index = find_parent_joint_index_by_depth(depth, &joints)
                    .filter(|&parent| parent >= 0)
                    .ok_or_else(|| MotionLoadError::parse(line_no, "End Site has no enclosing joint"))?;
                let name = format!("{}_End", joints[parent_index as Index].name);
                joints.push(JointDecl {
                    name,
                    depth,
                    parent_index,
                    offset: Position::new(0.0, 0.0, 0.0),
                    is_end_site: true,
                    rotation_channels: Vec::new(),
                    position_channels: Vec::new(),
                });
            } else {
                skipping_endsite = true;
            }
        } else if line == "{" {
            depth += 1;
        } else if line == "}" {
            depth = depth
                .checked_sub(1)
                .ok_or_else(|| MotionLoadError::parse(line_no, "unbalanced braces"))?;
        } else if let Some(captures) = re_offset.captures(line) {
            //// Parse offset
            let values = parse_floats(&captures[1], line_no)?;
            if values.len() != 3 {
                return Err(MotionLoadError::parse(line_no, "OFFSET needs three values"));
            }
            let offset = Position::new(values[0], values[1], values[2]) * scale;
            if skipping_endsite {
                skipping_endsite = false;
            } else if let Some(joint) = joints.last_mut() {
                joint.offset = offset;
            } else {
                return Err(MotionLoadError::parse(line_no, "OFFSET before any joint"));
            }
        } else if let Some(captures) = re_channels.captures(line) {
            //// Parse channels
            let declared: usize = captures[1]
                .parse()
                .map_err(|_| MotionLoadError::parse(line_no, "bad channel count"))?;
            let channel_names: Vec<&str> = captures[2].split_whitespace().collect();
            if channel_names.len() != declared {
                return Err(MotionLoadError::parse(
                    line_no,
                    format!("declared {} channels but listed {}", declared, channel_names.len()),
                ));
            }
            let joint = joints
                .last_mut()
                .ok_or_else(|| MotionLoadError::parse(line_no, "CHANNELS before any joint"))?;
            for channel_name in channel_names {
                match channel_axis(channel_name) {
                    Some((axis, true)) => joint.rotation_channels.push((axis, channels_index)),
                    Some((axis, false)) => joint.position_channels.push((axis, channels_index)),
                    None => {
                        return Err(MotionLoadError::parse(
                            line_no,
                            format!("unknown channel \"{}\"", channel_name),
                        ))
                    }
                }
                channels_index += 1;
            }
        } else if line.starts_with("Frames:") {
            //// Parse number of frames
            let value = line.split_whitespace().nth(1).unwrap_or_default();
            num_frames = Some(
                value
                    .parse::<usize>()
                    .map_err(|_| MotionLoadError::parse(line_no, "bad frame count"))?,
            );
        } else if line.starts_with("Frame Time:") {
            //// Parse frame time
            let value = line.split_whitespace().nth(2).unwrap_or_default();
            frame_time = Some(
                value
                    .parse::<f64>()
                    .map_err(|_| MotionLoadError::parse(line_no, "bad frame time"))?,
            );
            break; // jump to parsing Motion
        } else {
            debug!("Ignoring line {}: {}", line_no, line);
        }
    }

    let num_frames = num_frames.ok_or(MotionLoadError::MissingMotion)?;
    let frame_time = frame_time.ok_or(MotionLoadError::MissingMotion)?;
    if joints.is_empty() {
        return Err(MotionLoadError::parse(0, "no joints declared"));
    }

    //// Rotation orders: taken from the rotation channels, end sites inherit their parent's
    let mut rotation_orders: Vec<String> = Vec::with_capacity(joints.len());
    for (index, joint) in joints.iter().enumerate() {
        let order = if joint.is_end_site {
            rotation_orders[joint.parent_index as Index].clone()
        } else if joint.rotation_channels.len() == 3 {
            joint
                .rotation_channels
                .iter()
                .map(|(axis, _)| match axis {
                    Axis::X => 'x',
                    Axis::Y => 'y',
                    Axis::Z => 'z',
                })
                .collect()
        } else {
            return Err(MotionLoadError::parse(
                0,
                format!(
                    "joint {} ({}) must have three rotation channels, found {}",
                    index,
                    joint.name,
                    joint.rotation_channels.len()
                ),
            ));
        };
        rotation_orders.push(order);
    }
    if joints
        .iter()
        .skip(1)
        .any(|joint| !joint.position_channels.is_empty())
    {
        warn!("Position channels of non-root joints are ignored");
    }

    /////////////////////////////////// PARSING MOTION ///////////////////////////////////

    let mut frames: Vec<PoseFrame> = Vec::with_capacity(num_frames);
    for (line_no, line) in it {
        if line.is_empty() {
            continue;
        }
        let motion_line = parse_floats(line, line_no)?;
        if motion_line.len() != channels_index {
            return Err(MotionLoadError::parse(
                line_no,
                format!("expected {} channel values, found {}", channels_index, motion_line.len()),
            ));
        }

        //// Parse positional channels of the root
        let mut root_position = Position::new(0.0, 0.0, 0.0);
        for &(axis, column) in &joints[0].position_channels {
            match axis {
                Axis::X => root_position.x = motion_line[column],
                Axis::Y => root_position.y = motion_line[column],
                Axis::Z => root_position.z = motion_line[column],
            }
        }

        //// Parse rotational channels
        let rotations = joints
            .iter()
            .map(|joint| {
                let mut angles: Angles = [0.0; 3];
                for (slot, &(_, column)) in joint.rotation_channels.iter().enumerate() {
                    angles[slot] = motion_line[column];
                }
                angles
            })
            .collect();

        frames.push(PoseFrame::new(root_position * scale, rotations));
    }

    if frames.len() != num_frames {
        return Err(MotionLoadError::parse(
            0,
            format!("header declares {} frames but {} were found", num_frames, frames.len()),
        ));
    }

    Ok(Motion {
        names: joints.iter().map(|joint| joint.name.clone()).collect(),
        parent_indices: joints.iter().map(|joint| joint.parent_index).collect(),
        local_offsets: joints.iter().map(|joint| joint.offset).collect(),
        rotation_orders,
        frames,
        frame_time,
    })
}

//////////////////////////////////////////////////////////////// PUBLIC ///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// load a bvh file from a file path
pub fn load_bvh_from_file(
    file_path: impl AsRef<Path>,
    options: &LoadOptions,
) -> Result<Motion, MotionLoadError> {
    let file_path = file_path.as_ref();
    let contents = std::fs::read_to_string(file_path).map_err(|source| MotionLoadError::Io {
        path: file_path.to_path_buf(),
        source,
    })?;
    let motion = parse_bvh(contents.lines(), options)?;
    info!(
        "Loaded {} ({} joints, {} frames at {} fps)",
        file_path.display(),
        motion.num_joints(),
        motion.num_frames(),
        motion.fps()
    );
    Ok(motion)
}

/// load a bvh file from a string
pub fn load_bvh_from_string(bvh_string: &str, options: &LoadOptions) -> Result<Motion, MotionLoadError> {
    parse_bvh(bvh_string.lines(), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LengthUnit;
    use cgmath::InnerSpace;

    const ARM: &str = "HIERARCHY
ROOT Hips
{
    OFFSET 0.00 90.00 0.00
    CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
    JOINT Spine
    {
        OFFSET 0.00 10.00 0.00
        CHANNELS 3 Zrotation Xrotation Yrotation
        End Site
        {
            OFFSET 0.00 20.00 0.00
        }
    }
    JOINT LeftUpLeg
    {
        OFFSET 10.00 0.00 0.00
        CHANNELS 3 Xrotation Yrotation Zrotation
        End Site
        {
            OFFSET 0.00 -40.00 0.00
        }
    }
}
MOTION
Frames: 2
Frame Time: 0.033333
1.0 90.0 -2.0 0.0 0.0 0.0 10.0 20.0 30.0 1.0 2.0 3.0
0.0 91.0 0.0 5.0 0.0 0.0 0.0 0.0 0.0 -1.0 -2.0 -3.0
";

    #[test]
    fn parses_hierarchy_with_end_sites() {
        let motion = load_bvh_from_string(ARM, &LoadOptions::default()).unwrap();
        assert_eq!(
            motion.names,
            vec!["Hips", "Spine", "Spine_End", "LeftUpLeg", "LeftUpLeg_End"]
        );
        assert_eq!(motion.parent_indices, vec![-1, 0, 1, 0, 3]);
        assert_eq!(motion.rotation_orders, vec!["zxy", "zxy", "zxy", "xyz", "xyz"]);
        assert!((motion.local_offsets[2].y - 0.2).abs() < 1e-12);
        assert!((motion.local_offsets[4].y + 0.4).abs() < 1e-12);
        assert_eq!(motion.num_frames(), 2);
        assert_eq!(motion.fps(), 30);
    }

    #[test]
    fn parses_channels_into_frames() {
        let motion = load_bvh_from_string(ARM, &LoadOptions::default()).unwrap();
        let frame = &motion.frames[0];
        assert!((frame.root_position - Position::new(0.01, 0.9, -0.02)).magnitude() < 1e-12);
        assert_eq!(frame.rotations[0], [0.0, 0.0, 0.0]);
        assert_eq!(frame.rotations[1], [10.0, 20.0, 30.0]);
        assert_eq!(frame.rotations[2], [0.0, 0.0, 0.0]);
        assert_eq!(frame.rotations[3], [1.0, 2.0, 3.0]);
        assert_eq!(motion.frames[1].rotations[0], [5.0, 0.0, 0.0]);
    }

    #[test]
    fn end_sites_can_be_skipped() {
        let options = LoadOptions {
            unit: LengthUnit::Meters,
            include_end_sites: false,
        };
        let motion = load_bvh_from_string(ARM, &options).unwrap();
        assert_eq!(motion.names, vec!["Hips", "Spine", "LeftUpLeg"]);
        assert_eq!(motion.parent_indices, vec![-1, 0, 0]);
        // the End Site offset must not overwrite the joint's own
        assert_eq!(motion.local_offsets[1], Position::new(0.0, 10.0, 0.0));
        assert_eq!(motion.frames[0].rotations.len(), 3);
    }

    #[test]
    fn reports_bad_motion_lines() {
        let truncated = ARM.replace("1.0 2.0 3.0\n", "1.0 2.0\n");
        let error = load_bvh_from_string(&truncated, &LoadOptions::default()).unwrap_err();
        assert!(matches!(error, MotionLoadError::Parse { line: 28, .. }));

        let garbage = ARM.replace("10.0 20.0 30.0", "10.0 abc 30.0");
        assert!(matches!(
            load_bvh_from_string(&garbage, &LoadOptions::default()),
            Err(MotionLoadError::Parse { .. })
        ));

        let missing_frame = ARM.replace("Frames: 2", "Frames: 3");
        assert!(load_bvh_from_string(&missing_frame, &LoadOptions::default()).is_err());
    }

    #[test]
    fn rejects_end_site_outside_joints() {
        let stray = "HIERARCHY
ROOT A
{
    OFFSET 0.0 0.0 0.0
    CHANNELS 3 Zrotation Xrotation Yrotation
}
End Site
{
    OFFSET 0.0 1.0 0.0
}
MOTION
Frames: 1
Frame Time: 0.1
0.0 0.0 0.0
";
        for include_end_sites in [true, false] {
            let options = LoadOptions {
                unit: LengthUnit::Meters,
                include_end_sites,
            };
            assert!(matches!(
                load_bvh_from_string(stray, &options),
                Err(MotionLoadError::Parse { line: 7, .. })
            ));
        }
    }

    #[test]
    fn reports_missing_motion() {
        let header_only = ARM.split("MOTION").next().unwrap();
        assert!(matches!(
            load_bvh_from_string(header_only, &LoadOptions::default()),
            Err(MotionLoadError::MissingMotion)
        ));
    }

    #[test]
    fn reports_missing_file() {
        let error = load_bvh_from_file("/definitely/not/here.bvh", &LoadOptions::default()).unwrap_err();
        assert!(matches!(error, MotionLoadError::Io { .. }));
    }
}
