use std::fmt;
use std::str::FromStr;

use cgmath::{Decomposed, One, Quaternion as CgQuaternion, Vector3, Zero};

use crate::error::ParseRotationOrderError;

/////////////////////////////////////////////////////////////////////////////////////////////////

pub type Index = usize;
pub type ParentIndex = isize; // can be -1 if joint has no parent
pub type Quaternion = CgQuaternion<f64>;
pub type Position = Vector3<f64>;
pub type Depth = usize;

/// Euler angles in DEGREES, stored in the order of the joint's rotation channels
/// (angle 0 belongs to the first axis of its [`RotationOrder`]).
pub type Angles = [f64; 3];

/////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> Position {
        match self {
            Axis::X => Position::unit_x(),
            Axis::Y => Position::unit_y(),
            Axis::Z => Position::unit_z(),
        }
    }

    fn from_char(c: char) -> Option<Axis> {
        match c.to_ascii_lowercase() {
            'x' => Some(Axis::X),
            'y' => Some(Axis::Y),
            'z' => Some(Axis::Z),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }
}

/// Order in which a joint's three Euler angles are composed, e.g. "zxy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RotationOrder([Axis; 3]);

impl RotationOrder {
    pub const XYZ: RotationOrder = RotationOrder([Axis::X, Axis::Y, Axis::Z]);
    pub const ZXY: RotationOrder = RotationOrder([Axis::Z, Axis::X, Axis::Y]);

    pub fn new(axes: [Axis; 3]) -> Result<Self, ParseRotationOrderError> {
        let [a, b, c] = axes;
        if a == b || b == c || a == c {
            let name: String = axes.iter().map(|axis| axis.as_char()).collect();
            return Err(ParseRotationOrderError(name));
        }
        Ok(RotationOrder(axes))
    }

    pub fn axes(&self) -> [Axis; 3] {
        self.0
    }
}

impl FromStr for RotationOrder {
    type Err = ParseRotationOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let axes: Vec<Axis> = s
            .trim()
            .chars()
            .map(Axis::from_char)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ParseRotationOrderError(s.to_string()))?;
        match axes.as_slice() {
            &[a, b, c] => RotationOrder::new([a, b, c]).map_err(|_| ParseRotationOrderError(s.to_string())),
            _ => Err(ParseRotationOrderError(s.to_string())),
        }
    }
}

impl fmt::Display for RotationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.0 {
            write!(f, "{}", axis.as_char())?;
        }
        Ok(())
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub index: Index,
    pub parent_index: ParentIndex,
    pub depth: Depth,
    pub children: Vec<Index>,
    /// Rest-pose displacement from the parent, in meters.
    pub local_offset: Position,
    pub rotation_order: RotationOrder,
}

impl Joint {
    pub fn is_root(&self) -> bool {
        self.parent_index == -1
    }

    pub fn parent(&self) -> Option<Index> {
        if self.is_root() {
            None
        } else {
            Some(self.parent_index as Index)
        }
    }
}

/// One animation sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    /// Absolute position of the root joint (not an offset), in meters.
    pub root_position: Position,
    /// One triple per joint, in joint index order.
    pub rotations: Vec<Angles>,
}

impl PoseFrame {
    pub fn new(root_position: Position, rotations: Vec<Angles>) -> Self {
        PoseFrame {
            root_position,
            rotations,
        }
    }

    /// A frame with every angle at zero and the root at `root_position`.
    pub fn zeroed(root_position: Position, num_joints: usize) -> Self {
        PoseFrame {
            root_position,
            rotations: vec![[0.0; 3]; num_joints],
        }
    }
}

/// World space transform of a single joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalTransform {
    pub position: Position,
    pub orientation: Quaternion,
}

impl GlobalTransform {
    pub fn identity() -> Self {
        GlobalTransform {
            position: Position::zero(),
            orientation: Quaternion::one(),
        }
    }

    pub fn to_decomposed(&self) -> Decomposed<Position, Quaternion> {
        Decomposed {
            scale: 1.0,
            rot: self.orientation,
            disp: self.position,
        }
    }
}

impl From<Decomposed<Position, Quaternion>> for GlobalTransform {
    fn from(transform: Decomposed<Position, Quaternion>) -> Self {
        GlobalTransform {
            position: transform.disp,
            orientation: transform.rot,
        }
    }
}
