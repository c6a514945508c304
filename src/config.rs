/// Unit the lengths of a motion file are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LengthUnit {
    #[default]
    Centimeters,
    Meters,
}

impl LengthUnit {
    /// Factor converting a length in this unit to meters.
    pub fn to_meters(self) -> f64 {
        match self {
            LengthUnit::Centimeters => 0.01,
            LengthUnit::Meters => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub unit: LengthUnit,
    /// Turn every `End Site` into a leaf joint with no rotation channels so the last bone of each
    /// chain gets drawn.
    pub include_end_sites: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            unit: LengthUnit::Centimeters,
            include_end_sites: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub bone_thickness: f64,
    pub bone_color: [f32; 3],
    /// Bones shorter than this (in meters) keep their previous orientation.
    pub degenerate_epsilon: f64,
    pub ground_width: f64,
    pub ground_depth: f64,
    pub checker_color1: [f32; 3],
    pub checker_color2: [f32; 3],
    pub checker_size: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            bone_thickness: 0.03,
            bone_color: [0.85, 0.65, 0.3],
            degenerate_epsilon: 1e-6,
            ground_width: 100.0,
            ground_depth: 100.0,
            checker_color1: [0.9, 0.9, 0.9],
            checker_color2: [0.2, 0.2, 0.2],
            checker_size: 1.0,
        }
    }
}
