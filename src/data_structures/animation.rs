/// Sampled output of one animation channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
    /// Morph target weights, flattened per keyframe.
    Weights(Vec<f32>),
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) => v.len(),
            Keyframes::Rotation(v) => v.len(),
            Keyframes::Scale(v) => v.len(),
            Keyframes::Weights(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One channel of a named animation, targeting one node.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// glTF index of the animated node.
    pub node: usize,
    pub keyframes: Keyframes,
    pub timestamps: Vec<f32>,
}

impl AnimationClip {
    pub fn duration(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }
}
