use gltf::animation::util::ReadOutputs;

use crate::data_structures::animation::{AnimationClip, Keyframes};

/// Read every animation channel into a clip. Channels without readable
/// inputs or outputs are skipped with a warning rather than failing the asset.
pub fn read_animations(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> Vec<AnimationClip> {
    let mut clips = Vec::new();
    for animation in gltf.animations() {
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation{}", animation.index()));
        for (idx, channel) in animation.channels().enumerate() {
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let Some(inputs) = reader.read_inputs() else {
                log::warn!("no keyframe times in channel {idx} of {name}");
                continue;
            };
            let timestamps: Vec<f32> = inputs.collect();
            let keyframes = match reader.read_outputs() {
                Some(ReadOutputs::Translations(translations)) => {
                    Keyframes::Translation(translations.map(cgmath::Vector3::from).collect())
                }
                Some(ReadOutputs::Rotations(rotations)) => Keyframes::Rotation(
                    rotations
                        .into_f32()
                        .map(|[x, y, z, w]| cgmath::Quaternion::new(w, x, y, z))
                        .collect(),
                ),
                Some(ReadOutputs::Scales(scales)) => {
                    Keyframes::Scale(scales.map(cgmath::Vector3::from).collect())
                }
                Some(ReadOutputs::MorphTargetWeights(weights)) => {
                    Keyframes::Weights(weights.into_f32().collect())
                }
                None => {
                    log::warn!("no keyframes in channel {idx} of {name}");
                    continue;
                }
            };
            clips.push(AnimationClip {
                name: name.clone(),
                node: channel.target().node().index(),
                keyframes,
                timestamps,
            });
        }
    }
    clips
}
