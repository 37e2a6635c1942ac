use std::fmt::Debug;

use glam::{Quat, Vec3};
use log::{trace, warn};

use crate::{
    scene::{ImportedAnimation, ImportedKey},
    skin::Skeleton,
};

/// Substituted when a clip reports no usable tick rate.
pub const DEFAULT_TICKS_PER_SECOND: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationKeyFrame<T: Debug + Clone> {
    pub time_ticks: f32,
    pub value: T,
}

/// Keyframe tracks of one bone, each sorted by time. An empty track holds
/// the bind pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneKeyFrames {
    pub positions: Vec<AnimationKeyFrame<Vec3>>,
    pub orientations: Vec<AnimationKeyFrame<Quat>>,
    pub scales: Vec<AnimationKeyFrame<Vec3>>,
}

impl BoneKeyFrames {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.orientations.is_empty() && self.scales.is_empty()
    }

    fn sort(&mut self) {
        fn sort_by_time<T: Debug + Clone>(keyframes: &mut [AnimationKeyFrame<T>]) {
            keyframes.sort_by(|a, b| a.time_ticks.total_cmp(&b.time_ticks));
        }
        sort_by_time(&mut self.positions);
        sort_by_time(&mut self.orientations);
        sort_by_time(&mut self.scales);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationAsset {
    pub name: String,
    pub duration_ticks: f32,
    pub ticks_per_second: f32,
    /// Indexed by bone id, one entry per skeleton bone.
    pub bones: Vec<BoneKeyFrames>,
}

impl AnimationAsset {
    pub fn duration_seconds(&self) -> f32 {
        self.duration_ticks / self.ticks_per_second
    }
}

fn copy_keys<'a, T, U>(
    keys: &'a [ImportedKey<T>],
    convert: impl Fn(T) -> U + 'a,
) -> impl Iterator<Item = AnimationKeyFrame<U>> + 'a
where
    T: Copy,
    U: Debug + Clone,
{
    keys.iter().map(move |key| AnimationKeyFrame {
        time_ticks: key.time,
        value: convert(key.value),
    })
}

/// Convert a clip into per-bone tracks for `skeleton`. Channels of nodes
/// that are not bones are ignored.
pub fn build_animation(clip: &ImportedAnimation, skeleton: &Skeleton) -> AnimationAsset {
    trace!("Processing animation {:?}", clip.name);

    let ticks_per_second = if clip.ticks_per_second > 0.0 {
        clip.ticks_per_second
    } else {
        DEFAULT_TICKS_PER_SECOND
    };
    let mut bones = vec![BoneKeyFrames::default(); skeleton.bone_count()];

    for channel in &clip.channels {
        let Some(bone) = skeleton.bone_id(&channel.node_name) else {
            trace!("Channel {:?} does not target a bone", channel.node_name);
            continue;
        };
        let keyframes = &mut bones[bone];
        keyframes
            .positions
            .extend(copy_keys(&channel.positions, |value| value));
        keyframes
            .orientations
            .extend(copy_keys(&channel.rotations, Quat::normalize));
        keyframes
            .scales
            .extend(copy_keys(&channel.scales, |value| value));
    }

    let mut out_of_order = false;
    for keyframes in &mut bones {
        out_of_order |= !is_sorted(&keyframes.positions)
            || !is_sorted(&keyframes.orientations)
            || !is_sorted(&keyframes.scales);
        keyframes.sort();
    }
    if out_of_order {
        warn!("Animation {:?} stores keys out of order, re-sorted", clip.name);
    }

    AnimationAsset {
        name: clip.name.clone(),
        duration_ticks: clip.duration_ticks,
        ticks_per_second,
        bones,
    }
}

fn is_sorted<T: Debug + Clone>(keyframes: &[AnimationKeyFrame<T>]) -> bool {
    keyframes
        .windows(2)
        .all(|pair| pair[0].time_ticks <= pair[1].time_ticks)
}
