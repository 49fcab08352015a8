//! Keyframe clips and the mixers that play them on a scene graph subtree.
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::scene_graph::{NodeId, SceneGraph};

/// Transform channel a track writes to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Translation,
    /// Euler angles in radians, XYZ order.
    Rotation,
    Scale,
}

/// Animates one channel of the node named `target`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyframeTrack {
    pub target: String,
    pub channel: Channel,
    /// Key times in seconds, ascending.
    pub times: Vec<f32>,
    pub values: Vec<Vec3>,
}

impl KeyframeTrack {
    /// Linearly interpolated value at `time` seconds. Times outside the keys
    /// clamp to the first or last key. `None` when the track has no keys.
    pub fn sample(&self, time: f32) -> Option<Vec3> {
        let keys = &self.values;
        let count = self.times.len().min(keys.len());

        if count == 0 {
            return None;
        }

        if time <= self.times[0] {
            return Some(keys[0]);
        }

        for i in 1..count {
            if time < self.times[i] {
                let t0 = self.times[i - 1];
                let span = self.times[i] - t0;
                let t = if span > 0.0 { (time - t0) / span } else { 1.0 };
                return Some(keys[i - 1].lerp(keys[i], t));
            }
        }

        Some(keys[count - 1])
    }

    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
    pub tracks: Vec<KeyframeTrack>,
}

impl AnimationClip {
    /// Create a clip whose duration is the end of its longest track.
    pub fn new(name: impl Into<String>, tracks: Vec<KeyframeTrack>) -> Self {
        let duration = tracks.iter().map(KeyframeTrack::end_time).fold(0.0, f32::max);

        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    Repeat,
    Once,
}

/// Playback state of one clip inside a mixer.
#[derive(Clone, Debug)]
pub struct ClipAction {
    pub clip: Rc<AnimationClip>,
    /// Local time in seconds.
    pub time: f32,
    pub playing: bool,
    pub loop_mode: LoopMode,
}

impl ClipAction {
    fn new(clip: Rc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            playing: false,
            loop_mode: LoopMode::Repeat,
        }
    }

    fn advance(&mut self, seconds: f32) {
        self.time += seconds;

        if self.clip.duration <= 0.0 {
            self.time = 0.0;
            return;
        }

        match self.loop_mode {
            LoopMode::Repeat => self.time %= self.clip.duration,
            LoopMode::Once => {
                if self.time >= self.clip.duration {
                    self.time = self.clip.duration;
                    self.playing = false;
                }
            }
        }
    }
}

/// Plays clip actions on the subtree rooted at `root`. Track targets are
/// resolved by name inside that subtree.
#[derive(Clone, Debug)]
pub struct AnimationMixer {
    root: NodeId,
    actions: Vec<ClipAction>,
}

impl AnimationMixer {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            actions: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Add a stopped action for `clip` and return its index.
    pub fn clip_action(&mut self, clip: Rc<AnimationClip>) -> usize {
        self.actions.push(ClipAction::new(clip));
        self.actions.len() - 1
    }

    pub fn action(&self, index: usize) -> Option<&ClipAction> {
        self.actions.get(index)
    }

    pub fn action_mut(&mut self, index: usize) -> Option<&mut ClipAction> {
        self.actions.get_mut(index)
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }

    pub fn stop_all_actions(&mut self) {
        for action in &mut self.actions {
            action.playing = false;
            action.time = 0.0;
        }
    }

    /// Advance playing actions by `seconds` and write the sampled values to
    /// their targets. Targets missing from the graph are skipped.
    pub fn update(&mut self, seconds: f32, graph: &mut SceneGraph) {
        if !graph.contains(self.root) {
            return;
        }

        for action in self.actions.iter_mut().filter(|a| a.playing) {
            action.advance(seconds);

            for track in &action.clip.tracks {
                let Some(value) = track.sample(action.time) else {
                    continue;
                };
                let Some(id) = graph.find_in_subtree(self.root, &track.target) else {
                    continue;
                };
                let Some(node) = graph.get_mut(id) else {
                    continue;
                };

                match track.channel {
                    Channel::Translation => node.transform.position = value,
                    Channel::Rotation => node.transform.rotation = value,
                    Channel::Scale => node.transform.scale = value,
                }
            }
        }
    }
}
