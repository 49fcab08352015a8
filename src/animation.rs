//! Clip playback and procedural tweens for scene graph nodes.
//!
//! An `AnimationDriver` is owned by one scene and advanced once per rendered
//! frame. It tracks keyframe mixers (one per animated subtree) and at most one
//! active tween per node. Starting a tween on a node that already has one
//! replaces it, so two tweens never fight over the same transform.
mod clip;
mod easing;
mod tween;

use std::{collections::HashMap, rc::Rc, time::Duration};

use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::{
    platform::SystemTime,
    scene_graph::{NodeId, SceneGraph},
};

pub use clip::{AnimationClip, AnimationMixer, Channel, ClipAction, KeyframeTrack, LoopMode};
pub use easing::Easing;
pub use tween::{AxisTarget, TweenId, TweenOptions, TweenTarget};

use tween::{Tween, TweenStep};

new_key_type! {
    pub struct MixerId;
}

/// Refers to one clip action inside a tracked mixer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ActionHandle {
    pub mixer: MixerId,
    pub index: usize,
}

/// Mixer and actions created for a loaded asset's clips.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipPlayback {
    /// The null key when the asset had no clips. Such a mixer is never
    /// tracked, so it does nothing.
    pub mixer: MixerId,
    pub actions: Vec<ActionHandle>,
}

impl ClipPlayback {
    pub fn is_inert(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Default)]
pub struct AnimationDriver {
    mixers: SlotMap<MixerId, AnimationMixer>,
    tweens: HashMap<NodeId, Tween>,
    next_tween_id: u64,
    /// Sum of every delta passed to `update`. Tweens are timed against this.
    clock: Duration,
    last_update: Option<SystemTime>,
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new mixer for the subtree rooted at `root`. Callers are
    /// responsible for not creating two mixers for one subtree.
    pub fn create_mixer(&mut self, root: NodeId) -> MixerId {
        self.mixers.insert(AnimationMixer::new(root))
    }

    pub fn mixer(&self, id: MixerId) -> Option<&AnimationMixer> {
        self.mixers.get(id)
    }

    pub fn mixer_count(&self) -> usize {
        self.mixers.len()
    }

    /// Create a mixer with one action per clip, optionally playing them all
    /// right away. With no clips nothing is tracked and an inert playback is
    /// returned.
    pub fn setup_clip_playback(
        &mut self,
        root: NodeId,
        clips: &[Rc<AnimationClip>],
        autoplay: bool,
    ) -> ClipPlayback {
        if clips.is_empty() {
            return ClipPlayback {
                mixer: MixerId::default(),
                actions: Vec::new(),
            };
        }

        let mixer_id = self.create_mixer(root);
        let mixer = &mut self.mixers[mixer_id];
        let mut actions = Vec::with_capacity(clips.len());

        for clip in clips {
            let index = mixer.clip_action(clip.clone());

            if let Some(action) = mixer.action_mut(index).filter(|_| autoplay) {
                action.playing = true;
            }

            actions.push(ActionHandle {
                mixer: mixer_id,
                index,
            });
        }

        debug!(clips = clips.len(), autoplay, "set up clip playback");

        ClipPlayback {
            mixer: mixer_id,
            actions,
        }
    }

    /// Start the given actions. Handles to mixers that are gone are ignored.
    pub fn play(&mut self, actions: &[ActionHandle]) {
        for handle in actions {
            if let Some(action) = self
                .mixers
                .get_mut(handle.mixer)
                .and_then(|m| m.action_mut(handle.index))
            {
                action.playing = true;
            }
        }
    }

    pub fn is_playing(&self, handle: ActionHandle) -> bool {
        self.mixers
            .get(handle.mixer)
            .and_then(|m| m.action(handle.index))
            .is_some_and(|a| a.playing)
    }

    /// Tween the transform of `node` toward `target`.
    ///
    /// The start values are captured from the node now. A tween already
    /// running on `node` is dropped without completing. Returns `None` when
    /// `node` is not in `graph`.
    pub fn animate_object(
        &mut self,
        graph: &SceneGraph,
        node: NodeId,
        target: TweenTarget,
        options: TweenOptions,
    ) -> Option<TweenId> {
        let start = graph.get(node)?.transform;
        let id = TweenId(self.next_tween_id);
        self.next_tween_id += 1;

        let tween = Tween::new(id, node, start, target, options, self.clock);

        if self.tweens.insert(node, tween).is_some() {
            debug!(?node, "tween superseded by a newer one");
        }

        Some(id)
    }

    /// Stop the tween running on `node`, leaving the node where it is.
    pub fn cancel_tween(&mut self, node: NodeId) -> bool {
        self.tweens.remove(&node).is_some()
    }

    pub fn active_tween(&self, node: NodeId) -> Option<TweenId> {
        self.tweens.get(&node).map(|t| t.id)
    }

    pub fn tween_count(&self) -> usize {
        self.tweens.len()
    }

    /// Advance every mixer and tween by `delta`, or by the wall clock time
    /// since the previous update when `delta` is `None`.
    ///
    /// Completion callbacks run after all tweens have been stepped.
    pub fn update(&mut self, delta: Option<Duration>, graph: &mut SceneGraph) {
        let now = SystemTime::now();
        let delta = delta.unwrap_or_else(|| {
            self.last_update
                .map_or(Duration::ZERO, |last| now.saturating_duration_since(last))
        });
        self.last_update = Some(now);
        self.clock += delta;

        for (_, mixer) in self.mixers.iter_mut() {
            mixer.update(delta.as_secs_f32(), graph);
        }

        let clock = self.clock;
        let mut finished = Vec::new();

        self.tweens.retain(|node, tween| {
            let Some(target) = graph.get_mut(*node) else {
                return false;
            };

            match tween.step(clock, &mut target.transform) {
                TweenStep::Waiting | TweenStep::Running => true,
                TweenStep::Finished => {
                    finished.extend(tween.options.on_complete.take());
                    false
                }
            }
        });

        for callback in finished {
            callback();
        }
    }

    /// Stop every action on every mixer and drop all mixers and tweens. Later
    /// updates have nothing to advance.
    pub fn dispose(&mut self) {
        for (_, mixer) in self.mixers.iter_mut() {
            mixer.stop_all_actions();
        }

        debug!(
            mixers = self.mixers.len(),
            tweens = self.tweens.len(),
            "disposing animation driver"
        );

        self.mixers.clear();
        self.tweens.clear();
    }
}

impl std::fmt::Debug for AnimationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationDriver")
            .field("mixers", &self.mixers.len())
            .field("tweens", &self.tweens.len())
            .field("clock", &self.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use glam::Vec3;

    use super::*;
    use crate::scene_graph::NodeKind;

    const FRAME: Duration = Duration::from_millis(100);

    fn graph_with_node() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let node = graph.add_child(graph.root(), "ico", NodeKind::Group).unwrap();
        (graph, node)
    }

    fn position(graph: &SceneGraph, node: NodeId) -> Vec3 {
        graph.get(node).unwrap().transform.position
    }

    fn run(driver: &mut AnimationDriver, graph: &mut SceneGraph, frames: usize) {
        for _ in 0..frames {
            driver.update(Some(FRAME), graph);
        }
    }

    fn bob_clip() -> Rc<AnimationClip> {
        Rc::new(AnimationClip::new(
            "bob",
            vec![KeyframeTrack {
                target: "ico".into(),
                channel: Channel::Translation,
                times: vec![0.0, 1.0],
                values: vec![Vec3::ZERO, Vec3::Y],
            }],
        ))
    }

    #[test]
    fn zero_clips_give_inert_playback() {
        let (_, node) = graph_with_node();
        let mut driver = AnimationDriver::new();

        let playback = driver.setup_clip_playback(node, &[], true);

        assert!(playback.is_inert());
        assert!(driver.mixer(playback.mixer).is_none());
        assert_eq!(0, driver.mixer_count());
    }

    #[test]
    fn deferred_playback_starts_on_play() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();
        let root = graph.root();

        let playback = driver.setup_clip_playback(root, &[bob_clip()], false);
        assert_eq!(1, playback.actions.len());
        assert!(!driver.is_playing(playback.actions[0]));

        run(&mut driver, &mut graph, 2);
        assert_eq!(Vec3::ZERO, position(&graph, node));

        driver.play(&playback.actions);
        run(&mut driver, &mut graph, 5);
        assert!((position(&graph, node).y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn tween_completes_once_at_target() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();
        let completed = Rc::new(Cell::new(0));
        let counter = completed.clone();

        driver.animate_object(
            &graph,
            node,
            TweenTarget::new().with_position(AxisTarget::default().with_x(2.0)),
            TweenOptions::new().on_complete(move || counter.set(counter.get() + 1)),
        );

        run(&mut driver, &mut graph, 5);
        assert!((position(&graph, node).x - 1.0).abs() < 1e-5);
        assert_eq!(0, completed.get());

        run(&mut driver, &mut graph, 10);
        assert_eq!(Vec3::new(2.0, 0.0, 0.0), position(&graph, node));
        assert_eq!(1, completed.get());
        assert_eq!(0, driver.tween_count());
    }

    #[test]
    fn absent_axes_are_untouched() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();

        driver.animate_object(
            &graph,
            node,
            TweenTarget::new().with_position(AxisTarget::default().with_y(1.0)),
            TweenOptions::new(),
        );

        // Something else moves x while the tween runs.
        run(&mut driver, &mut graph, 3);
        graph.get_mut(node).unwrap().transform.position.x = 7.0;
        run(&mut driver, &mut graph, 10);

        assert_eq!(Vec3::new(7.0, 1.0, 0.0), position(&graph, node));
    }

    #[test]
    fn delay_postpones_the_start() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();

        driver.animate_object(
            &graph,
            node,
            TweenTarget::new().with_scale(AxisTarget::all(Vec3::splat(2.0))),
            TweenOptions::new()
                .with_delay(Duration::from_millis(500))
                .with_duration(Duration::from_millis(500)),
        );

        run(&mut driver, &mut graph, 4);
        assert_eq!(Vec3::ONE, graph.get(node).unwrap().transform.scale);

        run(&mut driver, &mut graph, 6);
        assert_eq!(Vec3::splat(2.0), graph.get(node).unwrap().transform.scale);
    }

    #[test]
    fn yoyo_returns_to_start_then_completes() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();

        driver.animate_object(
            &graph,
            node,
            TweenTarget::new().with_position(AxisTarget::default().with_x(1.0)),
            TweenOptions::new()
                .with_yoyo(true)
                .on_complete(move || flag.set(true)),
        );

        run(&mut driver, &mut graph, 10);
        assert_eq!(1.0, position(&graph, node).x);
        assert!(!done.get());

        run(&mut driver, &mut graph, 5);
        assert!((position(&graph, node).x - 0.5).abs() < 1e-5);

        run(&mut driver, &mut graph, 5);
        assert_eq!(0.0, position(&graph, node).x);
        assert!(done.get());
    }

    #[test]
    fn looping_tween_never_completes() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();

        driver.animate_object(
            &graph,
            node,
            TweenTarget::new().with_rotation(AxisTarget::default().with_z(1.0)),
            TweenOptions::new()
                .with_loop(true)
                .on_complete(move || flag.set(true)),
        );

        run(&mut driver, &mut graph, 35);
        assert!(!done.get());
        assert_eq!(1, driver.tween_count());
    }

    #[test]
    fn newer_tween_supersedes_older() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();
        let first_done = Rc::new(Cell::new(false));
        let flag = first_done.clone();

        let first = driver
            .animate_object(
                &graph,
                node,
                TweenTarget::new().with_position(AxisTarget::default().with_x(10.0)),
                TweenOptions::new().on_complete(move || flag.set(true)),
            )
            .unwrap();

        run(&mut driver, &mut graph, 5);
        assert!((position(&graph, node).x - 5.0).abs() < 1e-4);

        let second = driver
            .animate_object(
                &graph,
                node,
                TweenTarget::new().with_position(AxisTarget::default().with_x(-5.0)),
                TweenOptions::new(),
            )
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(Some(second), driver.active_tween(node));

        run(&mut driver, &mut graph, 20);
        assert!((position(&graph, node).x + 5.0).abs() < 1e-5);
        assert!(!first_done.get());
    }

    #[test]
    fn cancelled_tween_leaves_node_in_place() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();

        driver.animate_object(
            &graph,
            node,
            TweenTarget::new().with_position(AxisTarget::default().with_x(4.0)),
            TweenOptions::new().with_easing(Easing::EaseInOutQuad),
        );

        run(&mut driver, &mut graph, 5);
        let stopped_at = position(&graph, node);
        assert!((stopped_at.x - 2.0).abs() < 1e-4);

        assert!(driver.cancel_tween(node));
        assert!(!driver.cancel_tween(node));
        assert_eq!(None, driver.active_tween(node));

        run(&mut driver, &mut graph, 10);
        assert_eq!(stopped_at, position(&graph, node));
    }

    #[test]
    fn tween_on_missing_node_is_rejected() {
        let (mut graph, node) = graph_with_node();
        graph.remove(node);

        let mut driver = AnimationDriver::new();
        assert!(driver
            .animate_object(&graph, node, TweenTarget::new(), TweenOptions::new())
            .is_none());
    }

    #[test]
    fn removed_node_drops_its_tween() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();
        driver.animate_object(&graph, node, TweenTarget::new(), TweenOptions::new());

        graph.remove(node);
        run(&mut driver, &mut graph, 1);
        assert_eq!(0, driver.tween_count());
    }

    #[test]
    fn dispose_stops_everything() {
        let (mut graph, node) = graph_with_node();
        let mut driver = AnimationDriver::new();
        let root = graph.root();
        driver.setup_clip_playback(root, &[bob_clip()], true);
        driver.animate_object(
            &graph,
            node,
            TweenTarget::new().with_position(AxisTarget::default().with_x(1.0)),
            TweenOptions::new(),
        );
        run(&mut driver, &mut graph, 2);
        let before = position(&graph, node);

        driver.dispose();
        run(&mut driver, &mut graph, 5);

        assert_eq!(before, position(&graph, node));
        assert_eq!(0, driver.mixer_count());
        assert_eq!(0, driver.tween_count());
    }

    #[test]
    fn missing_delta_uses_wall_clock() {
        let (mut graph, _) = graph_with_node();
        let mut driver = AnimationDriver::new();

        driver.update(None, &mut graph);
        assert_eq!(Duration::ZERO, driver.clock);
        driver.update(Some(FRAME), &mut graph);
        assert_eq!(FRAME, driver.clock);
    }
}
