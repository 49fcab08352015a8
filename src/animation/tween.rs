use std::{fmt, time::Duration};

use glam::Vec3;

use crate::scene_graph::{NodeId, Transform};

use super::Easing;

/// Per axis tween targets. Axes left as `None` are never written.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AxisTarget {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

impl AxisTarget {
    pub fn all(value: Vec3) -> Self {
        Self {
            x: Some(value.x),
            y: Some(value.y),
            z: Some(value.z),
        }
    }

    pub fn with_x(mut self, x: f32) -> Self {
        self.x = Some(x);
        self
    }

    pub fn with_y(mut self, y: f32) -> Self {
        self.y = Some(y);
        self
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = Some(z);
        self
    }

    fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    fn interpolate(&self, start: Vec3, current: &mut Vec3, t: f32) {
        let lerp = |from: f32, to: f32| from + (to - from) * t;

        if let Some(x) = self.x {
            current.x = lerp(start.x, x);
        }

        if let Some(y) = self.y {
            current.y = lerp(start.y, y);
        }

        if let Some(z) = self.z {
            current.z = lerp(start.z, z);
        }
    }
}

/// Target values for a procedural tween of a node's transform.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TweenTarget {
    pub position: AxisTarget,
    pub rotation: AxisTarget,
    pub scale: AxisTarget,
}

impl TweenTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: AxisTarget) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: AxisTarget) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: AxisTarget) -> Self {
        self.scale = scale;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty() && self.rotation.is_empty() && self.scale.is_empty()
    }

    pub(super) fn apply(&self, start: &Transform, current: &mut Transform, t: f32) {
        self.position.interpolate(start.position, &mut current.position, t);
        self.rotation.interpolate(start.rotation, &mut current.rotation, t);
        self.scale.interpolate(start.scale, &mut current.scale, t);
    }
}

pub struct TweenOptions {
    pub duration: Duration,
    pub delay: Duration,
    pub easing: Easing,
    pub looping: bool,
    /// Play each forward leg back in reverse before finishing or looping.
    pub yoyo: bool,
    pub on_complete: Option<Box<dyn FnOnce()>>,
}

impl TweenOptions {
    pub const DEFAULT_DURATION: Duration = Duration::from_millis(1000);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_yoyo(mut self, yoyo: bool) -> Self {
        self.yoyo = yoyo;
        self
    }

    /// Called once when a finite tween finishes. Never called for looping
    /// tweens, cancelled tweens, or tweens superseded by a newer one.
    pub fn on_complete(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl Default for TweenOptions {
    fn default() -> Self {
        Self {
            duration: Self::DEFAULT_DURATION,
            delay: Duration::ZERO,
            easing: Easing::Linear,
            looping: false,
            yoyo: false,
            on_complete: None,
        }
    }
}

impl fmt::Debug for TweenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TweenOptions")
            .field("duration", &self.duration)
            .field("delay", &self.delay)
            .field("easing", &self.easing)
            .field("looping", &self.looping)
            .field("yoyo", &self.yoyo)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TweenId(pub(super) u64);

/// Result of stepping a tween.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum TweenStep {
    Waiting,
    Running,
    Finished,
}

pub(super) struct Tween {
    pub id: TweenId,
    pub node: NodeId,
    pub start: Transform,
    pub target: TweenTarget,
    pub options: TweenOptions,
    /// Driver clock time at which the current leg began.
    pub leg_start: Duration,
    pub reversed: bool,
}

impl Tween {
    pub fn new(id: TweenId, node: NodeId, start: Transform, target: TweenTarget, options: TweenOptions, now: Duration) -> Self {
        let leg_start = now + options.delay;

        Self {
            id,
            node,
            start,
            target,
            options,
            leg_start,
            reversed: false,
        }
    }

    /// Write the tween's value at driver time `now` into `transform`.
    pub fn step(&mut self, now: Duration, transform: &mut Transform) -> TweenStep {
        if now < self.leg_start {
            return TweenStep::Waiting;
        }

        let elapsed = now - self.leg_start;
        let progress = if self.options.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / self.options.duration.as_secs_f32()).min(1.0)
        };

        let t = if self.reversed { 1.0 - progress } else { progress };
        self.target
            .apply(&self.start, transform, self.options.easing.apply(t));

        if progress < 1.0 {
            return TweenStep::Running;
        }

        if self.options.yoyo && !self.reversed {
            self.reversed = true;
            self.leg_start = now;
            TweenStep::Running
        } else if self.options.looping {
            self.reversed = false;
            self.leg_start = now;
            TweenStep::Running
        } else {
            TweenStep::Finished
        }
    }
}
