use crate::render::accumulation::RefreshFlag;
use crate::scene::graph::{NodeGraph, NodeId};
use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
}

pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t).normalize()
    }
}

/// Sorted key times with one value per key.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframes<T> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: Interpolation,
}

impl<T: Interpolate> Keyframes<T> {
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn sample(&self, time: f32) -> Option<T> {
        let count = self.times.len().min(self.values.len());
        if count == 0 {
            return None;
        }
        if count == 1 || time.is_nan() || time <= self.times[0] {
            return Some(self.values[0]);
        }
        if time >= self.times[count - 1] {
            return Some(self.values[count - 1]);
        }
        let next = self.times[..count].partition_point(|&t| t <= time);
        let prev = next - 1;
        match self.interpolation {
            Interpolation::Step => Some(self.values[prev]),
            Interpolation::Linear => {
                let span = self.times[next] - self.times[prev];
                let t = if span > 0.0 {
                    (time - self.times[prev]) / span
                } else {
                    0.0
                };
                Some(T::interpolate(self.values[prev], self.values[next], t))
            }
        }
    }
}

/// Channels animating one node, addressed by its index in the model's
/// flattened node list.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub target_node_index: usize,
    pub translation: Option<Keyframes<Vec3>>,
    pub rotation: Option<Keyframes<Quat>>,
    pub scale: Option<Keyframes<Vec3>>,
}

impl Track {
    pub fn new(target_node_index: usize) -> Self {
        Self {
            target_node_index,
            translation: None,
            rotation: None,
            scale: None,
        }
    }

    fn end_time(&self) -> f32 {
        let t = self.translation.as_ref().map_or(0.0, Keyframes::end_time);
        let r = self.rotation.as_ref().map_or(0.0, Keyframes::end_time);
        let s = self.scale.as_ref().map_or(0.0, Keyframes::end_time);
        t.max(r).max(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Duration in seconds.
    pub life: f32,
    pub looped: bool,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    /// Clip whose life spans the longest of its tracks.
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let life = tracks.iter().map(Track::end_time).fold(0.0, f32::max);
        Self {
            name: name.into(),
            life,
            looped: true,
            tracks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipState {
    Stopped,
    Playing,
    Paused,
}

/// A clip whose track targets were resolved against a model's node list.
#[derive(Debug, Clone)]
pub struct BoundClip {
    clip: AnimationClip,
    targets: Vec<Option<NodeId>>,
    state: ClipState,
    time: f32,
}

impl BoundClip {
    pub fn bind(clip: AnimationClip, nodes: &[NodeId]) -> Self {
        let targets = clip
            .tracks
            .iter()
            .map(|track| {
                let target = nodes.get(track.target_node_index).copied();
                if target.is_none() {
                    log::warn!(
                        "Clip '{}' targets node {} which the model does not have",
                        clip.name,
                        track.target_node_index
                    );
                }
                target
            })
            .collect();
        Self {
            clip,
            targets,
            state: ClipState::Stopped,
            time: 0.0,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    pub fn state(&self) -> ClipState {
        self.state
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn targets(&self) -> &[Option<NodeId>] {
        &self.targets
    }

    fn seek(&mut self, time: f32) {
        let time = if time.is_nan() { 0.0 } else { time };
        self.time = time.clamp(0.0, self.clip.life.max(0.0));
    }

    fn advance(&mut self, dt: f32) {
        if !dt.is_finite() {
            log::debug!("Ignoring non-finite step {dt} for clip {}", self.clip.name);
            return;
        }
        let life = self.clip.life;
        let time = self.time + dt;
        if life <= 0.0 {
            self.time = 0.0;
        } else if time >= life && self.clip.looped {
            self.time = time.rem_euclid(life);
        } else if time >= life {
            self.time = life;
            self.state = ClipState::Stopped;
        } else {
            self.time = time;
        }
    }

    fn apply(&self, graph: &mut NodeGraph) {
        for (track, target) in self.clip.tracks.iter().zip(&self.targets) {
            let Some(node) = target.and_then(|id| graph.node_mut(id)) else {
                continue;
            };
            if let Some(value) = track.translation.as_ref().and_then(|k| k.sample(self.time)) {
                node.transform.translation = value;
            }
            if let Some(value) = track.rotation.as_ref().and_then(|k| k.sample(self.time)) {
                node.transform.rotation = value;
            }
            if let Some(value) = track.scale.as_ref().and_then(|k| k.sample(self.time)) {
                node.transform.scale = value;
            }
        }
    }
}

/// Named time range over one clip, for listing in a UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Take {
    pub name: String,
    pub range: (f32, f32),
    pub clip: usize,
}

/// The active clips and their shared clock.
///
/// Clips attached to the clock advance on every [`Timeline::advance`] and
/// raise the viewer's refresh flag whenever they move a node.
#[derive(Debug, Default)]
pub struct Timeline {
    clips: Vec<BoundClip>,
    takes: Vec<Take>,
    refresh: Option<RefreshFlag>,
    attached: bool,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clips(&mut self, clips: Vec<AnimationClip>, nodes: &[NodeId], refresh: RefreshFlag) {
        self.remove_clips();
        for clip in clips {
            let mut bound = BoundClip::bind(clip, nodes);
            bound.state = ClipState::Playing;
            self.takes.push(Take {
                name: bound.clip.name.clone(),
                range: (0.0, bound.clip.life),
                clip: self.clips.len(),
            });
            self.clips.push(bound);
        }
        self.refresh = Some(refresh);
        self.attached = true;
    }

    pub fn remove_clips(&mut self) {
        self.clips.clear();
        self.takes.clear();
        self.attached = false;
    }

    pub fn clips(&self) -> &[BoundClip] {
        &self.clips
    }

    pub fn takes(&self) -> &[Take] {
        &self.takes
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn pause(&mut self) {
        for clip in &mut self.clips {
            if clip.state == ClipState::Playing {
                clip.state = ClipState::Paused;
            }
        }
    }

    pub fn resume(&mut self) {
        for clip in &mut self.clips {
            if clip.state == ClipState::Paused {
                clip.state = ClipState::Playing;
            }
        }
    }

    /// Detach every clip from the clock.
    pub fn stop(&mut self) {
        for clip in &mut self.clips {
            clip.state = ClipState::Stopped;
        }
        self.attached = false;
    }

    /// Reattach clips after [`Timeline::stop`] and restart them from the
    /// beginning.
    pub fn play(&mut self) {
        for clip in &mut self.clips {
            if clip.state == ClipState::Stopped {
                clip.state = ClipState::Playing;
                clip.time = 0.0;
            }
        }
        self.attached = !self.clips.is_empty();
    }

    /// Seek every clip to `time` and pose the graph.
    pub fn set_pose(&mut self, time: f32, graph: &mut NodeGraph) {
        for clip in &mut self.clips {
            clip.seek(time);
            clip.apply(graph);
        }
        self.request_refresh();
    }

    /// Longest clip life, 0 with no clips.
    pub fn duration(&self) -> f32 {
        self.clips
            .iter()
            .map(|clip| clip.clip.life)
            .fold(0.0, f32::max)
    }

    /// Step playing clips by `dt` seconds. Returns true if any node moved.
    pub fn advance(&mut self, dt: f32, graph: &mut NodeGraph) -> bool {
        if !self.attached {
            return false;
        }
        let mut moved = false;
        for clip in &mut self.clips {
            if clip.state != ClipState::Playing {
                continue;
            }
            clip.advance(dt);
            clip.apply(graph);
            moved = true;
        }
        if moved {
            self.request_refresh();
        }
        moved
    }

    fn request_refresh(&self) {
        if let Some(flag) = &self.refresh {
            flag.set();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::graph::Node;

    fn slide_clip(life: f32) -> AnimationClip {
        let mut track = Track::new(1);
        track.translation = Some(Keyframes::new(
            vec![0.0, life],
            vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)],
            Interpolation::Linear,
        ));
        AnimationClip::new("slide", vec![track])
    }

    fn graph_with_bone() -> (NodeGraph, Vec<NodeId>) {
        let mut graph = NodeGraph::new("model");
        let root = graph.root();
        let bone = graph.add_child(root, Node::new("bone"));
        (graph, vec![root, bone])
    }

    #[test]
    fn duration_is_longest_clip_or_zero() {
        let (_, nodes) = graph_with_bone();
        let mut timeline = Timeline::new();
        assert_eq!(timeline.duration(), 0.0);
        timeline.set_clips(vec![slide_clip(2.0), slide_clip(0.5)], &nodes, RefreshFlag::new());
        assert_eq!(timeline.duration(), 2.0);
        assert_eq!(timeline.takes().len(), 2);
        assert_eq!(timeline.takes()[0].range, (0.0, 2.0));
    }

    #[test]
    fn set_pose_reaches_mid_clip_and_requests_refresh() {
        let (mut graph, nodes) = graph_with_bone();
        let refresh = RefreshFlag::new();
        let mut timeline = Timeline::new();
        timeline.set_clips(vec![slide_clip(2.0)], &nodes, refresh.clone());
        refresh.take();

        timeline.set_pose(1.0, &mut graph);
        let x = graph.node(nodes[1]).map(|n| n.transform.translation.x);
        assert_eq!(x, Some(1.0));
        assert!(refresh.take());
    }

    #[test]
    fn pause_freezes_and_stop_detaches() {
        let (mut graph, nodes) = graph_with_bone();
        let mut timeline = Timeline::new();
        timeline.set_clips(vec![slide_clip(2.0)], &nodes, RefreshFlag::new());

        assert!(timeline.advance(0.5, &mut graph));
        timeline.pause();
        assert!(!timeline.advance(0.5, &mut graph));
        assert_eq!(timeline.clips()[0].time(), 0.5);

        timeline.resume();
        assert_eq!(timeline.clips()[0].state(), ClipState::Playing);

        timeline.stop();
        assert!(!timeline.is_attached());
        timeline.resume();
        assert_eq!(timeline.clips()[0].state(), ClipState::Stopped);

        timeline.play();
        assert!(timeline.is_attached());
        assert_eq!(timeline.clips()[0].state(), ClipState::Playing);
    }

    #[test]
    fn nan_times_fall_back_to_the_first_key() {
        let keys = Keyframes::new(vec![0.0, 1.0], vec![Vec3::ZERO, Vec3::ONE], Interpolation::Linear);
        assert_eq!(keys.sample(f32::NAN), Some(Vec3::ZERO));

        let (mut graph, nodes) = graph_with_bone();
        let mut timeline = Timeline::new();
        timeline.set_clips(vec![slide_clip(2.0)], &nodes, RefreshFlag::new());
        timeline.set_pose(f32::NAN, &mut graph);
        assert_eq!(timeline.clips()[0].time(), 0.0);
        assert_eq!(graph.node(nodes[1]).map(|n| n.transform.translation), Some(Vec3::ZERO));

        timeline.advance(0.5, &mut graph);
        timeline.advance(f32::NAN, &mut graph);
        timeline.advance(f32::INFINITY, &mut graph);
        assert_eq!(timeline.clips()[0].time(), 0.5);
    }

    #[test]
    fn looped_clip_wraps() {
        let (mut graph, nodes) = graph_with_bone();
        let mut timeline = Timeline::new();
        timeline.set_clips(vec![slide_clip(2.0)], &nodes, RefreshFlag::new());
        timeline.advance(2.5, &mut graph);
        assert!((timeline.clips()[0].time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn unresolved_targets_are_skipped() {
        let mut track = Track::new(7);
        track.scale = Some(Keyframes::new(vec![0.0], vec![Vec3::splat(3.0)], Interpolation::Step));
        let (mut graph, nodes) = graph_with_bone();
        let mut timeline = Timeline::new();
        timeline.set_clips(vec![AnimationClip::new("broken", vec![track])], &nodes, RefreshFlag::new());
        assert!(timeline.clips()[0].targets()[0].is_none());
        timeline.set_pose(0.0, &mut graph);
    }
}
