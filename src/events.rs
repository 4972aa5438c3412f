use crate::assets::{LoadId, ModelStats};
use crate::render::camera::CameraState;
use crate::render::pick::PickResult;
use crate::render::RenderPass;
use std::collections::VecDeque;
use std::fmt;

/// Emitted by the asset pipeline, tagged with the load that caused them.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// Model installed and renderable; textures may still be placeholders.
    ModelLoaded { load: LoadId, stats: ModelStats },
    /// Every texture of the load settled and bump maps were converted.
    Ready { load: LoadId },
    /// Textures settled after a newer model replaced this one.
    Superseded { load: LoadId },
    AnimationLoaded { load: LoadId, clip_count: usize },
    Error { load: LoadId, message: String },
}

impl LoadEvent {
    pub fn load(&self) -> LoadId {
        match self {
            LoadEvent::ModelLoaded { load, .. }
            | LoadEvent::Ready { load }
            | LoadEvent::Superseded { load }
            | LoadEvent::AnimationLoaded { load, .. }
            | LoadEvent::Error { load, .. } => *load,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    Select(PickResult),
    Deselect(PickResult),
    DofFocus(PickResult),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    CameraUpdated(CameraState),
    RenderScene,
    AfterRender { pass: RenderPass },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Load(LoadEvent),
    Interaction(InteractionEvent),
    View(ViewEvent),
}

impl From<LoadEvent> for ViewerEvent {
    fn from(event: LoadEvent) -> Self {
        ViewerEvent::Load(event)
    }
}

impl From<InteractionEvent> for ViewerEvent {
    fn from(event: InteractionEvent) -> Self {
        ViewerEvent::Interaction(event)
    }
}

impl From<ViewEvent> for ViewerEvent {
    fn from(event: ViewEvent) -> Self {
        ViewerEvent::View(event)
    }
}

impl fmt::Display for LoadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadEvent::ModelLoaded { load, stats } => write!(
                f,
                "ModelLoaded load={} triangles={} vertices={} meshes={}",
                load.get(),
                stats.triangle_count,
                stats.vertex_count,
                stats.mesh_count
            ),
            LoadEvent::Ready { load } => write!(f, "Ready load={}", load.get()),
            LoadEvent::Superseded { load } => write!(f, "Superseded load={}", load.get()),
            LoadEvent::AnimationLoaded { load, clip_count } => {
                write!(f, "AnimationLoaded load={} clips={}", load.get(), clip_count)
            }
            LoadEvent::Error { load, message } => write!(f, "Error load={} {message}", load.get()),
        }
    }
}

impl fmt::Display for ViewerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerEvent::Load(event) => event.fmt(f),
            ViewerEvent::Interaction(InteractionEvent::Select(hit)) => {
                write!(f, "Select target={:?} distance={:.3}", hit.target, hit.distance)
            }
            ViewerEvent::Interaction(InteractionEvent::Deselect(hit)) => {
                write!(f, "Deselect target={:?}", hit.target)
            }
            ViewerEvent::Interaction(InteractionEvent::DofFocus(hit)) => {
                write!(f, "DofFocus distance={:.3}", hit.distance)
            }
            ViewerEvent::View(ViewEvent::CameraUpdated(state)) => write!(
                f,
                "CameraUpdated distance={:.3} alpha={:.1} beta={:.1}",
                state.distance, state.alpha, state.beta
            ),
            ViewerEvent::View(ViewEvent::RenderScene) => write!(f, "RenderScene"),
            ViewerEvent::View(ViewEvent::AfterRender { pass }) => write!(f, "AfterRender pass={pass:?}"),
        }
    }
}

/// Events waiting for the host. Holds at most [`EventQueue::CAPACITY`]
/// entries; when full, the oldest view event is dropped first.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<ViewerEvent>,
    dropped: usize,
}

impl EventQueue {
    pub const CAPACITY: usize = 1024;

    pub fn push(&mut self, event: impl Into<ViewerEvent>) {
        if self.events.len() >= Self::CAPACITY {
            let oldest_view = self
                .events
                .iter()
                .position(|queued| matches!(queued, ViewerEvent::View(_)))
                .unwrap_or(0);
            self.events.remove(oldest_view);
            if self.dropped == 0 {
                log::debug!("Event queue full, dropping oldest events until drained");
            }
            self.dropped += 1;
        }
        self.events.push_back(event.into());
    }

    pub fn drain(&mut self) -> Vec<ViewerEvent> {
        if self.dropped > 0 {
            log::debug!("Dropped {} undrained events", self.dropped);
            self.dropped = 0;
        }
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undrained_queue_stays_bounded_and_keeps_load_events() {
        let mut queue = EventQueue::default();
        let load = LoadId(3);
        queue.push(LoadEvent::Ready { load });
        for _ in 0..EventQueue::CAPACITY * 3 {
            queue.push(ViewEvent::RenderScene);
        }
        assert_eq!(queue.len(), EventQueue::CAPACITY);

        let events = queue.drain();
        assert_eq!(events[0], ViewerEvent::Load(LoadEvent::Ready { load }));
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_without_view_events_drops_the_oldest() {
        let mut queue = EventQueue::default();
        for id in 0..=EventQueue::CAPACITY as u64 {
            queue.push(LoadEvent::Ready { load: LoadId(id) });
        }
        let events = queue.drain();
        assert_eq!(events.len(), EventQueue::CAPACITY);
        assert_eq!(events[0], ViewerEvent::Load(LoadEvent::Ready { load: LoadId(1) }));
    }
}
