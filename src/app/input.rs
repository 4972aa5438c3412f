use crate::events::InteractionEvent;
use crate::render::PickResult;
use glam::Vec2;

/// What a pointer release turned out to be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    /// No press was recorded, or nothing listens for clicks.
    Ignored,
    /// The pointer travelled too far to count as a click.
    Drag,
    Pick { x: f32, y: f32 },
}

/// Click versus drag discrimination from pointer down/up positions.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    down: Option<Vec2>,
    last: Option<Vec2>,
    threshold: f32,
}

impl PointerTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            down: None,
            last: None,
            threshold,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.down.is_some()
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.down = Some(Vec2::new(x, y));
        self.last = self.down;
    }

    /// Movement since the previous event while pressed.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<Vec2> {
        self.down?;
        let position = Vec2::new(x, y);
        let delta = self.last.map(|last| position - last);
        self.last = Some(position);
        delta
    }

    /// `listening` is false when neither picking nor depth of field wants
    /// clicks.
    pub fn pointer_up(&mut self, x: f32, y: f32, listening: bool) -> ClickOutcome {
        self.last = None;
        let Some(down) = self.down.take() else {
            return ClickOutcome::Ignored;
        };
        if !listening {
            return ClickOutcome::Ignored;
        }
        if down.distance(Vec2::new(x, y)) >= self.threshold {
            return ClickOutcome::Drag;
        }
        ClickOutcome::Pick { x, y }
    }
}

/// Remembers the last selection so a miss can deselect it.
#[derive(Debug, Default)]
pub struct Selection {
    last: Option<PickResult>,
}

impl Selection {
    pub fn current(&self) -> Option<&PickResult> {
        self.last.as_ref()
    }

    /// Turn the result of a pick into interaction events. A hit on a model
    /// node focuses and selects it; a miss or a ground hit deselects.
    pub fn resolve(&mut self, hit: Option<PickResult>) -> Vec<InteractionEvent> {
        match hit.filter(|hit| !hit.target.is_ground()) {
            Some(hit) => {
                self.last = Some(hit);
                vec![InteractionEvent::DofFocus(hit), InteractionEvent::Select(hit)]
            }
            None => self
                .last
                .take()
                .map(InteractionEvent::Deselect)
                .into_iter()
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}
