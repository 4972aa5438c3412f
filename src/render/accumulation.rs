use crate::app::context::DisposeToken;
use crate::render::{RenderBackend, RenderPass, SceneView};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// "Needs refresh" bit shared with the parts of the viewer that dirty the
/// scene outside a direct method call (animation clock, texture decodes).
#[derive(Debug, Clone, Default)]
pub struct RefreshFlag(Rc<Cell<bool>>);

impl RefreshFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.set(true);
    }

    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// What one [`RenderLoop::tick`] drew.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub full: bool,
    pub accumulated: Vec<SessionId>,
    /// Continuations that found their session invalidated.
    pub dropped: usize,
}

impl TickReport {
    pub fn rendered(&self) -> bool {
        self.full || !self.accumulated.is_empty()
    }
}

// ============================================================================
// Render loop
// ============================================================================

/// Dirty-flag frame scheduler with cancellable accumulation sessions.
///
/// A session is a chain of continuations: one debounce timer, then one
/// continuation per display frame. Every continuation carries its session
/// id and does nothing once that id is no longer live.
#[derive(Debug)]
pub struct RenderLoop {
    refresh: RefreshFlag,
    running: bool,
    next_session: u64,
    live: Option<SessionId>,
    timer: Option<(SessionId, Instant)>,
    next_frame: Vec<SessionId>,
    debounce: Duration,
}

impl RenderLoop {
    pub fn new(debounce: Duration) -> Self {
        Self {
            refresh: RefreshFlag::new(),
            running: false,
            next_session: 1,
            live: None,
            timer: None,
            next_frame: Vec::new(),
            debounce,
        }
    }

    pub fn refresh_flag(&self) -> RefreshFlag {
        self.refresh.clone()
    }

    pub fn mark_dirty(&self) {
        self.refresh.set();
    }

    pub fn needs_refresh(&self) -> bool {
        self.refresh.is_set()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn live_session(&self) -> Option<SessionId> {
        self.live
    }

    /// Invalidate the live session. Already scheduled continuations stay
    /// queued and drop themselves when they run.
    pub fn stop_accumulating(&mut self) {
        if let Some(id) = self.live.take() {
            log::debug!("Accumulation session {} invalidated", id.0);
        }
        self.timer = None;
    }

    /// Begin a fresh session after a full frame, if the backend wants one.
    pub fn start_accumulating<B: RenderBackend + ?Sized>(&mut self, backend: &B, now: Instant) {
        self.stop_accumulating();
        if !backend.needs_accumulate() {
            return;
        }
        let id = SessionId(self.next_session);
        self.next_session += 1;
        self.live = Some(id);
        self.timer = Some((id, now + self.debounce));
        log::debug!("Accumulation session {} scheduled", id.0);
    }

    /// One display-refresh step.
    pub fn tick<B: RenderBackend + ?Sized>(
        &mut self,
        now: Instant,
        backend: &mut B,
        view: &SceneView<'_>,
        token: &DisposeToken,
    ) -> TickReport {
        let mut report = TickReport::default();
        if token.is_disposed() || !self.running {
            return report;
        }

        if self.refresh.take() {
            backend.render(view, RenderPass::Full);
            report.full = true;
            self.start_accumulating(backend, now);
        }

        let mut due = std::mem::take(&mut self.next_frame);
        if let Some((id, at)) = self.timer {
            if now >= at {
                self.timer = None;
                due.push(id);
            }
        }

        for id in due {
            if token.is_disposed() || self.live != Some(id) {
                report.dropped += 1;
                continue;
            }
            if backend.is_accumulation_finished() {
                log::debug!("Accumulation session {} finished", id.0);
                self.live = None;
                continue;
            }
            backend.render(view, RenderPass::Accumulate(id));
            report.accumulated.push(id);
            self.next_frame.push(id);
        }
        report
    }
}
