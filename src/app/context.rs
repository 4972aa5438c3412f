use std::cell::Cell;
use std::rc::Rc;

/// Shared disposal state. Every deferred continuation (texture decode,
/// join completion, accumulation frame) holds a clone and checks it before
/// touching viewer state.
#[derive(Debug, Clone, Default)]
pub struct DisposeToken {
    disposed: Rc<Cell<bool>>,
}

impl DisposeToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose(&self) {
        self.disposed.set(true);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::DisposeToken;

    #[test]
    fn clones_observe_disposal() {
        let token = DisposeToken::new();
        let held = token.clone();
        assert!(!held.is_disposed());
        token.dispose();
        assert!(held.is_disposed());
    }
}
