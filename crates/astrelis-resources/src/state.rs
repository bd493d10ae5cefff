//! Per-slot load state machine.

/// Load state of an asset slot.
///
/// ```text
/// NotLoaded -> Loading -> Loaded | Failed
/// Loaded | Failed -> Unloading -> (freed)
/// ```
///
/// `NotLoaded` only exists between allocation and the first state change.
/// A failed slot may go back to `Loading` when it is reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// Allocated but no load started yet.
    #[default]
    NotLoaded,

    /// A load is in progress.
    Loading,

    /// Successfully loaded; the slot holds asset data.
    Loaded,

    /// The load failed; the slot holds an error message.
    Failed,

    /// The slot is being freed.
    Unloading,
}

impl LoadState {
    /// Returns true if loading has completed (successfully or not).
    pub fn is_done(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Failed)
    }

    /// Returns true if the slot holds usable data.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded)
    }

    /// Returns true while a load is in progress.
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: LoadState) -> bool {
        use LoadState::*;

        match (self, next) {
            (NotLoaded, Loading | Loaded | Failed) => true,
            (Loading, Loaded | Failed) => true,
            (Loaded, Loaded | Unloading) => true,
            (Failed, Loading | Unloading) => true,
            (Unloading, NotLoaded) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadState::NotLoaded => "not loaded",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Failed => "failed",
            LoadState::Unloading => "unloading",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(LoadState::NotLoaded.can_transition_to(LoadState::Loading));
        assert!(LoadState::Loading.can_transition_to(LoadState::Loaded));
        assert!(LoadState::Loading.can_transition_to(LoadState::Failed));
        assert!(LoadState::Loaded.can_transition_to(LoadState::Unloading));
        assert!(LoadState::Failed.can_transition_to(LoadState::Unloading));
        assert!(LoadState::Unloading.can_transition_to(LoadState::NotLoaded));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!LoadState::Loading.can_transition_to(LoadState::Unloading));
        assert!(!LoadState::Loaded.can_transition_to(LoadState::Loading));
        assert!(!LoadState::Unloading.can_transition_to(LoadState::Loaded));
        assert!(!LoadState::NotLoaded.can_transition_to(LoadState::Unloading));
    }

    #[test]
    fn test_is_done() {
        assert!(LoadState::Loaded.is_done());
        assert!(LoadState::Failed.is_done());
        assert!(!LoadState::Loading.is_done());
        assert!(!LoadState::NotLoaded.is_done());
    }
}
