//! Dirty-flag value holder driving the resolution pass.

/// A value slot that remembers whether it was written since the flag was
/// last cleared.
///
/// `set` always marks the trigger assigned, even when the new value
/// equals the old one: a client re-sending the same configuration still
/// asks for a pass. `clear_assigned` resets only the flag; the value
/// stays readable for the pass that follows.
#[derive(Debug)]
pub struct Trigger<T> {
    value: Option<T>,
    was_assigned: bool,
}

impl<T> Trigger<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: None,
            was_assigned: false,
        }
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.was_assigned = true;
    }

    #[must_use]
    pub fn was_assigned(&self) -> bool {
        self.was_assigned
    }

    pub fn clear_assigned(&mut self) {
        self.was_assigned = false;
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T> Default for Trigger<T> {
    fn default() -> Self {
        Self::new()
    }
}
