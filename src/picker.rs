//! Date field adapter.
//!
//! The date/time widget fires close events that cannot be trusted at
//! face value: it can report "closed" while its popup is still visible
//! (validation flows), and it re-fires on focus churn. The adapter
//! defers the real check past a short debounce, consults an explicit
//! popup-open query instead of probing widget internals, and emits a
//! cursor signal only for a genuine, fully-filled, changed value.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::Cursor;

/// Delay between a close event and the deferred value check.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Mask shown while the field has not been filled in.
pub const PLACEHOLDER: &str = "__/__/____ __:__";

/// Debounced date/time field state.
#[derive(Debug)]
pub struct DateField {
    /// Current field text
    value: String,
    /// Last value that produced a cursor signal
    last_accepted: String,
    /// Deadline for the deferred check, when one is pending
    pending: Option<Instant>,
}

impl DateField {
    /// Create an unfilled field.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: PLACEHOLDER.to_string(),
            last_accepted: String::new(),
            pending: None,
        }
    }

    /// Current field text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Mutable text buffer for the UI widget to edit.
    pub fn buffer_mut(&mut self) -> &mut String {
        &mut self.value
    }

    /// Record a close/change event; the real check runs after
    /// [`DEBOUNCE`] via [`poll`](Self::poll).
    pub fn on_close(&mut self, now: Instant) {
        self.pending = Some(now + DEBOUNCE);
    }

    /// Replace the field text programmatically (chart point click) and
    /// schedule the deferred check, as if the value had been typed.
    pub fn set_value(&mut self, text: &str, now: Instant) {
        self.value = text.to_string();
        self.on_close(now);
    }

    /// Run the deferred check once its deadline has passed.
    ///
    /// `popup_open` reports whether the picker popup is still visible;
    /// while it is, the event is ignored entirely. A value equal to the
    /// last accepted one or to the unfilled placeholder emits nothing,
    /// as does a value that does not parse as `m/d/Y H:i`.
    pub fn poll(&mut self, now: Instant, popup_open: bool) -> Option<Cursor> {
        let deadline = self.pending?;
        if now < deadline {
            return None;
        }
        self.pending = None;

        if popup_open {
            debug!("skipping date check, picker still open");
            return None;
        }
        if self.value == self.last_accepted || self.value == PLACEHOLDER {
            debug!("skipping date check, value unchanged");
            return None;
        }

        let cursor = Cursor::from_picker(&self.value)?;
        self.last_accepted = self.value.clone();
        Some(cursor)
    }

    /// Forget the accepted value and any pending check (tab switch).
    pub fn reset(&mut self) {
        self.last_accepted.clear();
        self.pending = None;
    }
}

impl Default for DateField {
    fn default() -> Self {
        Self::new()
    }
}
