//! Dashboard view state and navigation resolution.
//!
//! One `ViewState` record owns everything the original page kept in
//! ambient scope or stashed on DOM nodes: the active volcano, the live
//! or browse fetch mode, images-per-row, and typed per-volcano
//! navigation cursors. Handlers receive it by reference and resolve each
//! discrete UI event into at most one fetch+render cycle.

use std::collections::HashMap;

use crate::models::{Cursor, ImagePage};

/// How the image page is currently being fetched.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchMode {
    /// Most recent page, no cursor persisted
    #[default]
    Live,
    /// Page anchored at an explicit stop cursor
    Browse(Cursor),
}

impl FetchMode {
    /// The cursor to send with a page request, if any.
    #[must_use]
    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            Self::Live => None,
            Self::Browse(cursor) => Some(cursor),
        }
    }
}

/// Typed navigation cursors for one volcano tab.
///
/// `forward` walks toward newer pages, `backward` toward older ones.
#[derive(Debug, Clone, Default)]
pub struct NavState {
    /// Cursor for the next-newer page; `None` disables the next control
    pub forward: Option<Cursor>,
    /// Cursor for the next-older page; `None` disables the prev control
    pub backward: Option<Cursor>,
}

/// Token identifying one issued fetch.
///
/// Fetches run concurrently with UI events, so every request carries the
/// token it was issued under and only the most recently issued token's
/// response is applied. Stale responses are dropped instead of racing
/// last-write-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

/// State owned by the navigation controller.
#[derive(Debug)]
pub struct ViewState {
    /// Tab set, in display order
    volcanoes: Vec<String>,
    /// Index of the active tab
    current: usize,
    /// Live or browse fetch mode for the active tab
    mode: FetchMode,
    /// Images-per-row last used for a fetch
    image_count: usize,
    /// Per-volcano navigation cursors from the last applied page
    nav: HashMap<String, NavState>,
    /// Set when the next rendered page came from an explicit date pick
    highlight_pending: bool,
    /// Sequence for page fetch tokens
    page_seq: u64,
    /// Sequence for detection fetch tokens
    detection_seq: u64,
}

impl ViewState {
    /// Create view state over the given tab set.
    ///
    /// # Panics
    ///
    /// Panics if the tab set is empty; the dashboard needs at least one
    /// volcano.
    #[must_use]
    pub fn new(volcanoes: Vec<String>) -> Self {
        assert!(!volcanoes.is_empty(), "at least one volcano required");

        Self {
            volcanoes,
            current: 0,
            mode: FetchMode::Live,
            image_count: 1,
            nav: HashMap::new(),
            highlight_pending: false,
            page_seq: 0,
            detection_seq: 0,
        }
    }

    /// The tab set, in display order.
    #[must_use]
    pub fn volcanoes(&self) -> &[String] {
        &self.volcanoes
    }

    /// The active volcano.
    #[must_use]
    pub fn current_volcano(&self) -> &str {
        &self.volcanoes[self.current]
    }

    /// The active fetch mode.
    #[must_use]
    pub fn mode(&self) -> &FetchMode {
        &self.mode
    }

    /// Images-per-row last used for a fetch.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// Switch to another tab, dropping any pending cursor.
    ///
    /// Returns `false` (and changes nothing) for an unknown volcano. The
    /// caller re-derives the detection chart and a live image page for
    /// the newly selected volcano.
    pub fn select_volcano(&mut self, volcano: &str) -> bool {
        let Some(index) = self.volcanoes.iter().position(|name| name == volcano) else {
            return false;
        };
        self.current = index;
        self.mode = FetchMode::Live;
        self.highlight_pending = false;
        true
    }

    /// Record the cursors from a freshly applied page.
    pub fn apply_page(&mut self, volcano: &str, page: &ImagePage) {
        self.nav.insert(
            volcano.to_string(),
            NavState {
                forward: page.next.clone(),
                backward: page.prev.clone(),
            },
        );
    }

    /// Navigation cursors for the active volcano.
    #[must_use]
    pub fn nav_state(&self) -> NavState {
        self.nav
            .get(self.current_volcano())
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the next (newer) control is enabled.
    #[must_use]
    pub fn next_enabled(&self) -> bool {
        self.nav_state().forward.is_some()
    }

    /// Whether the prev (older) control is enabled.
    #[must_use]
    pub fn prev_enabled(&self) -> bool {
        self.nav_state().backward.is_some()
    }

    /// Whether the manual "current" refresh control is enabled.
    ///
    /// Gated by the forward cursor exactly like the next control: when
    /// `next` is null the page is already the newest and a live refresh
    /// would be redundant.
    #[must_use]
    pub fn refresh_enabled(&self) -> bool {
        self.next_enabled()
    }

    /// Resolve a next-button click into a fetch mode.
    ///
    /// An absent or non-positive target means "go live".
    pub fn go_next(&mut self) -> FetchMode {
        let target = self.nav_state().forward.filter(|c| c.is_usable());
        self.set_mode_from_target(target)
    }

    /// Resolve a prev-button click into a fetch mode.
    pub fn go_prev(&mut self) -> FetchMode {
        let target = self.nav_state().backward.filter(|c| c.is_usable());
        self.set_mode_from_target(target)
    }

    /// Resolve the manual refresh control: always a live fetch.
    pub fn go_live(&mut self) -> FetchMode {
        self.mode = FetchMode::Live;
        self.mode.clone()
    }

    /// Resolve an accepted date-picker value (or chart click) into a
    /// browse fetch, arming the highlight for the matched group.
    pub fn browse_to(&mut self, cursor: Cursor) -> FetchMode {
        self.mode = FetchMode::Browse(cursor);
        self.highlight_pending = true;
        self.mode.clone()
    }

    /// React to a viewport-width change.
    ///
    /// Returns the mode to re-fetch with when the images-per-row count
    /// actually changed — live stays live, browse keeps its cursor — and
    /// `None` when the density is unchanged.
    pub fn resize(&mut self, image_count: usize) -> Option<FetchMode> {
        if image_count == self.image_count {
            return None;
        }
        self.image_count = image_count;
        Some(self.mode.clone())
    }

    /// Consume the pending highlight flag, if armed.
    pub fn take_highlight(&mut self) -> bool {
        std::mem::take(&mut self.highlight_pending)
    }

    /// Issue a token for a page fetch, superseding earlier ones.
    pub fn issue_page_token(&mut self) -> RequestToken {
        self.page_seq += 1;
        RequestToken(self.page_seq)
    }

    /// Whether a page response with this token is still current.
    #[must_use]
    pub fn page_token_current(&self, token: RequestToken) -> bool {
        token.0 == self.page_seq
    }

    /// Issue a token for a detections fetch, superseding earlier ones.
    pub fn issue_detection_token(&mut self) -> RequestToken {
        self.detection_seq += 1;
        RequestToken(self.detection_seq)
    }

    /// Whether a detections response with this token is still current.
    #[must_use]
    pub fn detection_token_current(&self, token: RequestToken) -> bool {
        token.0 == self.detection_seq
    }

    fn set_mode_from_target(&mut self, target: Option<Cursor>) -> FetchMode {
        self.mode = match target {
            Some(cursor) => FetchMode::Browse(cursor),
            None => FetchMode::Live,
        };
        self.mode.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(prev: Option<Cursor>, next: Option<Cursor>) -> ImagePage {
        ImagePage {
            files: Vec::new(),
            prev,
            next,
        }
    }

    fn state() -> ViewState {
        ViewState::new(vec!["pavlof".to_string(), "semi".to_string()])
    }

    #[test]
    fn test_tab_switch_resets_cursor() {
        let mut view = state();
        view.browse_to(Cursor::Epoch(1_680_694_200.0));
        assert!(matches!(view.mode(), FetchMode::Browse(_)));

        assert!(view.select_volcano("semi"));
        assert_eq!(view.current_volcano(), "semi");
        assert_eq!(view.mode(), &FetchMode::Live);
        assert!(!view.take_highlight());
    }

    #[test]
    fn test_unknown_volcano_rejected() {
        let mut view = state();
        assert!(!view.select_volcano("erebus"));
        assert_eq!(view.current_volcano(), "pavlof");
    }

    #[test]
    fn test_null_next_disables_forward_and_refresh() {
        let mut view = state();
        view.apply_page("pavlof", &page(Some(Cursor::Epoch(100.0)), None));

        assert!(!view.next_enabled());
        assert!(!view.refresh_enabled());
        assert!(view.prev_enabled());

        view.apply_page("pavlof", &page(None, Some(Cursor::Epoch(200.0))));
        assert!(view.next_enabled());
        assert!(view.refresh_enabled());
        assert!(!view.prev_enabled());
    }

    #[test]
    fn test_nav_click_uses_stashed_target() {
        let mut view = state();
        view.apply_page(
            "pavlof",
            &page(Some(Cursor::Epoch(100.0)), Some(Cursor::Epoch(200.0))),
        );

        assert_eq!(view.go_prev(), FetchMode::Browse(Cursor::Epoch(100.0)));
        assert_eq!(view.go_next(), FetchMode::Browse(Cursor::Epoch(200.0)));
    }

    #[test]
    fn test_non_positive_target_goes_live() {
        let mut view = state();
        view.apply_page("pavlof", &page(Some(Cursor::Epoch(0.0)), None));

        assert_eq!(view.go_prev(), FetchMode::Live);
        assert_eq!(view.go_next(), FetchMode::Live);
    }

    #[test]
    fn test_resize_refetches_only_on_density_change() {
        let mut view = state();
        assert_eq!(view.image_count(), 1);
        assert!(view.resize(1).is_none());

        let cursor = Cursor::Epoch(1_680_694_200.0);
        view.browse_to(cursor.clone());
        // Density change while browsing re-issues the same browse request
        // instead of silently jumping back to live.
        assert_eq!(view.resize(3), Some(FetchMode::Browse(cursor)));
        assert_eq!(view.image_count(), 3);

        view.go_live();
        assert_eq!(view.resize(2), Some(FetchMode::Live));
    }

    #[test]
    fn test_date_pick_arms_highlight_once() {
        let mut view = state();
        view.browse_to(Cursor::Text("04/05/2023 12:00".into()));
        assert!(view.take_highlight());
        assert!(!view.take_highlight());
    }

    #[test]
    fn test_stale_page_token_discarded() {
        let mut view = state();
        let first = view.issue_page_token();
        let second = view.issue_page_token();

        assert!(!view.page_token_current(first));
        assert!(view.page_token_current(second));
    }

    #[test]
    fn test_detection_tokens_independent_of_page_tokens() {
        let mut view = state();
        let page_token = view.issue_page_token();
        let detection_token = view.issue_detection_token();

        assert!(view.page_token_current(page_token));
        assert!(view.detection_token_current(detection_token));

        let newer = view.issue_detection_token();
        assert!(!view.detection_token_current(detection_token));
        assert!(view.detection_token_current(newer));
        assert!(view.page_token_current(page_token));
    }
}
