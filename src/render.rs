//! Render planning for image pages.
//!
//! Turns a fetched [`ImagePage`] into an ordered display plan. The GUI
//! repaints the active tab from the plan; keeping the step pure keeps
//! ordering, role priority, and placeholder states checkable without a
//! window.

use tracing::warn;

use crate::models::{ImageGroup, ImagePage, ImageRole, image_url_path};

/// Placeholder shown when a page has no image groups.
pub const EMPTY_MESSAGE: &str = "No Images Found";

/// Placeholder shown when a page fetch failed outright.
pub const FAILURE_MESSAGE: &str = "Unable to retrieve images";

/// One image resolved for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Role within the group
    pub role: ImageRole,
    /// Original backend filename
    pub filename: String,
    /// Derived retrieval path under `getImage/`
    pub path: String,
}

/// One group block in the image row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGroup {
    /// Images in fixed role-priority order
    pub images: Vec<RenderedImage>,
    /// Set on the newest group; revealed only after an explicit date pick
    pub highlight: bool,
}

/// Plan for repainting the image row of the active tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPlan {
    /// Zero groups: show [`EMPTY_MESSAGE`]
    Empty,
    /// Groups in display order, oldest first
    Groups(Vec<RenderedGroup>),
}

/// Build the display plan for a page.
///
/// The backend returns groups newest-first; the row always displays
/// oldest-first, so groups are emitted in reverse order of receipt. The
/// last (newest) group carries the highlight marker.
#[must_use]
pub fn plan(page: &ImagePage) -> RenderPlan {
    if page.is_empty() {
        return RenderPlan::Empty;
    }

    let mut groups: Vec<RenderedGroup> = page.files.iter().rev().map(plan_group).collect();
    if let Some(newest) = groups.last_mut() {
        newest.highlight = true;
    }
    RenderPlan::Groups(groups)
}

/// Resolve one group's images in fixed role priority.
///
/// A group missing a role is normal and skipped silently; a filename the
/// path parser rejects is skipped with a warning rather than erroring
/// the whole page.
fn plan_group(group: &ImageGroup) -> RenderedGroup {
    let mut images = Vec::new();
    for role in ImageRole::DISPLAY_ORDER {
        let Some(filename) = group.find_role(role) else {
            continue;
        };
        match image_url_path(filename) {
            Ok(path) => images.push(RenderedImage {
                role,
                filename: filename.to_string(),
                path,
            }),
            Err(err) => warn!("skipping undisplayable image name: {err}"),
        }
    }
    RenderedGroup {
        images,
        highlight: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cursor;

    fn page_of(files: Vec<Vec<&str>>) -> ImagePage {
        ImagePage {
            files: files
                .into_iter()
                .map(|group| ImageGroup(group.into_iter().map(String::from).collect()))
                .collect(),
            prev: Some(Cursor::Epoch(100.0)),
            next: None,
        }
    }

    #[test]
    fn test_empty_page_plans_placeholder() {
        let plan = plan(&page_of(vec![]));
        assert_eq!(plan, RenderPlan::Empty);
    }

    #[test]
    fn test_groups_reverse_to_oldest_first() {
        // Backend order: newest (12:20) first.
        let plan = plan(&page_of(vec![
            vec!["pavlof_20230405_1220_slice.png"],
            vec!["pavlof_20230405_1210_slice.png"],
            vec!["pavlof_20230405_1200_slice.png"],
        ]));

        let RenderPlan::Groups(groups) = plan else {
            panic!("expected groups");
        };
        assert_eq!(groups.len(), 3);
        assert!(groups[0].images[0].filename.contains("_1200_"));
        assert!(groups[1].images[0].filename.contains("_1210_"));
        assert!(groups[2].images[0].filename.contains("_1220_"));
    }

    #[test]
    fn test_role_priority_order_within_group() {
        // Receipt order scrambled; plan emits slice, recsec, wfs.
        let plan = plan(&page_of(vec![vec![
            "semi_20230405_1200_wfs.png",
            "semi_20230405_1200_slice.png",
            "semi_20230405_1200_recsec.png",
        ]]));

        let RenderPlan::Groups(groups) = plan else {
            panic!("expected groups");
        };
        let roles: Vec<ImageRole> = groups[0].images.iter().map(|img| img.role).collect();
        assert_eq!(
            roles,
            vec![ImageRole::Slice, ImageRole::RecordSection, ImageRole::Waveform]
        );
    }

    #[test]
    fn test_missing_role_skipped_silently() {
        let plan = plan(&page_of(vec![vec!["semi_20230405_1200_combined.png"]]));

        let RenderPlan::Groups(groups) = plan else {
            panic!("expected groups");
        };
        assert_eq!(groups[0].images.len(), 1);
        assert_eq!(groups[0].images[0].role, ImageRole::Combined);
    }

    #[test]
    fn test_unparseable_filename_skipped() {
        let plan = plan(&page_of(vec![vec![
            "badname-slice.png",
            "semi_20230405_1200_wfs.png",
        ]]));

        let RenderPlan::Groups(groups) = plan else {
            panic!("expected groups");
        };
        assert_eq!(groups[0].images.len(), 1);
        assert_eq!(groups[0].images[0].role, ImageRole::Waveform);
    }

    #[test]
    fn test_highlight_marks_only_newest_group() {
        let plan = plan(&page_of(vec![
            vec!["pavlof_20230405_1210_slice.png"],
            vec!["pavlof_20230405_1200_slice.png"],
        ]));

        let RenderPlan::Groups(groups) = plan else {
            panic!("expected groups");
        };
        assert!(!groups[0].highlight);
        assert!(groups[1].highlight);
    }

    #[test]
    fn test_derived_paths_split_date_segments() {
        let plan = plan(&page_of(vec![vec!["pavlof_20230405_1200_slice.png"]]));

        let RenderPlan::Groups(groups) = plan else {
            panic!("expected groups");
        };
        assert_eq!(
            groups[0].images[0].path,
            "pavlof/2023/04/05/pavlof_20230405_1200_slice.png"
        );
    }
}
