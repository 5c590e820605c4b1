//! Data models for dashboard backend responses.
//!
//! These structures match the JSON emitted by the infrasound web backend
//! (`getImages`, `imageBrowse`, `getDetections`).

use std::fmt;

use chrono::NaiveDateTime;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::InfraviewError;

/// Date format used by the picker and accepted by `imageBrowse` (`m/d/Y H:i`).
pub const CURSOR_DATE_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Pagination boundary for a page request ("stop before this time").
///
/// The backend emits epoch-second numbers for `next`/`prev`, and the
/// `stop` query parameter additionally accepts the literal `m/d/Y H:i`
/// string typed into the date field. Both shapes are carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    /// Seconds since the Unix epoch, as returned in `next`/`prev`.
    Epoch(f64),
    /// A literal date string, as typed into the date field.
    Text(String),
}

impl Cursor {
    /// Whether this cursor can be used as a browse target.
    ///
    /// Mirrors the original `target > 0` gate: zero or negative epochs and
    /// blank strings mean "go live" instead.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        match self {
            Self::Epoch(seconds) => *seconds > 0.0,
            Self::Text(text) => !text.trim().is_empty(),
        }
    }

    /// Build a cursor from picker text, requiring a fully parsed value.
    ///
    /// Returns `None` for masked, partial, or otherwise malformed input.
    #[must_use]
    pub fn from_picker(text: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(text.trim(), CURSOR_DATE_FORMAT)
            .ok()
            .map(|_| Self::Text(text.trim().to_string()))
    }

    /// The value to send as the `stop` query parameter.
    #[must_use]
    pub fn query_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epoch(seconds) => write!(f, "{seconds}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Cursor {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// One page of image groups plus the cursors that drive navigation.
///
/// Canonical pagination contract is `prev`/`next`; the legacy `newest`
/// key some deployments emit is accepted as an alias for `prev`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagePage {
    /// Image groups, newest first as returned by the backend
    pub files: Vec<ImageGroup>,

    /// Cursor for the next-older page; `None` means no older images
    #[serde(default, alias = "newest")]
    pub prev: Option<Cursor>,

    /// Cursor for the next-newer page; `None` means already at the
    /// newest page
    #[serde(default)]
    pub next: Option<Cursor>,
}

impl ImagePage {
    /// Number of image groups in this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the page contains no image groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Role of an image within a group, derived from the filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// Time-slice location plot
    Slice,
    /// Record-section plot
    RecordSection,
    /// Waveform plot
    Waveform,
    /// Combined plot
    Combined,
}

impl ImageRole {
    /// Fixed display priority within a group.
    pub const DISPLAY_ORDER: [Self; 4] =
        [Self::Slice, Self::RecordSection, Self::Waveform, Self::Combined];

    /// The filename suffix tag identifying this role.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Slice => "slice",
            Self::RecordSection => "recsec",
            Self::Waveform => "wfs",
            Self::Combined => "combined",
        }
    }
}

/// An ordered set of plot filenames sharing one encoded timestamp.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ImageGroup(pub Vec<String>);

impl ImageGroup {
    /// Find the filename filling the given role, if the group has one.
    ///
    /// Matches on the base name (extension stripped) ending with the
    /// role's tag. A group may be missing any role; that is not an error.
    #[must_use]
    pub fn find_role(&self, role: ImageRole) -> Option<&str> {
        self.0.iter().map(String::as_str).find(|name| {
            let base = name.split('.').next().unwrap_or(name);
            base.ends_with(role.tag())
        })
    }

    /// Number of filenames in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the group holds no filenames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Derive the retrieval path for an image filename.
///
/// Filenames encode `{volcano}_{YYYYMMDD}_{HHMM...}_{suffix}.{ext}`; the
/// backend serves them from `getImage/{volc}/{yyyy}/{mm}/{dd}/{filename}`.
///
/// # Errors
///
/// Returns a validation error when the filename does not carry the
/// expected volcano and date tokens.
pub fn image_url_path(filename: &str) -> Result<String, InfraviewError> {
    let mut parts = filename.split('_');
    let volcano = parts
        .next()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            InfraviewError::Validation(format!("missing volcano token in filename: {filename}"))
        })?;
    let date = parts.next().ok_or_else(|| {
        InfraviewError::Validation(format!("missing date token in filename: {filename}"))
    })?;

    if date.len() < 8 || !date.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(InfraviewError::Validation(format!(
            "malformed date token '{date}' in filename: {filename}"
        )));
    }

    let year = &date[0..4];
    let month = &date[4..6];
    let day = &date[6..];
    Ok(format!("{volcano}/{year}/{month}/{day}/{filename}"))
}

/// Detection time series for one volcano.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionSeries {
    /// Maximum distance-to-center, used as the top of the color scale
    pub max_dist: f64,

    /// Parallel (time, stack amplitude, distance) columns
    #[serde(deserialize_with = "detection_columns")]
    pub detections: DetectionColumns,
}

impl DetectionSeries {
    /// Validate column alignment and scale bounds.
    ///
    /// # Errors
    ///
    /// Returns an error when the parallel columns disagree in length or
    /// the distance scale is not a usable number.
    pub fn validate(&self) -> Result<(), InfraviewError> {
        let times = self.detections.times.len();
        let values = self.detections.values.len();
        let distances = self.detections.distances.len();
        if times != values || times != distances {
            return Err(InfraviewError::Validation(format!(
                "detection columns disagree: {times} times, {values} values, {distances} distances"
            )));
        }
        if !self.max_dist.is_finite() || self.max_dist < 0.0 {
            return Err(InfraviewError::Validation(format!(
                "max_dist is not a usable distance: {}",
                self.max_dist
            )));
        }
        Ok(())
    }

    /// Number of detection events in the series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detections.times.len()
    }

    /// Whether the series holds no detections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detections.times.is_empty()
    }
}

/// Parallel detection columns: times, stack amplitudes, distances.
#[derive(Debug, Clone, Default)]
pub struct DetectionColumns {
    /// Event times, `YYYY-MM-DD HH:MM:SS` UTC strings
    pub times: Vec<String>,
    /// Stack amplitudes
    pub values: Vec<f64>,
    /// Distance to grid center in meters
    pub distances: Vec<f64>,
}

/// Deserialize the `detections` array.
///
/// The backend emits `[]` (not `[[],[],[]]`) for a volcano with no
/// detections, so an empty sequence maps to empty columns.
fn detection_columns<'de, D>(deserializer: D) -> Result<DetectionColumns, D::Error>
where
    D: Deserializer<'de>,
{
    struct ColumnsVisitor;

    impl<'de> Visitor<'de> for ColumnsVisitor {
        type Value = DetectionColumns;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("three parallel detection columns or an empty array")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let Some(times) = seq.next_element::<Vec<String>>()? else {
                return Ok(DetectionColumns::default());
            };
            let values = seq
                .next_element::<Vec<f64>>()?
                .ok_or_else(|| de::Error::invalid_length(1, &self))?;
            let distances = seq
                .next_element::<Vec<f64>>()?
                .ok_or_else(|| de::Error::invalid_length(2, &self))?;
            Ok(DetectionColumns {
                times,
                values,
                distances,
            })
        }
    }

    deserializer.deserialize_seq(ColumnsVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_page() {
        let json = include_str!("../tools/sample_page.json");
        let page: ImagePage = serde_json::from_str(json).expect("failed to parse sample page");

        assert_eq!(page.len(), 2);
        assert!(page.next.is_none());
        assert_eq!(page.prev, Some(Cursor::Epoch(1_680_694_200.0)));
        assert_eq!(page.files[0].len(), 3);
    }

    #[test]
    fn test_legacy_newest_alias_maps_to_prev() {
        let json = r#"{"files": [], "newest": 1680694200.0, "next": 1680698000.0}"#;
        let page: ImagePage = serde_json::from_str(json).expect("failed to parse legacy page");
        assert_eq!(page.prev, Some(Cursor::Epoch(1_680_694_200.0)));
        assert_eq!(page.next, Some(Cursor::Epoch(1_680_698_000.0)));
    }

    #[test]
    fn test_null_cursors_parse_as_none() {
        let json = r#"{"files": [["a_20230405_1200_slice.png"]], "prev": null, "next": null}"#;
        let page: ImagePage = serde_json::from_str(json).expect("failed to parse page");
        assert!(page.prev.is_none());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_cursor_usability() {
        assert!(Cursor::Epoch(1_680_694_200.0).is_usable());
        assert!(!Cursor::Epoch(0.0).is_usable());
        assert!(!Cursor::Epoch(-1.0).is_usable());
        assert!(Cursor::Text("04/05/2023 12:00".into()).is_usable());
        assert!(!Cursor::Text("   ".into()).is_usable());
    }

    #[test]
    fn test_cursor_from_picker() {
        assert_eq!(
            Cursor::from_picker("04/05/2023 12:00"),
            Some(Cursor::Text("04/05/2023 12:00".into()))
        );
        assert!(Cursor::from_picker("__/__/____ __:__").is_none());
        assert!(Cursor::from_picker("04/05/2023").is_none());
        assert!(Cursor::from_picker("").is_none());
    }

    #[test]
    fn test_cursor_query_value() {
        assert_eq!(Cursor::Epoch(1_680_694_200.0).query_value(), "1680694200");
        assert_eq!(
            Cursor::Text("04/05/2023 12:00".into()).query_value(),
            "04/05/2023 12:00"
        );
    }

    #[test]
    fn test_image_url_path_round_trip() {
        let path = image_url_path("VOLC_20230405_120000_slice.png").expect("valid filename");
        assert_eq!(path, "VOLC/2023/04/05/VOLC_20230405_120000_slice.png");
    }

    #[test]
    fn test_image_url_path_rejects_malformed_names() {
        assert!(image_url_path("noseparators.png").is_err());
        assert!(image_url_path("volc_2023_slice.png").is_err());
        assert!(image_url_path("volc_2023040x_slice.png").is_err());
        assert!(image_url_path("_20230405_slice.png").is_err());
    }

    #[test]
    fn test_find_role_matches_on_base_name() {
        let group = ImageGroup(vec![
            "pavlof_20230405_1200_wfs.png".into(),
            "pavlof_20230405_1200_slice.png".into(),
        ]);
        assert_eq!(
            group.find_role(ImageRole::Slice),
            Some("pavlof_20230405_1200_slice.png")
        );
        assert_eq!(
            group.find_role(ImageRole::Waveform),
            Some("pavlof_20230405_1200_wfs.png")
        );
        assert!(group.find_role(ImageRole::Combined).is_none());
        assert!(group.find_role(ImageRole::RecordSection).is_none());
    }

    #[test]
    fn test_parse_sample_detections() {
        let json = include_str!("../tools/sample_detections.json");
        let series: DetectionSeries =
            serde_json::from_str(json).expect("failed to parse sample detections");

        series.validate().expect("invalid series");
        assert_eq!(series.len(), 3);
        assert!((series.max_dist - 1414.2135623730951).abs() < 1e-9);
        assert_eq!(series.detections.times[0], "2023-04-05 12:00:00");
    }

    #[test]
    fn test_parse_empty_detections() {
        let json = r#"{"max_dist": 1414.2, "detections": []}"#;
        let series: DetectionSeries =
            serde_json::from_str(json).expect("failed to parse empty detections");
        series.validate().expect("invalid series");
        assert!(series.is_empty());
    }

    #[test]
    fn test_validate_rejects_mismatched_columns() {
        let json = r#"{"max_dist": 100.0, "detections": [["t1", "t2"], [0.9], [10.0]]}"#;
        let series: DetectionSeries =
            serde_json::from_str(json).expect("shape parses before validation");
        assert!(series.validate().is_err());
    }
}
