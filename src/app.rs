//! Dashboard window.
//!
//! eframe/egui application wiring the navigation controller, image
//! renderer, date field, and detection chart together. Network fetches
//! run blocking on spawned worker threads with results delivered over
//! mpsc channels; every page and detection fetch carries a request token
//! so stale responses are dropped instead of racing the newest one.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use eframe::egui::{
    self, Color32, ColorImage, Context, RichText, Stroke, TextureHandle, TextureOptions,
};
use egui_plot::{Plot, PlotBounds, PlotPoints, Points};
use tracing::{debug, warn};

use crate::chart::{self, ChartPoint};
use crate::client::DashboardClient;
use crate::errors::InfraviewError;
use crate::layout;
use crate::models::{DetectionSeries, ImagePage};
use crate::picker::{DateField, PLACEHOLDER};
use crate::render::{self, RenderPlan};
use crate::view::{FetchMode, RequestToken, ViewState};

/// Width reserved for each nav control flanking the image row.
const NAV_WIDTH: f32 = 48.0;

/// Height of the detection chart panel.
const CHART_HEIGHT: f32 = 280.0;

/// How long the highlight holds before fading.
const HIGHLIGHT_HOLD: Duration = Duration::from_secs(2);

/// Duration of the highlight fade-out.
const HIGHLIGHT_FADE: Duration = Duration::from_secs(1);

/// Color bins used to approximate the continuous distance scale.
const COLOR_BINS: usize = 24;

/// Most uploaded image textures kept alive at once.
///
/// Textures shown by the current plan are never evicted, so the cap is
/// sized well above one page's worth of images.
const TEXTURE_CACHE_LIMIT: usize = 48;

/// State of the active tab's image panel.
enum PanelState {
    /// A page fetch is outstanding
    Loading,
    /// The last fetch failed; message is scoped to the volcano
    Failed(String),
    /// A fetched page, planned for display
    Page(RenderPlan),
}

struct PageResult {
    token: RequestToken,
    volcano: String,
    result: Result<ImagePage, InfraviewError>,
}

struct DetectionResult {
    token: RequestToken,
    volcano: String,
    result: Result<DetectionSeries, InfraviewError>,
}

struct ImageResult {
    path: String,
    result: Result<ColorImage, String>,
}

/// Deferred chart interaction, resolved after plot borrows end.
enum ChartAction {
    PointClicked(ChartPoint),
    DownloadCsv,
}

/// The dashboard application.
pub struct DashboardApp {
    client: Arc<DashboardClient>,
    view: ViewState,
    date_field: DateField,
    /// Whether the date field still has focus (the picker-open query)
    picker_open: bool,
    /// First-frame bootstrap done
    started: bool,
    panel: PanelState,
    /// When the newest-group highlight was revealed
    highlight_started: Option<Instant>,
    page_tx: Sender<PageResult>,
    page_rx: Receiver<PageResult>,
    detection_tx: Sender<DetectionResult>,
    detection_rx: Receiver<DetectionResult>,
    image_tx: Sender<ImageResult>,
    image_rx: Receiver<ImageResult>,
    /// Fetched detection series, by volcano
    detections: HashMap<String, DetectionSeries>,
    /// Plottable points parallel to `detections`
    points: HashMap<String, Vec<ChartPoint>>,
    /// Failed detection fetches, by volcano; cleared on retry
    detection_failures: HashMap<String, String>,
    /// Uploaded image textures, by retrieval path
    textures: HashMap<String, TextureHandle>,
    /// Texture paths in upload order, oldest first, for eviction
    texture_order: VecDeque<String>,
    /// Image fetches in flight
    pending_images: HashSet<String>,
    status_line: String,
}

impl DashboardApp {
    /// Create the dashboard against the given backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(server: &str, volcanoes: Vec<String>) -> Result<Self, InfraviewError> {
        let client = Arc::new(DashboardClient::new(server)?);
        let (page_tx, page_rx) = mpsc::channel();
        let (detection_tx, detection_rx) = mpsc::channel();
        let (image_tx, image_rx) = mpsc::channel();

        Ok(Self {
            client,
            view: ViewState::new(volcanoes),
            date_field: DateField::new(),
            picker_open: false,
            started: false,
            panel: PanelState::Loading,
            highlight_started: None,
            page_tx,
            page_rx,
            detection_tx,
            detection_rx,
            image_tx,
            image_rx,
            detections: HashMap::new(),
            points: HashMap::new(),
            detection_failures: HashMap::new(),
            textures: HashMap::new(),
            texture_order: VecDeque::new(),
            pending_images: HashSet::new(),
            status_line: String::new(),
        })
    }

    /// Start a page fetch for the active volcano in the given mode.
    fn start_page_fetch(&mut self, mode: &FetchMode) {
        let volcano = self.view.current_volcano().to_string();
        let count = self.view.image_count();
        let cursor = mode.cursor().cloned();
        let token = self.view.issue_page_token();
        self.panel = PanelState::Loading;

        let client = Arc::clone(&self.client);
        let tx = self.page_tx.clone();
        thread::spawn(move || {
            let result = client.fetch_page(&volcano, count, cursor.as_ref());
            let _ = tx.send(PageResult {
                token,
                volcano,
                result,
            });
        });
    }

    /// Start a detections fetch for the active volcano.
    fn start_detection_fetch(&mut self) {
        let volcano = self.view.current_volcano().to_string();
        let token = self.view.issue_detection_token();
        self.detection_failures.remove(&volcano);

        let client = Arc::clone(&self.client);
        let tx = self.detection_tx.clone();
        thread::spawn(move || {
            let result = client.fetch_detections(&volcano);
            let _ = tx.send(DetectionResult {
                token,
                volcano,
                result,
            });
        });
    }

    /// Start fetching and decoding one image, unless already present or
    /// in flight.
    fn start_image_fetch(&mut self, path: String) {
        if self.textures.contains_key(&path) || !self.pending_images.insert(path.clone()) {
            return;
        }

        let client = Arc::clone(&self.client);
        let tx = self.image_tx.clone();
        thread::spawn(move || {
            let result = client
                .fetch_image(&path)
                .map_err(|err| format!("{err:#}"))
                .and_then(|bytes| decode_color_image(&bytes));
            let _ = tx.send(ImageResult { path, result });
        });
    }

    /// Switch tabs: reset cursor and date state, re-derive chart and a
    /// live image page for the newly selected volcano.
    fn select_volcano(&mut self, volcano: &str) {
        if !self.view.select_volcano(volcano) {
            return;
        }
        self.date_field.reset();
        self.highlight_started = None;
        self.status_line.clear();
        self.start_detection_fetch();
        let mode = self.view.mode().clone();
        self.start_page_fetch(&mode);
    }

    /// Apply finished fetches from the worker channels.
    fn drain_results(&mut self, ctx: &Context) {
        while let Ok(message) = self.page_rx.try_recv() {
            if !self.view.page_token_current(message.token) {
                debug!("discarding stale page response for {}", message.volcano);
                continue;
            }
            match message.result {
                Ok(page) => {
                    self.view.apply_page(&message.volcano, &page);
                    let plan = render::plan(&page);
                    if let RenderPlan::Groups(groups) = &plan {
                        for group in groups {
                            for image in &group.images {
                                self.start_image_fetch(image.path.clone());
                            }
                        }
                    }
                    if self.view.take_highlight() && matches!(plan, RenderPlan::Groups(_)) {
                        self.highlight_started = Some(Instant::now());
                    }
                    self.panel = PanelState::Page(plan);
                    self.status_line.clear();
                }
                Err(err) => {
                    warn!("{err:#}");
                    self.panel = PanelState::Failed(format!(
                        "{} for {}",
                        render::FAILURE_MESSAGE,
                        message.volcano
                    ));
                }
            }
        }

        while let Ok(message) = self.detection_rx.try_recv() {
            if !self.view.detection_token_current(message.token) {
                debug!("discarding stale detections for {}", message.volcano);
                continue;
            }
            match message.result {
                Ok(series) => {
                    self.detection_failures.remove(&message.volcano);
                    self.points
                        .insert(message.volcano.clone(), chart::chart_points(&series));
                    self.detections.insert(message.volcano, series);
                }
                Err(err) => {
                    warn!("{err:#}");
                    self.detection_failures.insert(
                        message.volcano.clone(),
                        format!("Unable to retrieve detections for {}", message.volcano),
                    );
                }
            }
        }

        while let Ok(message) = self.image_rx.try_recv() {
            self.pending_images.remove(&message.path);
            match message.result {
                Ok(color_image) => {
                    let texture = ctx.load_texture(
                        format!("image:{}", message.path),
                        color_image,
                        TextureOptions::LINEAR,
                    );
                    if self.textures.insert(message.path.clone(), texture).is_none() {
                        self.texture_order.push_back(message.path);
                    }
                    self.evict_stale_textures();
                }
                Err(err) => warn!("image {} failed: {err}", message.path),
            }
        }
    }

    /// Drop the oldest textures beyond the cache cap, keeping anything
    /// the current plan still displays.
    fn evict_stale_textures(&mut self) {
        if self.textures.len() <= TEXTURE_CACHE_LIMIT {
            return;
        }

        let visible: HashSet<&str> = match &self.panel {
            PanelState::Page(RenderPlan::Groups(groups)) => groups
                .iter()
                .flat_map(|group| group.images.iter().map(|image| image.path.as_str()))
                .collect(),
            _ => HashSet::new(),
        };

        let mut kept = VecDeque::with_capacity(self.texture_order.len());
        while let Some(path) = self.texture_order.pop_front() {
            if self.textures.len() <= TEXTURE_CACHE_LIMIT || visible.contains(path.as_str()) {
                kept.push_back(path);
                continue;
            }
            self.textures.remove(&path);
        }
        self.texture_order = kept;
    }

    /// Top row: volcano tabs, date field, manual refresh.
    fn controls_ui(&mut self, ui: &mut egui::Ui, now: Instant) {
        ui.horizontal(|ui| {
            let names: Vec<String> = self.view.volcanoes().to_vec();
            let mut clicked = None;
            for name in &names {
                let selected = name == self.view.current_volcano();
                if ui.selectable_label(selected, name).clicked() && !selected {
                    clicked = Some(name.clone());
                }
            }
            if let Some(name) = clicked {
                self.select_volcano(&name);
            }

            ui.separator();

            let response = ui.add(
                egui::TextEdit::singleline(self.date_field.buffer_mut())
                    .desired_width(150.0)
                    .hint_text(PLACEHOLDER),
            );
            // Focus doubles as the "picker popup still open" query: the
            // deferred check only runs once editing has actually ended.
            self.picker_open = response.has_focus();
            if response.lost_focus() {
                self.date_field.on_close(now);
            }

            let refresh =
                ui.add_enabled(self.view.refresh_enabled(), egui::Button::new("Current"));
            if refresh.clicked() {
                let mode = self.view.go_live();
                self.start_page_fetch(&mode);
            }

            if !self.status_line.is_empty() {
                ui.label(RichText::new(&self.status_line).color(Color32::LIGHT_RED));
            }
        });
    }

    /// Image row: prev control, rendered groups oldest-first, next
    /// control.
    fn images_ui(&mut self, ui: &mut egui::Ui, now: Instant) {
        let row_height = ui.available_height();
        let highlight = self.highlight_alpha(now);

        let mut go_prev = false;
        let mut go_next = false;

        ui.horizontal(|ui| {
            let prev = ui.add_enabled(
                self.view.prev_enabled(),
                egui::Button::new("◀").min_size(egui::vec2(NAV_WIDTH, row_height * 0.5)),
            );
            go_prev = prev.clicked();

            let group_width = layout::GROUP_WIDTH - 2.0 * NAV_WIDTH / 3.0;
            egui::ScrollArea::horizontal()
                .max_width(ui.available_width() - NAV_WIDTH - 8.0)
                .show(ui, |ui| match &self.panel {
                    PanelState::Loading => {
                        ui.centered_and_justified(|ui| {
                            ui.spinner();
                        });
                    }
                    PanelState::Failed(message) => {
                        ui.centered_and_justified(|ui| {
                            ui.label(RichText::new(message).color(Color32::LIGHT_RED));
                        });
                    }
                    PanelState::Page(RenderPlan::Empty) => {
                        ui.centered_and_justified(|ui| {
                            ui.label(RichText::new(render::EMPTY_MESSAGE).weak());
                        });
                    }
                    PanelState::Page(RenderPlan::Groups(groups)) => {
                        for group in groups {
                            let stroke = if group.highlight {
                                highlight.map(|alpha| {
                                    Stroke::new(
                                        3.0,
                                        Color32::from_rgba_unmultiplied(255, 196, 0, alpha),
                                    )
                                })
                            } else {
                                None
                            };

                            let frame = match stroke {
                                Some(stroke) => egui::Frame::group(ui.style()).stroke(stroke),
                                None => egui::Frame::group(ui.style()),
                            };
                            frame.show(ui, |ui| {
                                ui.vertical(|ui| {
                                    ui.set_width(group_width);
                                    for image in &group.images {
                                        match self.textures.get(&image.path) {
                                            Some(texture) => {
                                                ui.add(
                                                    egui::Image::new(texture)
                                                        .max_width(group_width),
                                                );
                                            }
                                            None => {
                                                ui.spinner();
                                            }
                                        }
                                    }
                                });
                            });
                        }
                    }
                });

            let next = ui.add_enabled(
                self.view.next_enabled(),
                egui::Button::new("▶").min_size(egui::vec2(NAV_WIDTH, row_height * 0.5)),
            );
            go_next = next.clicked();
        });

        if go_prev {
            let mode = self.view.go_prev();
            self.start_page_fetch(&mode);
        }
        if go_next {
            let mode = self.view.go_next();
            self.start_page_fetch(&mode);
        }
    }

    /// Detection scatter with point-click navigation and a
    /// hover-revealed CSV download affordance.
    fn chart_ui(&mut self, ui: &mut egui::Ui, now: Instant) {
        let volcano = self.view.current_volcano().to_string();
        if let Some(message) = self.detection_failures.get(&volcano) {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new(message).color(Color32::LIGHT_RED));
            });
            return;
        }
        let Some(series) = self.detections.get(&volcano) else {
            ui.centered_and_justified(|ui| {
                ui.spinner();
            });
            return;
        };

        let max_dist = series.max_dist;
        let points = self.points.get(&volcano).map_or(&[][..], Vec::as_slice);

        let now_epoch = chrono::Utc::now().timestamp() as f64;
        // Top of the x-range is always the present, matching the
        // original chart's transparent "current date" marker.
        let x_max = now_epoch;
        let x_min = points
            .first()
            .map_or(now_epoch - 86_400.0, |point| point.epoch);

        let mut action: Option<ChartAction> = None;

        ui.horizontal(|ui| {
            ui.label(RichText::new("Stack Amp").weak());
            ui.label(
                RichText::new(format!("(distance 0 m red → {max_dist:.0} m blue)")).weak(),
            );
        });

        let plot_response = Plot::new(("detections", volcano.clone()))
            .height(ui.available_height() - 4.0)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .show(ui, |plot_ui| {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [x_min, chart::Y_AXIS_RANGE.0],
                    [x_max, chart::Y_AXIS_RANGE.1],
                ));

                // One Points element per color bin approximates the
                // continuous distance scale.
                let mut bins: Vec<Vec<[f64; 2]>> = vec![Vec::new(); COLOR_BINS];
                for point in points {
                    let t = if max_dist > 0.0 {
                        (point.distance / max_dist).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    let index = ((t * COLOR_BINS as f64) as usize).min(COLOR_BINS - 1);
                    bins[index].push([point.epoch, point.value]);
                }
                for (index, bin) in bins.into_iter().enumerate() {
                    if bin.is_empty() {
                        continue;
                    }
                    let bin_distance = max_dist * (index as f64 + 0.5) / COLOR_BINS as f64;
                    plot_ui.points(
                        Points::new(PlotPoints::from(bin))
                            .color(chart::distance_color(bin_distance, max_dist))
                            .radius(3.0),
                    );
                }

                if plot_ui.response().clicked() {
                    plot_ui.pointer_coordinate()
                } else {
                    None
                }
            });

        if let Some(click) = plot_response.inner {
            let x_tolerance = ((x_max - x_min) / 100.0).max(1.0);
            let y_tolerance = (chart::Y_AXIS_RANGE.1 - chart::Y_AXIS_RANGE.0) / 20.0;
            if let Some(point) =
                chart::nearest_point(points, click.x, click.y, x_tolerance, y_tolerance)
            {
                action = Some(ChartAction::PointClicked(point.clone()));
            }
        }

        let chart_rect = plot_response.response.rect;
        if ui.rect_contains_pointer(chart_rect) && !series.is_empty() {
            egui::Area::new(egui::Id::new("csv-download"))
                .fixed_pos(chart_rect.right_top() + egui::vec2(-96.0, 8.0))
                .show(ui.ctx(), |ui| {
                    if ui.button("⬇ CSV").clicked() {
                        action = Some(ChartAction::DownloadCsv);
                    }
                });
        }

        match action {
            Some(ChartAction::PointClicked(point)) => {
                // A chart click behaves exactly like typing the point's
                // time into the date field.
                self.date_field.set_value(&point.picker_text(), now);
            }
            Some(ChartAction::DownloadCsv) => self.download_csv(&volcano),
            None => {}
        }
    }

    /// Serialize the active volcano's series and save it where the user
    /// chooses.
    fn download_csv(&mut self, volcano: &str) {
        let Some(series) = self.detections.get(volcano) else {
            return;
        };
        let file_name = chart::csv_file_name(volcano, series);
        let csv = chart::to_csv(series);

        if let Some(path) = rfd::FileDialog::new().set_file_name(file_name).save_file() {
            match std::fs::write(&path, csv) {
                Ok(()) => self.status_line = format!("Saved {}", path.display()),
                Err(err) => self.status_line = format!("CSV save failed: {err}"),
            }
        }
    }

    /// Current highlight opacity, or `None` once faded out.
    ///
    /// Holds fully visible for [`HIGHLIGHT_HOLD`], then fades linearly
    /// over [`HIGHLIGHT_FADE`].
    fn highlight_alpha(&mut self, now: Instant) -> Option<u8> {
        let started = self.highlight_started?;
        let elapsed = now.saturating_duration_since(started);
        if elapsed < HIGHLIGHT_HOLD {
            return Some(255);
        }
        let fade = elapsed - HIGHLIGHT_HOLD;
        if fade >= HIGHLIGHT_FADE {
            self.highlight_started = None;
            return None;
        }
        let t = fade.as_secs_f32() / HIGHLIGHT_FADE.as_secs_f32();
        Some(((1.0 - t) * 255.0) as u8)
    }

    /// Whether any fetch is still outstanding.
    ///
    /// A recorded detection failure counts as settled, not pending, so a
    /// failed fetch does not keep the repaint loop spinning.
    fn has_pending_work(&self) -> bool {
        let volcano = self.view.current_volcano();
        let detections_pending = !self.detections.contains_key(volcano)
            && !self.detection_failures.contains_key(volcano);

        matches!(self.panel, PanelState::Loading) || !self.pending_images.is_empty() || detections_pending
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.drain_results(ctx);

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            self.controls_ui(ui, now);
        });
        egui::TopBottomPanel::bottom("chart")
            .exact_height(CHART_HEIGHT)
            .show(ctx, |ui| {
                self.chart_ui(ui, now);
            });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.images_ui(ui, now);
        });

        // Deferred date check, once the debounce deadline passes.
        if let Some(cursor) = self.date_field.poll(now, self.picker_open) {
            let mode = self.view.browse_to(cursor);
            self.start_page_fetch(&mode);
        }

        // Density watch: refetch in the current mode when the viewport
        // now fits a different number of groups.
        let count = layout::image_count(ctx.screen_rect().width(), NAV_WIDTH);
        if self.started {
            if let Some(mode) = self.view.resize(count) {
                self.start_page_fetch(&mode);
            }
        } else {
            self.started = true;
            let _ = self.view.resize(count);
            self.start_detection_fetch();
            let mode = self.view.mode().clone();
            self.start_page_fetch(&mode);
        }

        if self.has_pending_work() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
        if self.highlight_started.is_some() {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }
}

/// Decode fetched image bytes into an egui color image.
fn decode_color_image(bytes: &[u8]) -> Result<ColorImage, String> {
    let decoded = image::load_from_memory(bytes).map_err(|err| err.to_string())?;
    let rgba = decoded.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::ImageRole;
    use crate::render::{RenderedGroup, RenderedImage};

    fn test_app() -> DashboardApp {
        DashboardApp::new("http://localhost:5000", vec!["pavlof".to_string()])
            .expect("app builds")
    }

    #[test]
    fn test_failed_detection_fetch_settles_chart_state() {
        let mut app = test_app();
        app.panel = PanelState::Page(RenderPlan::Empty);

        let token = app.view.issue_detection_token();
        app.detection_tx
            .send(DetectionResult {
                token,
                volcano: "pavlof".to_string(),
                result: Err(InfraviewError::Api {
                    status: 500,
                    message: "boom".to_string(),
                }),
            })
            .expect("channel open");

        let ctx = egui::Context::default();
        app.drain_results(&ctx);

        // The failure is recorded against the volcano and the repaint
        // loop goes idle instead of spinning on a fetch that already
        // resolved.
        assert!(app.detection_failures["pavlof"].contains("pavlof"));
        assert!(!app.has_pending_work());

        // A retry clears the recorded failure so the spinner returns.
        app.start_detection_fetch();
        assert!(!app.detection_failures.contains_key("pavlof"));
    }

    #[test]
    fn test_texture_cache_caps_total_and_keeps_visible() {
        let mut app = test_app();
        let visible_path = "pavlof/2023/04/05/pavlof_20230405_1200_slice.png".to_string();
        app.panel = PanelState::Page(RenderPlan::Groups(vec![RenderedGroup {
            images: vec![RenderedImage {
                role: ImageRole::Slice,
                filename: "pavlof_20230405_1200_slice.png".to_string(),
                path: visible_path.clone(),
            }],
            highlight: false,
        }]));

        app.image_tx
            .send(ImageResult {
                path: visible_path.clone(),
                result: Ok(ColorImage::new([1, 1], Color32::WHITE)),
            })
            .expect("channel open");
        for index in 0..(TEXTURE_CACHE_LIMIT + 10) {
            app.image_tx
                .send(ImageResult {
                    path: format!("pavlof/2023/04/05/extra_{index}.png"),
                    result: Ok(ColorImage::new([1, 1], Color32::WHITE)),
                })
                .expect("channel open");
        }

        let ctx = egui::Context::default();
        app.drain_results(&ctx);

        assert!(app.textures.len() <= TEXTURE_CACHE_LIMIT);
        assert!(app.textures.contains_key(&visible_path));
        assert_eq!(app.textures.len(), app.texture_order.len());
    }

    #[test]
    fn test_decode_color_image_accepts_png() {
        // Smallest valid image: 1x1 white PNG.
        let mut bytes = Vec::new();
        let buffer = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        image::DynamicImage::ImageRgba8(buffer)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .expect("png encodes");

        let color_image = decode_color_image(&bytes).expect("png decodes");
        assert_eq!(color_image.size, [1, 1]);
    }

    #[test]
    fn test_decode_color_image_rejects_garbage() {
        assert!(decode_color_image(b"not an image").is_err());
    }
}
