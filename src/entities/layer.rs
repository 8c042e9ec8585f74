//! Georeferencing layer: one raster placed on the map.
//!
//! # Architecture
//!
//! The layer owns the decoded [`RasterImage`], the committed [`Transform`],
//! its undo [`History`] and a flat [`Attrs`] mirror of everything that is
//! persisted. The typed fields are the source of truth while the session
//! runs; [`GeorefLayer::commit_transform_parameters`] writes them back to
//! attrs on every commit, and [`GeorefLayer::from_attrs`] reads them when a
//! session is loaded.
//!
//! # Lifecycle
//!
//! - `Uninitialized`: created from attrs or from "add layer", no pixels yet
//! - `Ready`: raster decoded, transform valid
//! - `Invalid`: file missing or undecodable; skipped by rendering, tools
//!   and further initialization attempts

use std::cell::Cell;
use std::path::{Path, PathBuf};

use glam::DVec2;
use log::{debug, info, warn};
use uuid::Uuid;

use super::attrs::Attrs;
use super::history::{History, HistoryEntry, HistoryKind};
use super::keys::*;
use super::layer_events::StatusMessageEvent;
use super::loader::{GeoreferenceProbe, Loader, RasterImage};
use super::transform::{Extent, ImageSize, Transform};
use crate::crs::{same_crs, Reprojector};
use crate::error::{GeorefError, Result};
use crate::paths;

pub const DEFAULT_TRANSPARENCY: i64 = 30;
pub const METERS_PER_INCH: f64 = 0.0254;

// =============================================================================
// Small value types
// =============================================================================

/// Initialization state of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerState {
    #[default]
    Uninitialized,
    Ready,
    Invalid,
}

/// Compositing mode used when drawing the raster over the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    SourceOver,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
    Plus,
}

impl BlendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::SourceOver => "SourceOver",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::Darken => "Darken",
            BlendMode::Lighten => "Lighten",
            BlendMode::Difference => "Difference",
            BlendMode::Plus => "Plus",
        }
    }

    /// Parse a stored name. Unknown names fall back to `SourceOver`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "Multiply" => BlendMode::Multiply,
            "Screen" => BlendMode::Screen,
            "Overlay" => BlendMode::Overlay,
            "Darken" => BlendMode::Darken,
            "Lighten" => BlendMode::Lighten,
            "Difference" => BlendMode::Difference,
            "Plus" => BlendMode::Plus,
            _ => BlendMode::SourceOver,
        }
    }
}

/// Initial scale rule for a freshly placed raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Paper scale denominator (`1:scale`). `None` fits the raster in the view.
    pub scale: Option<f64>,
    /// Screen resolution used with a paper scale
    pub dpi: f64,
}

impl Default for Placement {
    fn default() -> Self {
        Self { scale: None, dpi: 96.0 }
    }
}

/// Asks for a replacement when a stored raster path no longer exists.
pub trait PathResolver {
    fn resolve_missing(&self, path: &Path) -> Option<PathBuf>;
}

/// Collaborators and view state needed to initialize a layer.
pub struct LoadContext<'a> {
    /// Directory of the session file; relative raster paths resolve against it
    pub project_dir: Option<&'a Path>,
    pub resolver: Option<&'a dyn PathResolver>,
    pub probe: &'a dyn GeoreferenceProbe,
    pub reprojector: &'a dyn Reprojector,
    pub map_crs: Option<&'a str>,
    /// Visible map extent. Present only when the layer is being added (not
    /// restored from a session), which enables probing and default placement.
    pub screen_extent: Option<Extent>,
    pub placement: Placement,
}

/// Side effects of a successful initialization for the session to act on.
#[derive(Debug, Default)]
pub struct InitOutcome {
    /// The stored path was replaced through the resolver
    pub path_changed: bool,
    pub notices: Vec<StatusMessageEvent>,
}

// =============================================================================
// GeorefLayer
// =============================================================================

#[derive(Debug)]
pub struct GeorefLayer {
    id: Uuid,
    /// Persisted properties, rewritten on every commit
    pub attrs: Attrs,
    title: String,
    /// Stored path: session-relative when possible
    filepath: PathBuf,
    /// Resolved path of the loaded raster
    absolute_path: Option<PathBuf>,
    state: LayerState,
    image: Option<RasterImage>,
    transform: Transform,
    history: History,
    extent_cache: Cell<Option<Extent>>,
    transparency: i64,
    blend_mode: BlendMode,
    crs: Option<String>,
    tracks_map_crs: bool,
}

impl GeorefLayer {
    pub fn new(title: &str, filepath: impl Into<PathBuf>) -> Self {
        let mut layer = Self {
            id: Uuid::new_v4(),
            attrs: Attrs::new(),
            title: title.to_string(),
            filepath: filepath.into(),
            absolute_path: None,
            state: LayerState::Uninitialized,
            image: None,
            transform: Transform::default(),
            history: History::new(),
            extent_cache: Cell::new(None),
            transparency: DEFAULT_TRANSPARENCY,
            blend_mode: BlendMode::default(),
            crs: None,
            tracks_map_crs: true,
        };
        layer.write_attrs();
        layer
    }

    /// Restore a layer from persisted properties. Missing keys get the
    /// defaults of a freshly added layer.
    pub fn from_attrs(id: Uuid, attrs: Attrs) -> Self {
        let transform = Transform::new(
            DVec2::new(
                finite_or(attrs.get_float_or(A_X_CENTER, 0.0), 0.0),
                finite_or(attrs.get_float_or(A_Y_CENTER, 0.0), 0.0),
            ),
            finite_or(attrs.get_float_or(A_ROTATION, 0.0), 0.0),
            positive_or_one(attrs.get_float_or(A_X_SCALE, 1.0)),
            positive_or_one(attrs.get_float_or(A_Y_SCALE, 1.0)),
        );
        let mut layer = Self {
            id,
            title: attrs.get_str_or(A_TITLE, "").to_string(),
            filepath: PathBuf::from(attrs.get_str_or(A_FILEPATH, "")),
            absolute_path: None,
            state: LayerState::Uninitialized,
            image: None,
            transform,
            history: History::new(),
            extent_cache: Cell::new(None),
            transparency: attrs.get_int_or(A_TRANSPARENCY, DEFAULT_TRANSPARENCY).clamp(0, 100),
            blend_mode: BlendMode::from_str(attrs.get_str_or(A_BLEND_MODE, "SourceOver")),
            crs: attrs.get_str(A_CRS).map(str::to_string),
            tracks_map_crs: attrs.get_bool(A_TRACKS_MAP_CRS).unwrap_or(true),
            attrs,
        };
        layer.write_attrs();
        layer
    }

    // === Accessors ===

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn absolute_path(&self) -> Option<&Path> {
        self.absolute_path.as_deref()
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LayerState::Ready
    }

    pub fn image(&self) -> Option<&RasterImage> {
        self.image.as_ref()
    }

    pub fn size(&self) -> Option<ImageSize> {
        self.image.as_ref().map(|i| i.size())
    }

    /// Committed transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn transparency(&self) -> i64 {
        self.transparency
    }

    pub fn opacity(&self) -> f64 {
        1.0 - self.transparency as f64 / 100.0
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn tracks_map_crs(&self) -> bool {
        self.tracks_map_crs
    }

    /// Bounding box of the committed placement, cached until the next commit.
    pub fn extent(&self) -> Option<Extent> {
        if let Some(e) = self.extent_cache.get() {
            return Some(e);
        }
        let e = self.transform.extent(self.size()?);
        self.extent_cache.set(Some(e));
        Some(e)
    }

    fn ready_size(&self) -> Result<ImageSize> {
        match (self.state, self.size()) {
            (LayerState::Ready, Some(size)) => Ok(size),
            _ => Err(GeorefError::LayerNotReady(self.title.clone())),
        }
    }

    // === Lifecycle ===

    /// Resolve and decode the raster, then place it.
    ///
    /// No-op for layers that are already `Ready`. A failing layer is left
    /// `Invalid` and is never retried.
    pub fn initialize(&mut self, ctx: &LoadContext) -> Result<InitOutcome> {
        match self.state {
            LayerState::Ready => return Ok(InitOutcome::default()),
            LayerState::Invalid => return Err(GeorefError::LayerNotReady(self.title.clone())),
            LayerState::Uninitialized => {}
        }
        let mut outcome = InitOutcome::default();

        let path = match self.locate_file(ctx, &mut outcome) {
            Ok(p) => p,
            Err(e) => {
                warn!("Layer '{}': {}", self.title, e);
                self.state = LayerState::Invalid;
                return Err(e);
            }
        };
        let image = match Loader::decode(&path) {
            Ok(img) => img,
            Err(e) => {
                warn!("Layer '{}': {}", self.title, e);
                self.state = LayerState::Invalid;
                return Err(e);
            }
        };
        if self.title.is_empty() {
            self.title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        self.image = Some(image);
        self.absolute_path = Some(path.clone());
        self.state = LayerState::Ready;
        if self.crs.is_none() {
            self.crs = ctx.map_crs.map(str::to_string);
        }

        if let Some(screen) = ctx.screen_extent {
            self.place_new(&path, screen, ctx, &mut outcome);
        }
        self.commit_transform_parameters();
        info!("Layer '{}' ready ({})", self.title, path.display());
        Ok(outcome)
    }

    fn locate_file(&mut self, ctx: &LoadContext, outcome: &mut InitOutcome) -> Result<PathBuf> {
        let path = match ctx.project_dir {
            Some(dir) => paths::resolve_project_path(&self.filepath, dir),
            None => self.filepath.clone(),
        };
        if path.exists() {
            return Ok(path);
        }

        let replacement = ctx
            .resolver
            .and_then(|r| r.resolve_missing(&path))
            .filter(|p| p.exists());
        let Some(found) = replacement else {
            return Err(GeorefError::MissingFile(path));
        };

        info!("Layer '{}': {} replaced by {}", self.title, path.display(), found.display());
        self.filepath = match ctx.project_dir {
            Some(dir) => paths::to_project_relative(&found, dir),
            None => found.clone(),
        };
        self.attrs.set(A_FILEPATH, self.filepath.to_string_lossy().into_owned());
        outcome.path_changed = true;
        Ok(found)
    }

    /// First placement of an added layer: existing georeferencing if the
    /// probe finds any, else centered in the view at the reset scale.
    fn place_new(&mut self, path: &Path, screen: Extent, ctx: &LoadContext, outcome: &mut InitOutcome) {
        let size = match self.size() {
            Some(s) => s,
            None => return,
        };

        let existing = ctx
            .probe
            .read_geotransform(path)
            .filter(|m| !m.is_default())
            .and_then(|m| match m.decompose(size) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!("Layer '{}': ignoring georeferencing: {}", self.title, e);
                    None
                }
            });

        let Some(t) = existing else {
            self.transform = Transform::new(screen.center(), 0.0, 1.0, 1.0);
            self.reset_scale(screen.width(), screen.height(), &ctx.placement);
            debug!("Layer '{}': default placement at {:?}", self.title, screen.center());
            return;
        };

        self.transform = t;
        self.extent_cache.set(None);
        let source_crs = ctx.probe.read_crs(path);
        let (Some(src), Some(map)) = (source_crs.as_deref(), ctx.map_crs) else {
            return;
        };
        if same_crs(src, map) {
            return;
        }

        match self.reproject_transform_parameters(src, map, ctx.reprojector) {
            Ok(()) => outcome.notices.push(StatusMessageEvent::warning(
                "Georeferencer",
                "The layer was reprojected from its source CRS to the map CRS; check the placement",
            )),
            Err(e) => {
                warn!("Layer '{}': {}", self.title, e);
                self.crs = Some(src.to_string());
                outcome.notices.push(StatusMessageEvent::warning("Georeferencer", &e.to_string()));
            }
        }
    }

    /// Uniform scale for a new placement.
    ///
    /// With a paper scale both ratios are `scale * 0.0254 / dpi`; otherwise
    /// they are `sw / image_width` and `sh / image_height`. The smaller one is
    /// applied to both axes so the raster fits inside `sw x sh`.
    pub fn reset_scale(&mut self, sw: f64, sh: f64, placement: &Placement) {
        let Some((iw, ih)) = self.size() else {
            return;
        };
        let (wratio, hratio) = match placement.scale {
            Some(scale) => {
                let r = scale * METERS_PER_INCH / placement.dpi;
                (r, r)
            }
            None => (sw / iw as f64, sh / ih as f64),
        };
        let ratio = wratio.min(hratio);
        if ratio > 0.0 && ratio.is_finite() {
            self.transform.set_scale(ratio, ratio);
            self.extent_cache.set(None);
        } else {
            warn!("Layer '{}': cannot reset scale from {}x{}", self.title, sw, sh);
        }
    }

    /// Move the placement from one CRS to another: center and extent are
    /// reprojected, scale is refit to the new extent, rotation is kept.
    ///
    /// On error nothing changes.
    pub fn reproject_transform_parameters(&mut self, from: &str, to: &str, reprojector: &dyn Reprojector) -> Result<()> {
        let size = self.ready_size()?;
        let extent = self.transform.extent(size);
        let center = reprojector.reproject_point(from, to, self.transform.center())?;
        let new_extent = reprojector.reproject_extent(from, to, &extent)?;

        self.crs = Some(to.to_string());
        self.transform.set_center(center);
        self.reset_scale(new_extent.width(), new_extent.height(), &Placement::default());
        debug!("Layer '{}' reprojected {} -> {}", self.title, from, to);
        Ok(())
    }

    // === Commits ===

    /// Write every persisted property from the typed state and drop the
    /// cached extent.
    pub fn commit_transform_parameters(&mut self) {
        self.write_attrs();
        self.extent_cache.set(None);
    }

    fn write_attrs(&mut self) {
        let t = self.transform;
        self.attrs.set(A_TITLE, self.title.clone());
        self.attrs.set(A_FILEPATH, self.filepath.to_string_lossy().into_owned());
        self.attrs.set(A_X_SCALE, t.x_scale());
        self.attrs.set(A_Y_SCALE, t.y_scale());
        self.attrs.set(A_ROTATION, t.rotation());
        self.attrs.set(A_X_CENTER, t.center().x);
        self.attrs.set(A_Y_CENTER, t.center().y);
        self.attrs.set(A_TRANSPARENCY, self.transparency);
        self.attrs.set(A_BLEND_MODE, self.blend_mode.as_str());
        match &self.crs {
            Some(crs) => self.attrs.set(A_CRS, crs.clone()),
            None => {
                self.attrs.remove(A_CRS);
            }
        }
        self.attrs.set(A_TRACKS_MAP_CRS, self.tracks_map_crs);
    }

    /// Apply a finished gesture: push its entry, adopt the new transform.
    pub fn apply_commit(&mut self, entry: HistoryEntry, transform: Transform) {
        debug!(
            "Layer '{}' commit {}: center=({:.3}, {:.3}) rot={:.4} scale=({:.6}, {:.6})",
            self.title,
            entry.kind().as_str(),
            transform.center().x,
            transform.center().y,
            transform.rotation(),
            transform.x_scale(),
            transform.y_scale()
        );
        self.history.push(entry);
        self.transform = transform;
        self.commit_transform_parameters();
    }

    /// Snapshot the fields `kind` touches, run `update`, commit.
    pub fn commit_with(&mut self, kind: HistoryKind, update: impl FnOnce(&mut Transform)) {
        let entry = HistoryEntry::capture(kind, &self.transform);
        let mut next = self.transform;
        update(&mut next);
        self.apply_commit(entry, next);
    }

    /// Pop and reverse the newest history entry.
    pub fn undo_step(&mut self) -> Option<HistoryKind> {
        let entry = self.history.pop()?;
        entry.restore(&mut self.transform);
        self.commit_transform_parameters();
        debug!("Layer '{}' undo {}", self.title, entry.kind().as_str());
        Some(entry.kind())
    }

    // === Image ===

    /// Swap the raster, keeping placement and history.
    pub fn replace_image(&mut self, path: &Path, title: &str, project_dir: Option<&Path>) -> Result<()> {
        let image = Loader::decode(path)?;
        self.image = Some(image);
        self.absolute_path = Some(path.to_path_buf());
        self.filepath = match project_dir {
            Some(dir) => paths::to_project_relative(path, dir),
            None => path.to_path_buf(),
        };
        self.title = title.to_string();
        self.state = LayerState::Ready;
        self.commit_transform_parameters();
        info!("Layer '{}' image replaced by {}", self.title, path.display());
        Ok(())
    }

    /// Store the loaded raster's path relative to `project_dir`.
    pub fn rebase_path(&mut self, project_dir: &Path) {
        if let Some(abs) = &self.absolute_path {
            self.filepath = paths::to_project_relative(abs, project_dir);
            self.attrs.set(A_FILEPATH, self.filepath.to_string_lossy().into_owned());
        }
    }

    /// Copy with the same properties and pixels, a new id and no history.
    pub fn duplicate(&self) -> GeorefLayer {
        GeorefLayer {
            id: Uuid::new_v4(),
            attrs: self.attrs.clone(),
            title: self.title.clone(),
            filepath: self.filepath.clone(),
            absolute_path: self.absolute_path.clone(),
            state: self.state,
            image: self.image.clone(),
            transform: self.transform,
            history: History::new(),
            extent_cache: Cell::new(None),
            transparency: self.transparency,
            blend_mode: self.blend_mode,
            crs: self.crs.clone(),
            tracks_map_crs: self.tracks_map_crs,
        }
    }

    /// Human readable summary, one `Label:\tvalue` per line.
    pub fn metadata(&self) -> String {
        let path = self.absolute_path.as_deref().unwrap_or(&self.filepath);
        let (w, h) = self.size().unwrap_or((0, 0));
        let t = &self.transform;
        [
            ("Title", self.title.clone()),
            ("Path", path.display().to_string()),
            ("Image Width", w.to_string()),
            ("Image Height", h.to_string()),
            ("Rotation (CW)", t.rotation().to_string()),
            ("X center", t.center().x.to_string()),
            ("Y center", t.center().y.to_string()),
            ("X scale", t.x_scale().to_string()),
            ("Y scale", t.y_scale().to_string()),
        ]
        .iter()
        .map(|(label, value)| format!("{}:\t{}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
    }

    // === Appearance ===

    pub fn set_transparency(&mut self, value: i64) {
        self.transparency = value.clamp(0, 100);
        self.attrs.set(A_TRANSPARENCY, self.transparency);
    }

    pub fn increase_transparency(&mut self, step: i64) {
        self.set_transparency(self.transparency + step);
    }

    pub fn decrease_transparency(&mut self, step: i64) {
        self.set_transparency(self.transparency - step);
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
        self.attrs.set(A_BLEND_MODE, mode.as_str());
    }

    pub fn set_crs(&mut self, crs: Option<String>, tracks_map_crs: bool) {
        self.crs = crs;
        self.tracks_map_crs = tracks_map_crs;
        self.write_attrs();
    }
}

fn positive_or_one(v: f64) -> f64 {
    if v > 0.0 && v.is_finite() { v } else { 1.0 }
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}
