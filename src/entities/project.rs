//! Session: the georeferencing layers of one map and the tool driving them.
//!
//! # Architecture
//!
//! - Layers live in an explicit id -> layer map (insertion order = draw order).
//! - One layer is active; tools and numeric controls act on it only.
//! - The current tool receives pointer events and returns a [`Commit`] on
//!   release; the session applies it atomically to the active layer.
//! - Every state change is announced on the [`EventBus`] (repaint, dirty,
//!   parameter refresh, user notices). Nobody waits on those events.
//!
//! Persistence is `{ map_crs, active, layers: [{ id, attrs }] }` JSON; raster
//! paths inside attrs are relative to the session file when possible.

use std::path::{Path, PathBuf};

use glam::DVec2;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attrs::Attrs;
use super::history::HistoryKind;
use super::layer::{BlendMode, GeorefLayer, InitOutcome, LoadContext, PathResolver, Placement};
use super::layer_events::*;
use super::loader::{GeoreferenceProbe, WorldFileProbe};
use super::transform::Extent;
use crate::config::Settings;
use crate::core::event_bus::EventBus;
use crate::crs::{same_crs, IdentityReprojector, Reprojector};
use crate::error::{GeorefError, Result};
use crate::export::{export_georef_raster, ExportOptions, ExportReport};
use crate::paths;
use crate::render::{self, MapToPixel, RenderSurface};
use crate::tools::{solve_two_points, ActiveTool, Commit, MapTool, Modifiers, Preview, ToolMode};

/// On-disk session layout.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    map_crs: Option<String>,
    active: Option<Uuid>,
    layers: Vec<LayerRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerRecord {
    id: Uuid,
    attrs: Attrs,
}

pub struct Session {
    layers: IndexMap<Uuid, GeorefLayer>,
    active: Option<Uuid>,
    tool: Option<ActiveTool>,
    map_crs: Option<String>,
    view_extent: Extent,
    dirty: bool,
    bus: EventBus,
    settings: Settings,
    /// Session file; raster paths are stored relative to its directory
    project_path: Option<PathBuf>,
    probe: Box<dyn GeoreferenceProbe>,
    reprojector: Box<dyn Reprojector>,
    resolver: Option<Box<dyn PathResolver>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("layers", &self.layers.len())
            .field("active", &self.active)
            .field("tool", &self.tool_mode())
            .field("map_crs", &self.map_crs)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            layers: IndexMap::new(),
            active: None,
            tool: None,
            map_crs: None,
            view_extent: Extent::new(DVec2::new(-0.5, -0.5), DVec2::new(0.5, 0.5)),
            dirty: false,
            bus: EventBus::new(),
            settings,
            project_path: None,
            probe: Box::new(WorldFileProbe),
            reprojector: Box::new(IdentityReprojector),
            resolver: None,
        }
    }

    // === Collaborators ===

    pub fn with_probe(mut self, probe: impl GeoreferenceProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_reprojector(mut self, reprojector: impl Reprojector + 'static) -> Self {
        self.reprojector = Box::new(reprojector);
        self
    }

    pub fn with_resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    // === Accessors ===

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layers(&self) -> impl Iterator<Item = &GeorefLayer> {
        self.layers.values()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, id: Uuid) -> Option<&GeorefLayer> {
        self.layers.get(&id)
    }

    pub fn layer_mut(&mut self, id: Uuid) -> Option<&mut GeorefLayer> {
        self.layers.get_mut(&id)
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    pub fn active_layer(&self) -> Option<&GeorefLayer> {
        self.active.and_then(|id| self.layers.get(&id))
    }

    pub fn map_crs(&self) -> Option<&str> {
        self.map_crs.as_deref()
    }

    pub fn view_extent(&self) -> Extent {
        self.view_extent
    }

    pub fn set_view_extent(&mut self, extent: Extent) {
        self.view_extent = extent;
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    pub fn set_project_path(&mut self, path: Option<PathBuf>) {
        self.project_path = path;
    }

    fn project_dir(&self) -> Option<PathBuf> {
        self.project_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn mark_dirty(&mut self) {
        if !self.dirty {
            self.bus.emit(ProjectDirtyEvent);
        }
        self.dirty = true;
    }

    fn repaint(&self, layer_id: Uuid) {
        self.bus.emit(RepaintRequestedEvent { layer_id });
    }

    fn notify(&self, notice: StatusMessageEvent) {
        self.bus.emit(notice);
    }

    fn placement(&self) -> Placement {
        Placement {
            scale: self.settings.placement_scale,
            dpi: self.settings.placement_dpi,
        }
    }

    fn initialize_layer(&mut self, id: Uuid, screen_extent: Option<Extent>) -> Result<InitOutcome> {
        let project_dir = self.project_dir();
        let placement = self.placement();
        let ctx = LoadContext {
            project_dir: project_dir.as_deref(),
            resolver: self.resolver.as_deref(),
            probe: self.probe.as_ref(),
            reprojector: self.reprojector.as_ref(),
            map_crs: self.map_crs.as_deref(),
            screen_extent,
            placement,
        };
        let layer = self.layers.get_mut(&id).ok_or(GeorefError::NoActiveLayer)?;
        layer.initialize(&ctx)
    }

    fn announce_init(&mut self, outcome: InitOutcome) {
        for notice in outcome.notices {
            self.notify(notice);
        }
        if outcome.path_changed {
            self.mark_dirty();
        }
    }

    // === Registry ===

    /// Add a raster, place it in the current view and make it active.
    pub fn add_layer(&mut self, path: &Path, title: Option<&str>) -> Result<Uuid> {
        let title = title
            .map(str::to_string)
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        let stored = match self.project_dir() {
            Some(dir) => paths::to_project_relative(path, &dir),
            None => path.to_path_buf(),
        };

        let mut layer = GeorefLayer::new(&title, stored);
        layer.set_transparency(self.settings.default_transparency);
        layer.set_blend_mode(super::layer::BlendMode::from_str(&self.settings.default_blend_mode));
        let id = layer.id();
        self.layers.insert(id, layer);

        let screen = self.view_extent;
        match self.initialize_layer(id, Some(screen)) {
            Ok(outcome) => self.announce_init(outcome),
            Err(e) => {
                self.layers.shift_remove(&id);
                self.notify(StatusMessageEvent::critical("Georeferencer", &e.to_string()));
                return Err(e);
            }
        }

        info!("Added layer '{}' ({})", title, id);
        self.bus.emit(LayerAddedEvent { layer_id: id });
        self.set_active_layer(Some(id));
        self.mark_dirty();
        self.repaint(id);
        Ok(id)
    }

    pub fn remove_layer(&mut self, id: Uuid) -> bool {
        if self.layers.shift_remove(&id).is_none() {
            return false;
        }
        if self.active == Some(id) {
            self.set_active_layer(None);
        }
        self.bus.emit(LayerRemovedEvent { layer_id: id });
        self.mark_dirty();
        self.repaint(id);
        true
    }

    /// Insert a copy of the active layer right above it and activate it.
    pub fn duplicate_active_layer(&mut self) -> Result<Uuid> {
        let source_id = self.active.ok_or(GeorefError::NoActiveLayer)?;
        let (index, _, source) = self.layers.get_full(&source_id).ok_or(GeorefError::NoActiveLayer)?;
        let copy = source.duplicate();
        let id = copy.id();
        self.layers.shift_insert(index + 1, id, copy);

        self.bus.emit(LayerAddedEvent { layer_id: id });
        self.set_active_layer(Some(id));
        self.mark_dirty();
        self.repaint(id);
        Ok(id)
    }

    /// Change the active layer. Any gesture in progress is dropped.
    pub fn set_active_layer(&mut self, id: Option<Uuid>) {
        let id = id.filter(|id| self.layers.contains_key(id));
        if self.active == id {
            return;
        }
        self.cancel_gesture();
        self.active = id;
        debug!("Active layer: {:?}", id);
        self.bus.emit(ActiveLayerChangedEvent { layer_id: id });
    }

    // === Tools ===

    pub fn tool_mode(&self) -> Option<ToolMode> {
        self.tool.as_ref().map(|t| t.mode())
    }

    /// Select `mode`, or deselect it when it is already the current tool.
    pub fn toggle_tool(&mut self, mode: ToolMode) {
        self.cancel_gesture();
        if self.tool_mode() == Some(mode) {
            self.tool = None;
            debug!("Tool off: {}", mode.as_str());
        } else {
            self.tool = Some(mode.create());
            debug!("Tool on: {}", mode.as_str());
        }
    }

    pub fn preview(&self) -> Option<Preview> {
        self.tool.as_ref().and_then(|t| t.preview())
    }

    pub fn pointer_press(&mut self, point: DVec2, modifiers: Modifiers) {
        let (Some(tool), Some(id)) = (self.tool.as_mut(), self.active) else {
            return;
        };
        if let Some(layer) = self.layers.get(&id) {
            tool.press(layer, point, modifiers);
        }
    }

    pub fn pointer_move(&mut self, point: DVec2, modifiers: Modifiers) {
        let (Some(tool), Some(id)) = (self.tool.as_mut(), self.active) else {
            return;
        };
        let Some(layer) = self.layers.get(&id) else {
            return;
        };
        tool.drag(layer, point, modifiers);
        if tool.is_active() {
            self.repaint(id);
        }
    }

    /// Finish the gesture and apply its commit, if any.
    pub fn pointer_release(&mut self, point: DVec2, modifiers: Modifiers) -> Option<Commit> {
        let (Some(tool), Some(id)) = (self.tool.as_mut(), self.active) else {
            return None;
        };
        let layer = self.layers.get(&id)?;
        let commit = tool.release(layer, point, modifiers)?;
        self.apply_commit(id, commit);
        Some(commit)
    }

    /// Drop the provisional state of the current tool.
    pub fn cancel_gesture(&mut self) {
        let Some(tool) = self.tool.as_mut() else {
            return;
        };
        let was_active = tool.is_active();
        tool.reset();
        if let (true, Some(id)) = (was_active, self.active) {
            self.repaint(id);
        }
    }

    fn apply_commit(&mut self, id: Uuid, commit: Commit) {
        let Some(layer) = self.layers.get_mut(&id) else {
            return;
        };
        layer.apply_commit(commit.entry, commit.transform);
        self.after_transform_change(id);
    }

    fn after_transform_change(&mut self, id: Uuid) {
        if let Some(layer) = self.layers.get(&id) {
            self.bus.emit(TransformParametersChangedEvent {
                layer_id: id,
                transform: *layer.transform(),
            });
        }
        self.mark_dirty();
        self.repaint(id);
    }

    fn active_mut(&mut self) -> Result<&mut GeorefLayer> {
        let id = self.active.ok_or(GeorefError::NoActiveLayer)?;
        self.layers.get_mut(&id).ok_or(GeorefError::NoActiveLayer)
    }

    fn active_ready_mut(&mut self) -> Result<&mut GeorefLayer> {
        let layer = self.active_mut()?;
        if !layer.is_ready() {
            return Err(GeorefError::LayerNotReady(layer.title().to_string()));
        }
        Ok(layer)
    }

    // === Numeric controls ===

    /// Focusing a numeric control drops any gesture in progress.
    pub fn numeric_control_focused(&mut self) {
        self.cancel_gesture();
    }

    /// Rotation as shown in the numeric control: `(-180, 180]`.
    pub fn rotation_value(&self) -> Option<f64> {
        let r = self.active_layer()?.transform().rotation();
        Some(if r > 180.0 { r - 360.0 } else { r })
    }

    pub fn set_rotation_value(&mut self, degrees: f64) -> Result<()> {
        self.cancel_gesture();
        let degrees = finite("rotation", degrees)?;
        let degrees = self.settings.clamp_rotation(degrees);
        let layer = self.active_ready_mut()?;
        layer.commit_with(HistoryKind::Rotation, |t| t.set_rotation(degrees));
        let id = layer.id();
        self.after_transform_change(id);
        Ok(())
    }

    pub fn set_x_scale_value(&mut self, value: f64) -> Result<()> {
        self.cancel_gesture();
        let value = finite("x scale", value)?;
        let value = self.settings.clamp_scale(value);
        let layer = self.active_ready_mut()?;
        layer.commit_with(HistoryKind::Scale, |t| t.set_scale(value, t.y_scale()));
        let id = layer.id();
        self.after_transform_change(id);
        Ok(())
    }

    pub fn set_y_scale_value(&mut self, value: f64) -> Result<()> {
        self.cancel_gesture();
        let value = finite("y scale", value)?;
        let value = self.settings.clamp_scale(value);
        let layer = self.active_ready_mut()?;
        layer.commit_with(HistoryKind::Scale, |t| t.set_scale(t.x_scale(), value));
        let id = layer.id();
        self.after_transform_change(id);
        Ok(())
    }

    /// Numeric center edit, recorded like a Move gesture.
    pub fn set_center_value(&mut self, center: DVec2) -> Result<()> {
        self.cancel_gesture();
        let center = DVec2::new(finite("x center", center.x)?, finite("y center", center.y)?);
        let layer = self.active_ready_mut()?;
        layer.commit_with(HistoryKind::Move, |t| t.set_center(center));
        let id = layer.id();
        self.after_transform_change(id);
        Ok(())
    }

    /// Place the active layer so pixel `a1` lands on map point `p1` and `a2`
    /// on `p2`. Recorded as one two-point commit.
    pub fn place_by_two_points(&mut self, a1: DVec2, a2: DVec2, p1: DVec2, p2: DVec2) -> Result<()> {
        self.cancel_gesture();
        let layer = self.active_ready_mut()?;
        let size = layer
            .size()
            .ok_or_else(|| GeorefError::LayerNotReady(layer.title().to_string()))?;
        let solved = solve_two_points(size, a1, a2, p1, p2)?;
        layer.commit_with(HistoryKind::TwoPointsB, |t| *t = solved);
        let id = layer.id();
        self.after_transform_change(id);
        Ok(())
    }

    // === Undo ===

    /// Reverse the newest change of the active layer.
    ///
    /// `Ok(None)` when its history is empty.
    pub fn undo(&mut self) -> Result<Option<HistoryKind>> {
        self.cancel_gesture();
        let layer = self.active_ready_mut()?;
        let Some(kind) = layer.undo_step() else {
            return Ok(None);
        };
        let id = layer.id();
        self.after_transform_change(id);
        Ok(Some(kind))
    }

    // === Appearance ===

    pub fn increase_transparency(&mut self) -> Result<i64> {
        let step = self.settings.transparency_step;
        self.change_transparency(step)
    }

    pub fn decrease_transparency(&mut self) -> Result<i64> {
        let step = self.settings.transparency_step;
        self.change_transparency(-step)
    }

    fn change_transparency(&mut self, delta: i64) -> Result<i64> {
        let value = self.active_mut()?.transparency() + delta;
        self.set_active_transparency(value)
    }

    /// Returns the stored value, clamped to `0..=100`.
    pub fn set_active_transparency(&mut self, value: i64) -> Result<i64> {
        self.cancel_gesture();
        let layer = self.active_mut()?;
        layer.set_transparency(value);
        let (id, value) = (layer.id(), layer.transparency());
        self.mark_dirty();
        self.repaint(id);
        Ok(value)
    }

    pub fn set_active_blend_mode(&mut self, mode: BlendMode) -> Result<()> {
        self.cancel_gesture();
        let layer = self.active_mut()?;
        layer.set_blend_mode(mode);
        let id = layer.id();
        self.mark_dirty();
        self.repaint(id);
        Ok(())
    }

    /// Swap the raster of the active layer. Placement and history are kept,
    /// so a layer whose file went missing can be pointed at a new copy.
    pub fn replace_active_image(&mut self, path: &Path, title: &str) -> Result<()> {
        self.cancel_gesture();
        let project_dir = self.project_dir();
        let layer = self.active_mut()?;
        if let Err(e) = layer.replace_image(path, title, project_dir.as_deref()) {
            warn!("Layer '{}': {}", layer.title(), e);
            self.notify(StatusMessageEvent::warning("Georeferencer", &e.to_string()));
            return Err(e);
        }
        let id = layer.id();
        self.after_transform_change(id);
        Ok(())
    }

    // === CRS ===

    /// Switch the map CRS. Layers that follow the map CRS are reprojected;
    /// a layer that cannot be keeps its parameters and a warning is posted.
    pub fn set_map_crs(&mut self, crs: &str) {
        if self.map_crs.as_deref().is_some_and(|c| same_crs(c, crs)) {
            return;
        }
        info!("Map CRS: {:?} -> {}", self.map_crs, crs);
        self.map_crs = Some(crs.to_string());
        self.cancel_gesture();

        let ids: Vec<Uuid> = self.layers.keys().copied().collect();
        for id in ids {
            self.follow_map_crs(id, crs);
        }
        self.mark_dirty();
    }

    /// Declare the CRS the active layer's parameters are expressed in, and
    /// whether they follow map CRS changes. Turning tracking on brings the
    /// layer into the current map CRS right away.
    pub fn set_active_crs(&mut self, crs: Option<&str>, tracks_map_crs: bool) -> Result<()> {
        self.cancel_gesture();
        let layer = self.active_mut()?;
        layer.set_crs(crs.map(str::to_string), tracks_map_crs);
        let id = layer.id();
        debug!("Layer {} CRS {:?}, tracks map CRS: {}", id, crs, tracks_map_crs);
        if let Some(map_crs) = self.map_crs.clone() {
            self.follow_map_crs(id, &map_crs);
        }
        self.mark_dirty();
        self.repaint(id);
        Ok(())
    }

    /// Reproject one tracking layer into `crs`. A layer without a CRS adopts
    /// it; one that cannot be reprojected keeps its parameters.
    fn follow_map_crs(&mut self, id: Uuid, crs: &str) {
        let Some(layer) = self.layers.get_mut(&id) else {
            return;
        };
        if !layer.tracks_map_crs() {
            return;
        }
        let from = match layer.crs() {
            Some(from) => from.to_string(),
            None => {
                layer.set_crs(Some(crs.to_string()), true);
                return;
            }
        };
        if same_crs(&from, crs) || !layer.is_ready() {
            return;
        }
        match layer.reproject_transform_parameters(&from, crs, self.reprojector.as_ref()) {
            Ok(()) => {
                layer.commit_transform_parameters();
                self.after_transform_change(id);
            }
            Err(e) => {
                warn!("Layer '{}': {}", layer.title(), e);
                let title = format!("Georeferencer: {}", layer.title());
                self.notify(StatusMessageEvent::warning(&title, &e.to_string()));
            }
        }
    }

    // === Drawing ===

    /// Draw every ready layer in order, then the outline of the gesture in
    /// progress. Returns the number of layers drawn.
    pub fn draw(&self, view: &dyn MapToPixel, surface: &mut dyn RenderSurface) -> usize {
        let drawn = self
            .layers
            .values()
            .filter(|layer| render::draw_layer(layer, &self.view_extent, view, surface))
            .count();
        if let Some(preview) = self.preview() {
            surface.draw_outline(&render::outline(&preview.transform, preview.size, view));
        }
        drawn
    }

    // === Export ===

    pub fn export_active_layer(&self, output: &Path, options: &ExportOptions) -> Result<ExportReport> {
        let layer = self.active_layer().ok_or(GeorefError::NoActiveLayer)?;
        let report = export_georef_raster(layer, output, options)?;
        self.notify(StatusMessageEvent::info(
            "Georeferencer",
            &format!("Exported {}", report.world_file.display()),
        ));
        Ok(report)
    }

    /// Export options from settings.
    pub fn default_export_options(&self) -> ExportOptions {
        ExportOptions {
            rotation_in_world_file: self.settings.export_rotation_in_world_file,
            world_file_only: self.settings.export_world_file_only,
        }
    }

    // === Persistence ===

    pub fn to_json(&self) -> Result<String> {
        let file = SessionFile {
            map_crs: self.map_crs.clone(),
            active: self.active,
            layers: self
                .layers
                .values()
                .map(|l| LayerRecord {
                    id: l.id(),
                    attrs: l.attrs.clone(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Rebuild a session from JSON. Layers are restored but not loaded; call
    /// [`initialize_layers`](Self::initialize_layers).
    pub fn from_json(json: &str, settings: Settings) -> Result<Self> {
        let file: SessionFile = serde_json::from_str(json)?;
        let mut session = Session::new(settings);
        session.map_crs = file.map_crs;
        for record in file.layers {
            session.layers.insert(record.id, GeorefLayer::from_attrs(record.id, record.attrs));
        }
        session.active = file.active.filter(|id| session.layers.contains_key(id));
        Ok(session)
    }

    /// Load every uninitialized layer. Failing layers are flagged invalid
    /// and reported; the rest of the session is unaffected. Returns the
    /// number of layers that failed.
    pub fn initialize_layers(&mut self) -> usize {
        let ids: Vec<Uuid> = self.layers.keys().copied().collect();
        let mut failed = 0;
        for id in ids {
            match self.initialize_layer(id, None) {
                Ok(outcome) => {
                    self.announce_init(outcome);
                    self.repaint(id);
                }
                Err(e) => {
                    failed += 1;
                    self.notify(StatusMessageEvent::critical("Georeferencer", &e.to_string()));
                }
            }
        }
        failed
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.rebase_paths(path);
        std::fs::write(path, self.to_json()?)?;
        self.project_path = Some(path.to_path_buf());
        self.mark_clean();
        info!("Session saved: {}", path.display());
        Ok(())
    }

    /// Read a session file and load its rasters.
    pub fn load(path: &Path, settings: Settings) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut session = Self::from_json(&json, settings)?;
        session.project_path = Some(path.to_path_buf());
        let failed = session.initialize_layers();
        if failed > 0 {
            warn!("{} layer(s) could not be loaded from {}", failed, path.display());
        }
        Ok(session)
    }

    /// Re-express loaded raster paths relative to the directory of `target`.
    fn rebase_paths(&mut self, target: &Path) {
        let Some(dir) = target.parent() else {
            return;
        };
        for layer in self.layers.values_mut() {
            layer.rebase_path(dir);
        }
    }
}

fn finite(what: &str, v: f64) -> Result<f64> {
    if v.is_finite() { Ok(v) } else { Err(GeorefError::InvalidValue(what.to_string())) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::count_queued;
    use crate::entities::keys::A_FILEPATH;
    use crate::entities::layer::tests::write_png;
    use crate::entities::layer::LayerState;
    use crate::render::tests::Recorder;
    use crate::render::ViewTransform;
    use std::cell::Cell;
    use std::rc::Rc;

    fn session_with_layer(dir: &Path, w: u32, h: u32) -> (Session, Uuid) {
        let path = write_png(dir, "scan.png", w, h);
        let mut s = Session::new(Settings::default());
        s.set_view_extent(Extent::new(DVec2::ZERO, DVec2::new(w as f64, h as f64)));
        let id = s.add_layer(&path, None).unwrap();
        (s, id)
    }

    #[test]
    fn test_add_layer_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (s, id) = session_with_layer(dir.path(), 100, 50);

        assert_eq!(s.active_id(), Some(id));
        let layer = s.layer(id).unwrap();
        assert_eq!(layer.title(), "scan");
        assert_eq!(layer.transform().center(), DVec2::new(50.0, 25.0));
        assert_eq!(layer.transform().scale(), DVec2::ONE);
        assert_eq!(layer.transparency(), 30);
        assert!(s.is_dirty());
        assert_eq!(count_queued::<LayerAddedEvent>(s.bus()), 1);
    }

    #[test]
    fn test_add_missing_layer_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Session::new(Settings::default());
        let err = s.add_layer(&dir.path().join("missing.png"), None);
        assert!(matches!(err, Err(GeorefError::MissingFile(_))));
        assert_eq!(s.layer_count(), 0);
        assert_eq!(count_queued::<StatusMessageEvent>(s.bus()), 1);
    }

    #[test]
    fn test_gesture_commit_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 100, 50);
        s.toggle_tool(ToolMode::Move);
        let committed = *s.layer(id).unwrap().transform();

        let params = Rc::new(Cell::new(0));
        let p = Rc::clone(&params);
        s.bus().subscribe::<TransformParametersChangedEvent, _>(move |_| p.set(p.get() + 1));

        s.pointer_press(DVec2::new(10.0, 10.0), Modifiers::NONE);
        s.pointer_move(DVec2::new(20.0, 20.0), Modifiers::NONE);
        s.pointer_move(DVec2::new(30.0, 40.0), Modifiers::NONE);
        // Nothing committed mid-gesture
        assert_eq!(*s.layer(id).unwrap().transform(), committed);
        assert!(s.layer(id).unwrap().history().is_empty());
        assert_eq!(params.get(), 0);

        let commit = s.pointer_release(DVec2::new(30.0, 40.0), Modifiers::NONE).unwrap();
        let layer = s.layer(id).unwrap();
        assert_eq!(layer.history().len(), 1);
        assert_eq!(layer.transform().center(), DVec2::new(70.0, 55.0));
        assert_eq!(*layer.transform(), commit.transform);
        assert_eq!(params.get(), 1);
    }

    #[test]
    fn test_cancel_on_layer_switch_and_numeric_focus() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 10, 10);
        s.toggle_tool(ToolMode::Rotate);

        s.pointer_press(DVec2::new(10.0, 5.0), Modifiers::NONE);
        s.pointer_move(DVec2::new(5.0, 10.0), Modifiers::NONE);
        assert!(s.preview().is_some());
        s.numeric_control_focused();
        assert!(s.preview().is_none());
        assert!(s.pointer_release(DVec2::new(0.0, 10.0), Modifiers::NONE).is_none());

        s.pointer_press(DVec2::new(10.0, 5.0), Modifiers::NONE);
        s.set_active_layer(None);
        assert!(s.preview().is_none());
        s.set_active_layer(Some(id));
        assert!(s.pointer_release(DVec2::new(0.0, 10.0), Modifiers::NONE).is_none());
        assert!(s.layer(id).unwrap().history().is_empty());
    }

    #[test]
    fn test_toggle_tool() {
        let mut s = Session::new(Settings::default());
        s.toggle_tool(ToolMode::Scale);
        assert_eq!(s.tool_mode(), Some(ToolMode::Scale));
        s.toggle_tool(ToolMode::Adjust);
        assert_eq!(s.tool_mode(), Some(ToolMode::Adjust));
        s.toggle_tool(ToolMode::Adjust);
        assert_eq!(s.tool_mode(), None);
    }

    #[test]
    fn test_numeric_controls_and_n_undos() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 100, 50);
        let initial = *s.layer(id).unwrap().transform();

        s.set_rotation_value(-90.0).unwrap();
        assert_eq!(s.layer(id).unwrap().transform().rotation(), 270.0);
        assert_eq!(s.rotation_value(), Some(-90.0));
        s.set_x_scale_value(2.5).unwrap();
        s.set_y_scale_value(500.0).unwrap();
        assert_eq!(s.layer(id).unwrap().transform().scale(), DVec2::new(2.5, 100.0));

        s.toggle_tool(ToolMode::Move);
        s.pointer_press(DVec2::ZERO, Modifiers::NONE);
        s.pointer_release(DVec2::new(1.0, 2.0), Modifiers::NONE).unwrap();
        s.set_center_value(DVec2::new(-5.0, 5.0)).unwrap();
        assert_eq!(s.layer(id).unwrap().history().len(), 5);

        let mut kinds = Vec::new();
        while let Some(kind) = s.undo().unwrap() {
            kinds.push(kind);
        }
        assert_eq!(
            kinds,
            vec![
                HistoryKind::Move,
                HistoryKind::Move,
                HistoryKind::Scale,
                HistoryKind::Scale,
                HistoryKind::Rotation
            ]
        );
        assert_eq!(*s.layer(id).unwrap().transform(), initial);
    }

    #[test]
    fn test_rotation_value_wraps_before_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 10, 10);

        s.set_rotation_value(270.0).unwrap();
        assert_eq!(s.layer(id).unwrap().transform().rotation(), 270.0);
        assert_eq!(s.rotation_value(), Some(-90.0));
        s.set_rotation_value(-450.0).unwrap();
        assert_eq!(s.layer(id).unwrap().transform().rotation(), 270.0);
        s.set_rotation_value(540.0).unwrap();
        assert_eq!(s.layer(id).unwrap().transform().rotation(), 180.0);
        assert_eq!(s.layer(id).unwrap().history().len(), 3);
    }

    #[test]
    fn test_non_finite_numeric_input_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 10, 10);
        let before = *s.layer(id).unwrap().transform();

        assert!(matches!(s.set_rotation_value(f64::NAN), Err(GeorefError::InvalidValue(_))));
        assert!(matches!(s.set_x_scale_value(f64::INFINITY), Err(GeorefError::InvalidValue(_))));
        assert!(s.set_center_value(DVec2::new(f64::NAN, 0.0)).is_err());
        assert_eq!(*s.layer(id).unwrap().transform(), before);
        assert!(s.layer(id).unwrap().history().is_empty());
    }

    #[test]
    fn test_place_by_two_points() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 100, 50);
        let before = *s.layer(id).unwrap().transform();
        s.place_by_two_points(
            DVec2::ZERO,
            DVec2::new(100.0, 0.0),
            DVec2::new(10.0, 10.0),
            DVec2::new(10.0, 110.0),
        )
        .unwrap();
        let t = *s.layer(id).unwrap().transform();
        assert!((t.rotation() - 270.0).abs() < 1e-9);
        assert!((t.pixel_to_map((100, 50), DVec2::new(100.0, 0.0)) - DVec2::new(10.0, 110.0)).length() < 1e-9);
        assert_eq!(s.undo().unwrap(), Some(HistoryKind::TwoPointsB));
        assert_eq!(*s.layer(id).unwrap().transform(), before);

        let p = DVec2::new(3.0, 3.0);
        assert!(matches!(
            s.place_by_two_points(p, p, DVec2::ZERO, DVec2::ONE),
            Err(GeorefError::DegenerateGeotransform)
        ));
    }

    #[test]
    fn test_undo_without_layer() {
        let mut s = Session::new(Settings::default());
        assert!(matches!(s.undo(), Err(GeorefError::NoActiveLayer)));
        assert!(s.set_rotation_value(10.0).is_err());
    }

    #[test]
    fn test_transparency_steps() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session_with_layer(dir.path(), 4, 4);
        assert_eq!(s.increase_transparency().unwrap(), 40);
        for _ in 0..10 {
            s.increase_transparency().unwrap();
        }
        assert_eq!(s.active_layer().unwrap().transparency(), 100);
        assert_eq!(s.decrease_transparency().unwrap(), 90);
    }

    #[test]
    fn test_appearance_edits_mark_dirty_and_repaint() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 4, 4);
        s.mark_clean();

        s.toggle_tool(ToolMode::Move);
        s.pointer_press(DVec2::ZERO, Modifiers::NONE);
        s.pointer_move(DVec2::new(1.0, 1.0), Modifiers::NONE);
        assert_eq!(s.set_active_transparency(250).unwrap(), 100);
        assert!(s.preview().is_none());
        assert!(s.is_dirty());

        let repaints = count_queued::<RepaintRequestedEvent>(s.bus());
        s.set_active_blend_mode(BlendMode::Multiply).unwrap();
        let layer = s.layer(id).unwrap();
        assert_eq!(layer.blend_mode(), BlendMode::Multiply);
        assert_eq!(layer.transparency(), 100);
        assert_eq!(count_queued::<RepaintRequestedEvent>(s.bus()), repaints + 1);

        s.set_active_layer(None);
        assert!(matches!(s.set_active_transparency(10), Err(GeorefError::NoActiveLayer)));
        assert!(matches!(
            s.set_active_blend_mode(BlendMode::Screen),
            Err(GeorefError::NoActiveLayer)
        ));
    }

    #[test]
    fn test_replace_active_image() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 10, 10);
        s.set_rotation_value(30.0).unwrap();
        s.mark_clean();
        let params = count_queued::<TransformParametersChangedEvent>(s.bus());
        let other = write_png(dir.path(), "other.png", 20, 10);

        s.toggle_tool(ToolMode::Rotate);
        s.pointer_press(DVec2::new(10.0, 5.0), Modifiers::NONE);
        s.pointer_move(DVec2::new(5.0, 10.0), Modifiers::NONE);
        s.replace_active_image(&other, "other").unwrap();
        assert!(s.preview().is_none());
        assert!(s.is_dirty());
        assert_eq!(count_queued::<TransformParametersChangedEvent>(s.bus()), params + 1);

        let layer = s.layer(id).unwrap();
        assert_eq!(layer.title(), "other");
        assert_eq!(layer.size(), Some((20, 10)));
        assert_eq!(layer.transform().rotation(), 30.0);
        assert_eq!(layer.history().len(), 1);

        // A failed swap keeps the current raster
        let notices = count_queued::<StatusMessageEvent>(s.bus());
        let err = s.replace_active_image(&dir.path().join("gone.png"), "gone");
        assert!(err.is_err());
        assert_eq!(s.layer(id).unwrap().title(), "other");
        assert_eq!(count_queued::<StatusMessageEvent>(s.bus()), notices + 1);
    }

    #[test]
    fn test_duplicate_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 4, 4);
        s.set_rotation_value(10.0).unwrap();

        let copy = s.duplicate_active_layer().unwrap();
        assert_eq!(s.active_id(), Some(copy));
        assert_eq!(s.layer(copy).unwrap().transform(), s.layer(id).unwrap().transform());
        assert!(s.layer(copy).unwrap().history().is_empty());
        let order: Vec<Uuid> = s.layers().map(|l| l.id()).collect();
        assert_eq!(order, vec![id, copy]);

        assert!(s.remove_layer(copy));
        assert_eq!(s.active_id(), None);
        assert!(!s.remove_layer(copy));
        assert_eq!(s.layer_count(), 1);
    }

    #[test]
    fn test_map_crs_change_reprojects() {
        struct Halve;
        impl Reprojector for Halve {
            fn reproject_point(&self, from: &str, to: &str, p: DVec2) -> Result<DVec2> {
                match (from, to) {
                    ("A", "B") => Ok(p * 0.5),
                    _ => Err(GeorefError::Reprojection {
                        from: from.to_string(),
                        to: to.to_string(),
                    }),
                }
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "scan.png", 10, 10);
        let mut s = Session::new(Settings::default()).with_reprojector(Halve);
        s.set_map_crs("A");
        s.set_view_extent(Extent::new(DVec2::ZERO, DVec2::new(40.0, 40.0)));
        let id = s.add_layer(&path, None).unwrap();
        assert_eq!(s.layer(id).unwrap().crs(), Some("A"));
        s.set_rotation_value(30.0).unwrap();

        s.set_map_crs("B");
        let layer = s.layer(id).unwrap();
        assert_eq!(layer.crs(), Some("B"));
        assert_eq!(layer.transform().center(), DVec2::new(10.0, 10.0));
        // 40 x 40 footprint turned 30 degrees, halved, refit to the 10 px raster
        let (sin, cos) = 30f64.to_radians().sin_cos();
        assert!((layer.transform().x_scale() - 4.0 * 0.5 * (cos + sin)).abs() < 1e-9);
        assert_eq!(layer.transform().rotation(), 30.0);

        // No path back: parameters kept, warning posted
        let before = *layer.transform();
        let warnings_before = count_queued::<StatusMessageEvent>(s.bus());
        s.set_map_crs("C");
        assert_eq!(*s.layer(id).unwrap().transform(), before);
        assert_eq!(s.layer(id).unwrap().crs(), Some("B"));
        assert_eq!(count_queued::<StatusMessageEvent>(s.bus()), warnings_before + 1);
    }

    #[test]
    fn test_layer_crs_tracking() {
        struct Halve;
        impl Reprojector for Halve {
            fn reproject_point(&self, from: &str, to: &str, p: DVec2) -> Result<DVec2> {
                match (from, to) {
                    ("A", "B") => Ok(p * 0.5),
                    _ => Err(GeorefError::Reprojection {
                        from: from.to_string(),
                        to: to.to_string(),
                    }),
                }
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "scan.png", 10, 10);
        let mut s = Session::new(Settings::default()).with_reprojector(Halve);
        s.set_map_crs("A");
        s.set_view_extent(Extent::new(DVec2::ZERO, DVec2::new(40.0, 40.0)));
        let id = s.add_layer(&path, None).unwrap();
        let placed = *s.layer(id).unwrap().transform();

        // Pinned layer ignores the map CRS switch
        s.set_active_crs(Some("A"), false).unwrap();
        s.set_map_crs("B");
        let layer = s.layer(id).unwrap();
        assert!(!layer.tracks_map_crs());
        assert_eq!(layer.crs(), Some("A"));
        assert_eq!(*layer.transform(), placed);

        // Tracking again catches up with the map CRS
        s.set_active_crs(Some("A"), true).unwrap();
        let layer = s.layer(id).unwrap();
        assert_eq!(layer.crs(), Some("B"));
        assert_eq!(layer.transform().center(), DVec2::new(10.0, 10.0));

        let session = dir.path().join("s.json");
        s.set_active_crs(Some("B"), false).unwrap();
        s.save(&session).unwrap();
        let loaded = Session::load(&session, Settings::default()).unwrap();
        assert!(!loaded.layer(id).unwrap().tracks_map_crs());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, id) = session_with_layer(dir.path(), 20, 10);
        s.set_map_crs("EPSG:3857");
        s.set_rotation_value(12.5).unwrap();
        s.set_x_scale_value(0.25).unwrap();

        let session_path = dir.path().join("session.json");
        s.save(&session_path).unwrap();
        assert!(!s.is_dirty());

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&session_path).unwrap()).unwrap();
        assert_eq!(json["map_crs"], "EPSG:3857");
        assert_eq!(json["active"], id.to_string());
        assert_eq!(json["layers"][0]["attrs"][A_FILEPATH], "scan.png");

        let loaded = Session::load(&session_path, Settings::default()).unwrap();
        let layer = loaded.layer(id).unwrap();
        assert_eq!(layer.state(), LayerState::Ready);
        assert_eq!(layer.transform(), s.layer(id).unwrap().transform());
        assert_eq!(loaded.active_id(), Some(id));
        assert_eq!(loaded.map_crs(), Some("EPSG:3857"));
        assert!(layer.history().is_empty());
    }

    #[test]
    fn test_missing_raster_on_load_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "ok.png", 4, 4);
        let good = Uuid::new_v4();
        let bad = Uuid::new_v4();
        let json = format!(
            r#"{{ "map_crs": null, "active": "{bad}", "layers": [
                {{ "id": "{good}", "attrs": {{ "title": "ok", "filepath": "ok.png", "xScale": 2.0, "rotation": 45.0 }} }},
                {{ "id": "{bad}", "attrs": {{ "title": "gone", "filepath": "gone.png" }} }}
            ] }}"#
        );
        let session_path = dir.path().join("s.json");
        std::fs::write(&session_path, json).unwrap();

        let mut s = Session::load(&session_path, Settings::default()).unwrap();
        assert_eq!(s.layer(good).unwrap().state(), LayerState::Ready);
        assert_eq!(s.layer(good).unwrap().transform().x_scale(), 2.0);
        assert_eq!(s.layer(bad).unwrap().state(), LayerState::Invalid);
        assert!(matches!(s.undo(), Err(GeorefError::LayerNotReady(_))));

        let v = ViewTransform::new(Extent::new(DVec2::splat(-10.0), DVec2::splat(10.0)), 20, 20);
        let mut rec = Recorder::default();
        s.set_view_extent(v.extent);
        assert_eq!(s.draw(&v, &mut rec), 1);
    }

    #[test]
    fn test_missing_raster_resolved_on_load() {
        struct Relocate(PathBuf);
        impl PathResolver for Relocate {
            fn resolve_missing(&self, _path: &Path) -> Option<PathBuf> {
                Some(self.0.clone())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let moved = write_png(dir.path(), "moved.png", 4, 4);
        let id = Uuid::new_v4();
        let json = format!(r#"{{ "map_crs": null, "active": null, "layers": [{{ "id": "{id}", "attrs": {{ "filepath": "old.png" }} }}] }}"#);
        let mut s = Session::from_json(&json, Settings::default()).unwrap().with_resolver(Relocate(moved));
        s.set_project_path(Some(dir.path().join("s.json")));
        assert_eq!(s.initialize_layers(), 0);
        assert!(s.is_dirty());
        assert_eq!(s.layer(id).unwrap().filepath(), Path::new("moved.png"));
    }

    #[test]
    fn test_draw_with_preview_outline() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session_with_layer(dir.path(), 10, 10);
        let v = ViewTransform::new(s.view_extent(), 10, 10);
        s.toggle_tool(ToolMode::Move);
        s.pointer_press(DVec2::new(5.0, 5.0), Modifiers::NONE);
        s.pointer_move(DVec2::new(6.0, 5.0), Modifiers::NONE);

        let mut rec = Recorder::default();
        assert_eq!(s.draw(&v, &mut rec), 1);
        assert_eq!(rec.outlines.len(), 1);
        // Committed placement drawn, provisional one outlined
        assert_eq!(rec.images[0].0, DVec2::new(5.0, 5.0));
        assert_eq!(rec.outlines[0][0], DVec2::new(1.0, 0.0));
    }

    #[test]
    fn test_export_active_layer() {
        let dir = tempfile::tempdir().unwrap();
        let (s, _) = session_with_layer(dir.path(), 10, 10);
        let out = dir.path().join("georef.png");
        let report = s.export_active_layer(&out, &s.default_export_options()).unwrap();
        assert!(report.world_file.exists());
        assert!(out.exists());
        let placed = report.geotransform.decompose((10, 10)).unwrap();
        assert!((placed.center() - DVec2::new(5.0, 5.0)).length() < 1e-9);
    }
}
