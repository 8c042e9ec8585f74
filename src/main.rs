use freehand::cli::{Args, Command, Step};
use freehand::config::{Settings, SETTINGS_FILE};
use freehand::entities::{BlendMode, Session};
use freehand::export::ExportOptions;
use freehand::paths::{self, PathConfig};

use anyhow::{bail, Context, Result};
use clap::Parser;
use glam::DVec2;
use log::{info, warn};
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn main() -> Result<()> {
    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());

    // Ensure directories exist
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    init_logging(&args, &path_config)?;

    let settings_path = paths::config_file(SETTINGS_FILE, &path_config);
    let settings = Settings::load(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = settings.save(&settings_path) {
            warn!("Failed to write default settings {}: {}", settings_path.display(), e);
        }
    }
    run(args.command, settings)
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::config_file("freehand.log", path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn run(command: Command, settings: Settings) -> Result<()> {
    match command {
        Command::Add { session, raster, title, extent, crs } => {
            let mut s = open_or_create(&session, settings)?;
            if let Some(crs) = crs {
                s.set_map_crs(&crs);
            }
            if let Some(e) = extent {
                s.set_view_extent(freehand::entities::Extent::new(DVec2::new(e[0], e[1]), DVec2::new(e[2], e[3])));
            }
            let raster = absolute(&raster);
            let id = s
                .add_layer(&raster, title.as_deref())
                .with_context(|| format!("Failed to add {}", raster.display()))?;
            save(&mut s, &session)?;
            println!("{}", id);
        }

        Command::Info { session } => {
            let s = open(&session, settings)?;
            if let Some(crs) = s.map_crs() {
                println!("Map CRS:\t{}", crs);
            }
            for layer in s.layers() {
                let marker = if s.active_id() == Some(layer.id()) { " (active)" } else { "" };
                println!("[{}]{} {:?}", layer.id(), marker, layer.state());
                println!("{}", layer.metadata());
                println!("Transparency:\t{}", layer.transparency());
                println!();
            }
        }

        Command::Set {
            session,
            layer,
            rotation,
            x_scale,
            y_scale,
            center,
            two_points,
            undo,
            image,
            transparency,
            blend_mode,
            layer_crs,
            pin_crs,
        } => {
            let mut s = open(&session, settings)?;
            select(&mut s, layer)?;
            for _ in 0..undo {
                if s.undo()?.is_none() {
                    warn!("Nothing left to undo");
                    break;
                }
            }
            if let Some(deg) = rotation {
                s.set_rotation_value(deg)?;
            }
            if let Some(v) = x_scale {
                s.set_x_scale_value(v)?;
            }
            if let Some(v) = y_scale {
                s.set_y_scale_value(v)?;
            }
            if let Some(c) = center {
                s.set_center_value(DVec2::new(c[0], c[1]))?;
            }
            if let Some(v) = two_points {
                s.place_by_two_points(
                    DVec2::new(v[0], v[1]),
                    DVec2::new(v[4], v[5]),
                    DVec2::new(v[2], v[3]),
                    DVec2::new(v[6], v[7]),
                )?;
            }
            if let Some(raster) = image {
                let raster = absolute(&raster);
                let title = raster.file_stem().map(|t| t.to_string_lossy().into_owned()).unwrap_or_default();
                s.replace_active_image(&raster, &title)
                    .with_context(|| format!("Failed to replace image with {}", raster.display()))?;
            }
            if let Some(v) = transparency {
                s.set_active_transparency(v)?;
            }
            if let Some(name) = blend_mode {
                s.set_active_blend_mode(BlendMode::from_str(&name))?;
            }
            if layer_crs.is_some() || pin_crs {
                let current = s.active_layer().and_then(|l| l.crs()).map(str::to_string);
                let crs = layer_crs.or(current);
                s.set_active_crs(crs.as_deref(), !pin_crs)?;
            }
            save(&mut s, &session)?;
        }

        Command::Export { session, output, layer, no_rotation, world_file_only } => {
            let mut s = open(&session, settings)?;
            select(&mut s, layer)?;
            let mut options: ExportOptions = s.default_export_options();
            options.rotation_in_world_file &= !no_rotation;
            options.world_file_only |= world_file_only;
            let report = s
                .export_active_layer(&output, &options)
                .with_context(|| format!("Failed to export {}", output.display()))?;
            if let Some(raster) = &report.raster {
                println!("{}", raster.display());
            }
            println!("{}", report.world_file.display());
            if let Some(prj) = &report.prj {
                println!("{}", prj.display());
            }
        }

        Command::Transparency { session, direction, layer } => {
            let mut s = open(&session, settings)?;
            select(&mut s, layer)?;
            let value = match direction {
                Step::Up => s.increase_transparency()?,
                Step::Down => s.decrease_transparency()?,
            };
            save(&mut s, &session)?;
            println!("{}", value);
        }
    }
    Ok(())
}

/// Absolute form of a user-supplied path.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn open(path: &Path, settings: Settings) -> Result<Session> {
    Session::load(&absolute(path), settings).with_context(|| format!("Failed to load session {}", path.display()))
}

fn open_or_create(path: &Path, settings: Settings) -> Result<Session> {
    if path.exists() {
        return open(path, settings);
    }
    info!("New session: {}", path.display());
    let mut s = Session::new(settings);
    s.set_project_path(Some(absolute(path)));
    Ok(s)
}

fn select(s: &mut Session, layer: Option<Uuid>) -> Result<()> {
    if let Some(id) = layer {
        if s.layer(id).is_none() {
            bail!("No layer {} in session", id);
        }
        s.set_active_layer(Some(id));
    }
    Ok(())
}

fn save(s: &mut Session, path: &Path) -> Result<()> {
    s.save(&absolute(path)).with_context(|| format!("Failed to save session {}", path.display()))
}
