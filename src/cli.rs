use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Raster: image 0.25 (png, jpeg, tiff, bmp, gif)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Freehand raster georeferencer
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: freehand.log in the config dir)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a raster to a session (created if missing) and place it in the view
    Add {
        /// Session JSON file
        session: PathBuf,
        /// Raster to place
        raster: PathBuf,
        /// Layer title (default: file name)
        #[arg(short = 't', long)]
        title: Option<String>,
        /// Visible map extent used for the initial placement
        #[arg(long, value_names = ["XMIN", "YMIN", "XMAX", "YMAX"], num_args = 4, allow_negative_numbers = true)]
        extent: Option<Vec<f64>>,
        /// Map CRS identifier, e.g. EPSG:3857
        #[arg(long)]
        crs: Option<String>,
    },

    /// Print the metadata of every layer
    Info {
        session: PathBuf,
    },

    /// Edit the placement of a layer; each edit is one undo step
    Set {
        session: PathBuf,
        /// Layer id (default: the active layer)
        #[arg(long)]
        layer: Option<Uuid>,
        /// Clockwise rotation in degrees
        #[arg(long, allow_negative_numbers = true)]
        rotation: Option<f64>,
        #[arg(long = "x-scale")]
        x_scale: Option<f64>,
        #[arg(long = "y-scale")]
        y_scale: Option<f64>,
        /// Map coordinates of the raster center
        #[arg(long, value_names = ["X", "Y"], num_args = 2, allow_negative_numbers = true)]
        center: Option<Vec<f64>>,
        /// Two pixel/map pairs: PX1 PY1 MX1 MY1 PX2 PY2 MX2 MY2
        #[arg(long = "two-points", num_args = 8, value_name = "V", allow_negative_numbers = true)]
        two_points: Option<Vec<f64>>,
        /// Undo the newest change N times before applying edits
        #[arg(long, value_name = "N", default_value_t = 0)]
        undo: usize,
        /// Swap the raster, keeping the placement
        #[arg(long, value_name = "RASTER")]
        image: Option<PathBuf>,
        /// Transparency percentage, 0-100
        #[arg(long)]
        transparency: Option<i64>,
        /// Compositing mode, e.g. Multiply
        #[arg(long = "blend-mode")]
        blend_mode: Option<String>,
        /// CRS the layer parameters are expressed in
        #[arg(long = "layer-crs")]
        layer_crs: Option<String>,
        /// Keep the layer parameters when the map CRS changes
        #[arg(long = "pin-crs")]
        pin_crs: bool,
    },

    /// Write the world file (and a raster copy) of a layer
    Export {
        session: PathBuf,
        /// Output raster path; the world file is written next to it
        output: PathBuf,
        #[arg(long)]
        layer: Option<Uuid>,
        /// Write an axis-aligned bounding box matrix instead of the rotated one
        #[arg(long = "no-rotation")]
        no_rotation: bool,
        /// Only write the world file
        #[arg(long = "world-file-only")]
        world_file_only: bool,
    },

    /// Step the transparency of a layer
    Transparency {
        session: PathBuf,
        direction: Step,
        #[arg(long)]
        layer: Option<Uuid>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}
