//! Command line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use provision_config::ColorChoice;
use std::path::PathBuf;

/// provision - Turn disk images into machine images
#[derive(Parser)]
#[command(name = "provision")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn disk images into machine images with live progress")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Write debug logs to the log directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorArg>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Image store directory
    #[arg(long, global = true, value_name = "DIR")]
    pub store: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Provision a machine image from a disk image file
    Image {
        /// Path to the raw disk image
        file: PathBuf,

        /// Name of the resulting image (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Skip re-hashing the image after upload
        #[arg(long)]
        no_verify: bool,

        /// Read and write in chunks of this many bytes
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<usize>,
    },

    /// List stored images
    #[command(alias = "ls")]
    List,

    /// Show the manifest of a stored image
    Status {
        /// Image name
        name: String,
    },
}

/// Color choice as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorArg {
    Always,
    Auto,
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(value: ColorArg) -> Self {
        match value {
            ColorArg::Always => ColorChoice::Always,
            ColorArg::Auto => ColorChoice::Auto,
            ColorArg::Never => ColorChoice::Never,
        }
    }
}
