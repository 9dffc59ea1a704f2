use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_MIDI_FILES_DIR: &str = "./midi_files";
pub const METADATA_FILE_NAME: &str = "metadata.json";
pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const MAX_PAGE_LIMIT: usize = 1000;

#[derive(Parser, Debug)]
#[command(
    name = "notemint",
    version,
    about = "Generate MIDI files from structured musical descriptions!"
)]
pub struct Args {
    /// Directory that generated MIDI files are written to.
    #[arg(long, env = "MIDI_FILES_DIR", default_value = DEFAULT_MIDI_FILES_DIR)]
    pub midi_dir: PathBuf,

    /// Path of the metadata snapshot. Defaults to `<midi-dir>/metadata.json`.
    #[arg(long, env = "NOTEMINT_METADATA_FILE")]
    pub metadata_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a MIDI file from a JSON composition request ('-' reads stdin).
    Generate { request: PathBuf },

    /// Print the metadata of a single composition.
    Get { id: String },

    /// List compositions, most recent first.
    List {
        /// Number of compositions to skip.
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Maximum number of compositions to return (1..=1000).
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: usize,
    },

    /// Copy a generated MIDI file out of the store.
    Download {
        id: String,

        /// Output path. Defaults to the artifact's file name in the current directory.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Summarize the tempo, instruments and notes of a MIDI file.
    Inspect { midi: PathBuf },
}

/// Resolved storage locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub midi_files_dir: PathBuf,
    pub metadata_file: PathBuf,
}

impl Settings {
    /// Resolves the locations and makes sure the directories exist.
    pub fn new<P: AsRef<Path>>(midi_files_dir: P, metadata_file: Option<PathBuf>) -> io::Result<Self> {
        let midi_files_dir = midi_files_dir.as_ref().to_path_buf();
        let metadata_file = metadata_file.unwrap_or_else(|| midi_files_dir.join(METADATA_FILE_NAME));

        fs::create_dir_all(&midi_files_dir)?;
        if let Some(parent) = metadata_file.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            midi_files_dir,
            metadata_file,
        })
    }
}
