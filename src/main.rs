use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use notemint::{Args, Command, CompositionRequest, CompositionService, Settings, read_midi_file};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    env_logger::init();
    let Args {
        midi_dir,
        metadata_file,
        command,
    } = Args::parse();

    let open_service = || -> Result<CompositionService> {
        let settings = Settings::new(&midi_dir, metadata_file.clone()).with_context(|| {
            format!("Failed to prepare MIDI directory '{}'", midi_dir.display())
        })?;
        debug!("Using settings: {:?}", settings);

        Ok(CompositionService::new(&settings))
    };

    match command {
        Command::Generate { request } => {
            let input = read_request(&request)?;
            let request = CompositionRequest::from_json(&input)
                .with_context(|| format!("Invalid composition request '{}'", request.display()))?;

            let record = open_service()?.generate(&request)?;
            print_json(&record)
        }
        Command::Get { id } => print_json(&open_service()?.get(&id)?),
        Command::List { skip, limit } => print_json(&open_service()?.list(skip, limit)?),
        Command::Download { id, out } => {
            let artifact = open_service()?.download(&id)?;
            let out = out.unwrap_or_else(|| PathBuf::from(&artifact.file_name));

            fs::write(&out, &artifact.bytes)
                .with_context(|| format!("Failed to write '{}'", out.display()))?;
            info!("Saved {} bytes to {}..!", artifact.bytes.len(), out.display());

            Ok(())
        }
        Command::Inspect { midi } => print_json(&read_midi_file(&midi)?),
    }
}

fn read_request(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read request from stdin")?;
        return Ok(input);
    }

    fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
