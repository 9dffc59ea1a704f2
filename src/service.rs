use crate::encoder::Encoder;
use crate::error::{NotemintError, Result};
use crate::model::composition::CompositionRequest;
use crate::model::config::{MAX_PAGE_LIMIT, Settings};
use crate::model::record::{CompositionPage, CompositionRecord};
use crate::store::CompositionStore;
use crate::validation::validate;
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

/// A generated MIDI file, ready to hand back to a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Request-level operations: validation, encoding and bookkeeping in one place.
#[derive(Debug, Clone)]
pub struct CompositionService {
    encoder: Encoder,
    store: Arc<CompositionStore>,
}

impl CompositionService {
    pub fn new(settings: &Settings) -> Self {
        let store = Arc::new(CompositionStore::open(&settings.metadata_file));
        Self::with_store(settings, store)
    }

    /// Builds a service around an existing store, so several services can share one registry.
    pub fn with_store(settings: &Settings, store: Arc<CompositionStore>) -> Self {
        Self {
            encoder: Encoder::new(&settings.midi_files_dir),
            store,
        }
    }

    pub fn store(&self) -> &Arc<CompositionStore> {
        &self.store
    }

    pub fn generate(&self, request: &CompositionRequest) -> Result<CompositionRecord> {
        let description = &request.composition;
        validate(description)?;

        let encoded = self.encoder.encode(description)?;
        let record = encoded.record;

        match self.store.put(record.clone()) {
            Ok(stored) => {
                info!("Generated composition '{}' ({})..!", stored.title, stored.id);
                Ok(stored)
            }
            Err(e) => {
                if let Err(why) = fs::remove_file(record.path()) {
                    warn!(
                        "Failed to clean up {} after a failed store write: {}..!",
                        record.file_path, why
                    );
                }
                Err(e.into())
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<CompositionRecord> {
        self.store.get(id).ok_or_else(|| NotemintError::NotFound {
            what: "Composition",
            id: id.to_owned(),
        })
    }

    pub fn list(&self, skip: usize, limit: usize) -> Result<CompositionPage> {
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(NotemintError::InvalidPagination(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, limit
            )));
        }

        Ok(self.store.list(skip, limit))
    }

    /// Reads the artifact for `id`. A record whose file has gone missing is reported as
    /// `ArtifactMissing` rather than an I/O failure.
    pub fn download(&self, id: &str) -> Result<Artifact> {
        let record = self.get(id)?;
        let path = record.path();

        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => NotemintError::ArtifactMissing {
                id: record.id.clone(),
                path: path.to_path_buf(),
            },
            _ => NotemintError::Io(e),
        })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.mid", record.id));

        Ok(Artifact { file_name, bytes })
    }
}
