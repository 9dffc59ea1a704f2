use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata describing one generated artifact. Immutable once created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompositionRecord {
    pub id: String,
    pub title: String,
    pub file_path: String,
    /// ISO-8601, fixed width, so string order is creation order.
    pub created_at: String,
}

impl CompositionRecord {
    pub fn path(&self) -> &Path {
        Path::new(&self.file_path)
    }
}

/// One page of records, most recent first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompositionPage {
    pub compositions: Vec<CompositionRecord>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_json_layout() {
        let record = CompositionRecord {
            id: "test-id-1".into(),
            title: "Test Composition".into(),
            file_path: "/path/to/midi/file.mid".into(),
            created_at: "2023-01-01T12:00:00".into(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "test-id-1",
                "title": "Test Composition",
                "file_path": "/path/to/midi/file.mid",
                "created_at": "2023-01-01T12:00:00"
            })
        );
        assert_eq!(record.path(), Path::new("/path/to/midi/file.mid"));
    }
}
