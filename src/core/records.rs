use crate::models::{CandidateRecord, Category, Gender, Platform};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    #[error("Failed to read record file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only collection of candidate identity records
#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Vec<CandidateRecord>,
}

impl RecordStore {
    /// Build a store, rejecting duplicate ids
    pub fn new(records: Vec<CandidateRecord>) -> Result<Self, RecordStoreError> {
        {
            let mut seen = HashSet::with_capacity(records.len());
            for record in &records {
                if !seen.insert(record.id.as_str()) {
                    return Err(RecordStoreError::DuplicateId(record.id.clone()));
                }
            }
        }
        Ok(Self { records })
    }

    /// Load records from a JSON array on disk
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, RecordStoreError> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<CandidateRecord> = serde_json::from_str(&raw)?;
        Self::new(records)
    }

    /// The demonstration data set
    pub fn builtin() -> Self {
        Self {
            records: builtin_records(),
        }
    }

    pub fn all(&self) -> &[CandidateRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CandidateRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn find_by_national_id(&self, national_id: &str, platform: Platform) -> Option<&CandidateRecord> {
        self.records
            .iter()
            .find(|r| r.national_id == national_id && r.platform == platform)
    }
}

#[allow(clippy::too_many_arguments)]
fn record(
    id: &str,
    name: &str,
    cpf: &str,
    photo: &str,
    platform: Platform,
    category: Category,
    gender: Gender,
    has_registration: bool,
) -> CandidateRecord {
    CandidateRecord {
        id: id.to_string(),
        display_name: name.to_string(),
        national_id: cpf.to_string(),
        photo_ref: photo.to_string(),
        platform,
        category,
        gender,
        has_registration,
    }
}

fn builtin_records() -> Vec<CandidateRecord> {
    vec![
        record(
            "1",
            "João Silva Santos",
            "123.456.789-01",
            "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=400&h=400&fit=crop",
            Platform::NinetyNinePop,
            Category::Carro,
            Gender::Masculino,
            false,
        ),
        record(
            "2",
            "Maria Oliveira Costa",
            "987.654.321-09",
            "https://images.unsplash.com/photo-1494790108755-2616b612b786?w=400&h=400&fit=crop",
            Platform::Uber,
            Category::Carro,
            Gender::Feminino,
            false,
        ),
        record(
            "3",
            "Carlos Eduardo Lima",
            "456.789.123-45",
            "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e?w=400&h=400&fit=crop",
            Platform::Abas,
            Category::Moto,
            Gender::Masculino,
            true,
        ),
        record(
            "4",
            "Ana Paula Ferreira",
            "789.123.456-78",
            "https://images.unsplash.com/photo-1438761681033-6461ffad8d80?w=400&h=400&fit=crop",
            Platform::NinetyNinePop,
            Category::Moto,
            Gender::Feminino,
            false,
        ),
        record(
            "5",
            "Roberto Almeida Souza",
            "321.654.987-12",
            "https://images.unsplash.com/photo-1500648767791-00dcc994a43e?w=400&h=400&fit=crop",
            Platform::Uber,
            Category::Carro,
            Gender::Masculino,
            false,
        ),
    ]
}
