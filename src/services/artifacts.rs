use crate::core::controller::{FlowError, FlowSession, Step};
use crate::core::masking::mask_sensitive_data;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to write artifact {filename}: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact file name: {0}")]
    InvalidName(String),

    #[error("Artifact sink is unavailable")]
    Unavailable,
}

/// Destination for downloadable files
pub trait ArtifactSink: std::fmt::Debug + Send + Sync {
    fn emit(&self, filename: &str, content: &[u8]) -> Result<(), ArtifactError>;
}

/// File produced for a completed purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub content: String,
}

/// Build the text summary and the photo reference for a paid flow.
///
/// Only masked identity data ever leaves through these files.
pub fn build_artifacts(
    session: &FlowSession,
    generated_at: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<Artifact>, FlowError> {
    if session.step != Step::Download {
        return Err(FlowError::InvalidTransition {
            step: session.step,
            event: "download",
        });
    }
    let selected = session.selected.as_ref().ok_or(FlowError::InvalidTransition {
        step: session.step,
        event: "download",
    })?;
    let payment = session.payment.as_ref().ok_or(FlowError::PaymentNotIssued)?;

    let record = &selected.record;
    let masked = mask_sensitive_data(&record.display_name, &record.national_id);
    let status = if selected.has_registration {
        "Cadastrado"
    } else {
        "Disponível"
    };

    let summary = format!(
        "Dados do arquivo\n\
         Nome: {}\n\
         CPF: {}\n\
         Plataforma: {}\n\
         Categoria: {}\n\
         Gênero: {}\n\
         Similaridade: {:.1}%\n\
         Pedido: {}\n\
         Data da análise: {}\n\
         ID do arquivo: {}\n\
         Status: {}\n",
        masked.name,
        masked.national_id,
        record.platform,
        record.category,
        record.gender,
        selected.similarity,
        payment.order_id,
        generated_at.format("%d/%m/%Y %H:%M:%S UTC"),
        record.id,
        status,
    );

    Ok(vec![
        Artifact {
            filename: format!("dados_{}.txt", record.id),
            content_type: "text/plain; charset=utf-8".to_string(),
            content: summary,
        },
        Artifact {
            filename: format!("foto_{}.url", record.id),
            content_type: "text/uri-list".to_string(),
            content: format!("{}\n", record.photo_ref),
        },
    ])
}

/// Write every artifact to a sink, stopping at the first failure
pub fn emit_all(sink: &dyn ArtifactSink, artifacts: &[Artifact]) -> Result<(), ArtifactError> {
    for artifact in artifacts {
        sink.emit(&artifact.filename, artifact.content.as_bytes())?;
        tracing::debug!("Emitted artifact {}", artifact.filename);
    }
    Ok(())
}

/// Writes artifacts into a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ArtifactSink for DirectorySink {
    fn emit(&self, filename: &str, content: &[u8]) -> Result<(), ArtifactError> {
        // Flat names only, nothing that escapes the root
        if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
            return Err(ArtifactError::InvalidName(filename.to_string()));
        }

        let io_err = |source| ArtifactError::Io {
            filename: filename.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.root).map_err(io_err)?;
        std::fs::write(self.root.join(filename), content).map_err(io_err)
    }
}

/// Keeps emitted files in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files
            .lock()
            .map(|files| files.clone())
            .unwrap_or_default()
    }
}

impl ArtifactSink for MemorySink {
    fn emit(&self, filename: &str, content: &[u8]) -> Result<(), ArtifactError> {
        let mut files = self.files.lock().map_err(|_| ArtifactError::Unavailable)?;
        files.push((filename.to_string(), content.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::RecordStore;
    use crate::models::{MatchResult, PaymentSession};
    use chrono::{Duration, TimeZone, Utc};

    fn paid_session() -> FlowSession {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let selected = MatchResult {
            record: RecordStore::builtin().get("1").unwrap().clone(),
            similarity: 87.3,
            has_registration: false,
        };
        FlowSession {
            step: Step::Download,
            selected: Some(selected.clone()),
            matches: vec![selected],
            payment: Some(PaymentSession {
                code: "000201".to_string(),
                amount_cents: 4000,
                order_id: "FM42".to_string(),
                match_id: "1".to_string(),
                created_at: created,
                expires_at: created + Duration::minutes(15),
            }),
            ..FlowSession::default()
        }
    }

    #[test]
    fn test_summary_contains_masked_data_only() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 5, 0).unwrap();
        let artifacts = build_artifacts(&paid_session(), at).unwrap();

        assert_eq!(artifacts.len(), 2);
        let summary = &artifacts[0];
        assert_eq!(summary.filename, "dados_1.txt");
        assert!(summary.content.contains("Nome: João S**** S*****"));
        assert!(summary.content.contains("CPF: 123.***.***-01"));
        assert!(summary.content.contains("Plataforma: 99 Pop"));
        assert!(summary.content.contains("Similaridade: 87.3%"));
        assert!(summary.content.contains("Data da análise: 01/03/2026 12:05:00 UTC"));
        assert!(!summary.content.contains("Silva"));
        assert!(!summary.content.contains("456.789"));

        assert_eq!(artifacts[1].filename, "foto_1.url");
        assert!(artifacts[1].content.starts_with("https://"));
    }

    #[test]
    fn test_artifacts_require_download_step() {
        let mut session = paid_session();
        session.step = Step::Payment;

        let err = build_artifacts(&session, Utc::now()).unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition { step: Step::Payment, .. }));
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        let artifacts = build_artifacts(&paid_session(), Utc::now()).unwrap();

        emit_all(&sink, &artifacts).unwrap();

        let files = sink.files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, "dados_1.txt");
    }

    #[test]
    fn test_directory_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));

        sink.emit("dados_1.txt", b"hello").unwrap();

        let written = std::fs::read(dir.path().join("out").join("dados_1.txt")).unwrap();
        assert_eq!(written, b"hello");
    }

    #[test]
    fn test_directory_sink_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());

        assert!(matches!(
            sink.emit("../evil.txt", b"x"),
            Err(ArtifactError::InvalidName(_))
        ));
    }
}
