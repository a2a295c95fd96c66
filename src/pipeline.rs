use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    bundles::ResultBundle,
    configs::AppConfig,
    dialogues::SourceDocument,
    renderers::RenderedOutputs,
    translators::Translator,
};

pub const ALLOWED_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Raw upload: a filename and its undecoded bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Whole-batch rejections, raised before any file is processed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no files to translate")]
    NoFiles,
    #[error("at most {max} files can be uploaded, got {got}")]
    TooManyFiles { max: usize, got: usize },
    #[error("unsupported file type '{0}', expected .txt or .md")]
    UnsupportedExtension(String),
}

#[derive(Debug, Clone)]
pub struct FileFailure {
    pub filename: String,
    pub reason: String,
}

/// Per-file result with its elapsed time.
#[derive(Debug)]
pub struct FileReport {
    pub filename: String,
    pub result: Result<RenderedOutputs, String>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct BatchReport {
    pub uploaded: usize,
    pub results: ResultBundle,
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
    pub provider_calls: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.uploaded - self.failures.len()
    }

    /// Files whose provider call failed but still rendered inline diagnostics.
    pub fn provider_failures(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_failure()).count()
    }

    pub fn total_dialogues(&self) -> usize {
        self.results.iter().map(|(_, r)| r.dialogue_count).sum()
    }

    pub fn average_secs(&self) -> Option<f64> {
        match self.succeeded() {
            0 => None,
            n => Some(self.elapsed.as_secs_f64() / n as f64),
        }
    }
}

pub struct Pipeline<T: Translator> {
    config: AppConfig,
    translator: T,
    provider_calls: AtomicUsize,
}

impl<T: Translator> Pipeline<T> {
    pub fn new(config: AppConfig, translator: T) -> Self {
        Self {
            config,
            translator,
            provider_calls: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    /// Rejects the batch before any work happens.
    pub fn check_uploads(&self, uploads: &[Upload]) -> Result<(), PipelineError> {
        if uploads.is_empty() {
            return Err(PipelineError::NoFiles);
        }
        let max = self.config.translation.max_files;
        if uploads.len() > max {
            return Err(PipelineError::TooManyFiles {
                max,
                got: uploads.len(),
            });
        }
        if let Some(bad) = uploads.iter().find(|u| !has_allowed_extension(&u.filename)) {
            return Err(PipelineError::UnsupportedExtension(bad.filename.clone()));
        }
        Ok(())
    }

    /// Count, strip, translate and render one document.
    pub async fn process_document(&self, doc: &SourceDocument) -> RenderedOutputs {
        let dialogue_count = doc.dialogue_count();
        let cleaned = doc.cleaned();

        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        let outcome = self.translator.translate(&cleaned).await;
        if let Some(failure) = outcome.failure() {
            warn!(file = %doc.filename, error = %failure, "translation failed, rendering diagnostic");
        }

        RenderedOutputs::render(outcome, dialogue_count)
    }

    async fn process_upload(&self, upload: Upload) -> FileReport {
        let start = Instant::now();
        let filename = upload.filename.clone();

        let result = match SourceDocument::from_bytes(&upload.filename, upload.bytes) {
            Ok(doc) => {
                info!(file = %doc, "translating");
                Ok(self.process_document(&doc).await)
            }
            Err(e) => {
                warn!(file = %filename, error = %e, "skipping file");
                Err(format!("{:#}", e))
            }
        };

        FileReport {
            filename,
            result,
            elapsed: start.elapsed(),
        }
    }

    /// Processes every upload, `file_concurrent` at a time, keeping upload
    /// order in the returned bundle. One file failing never aborts the rest.
    pub async fn run(&self, uploads: Vec<Upload>) -> Result<BatchReport, PipelineError> {
        self.run_with_progress(uploads, |_| {}).await
    }

    /// Like [`Pipeline::run`], calling `on_file` as each file completes.
    pub async fn run_with_progress<F>(
        &self,
        uploads: Vec<Upload>,
        mut on_file: F,
    ) -> Result<BatchReport, PipelineError>
    where
        F: FnMut(&FileReport),
    {
        self.check_uploads(&uploads)?;

        let start = Instant::now();
        let calls_before = self.provider_calls.load(Ordering::Relaxed);
        let uploaded = uploads.len();

        let files: Vec<FileReport> = stream::iter(uploads)
            .map(|upload| self.process_upload(upload))
            .buffered(self.config.translation.file_concurrent.max(1))
            .inspect(|report| on_file(report))
            .collect()
            .await;

        let mut results = ResultBundle::new();
        let mut failures = Vec::new();
        for report in &files {
            match &report.result {
                Ok(outputs) => results.insert(report.filename.clone(), outputs.clone()),
                Err(reason) => failures.push(FileFailure {
                    filename: report.filename.clone(),
                    reason: reason.clone(),
                }),
            }
        }

        let report = BatchReport {
            uploaded,
            results,
            files,
            failures,
            provider_calls: self.provider_calls.load(Ordering::Relaxed) - calls_before,
            elapsed: start.elapsed(),
        };

        info!(
            uploaded = report.uploaded,
            succeeded = report.succeeded(),
            provider_calls = report.provider_calls,
            elapsed_ms = report.elapsed.as_millis(),
            "batch finished"
        );

        Ok(report)
    }
}

pub fn has_allowed_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}
