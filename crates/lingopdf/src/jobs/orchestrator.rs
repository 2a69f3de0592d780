//! The job orchestrator: accepts translation requests, drives the stage
//! pipeline, tracks progress, and cleans up old jobs.
//!
//! Progress advances through fixed mile markers: 5 validated, 15
//! rasterized, 40 OCR complete, 70 translated, 95 reconstructed, 100
//! done. Updates are atomic and monotone; status reads never block the
//! worker for longer than a field copy.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::choices::{ChoiceLookup, NeologismTagger, UserChoiceStore};
use crate::core::config::PipelineConfig;
use crate::layout::LayoutEngine;
use crate::ocr::{OcrService, parse_layout};
use crate::pdf::{self, PageRasterizer, PdfReconstructor, RasterOptions};
use crate::translation::{LayoutAwareTranslator, Translator};
use crate::types::{Job, JobStatus, TranslatedLayout, TranslatedPage};
use crate::{LingoError, Result};

use super::CancellationFlag;

/// Progress mile markers per completed stage.
const PROGRESS_VALIDATED: u8 = 5;
const PROGRESS_RASTERIZED: u8 = 15;
const PROGRESS_OCR_DONE: u8 = 40;
const PROGRESS_TRANSLATED: u8 = 70;
const PROGRESS_RECONSTRUCTED: u8 = 95;
const PROGRESS_DONE: u8 = 100;

/// How long `shutdown` waits for an in-flight job before marking it
/// failed.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Sweeper cadence.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// The pluggable backends the pipeline drives.
pub struct PipelineClients {
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub ocr: Arc<dyn OcrService>,
    pub translator: Arc<dyn Translator>,
    pub tagger: Option<Arc<dyn NeologismTagger>>,
    pub choices: Option<Arc<UserChoiceStore>>,
}

struct JobSlot {
    job: Mutex<Job>,
    cancel: CancellationFlag,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobSlot {
    /// Atomic, monotone update of progress and status.
    fn update(&self, progress: u8, status: Option<JobStatus>) {
        let mut job = self.job.lock();
        if job.status.is_terminal() {
            return;
        }
        job.progress = job.progress.max(progress);
        if let Some(status) = status {
            job.status = status;
        }
        job.last_updated = Utc::now();
    }

    /// Transition to FAILED exactly once.
    fn fail(&self, reason: String) {
        let mut job = self.job.lock();
        if job.status.is_terminal() {
            return;
        }
        job.status = JobStatus::Failed;
        job.error = Some(reason);
        job.last_updated = Utc::now();
    }

    fn complete(&self, output_path: PathBuf) {
        let mut job = self.job.lock();
        if job.status.is_terminal() {
            return;
        }
        job.status = JobStatus::Completed;
        job.progress = PROGRESS_DONE;
        job.output_path = Some(output_path);
        job.last_updated = Utc::now();
    }

    fn snapshot(&self) -> Job {
        self.job.lock().clone()
    }
}

struct Inner {
    config: PipelineConfig,
    clients: PipelineClients,
    jobs: Mutex<HashMap<String, Arc<JobSlot>>>,
    shutting_down: AtomicBool,
}

/// Process-wide orchestrator; create once at startup, tear down with
/// [`JobOrchestrator::shutdown`].
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

impl JobOrchestrator {
    pub fn new(config: PipelineConfig, clients: PipelineClients) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                clients,
                jobs: Mutex::new(HashMap::new()),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Queue a document for translation and return its job id.
    pub fn submit(
        &self,
        source_path: impl Into<PathBuf>,
        source_language: &str,
        target_language: &str,
    ) -> Result<String> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(LingoError::invalid_input("orchestrator is shutting down"));
        }
        validate_language_code(source_language)?;
        validate_language_code(target_language)?;

        let source_path = source_path.into();
        let job_id = Uuid::new_v4().to_string();
        let job = Job::new(&job_id, source_path, source_language, target_language);

        let slot = Arc::new(JobSlot {
            job: Mutex::new(job),
            cancel: CancellationFlag::new(),
            handle: Mutex::new(None),
        });
        self.inner.jobs.lock().insert(job_id.clone(), Arc::clone(&slot));

        let inner = Arc::clone(&self.inner);
        let worker_slot = Arc::clone(&slot);
        let handle = tokio::spawn(async move {
            let outcome = run_pipeline(&inner, &worker_slot).await;
            match outcome {
                Ok(output_path) => worker_slot.complete(output_path),
                Err(err) => {
                    if matches!(err, LingoError::Cancelled) {
                        info!(code = err.code(), "job cancelled");
                    } else {
                        error!(code = err.code(), error = %err, "job failed");
                    }
                    worker_slot.fail(err.user_message());
                }
            }
        });
        *slot.handle.lock() = Some(handle);

        info!(job = %job_id, "job submitted");
        Ok(job_id)
    }

    /// Snapshot of one job.
    pub fn status(&self, job_id: &str) -> Result<Job> {
        let slot = self.slot(job_id)?;
        Ok(slot.snapshot())
    }

    /// The output path of a completed job, or the failure reason.
    pub fn result(&self, job_id: &str) -> Result<PathBuf> {
        let job = self.status(job_id)?;
        match job.status {
            JobStatus::Completed => job.output_path.ok_or_else(|| {
                LingoError::internal("completed job is missing its output path")
            }),
            JobStatus::Failed => Err(LingoError::Internal {
                message: job.error.unwrap_or_else(|| "job failed".to_string()),
            }),
            JobStatus::Queued | JobStatus::Running => Err(LingoError::invalid_input(format!(
                "job {job_id} has not finished"
            ))),
        }
    }

    /// Signal cancellation; the worker aborts at its next suspension
    /// point. Already-terminal jobs are left untouched.
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let slot = self.slot(job_id)?;
        slot.cancel.cancel();
        Ok(())
    }

    /// All known jobs, newest first.
    pub fn jobs(&self) -> Vec<Job> {
        let slots: Vec<Arc<JobSlot>> = self.inner.jobs.lock().values().cloned().collect();
        let mut jobs: Vec<Job> = slots.iter().map(|s| s.snapshot()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Purge terminal jobs older than the retention window. Returns how
    /// many were removed.
    pub fn sweep_expired(&self) -> usize {
        let retention = chrono::Duration::hours(self.inner.config.jobs.retention_hours as i64);
        let cutoff = Utc::now() - retention;

        // Copy the key set so the sweep never iterates a map it mutates.
        let keys: Vec<String> = self.inner.jobs.lock().keys().cloned().collect();
        let mut removed = 0;
        for key in keys {
            let expired = {
                let jobs = self.inner.jobs.lock();
                jobs.get(&key)
                    .map(|slot| {
                        let job = slot.snapshot();
                        job.status.is_terminal() && job.last_updated < cutoff
                    })
                    .unwrap_or(false)
            };
            if expired {
                self.inner.jobs.lock().remove(&key);
                removed += 1;
            }
        }
        if removed > 0 {
            info!(count = removed, "swept expired jobs");
        }
        removed
    }

    /// Spawn the hourly background sweeper. The task exits on shutdown.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if orchestrator.inner.shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                orchestrator.sweep_expired();
                if let Some(choices) = &orchestrator.inner.clients.choices
                    && let Err(err) = choices.expire_sessions()
                {
                    warn!(error = %err, "session expiry sweep failed");
                }
            }
        })
    }

    /// Stop accepting jobs and drain in-flight ones. Jobs that do not
    /// finish within the drain timeout are marked FAILED with reason
    /// `SHUTDOWN`.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);

        let slots: Vec<Arc<JobSlot>> = self.inner.jobs.lock().values().cloned().collect();
        for slot in slots {
            let handle = slot.handle.lock().take();
            let Some(handle) = handle else { continue };
            if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, handle).await.is_err() {
                slot.cancel.cancel();
                slot.fail("SHUTDOWN".to_string());
            }
        }
        info!("orchestrator shut down");
    }

    fn slot(&self, job_id: &str) -> Result<Arc<JobSlot>> {
        self.inner.jobs.lock().get(job_id).cloned().ok_or_else(|| LingoError::NotFound {
            what: format!("job {job_id}"),
        })
    }
}

/// Drive all stages for one job; returns the output path.
async fn run_pipeline(inner: &Inner, slot: &JobSlot) -> Result<PathBuf> {
    let (source_path, source_language, target_language) = {
        let job = slot.job.lock();
        (
            job.source_path.clone(),
            job.source_language.clone(),
            job.target_language.clone(),
        )
    };
    slot.update(0, Some(JobStatus::Running));
    let cancel = slot.cancel.clone();

    // Stage 1: validation.
    cancel.check()?;
    let max_mb = inner.config.pdf.max_file_size_mb;
    let validate_path = source_path.clone();
    tokio::task::spawn_blocking(move || pdf::validate(&validate_path, max_mb))
        .await
        .map_err(|e| LingoError::internal(format!("validation task failed: {e}")))??;
    slot.update(PROGRESS_VALIDATED, None);

    // Stage 2: rasterization.
    cancel.check()?;
    let raster_options = RasterOptions {
        dpi: inner.config.pdf.dpi,
        ..Default::default()
    };
    let rasterized = inner
        .clients
        .rasterizer
        .rasterize(&source_path, &raster_options)
        .await?;
    slot.update(PROGRESS_RASTERIZED, None);

    // Stage 3: OCR, in chunks the service accepts.
    let chunk_size = inner.config.ocr.max_images_per_request.max(1);
    let mut page_blocks = Vec::with_capacity(rasterized.page_count());
    let mut ocr_page_sizes: Vec<(Option<f64>, Option<f64>)> = Vec::new();

    let mut index = 0;
    while index < rasterized.page_count() {
        cancel.check()?;
        let end = (index + chunk_size).min(rasterized.page_count());
        let mut images = Vec::with_capacity(end - index);
        for page in index..end {
            images.push(rasterized.read_page(page).await?);
        }

        let layout = inner.clients.ocr.process(&images).await?;
        for page in &layout.pages {
            ocr_page_sizes.push((page.width, page.height));
        }
        page_blocks.extend(parse_layout(&layout));
        index = end;
    }
    slot.update(PROGRESS_OCR_DONE, None);

    // Stage 4: layout-aware translation, page by page.
    let engine = LayoutEngine::new(inner.config.layout.clone());
    let mut translator =
        LayoutAwareTranslator::new(Arc::clone(&inner.clients.translator), engine)
            .with_batch_size(inner.config.translation.batch_size);
    if let Some(tagger) = &inner.clients.tagger {
        translator = translator.with_tagger(Arc::clone(tagger));
    }
    let choices: Option<&dyn ChoiceLookup> = inner
        .clients
        .choices
        .as_ref()
        .map(|store| store.as_ref() as &dyn ChoiceLookup);

    let mut layout = TranslatedLayout::default();
    for (page_index, blocks) in page_blocks.iter().enumerate() {
        cancel.check()?;
        let elements = translator
            .translate_blocks(blocks, &source_language, &target_language, choices, None)
            .await?;

        let mut page = TranslatedPage::new(page_index + 1);
        page.elements = elements;
        if let Some((width, height)) = rasterized.page_dimensions(page_index) {
            page = page.with_dimensions(width, height);
        } else if let Some((Some(width), Some(height))) = ocr_page_sizes.get(page_index).copied() {
            page = page.with_dimensions(width, height);
        }
        layout.pages.push(page);
    }
    slot.update(PROGRESS_TRANSLATED, None);

    // Stage 5: reconstruction.
    cancel.check()?;
    let output_path = output_path_for(&source_path, &target_language);
    let reconstructor = PdfReconstructor::new(inner.config.layout.clone());
    let out = output_path.clone();
    let stats = tokio::task::spawn_blocking(move || reconstructor.reconstruct(&layout, &out))
        .await
        .map_err(|e| LingoError::internal(format!("reconstruction task failed: {e}")))??;
    if stats.overflow_rate > 0.0 || stats.font_fallback_rate > 0.0 {
        warn!(
            overflow_rate = stats.overflow_rate,
            font_fallback_rate = stats.font_fallback_rate,
            "reconstruction finished with degradations"
        );
    }
    slot.update(PROGRESS_RECONSTRUCTED, None);

    Ok(output_path)
}

fn output_path_for(source: &Path, target_language: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    source.with_file_name(format!("{stem}.{target_language}.pdf"))
}

/// ISO 639-1: exactly two ASCII lowercase letters.
fn validate_language_code(code: &str) -> Result<()> {
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(())
    } else {
        Err(LingoError::invalid_input(format!(
            "'{code}' is not an ISO 639-1 language code"
        )))
    }
}
