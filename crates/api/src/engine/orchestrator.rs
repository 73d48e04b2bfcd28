//! The generation lifecycle, end to end.
//!
//! `start` runs admission, writes the ledger row, prepares and submits
//! the workflow. `check_status` advances a `processing` row by at most
//! one completion check and is safe to call at any frequency; terminal
//! rows are returned untouched. Every failure after admission lands the
//! row in `failed` and, when the failsafe is enabled, mints one
//! single-use compensation code.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use genselfie_comfyui::{GenerationBackend, JobCheck, JobResolver, OutputLocator, Resolution};
use genselfie_core::error::CoreError;
use genselfie_core::types::DbId;
use genselfie_core::workflow::{JobSpec, PinnedImageNodes, WorkflowTemplate};
use genselfie_db::models::generation::{CreateGeneration, Generation, GenerationStatus};
use genselfie_db::models::settings::Settings;
use genselfie_db::repositories::{
    GenerationRepo, InfluencerImageRepo, PaymentRepo, PresetRepo, PromoCodeRepo, SettingsRepo,
};
use genselfie_db::DbPool;

use crate::engine::admission::{AdmissionGate, AdmissionRequest, PaymentProviders};
use crate::engine::BackendFactory;
use crate::error::{AppError, AppResult};

/// Where the visitor's image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Bytes uploaded with the request, plus a file extension.
    Upload { bytes: Vec<u8>, ext: String },
    /// A publicly fetchable URL.
    Url(String),
}

/// Everything needed to start one generation.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub admission: AdmissionRequest,
    pub source: ImageSource,
    pub preset_id: Option<DbId>,
    /// Visitor-supplied prompt; honored only when the preset allows it.
    pub prompt: Option<String>,
}

/// Client-facing view of a ledger row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GenerationView {
    pub id: DbId,
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationView {
    fn from_row(row: &Generation) -> Self {
        Self {
            id: row.id,
            status: row.status(),
            result_ref: row.result_ref.clone(),
            retry_code: row.compensation_code.clone(),
            error: row.error.clone(),
        }
    }
}

/// Composes the admission gate, the ledger, the workflow template, and
/// the generation backend into the public generation operations.
pub struct Orchestrator {
    pool: DbPool,
    data_dir: PathBuf,
    resolver: JobResolver,
    backends: Arc<dyn BackendFactory>,
    providers: Arc<PaymentProviders>,
}

impl Orchestrator {
    pub fn new(
        pool: DbPool,
        data_dir: PathBuf,
        resolver: JobResolver,
        backends: Arc<dyn BackendFactory>,
        providers: Arc<PaymentProviders>,
    ) -> Self {
        Self {
            pool,
            data_dir,
            resolver,
            backends,
            providers,
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn examples_dir(&self) -> PathBuf {
        self.data_dir.join("examples")
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.data_dir.join("generated")
    }

    // ---- public operations ----

    /// Admit, record, prepare, and submit one generation.
    ///
    /// Admission happens before the ledger row exists, so a refusal
    /// leaves no trace. Everything after the row exists fails into
    /// `failed` + compensation rather than returning early.
    pub async fn start(&self, request: StartRequest) -> AppResult<GenerationView> {
        let settings = SettingsRepo::get(&self.pool).await?;

        let admission =
            AdmissionGate::authorize(&self.pool, &settings, &self.providers, &request.admission)
                .await?;

        // The admission is spent. The ledger row goes in before any I/O,
        // so every failure from here on lands on a row instead of losing
        // the consumed code or payment.
        let (source_ref, upload) = plan_source(&request.source);

        let row = GenerationRepo::create(
            &self.pool,
            &CreateGeneration {
                source_image_ref: source_ref,
                preset_id: request.preset_id,
                authorization_method: admission.method.clone(),
                authorization_ref: admission.reference.clone(),
            },
        )
        .await?;
        tracing::info!(
            generation_id = row.id,
            method = %admission.method,
            "Generation admitted"
        );

        match self.submit(&row, &settings, &request, upload).await {
            Ok(job_id) => {
                GenerationRepo::mark_processing(&self.pool, row.id, &job_id).await?;
                if let Some(ref payment_ref) = admission.reference {
                    if admission.method != "code" {
                        // Best-effort audit link; the ledger row is the
                        // source of truth.
                        let _ =
                            PaymentRepo::mark_completed(&self.pool, payment_ref, row.id).await;
                    }
                }
                tracing::info!(generation_id = row.id, job_id = %job_id, "Job submitted");
            }
            Err(e) => {
                tracing::warn!(generation_id = row.id, error = %e, "Submission failed");
                self.fail_with_compensation(row.id, "Generation could not be started", &settings)
                    .await?;
            }
        }

        let row = self.fetch(row.id).await?;
        Ok(GenerationView::from_row(&row))
    }

    /// One idempotent status check.
    ///
    /// Terminal rows come back as stored, with no backend traffic and no
    /// writes. A `processing` row gets exactly one completion check.
    pub async fn check_status(&self, id: DbId) -> AppResult<GenerationView> {
        let row = self.fetch(id).await?;
        if row.status() != GenerationStatus::Processing {
            return Ok(GenerationView::from_row(&row));
        }
        let Some(ref job_id) = row.backend_job_id else {
            // Processing without a job id cannot happen via `start`;
            // treat it as still pending rather than inventing a failure.
            return Ok(GenerationView::from_row(&row));
        };

        let settings = SettingsRepo::get(&self.pool).await?;
        let backend = self.backends.backend();

        match self.resolver.check_once(backend.as_ref(), job_id).await {
            JobCheck::Pending => {}
            JobCheck::Output(locator) => {
                self.complete(&row, backend.as_ref(), &locator).await?;
            }
            JobCheck::NoOutput => {
                self.fail_with_compensation(row.id, "Generation produced no output", &settings)
                    .await?;
            }
        }

        let row = self.fetch(id).await?;
        Ok(GenerationView::from_row(&row))
    }

    /// Drive a `processing` row to a terminal state with the full bounded
    /// poll loop (admin/batch path). Budget exhaustion fails the row.
    pub async fn resolve_blocking(&self, id: DbId) -> AppResult<GenerationView> {
        let row = self.fetch(id).await?;
        if row.status() != GenerationStatus::Processing {
            return Ok(GenerationView::from_row(&row));
        }
        let Some(job_id) = row.backend_job_id.clone() else {
            return Ok(GenerationView::from_row(&row));
        };

        let settings = SettingsRepo::get(&self.pool).await?;
        let backend = self.backends.backend();

        match self.resolver.wait(backend.as_ref(), &job_id).await {
            Resolution::Output(locator) => {
                self.complete(&row, backend.as_ref(), &locator).await?;
            }
            Resolution::NoOutput => {
                self.fail_with_compensation(row.id, "Generation produced no output", &settings)
                    .await?;
            }
            Resolution::TimedOut => {
                self.fail_with_compensation(row.id, "Generation timed out", &settings)
                    .await?;
            }
        }

        let row = self.fetch(id).await?;
        Ok(GenerationView::from_row(&row))
    }

    /// Generate a showcase output for every example input on disk
    /// (admin batch flow). Each example runs start-to-finish with the
    /// bounded poll loop; failures skip to the next input.
    pub async fn generate_examples(&self) -> AppResult<(usize, usize)> {
        let settings = SettingsRepo::get(&self.pool).await?;
        let subject = InfluencerImageRepo::find_primary(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("No subject reference images configured".into())
            })?;

        let template = self.load_template(&settings)?;
        let pinned = pinned_nodes(&settings);
        let backend = self.backends.backend();

        let mut entries = tokio::fs::read_dir(self.examples_dir()).await?;
        let mut attempted = 0usize;
        let mut succeeded = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            attempted += 1;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("example")
                .to_string();

            match self
                .run_example(backend.as_ref(), &template, &pinned, &path, &subject.filename)
                .await
            {
                Ok(saved) => {
                    succeeded += 1;
                    tracing::info!(example = %stem, saved = %saved.display(), "Example generated");
                }
                Err(e) => {
                    tracing::warn!(example = %stem, error = %e, "Example generation failed");
                }
            }
        }

        Ok((succeeded, attempted))
    }

    // ---- lifecycle steps ----

    /// Persist the visitor's image, upload the images, instantiate the
    /// template, submit. Returns the backend job id.
    async fn submit(
        &self,
        row: &Generation,
        settings: &Settings,
        request: &StartRequest,
        upload: SourceUpload,
    ) -> AppResult<String> {
        let template = self.load_template(settings)?;

        // Preset resolution: subject image, dimensions, prompt.
        let mut dimensions = None;
        let mut prompt = None;
        let mut subject_filename = None;
        if let Some(preset_id) = request.preset_id {
            let preset = PresetRepo::find_by_id(&self.pool, preset_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or(CoreError::NotFound {
                    entity: "preset",
                    id: preset_id,
                })?;
            dimensions = Some((preset.width as u32, preset.height as u32));
            prompt = match (&request.prompt, preset.allow_prompt_edit) {
                (Some(custom), true) => Some(custom.clone()),
                _ => preset.prompt.clone(),
            };
            let image = InfluencerImageRepo::find_by_id(&self.pool, preset.influencer_image_id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "influencer_image",
                    id: preset.influencer_image_id,
                })?;
            subject_filename = Some(image.filename);
        } else if let Some(image) = InfluencerImageRepo::find_primary(&self.pool).await? {
            subject_filename = Some(image.filename);
        }

        let backend = self.backends.backend();

        // Visitor image first: it always has to land.
        let input_filename = match upload {
            SourceUpload::Bytes { bytes, filename } => {
                let dir = self.uploads_dir();
                tokio::fs::create_dir_all(&dir).await?;
                tokio::fs::write(dir.join(&filename), &bytes).await?;
                if !backend.upload_image(bytes, &filename).await {
                    return Err(upload_failed());
                }
                filename
            }
            SourceUpload::Remote { url, filename } => {
                if !backend.upload_image_from_url(&url, &filename).await {
                    return Err(upload_failed());
                }
                filename
            }
        };

        // Subject reference image, read from local storage.
        if let Some(ref filename) = subject_filename {
            let bytes = tokio::fs::read(self.uploads_dir().join(filename)).await?;
            if !backend.upload_image(bytes, filename).await {
                return Err(upload_failed());
            }
        }

        let spec = JobSpec {
            input_image: input_filename,
            subject_image: subject_filename,
            dimensions,
            prompt,
            pinned: pinned_nodes(settings),
        };
        let graph = template.instantiate(&spec).to_value();

        backend
            .submit_workflow(&graph)
            .await
            .ok_or_else(|| AppError::InternalError(format!("job submission refused (row {})", row.id)))
    }

    /// Download the output into durable storage and complete the row.
    async fn complete(
        &self,
        row: &Generation,
        backend: &dyn GenerationBackend,
        locator: &OutputLocator,
    ) -> AppResult<()> {
        // A failed download keeps the row processing; the next status
        // check retries against the still-available history.
        let Some(bytes) = backend.download_output(locator).await else {
            tracing::warn!(generation_id = row.id, "Output download failed, will retry");
            return Ok(());
        };

        let dir = self.generated_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let filename = format!(
            "gen_{}_{}.png",
            row.id,
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        tokio::fs::write(dir.join(&filename), bytes).await?;

        let result_ref = format!("generated/{filename}");
        GenerationRepo::mark_completed(&self.pool, row.id, &result_ref, Utc::now()).await?;
        tracing::info!(generation_id = row.id, result = %result_ref, "Generation completed");
        Ok(())
    }

    /// Fail the row; when the failsafe is on and the transition happened,
    /// mint one single-use code and attach it. The repository guards make
    /// both steps no-ops on repeats.
    async fn fail_with_compensation(
        &self,
        id: DbId,
        reason: &str,
        settings: &Settings,
    ) -> AppResult<()> {
        let transitioned = GenerationRepo::mark_failed(&self.pool, id, reason).await?;
        if !transitioned || !settings.failsafe_enabled {
            return Ok(());
        }
        let code = PromoCodeRepo::mint_single_use(&self.pool).await?;
        if GenerationRepo::set_compensation_code(&self.pool, id, &code.code).await? {
            tracing::info!(generation_id = id, "Compensation code issued");
        } else {
            // Another writer attached one first; retire the spare.
            PromoCodeRepo::deactivate(&self.pool, code.id).await?;
        }
        Ok(())
    }

    async fn run_example(
        &self,
        backend: &dyn GenerationBackend,
        template: &WorkflowTemplate,
        pinned: &PinnedImageNodes,
        input_path: &Path,
        subject_filename: &str,
    ) -> AppResult<PathBuf> {
        let input_filename = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::InternalError("unreadable example filename".into()))?
            .to_string();

        let bytes = tokio::fs::read(input_path).await?;
        if !backend.upload_image(bytes, &input_filename).await {
            return Err(upload_failed());
        }
        let subject_bytes = tokio::fs::read(self.uploads_dir().join(subject_filename)).await?;
        if !backend.upload_image(subject_bytes, subject_filename).await {
            return Err(upload_failed());
        }

        let spec = JobSpec {
            input_image: input_filename,
            subject_image: Some(subject_filename.to_string()),
            dimensions: None,
            prompt: None,
            pinned: pinned.clone(),
        };
        let graph = template.instantiate(&spec).to_value();
        let job_id = backend
            .submit_workflow(&graph)
            .await
            .ok_or_else(|| AppError::InternalError("example submission refused".into()))?;

        let locator = match self.resolver.wait(backend, &job_id).await {
            Resolution::Output(locator) => locator,
            Resolution::NoOutput => {
                return Err(AppError::InternalError("example produced no output".into()))
            }
            Resolution::TimedOut => {
                return Err(AppError::InternalError("example timed out".into()))
            }
        };
        let bytes = backend
            .download_output(&locator)
            .await
            .ok_or_else(|| AppError::InternalError("example download failed".into()))?;

        let dir = self.generated_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("example");
        let out = dir.join(format!(
            "{stem}_{}.png",
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        ));
        tokio::fs::write(&out, bytes).await?;
        Ok(out)
    }

    // ---- helpers ----

    fn load_template(&self, settings: &Settings) -> Result<WorkflowTemplate, CoreError> {
        let definition = settings
            .workflow_json
            .as_deref()
            .ok_or_else(|| CoreError::TemplateUnavailable("no workflow configured".into()))?;
        WorkflowTemplate::parse(definition)
    }

    async fn fetch(&self, id: DbId) -> AppResult<Generation> {
        GenerationRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::NotFound {
                    entity: "generation",
                    id,
                })
            })
    }
}

enum SourceUpload {
    Bytes { bytes: Vec<u8>, filename: String },
    Remote { url: String, filename: String },
}

/// Choose the ledger reference and backend filename for the visitor's
/// image. Pure; the bytes hit disk inside the submit step, where a write
/// failure fails the row instead of escaping the lifecycle.
fn plan_source(source: &ImageSource) -> (String, SourceUpload) {
    match source {
        ImageSource::Upload { bytes, ext } => {
            let ext = sanitize_ext(ext);
            let filename = format!("fan_{}.{ext}", uuid::Uuid::new_v4().simple());
            (
                format!("uploads/{filename}"),
                SourceUpload::Bytes {
                    bytes: bytes.clone(),
                    filename,
                },
            )
        }
        ImageSource::Url(url) => {
            let filename = format!("fan_{}.png", uuid::Uuid::new_v4().simple());
            (
                url.clone(),
                SourceUpload::Remote {
                    url: url.clone(),
                    filename,
                },
            )
        }
    }
}

fn pinned_nodes(settings: &Settings) -> PinnedImageNodes {
    PinnedImageNodes {
        subject: settings.subject_node_id.clone(),
        input: settings.input_node_id.clone(),
    }
}

fn upload_failed() -> AppError {
    AppError::InternalError("image upload to backend failed".into())
}

/// Keep extensions boring: alphanumeric, short, lowercase.
fn sanitize_ext(ext: &str) -> String {
    let cleaned: String = ext
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(5)
        .collect();
    if cleaned.is_empty() {
        "png".into()
    } else {
        cleaned.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_sanitized() {
        assert_eq!(sanitize_ext("PNG"), "png");
        assert_eq!(sanitize_ext(".jpeg"), "jpeg");
        assert_eq!(sanitize_ext("../../etc"), "etc");
        assert_eq!(sanitize_ext(""), "png");
    }
}
