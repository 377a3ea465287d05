use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use persona_contracts::events::{EventPayload, EventWriter};
use persona_contracts::models::{ModelSelector, ModelSpec, IMAGE_CAPABILITY};
use persona_contracts::studio::{
    GenerationError, GenerationRequest, GenerationState, History, HistoryEntry,
    PendingGeneration, SelectionAxis, SelectionChange, StudioError, StudioState, DATA_URI_MIME,
};
use persona_contracts::summary::{write_summary, HistorySummary, SessionSummary};
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::key_gate::{CredentialSlot, KeyGate, KeyGateCheck};
use crate::prompt::build_character_prompt;
use crate::providers::{
    map_object, push_unique_warning, DryrunProvider, GeminiProvider, ImageGenerator,
    ImageGeneratorRegistry, ProviderGenerateRequest, ProviderGenerateResponse,
    SQUARE_ASPECT_RATIO,
};

pub fn default_generators(
    config: &EngineConfig,
    credentials: &CredentialSlot,
) -> ImageGeneratorRegistry {
    let mut generators = ImageGeneratorRegistry::new();
    generators.register(GeminiProvider::new(config, credentials.clone()));
    generators.register(DryrunProvider);
    generators
}

/// A started generation, detached from the studio so it can run on a worker
/// thread. Hand the result of [`GenerationJob::run`] back to
/// [`Studio::complete`].
pub struct GenerationJob {
    pending: PendingGeneration,
    generator: Arc<dyn ImageGenerator>,
    request: ProviderGenerateRequest,
}

impl GenerationJob {
    pub fn request(&self) -> &GenerationRequest {
        self.pending.request()
    }

    pub fn run(self) -> CompletedGeneration {
        let started = Instant::now();
        let outcome = self.generator.generate(&self.request);
        CompletedGeneration {
            pending: self.pending,
            provider: self.generator.name().to_string(),
            model: self.request.model,
            outcome,
            latency_s: started.elapsed().as_secs_f64(),
        }
    }
}

pub struct CompletedGeneration {
    pending: PendingGeneration,
    provider: String,
    model: String,
    outcome: Result<ProviderGenerateResponse, GenerationError>,
    latency_s: f64,
}

impl CompletedGeneration {
    pub fn request(&self) -> &GenerationRequest {
        self.pending.request()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
}

/// Owns the state machine for one session and performs its effects:
/// generator calls, downloads and the event log.
pub struct Studio {
    state: StudioState,
    gate: KeyGate,
    credentials: CredentialSlot,
    generators: ImageGeneratorRegistry,
    model_selector: ModelSelector,
    model: ModelSpec,
    last_fallback_reason: Option<String>,
    events: EventWriter,
    out_dir: PathBuf,
    started_at: DateTime<Utc>,
    counters: SessionCounters,
}

impl Studio {
    pub fn new(config: &EngineConfig, gate: KeyGate, credentials: CredentialSlot) -> Result<Self> {
        let generators = default_generators(config, &credentials);
        Self::with_generators(config, gate, credentials, generators)
    }

    pub fn with_generators(
        config: &EngineConfig,
        gate: KeyGate,
        credentials: CredentialSlot,
        generators: ImageGeneratorRegistry,
    ) -> Result<Self> {
        fs::create_dir_all(&config.out_dir).with_context(|| {
            format!("failed to create output dir {}", config.out_dir.display())
        })?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let events = EventWriter::new(config.resolved_events_path(), session_id);
        let model_selector = ModelSelector::new(None);
        let selection = model_selector
            .select(config.model.as_deref(), IMAGE_CAPABILITY)
            .map_err(|message| anyhow!(message))?;

        events.emit(
            "session_started",
            map_object(json!({
                "out_dir": config.out_dir.to_string_lossy().to_string(),
                "model": selection.model.name,
                "provider": selection.model.provider,
                "model_fallback": selection.fallback_reason,
                "generators": generators.names(),
            })),
        )?;

        Ok(Self {
            state: StudioState::new(),
            gate,
            credentials,
            generators,
            model_selector,
            model: selection.model,
            last_fallback_reason: selection.fallback_reason,
            events,
            out_dir: config.out_dir.clone(),
            started_at: Utc::now(),
            counters: SessionCounters::default(),
        })
    }

    pub fn state(&self) -> &StudioState {
        &self.state
    }

    pub fn selection(&self) -> &GenerationRequest {
        self.state.selection()
    }

    pub fn generation(&self) -> &GenerationState {
        self.state.generation()
    }

    pub fn history(&self) -> &History {
        self.state.history()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn last_fallback_reason(&self) -> Option<&str> {
        self.last_fallback_reason.as_deref()
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn events_path(&self) -> &Path {
        self.events.path()
    }

    pub fn session_id(&self) -> &str {
        self.events.session_id()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn has_credential(&self) -> bool {
        self.credentials.has_key()
    }

    pub fn emit_event(&self, event_type: &str, payload: EventPayload) -> Result<Value> {
        self.events.emit(event_type, payload)
    }

    pub fn is_key_usable(&self) -> bool {
        self.gate.is_usable()
    }

    pub fn check_key_gate(&mut self) -> Result<KeyGateCheck> {
        let outcome = self.gate.check();
        let detail = match &outcome {
            KeyGateCheck::HostUnavailable(detail) => Some(detail.clone()),
            _ => None,
        };
        self.events.emit(
            "key_gate_checked",
            map_object(json!({
                "outcome": outcome.label(),
                "usable": self.gate.is_usable(),
                "has_host": self.gate.has_host(),
                "detail": detail,
            })),
        )?;
        Ok(outcome)
    }

    /// Opens the host's key picker. A picker error leaves the gate closed.
    pub fn request_key_selection(&mut self) -> Result<bool> {
        let usable = self
            .gate
            .request_selection()
            .context("key selection failed")?;
        self.events.emit(
            "key_selected",
            map_object(json!({
                "via": "host",
                "usable": usable,
                "has_key": self.credentials.has_key(),
            })),
        )?;
        Ok(usable)
    }

    /// Applies to the next generation; one already in flight keeps its key.
    pub fn select_key(&mut self, key: &str) -> Result<bool> {
        self.credentials.select(key);
        let has_key = self.credentials.has_key();
        self.events.emit(
            "key_selected",
            map_object(json!({
                "via": "manual",
                "usable": self.gate.is_usable(),
                "has_key": has_key,
            })),
        )?;
        Ok(has_key)
    }

    pub fn set_model(&mut self, requested: Option<&str>) -> Result<&ModelSpec> {
        let selection = self
            .model_selector
            .select(requested, IMAGE_CAPABILITY)
            .map_err(|message| anyhow!(message))?;
        self.events.emit(
            "model_selected",
            map_object(json!({
                "requested": selection.requested,
                "model": selection.model.name,
                "provider": selection.model.provider,
                "model_fallback": selection.fallback_reason,
            })),
        )?;
        self.model = selection.model;
        self.last_fallback_reason = selection.fallback_reason;
        Ok(&self.model)
    }

    pub fn available_models(&self) -> Vec<ModelSpec> {
        self.model_selector
            .registry
            .by_capability(IMAGE_CAPABILITY)
    }

    pub fn select(&mut self, change: SelectionChange) -> Result<bool> {
        let changed = self.state.select(change);
        if changed {
            let mut payload = self.state.selection().event_fields();
            payload.insert(
                "axis".to_string(),
                Value::String(change.axis().key().to_string()),
            );
            payload.insert(
                "value".to_string(),
                Value::String(change.value_label().to_string()),
            );
            payload.insert("loading".to_string(), Value::Bool(self.state.is_loading()));
            self.events.emit("selection_changed", payload)?;
        }
        Ok(changed)
    }

    pub fn select_from_str(&mut self, axis: SelectionAxis, raw: &str) -> Result<bool> {
        let change = SelectionChange::parse(axis, raw)?;
        self.select(change)
    }

    /// Snapshots the selection and enters Loading. Fails with
    /// [`StudioError::GenerationInFlight`] while another job is running.
    pub fn begin_generation(&mut self) -> Result<GenerationJob> {
        let generator = self.generators.get(&self.model.provider).ok_or_else(|| {
            anyhow!(
                "no image generator registered for provider '{}'",
                self.model.provider
            )
        })?;

        let pending = match self.state.begin_generation(Utc::now()) {
            Ok(pending) => pending,
            Err(err) => {
                self.counters.rejected += 1;
                let mut payload = self.state.selection().event_fields();
                payload.insert("reason".to_string(), Value::String(err.to_string()));
                self.events.emit("generation_rejected", payload)?;
                return Err(err.into());
            }
        };

        let prompt = build_character_prompt(pending.request());
        let mut payload = pending.request().event_fields();
        payload.insert("model".to_string(), Value::String(self.model.name.clone()));
        payload.insert(
            "provider".to_string(),
            Value::String(self.model.provider.clone()),
        );
        payload.insert(
            "prompt_chars".to_string(),
            Value::Number((prompt.chars().count() as u64).into()),
        );
        payload.insert(
            "started_at".to_string(),
            Value::String(
                pending
                    .started_at()
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        );
        if let Some(reason) = self.last_fallback_reason.as_ref() {
            payload.insert("model_fallback".to_string(), Value::String(reason.clone()));
        }
        if let Err(err) = self.events.emit("generation_started", payload) {
            self.state.abandon_generation(pending);
            return Err(err);
        }

        let request = ProviderGenerateRequest {
            model: self.model.name.clone(),
            prompt,
            aspect_ratio: SQUARE_ASPECT_RATIO,
            selection: *pending.request(),
        };
        Ok(GenerationJob {
            pending,
            generator,
            request,
        })
    }

    /// Folds a finished job back into the state. Last write wins: a restore
    /// made while the job was running is replaced by this result.
    pub fn complete(&mut self, completed: CompletedGeneration) -> Result<&GenerationState> {
        let CompletedGeneration {
            pending,
            provider,
            model,
            outcome,
            latency_s,
        } = completed;
        let mut payload = pending.request().event_fields();
        payload.insert("model".to_string(), Value::String(model));
        payload.insert("provider".to_string(), Value::String(provider));
        payload.insert("latency_s".to_string(), json!(latency_s));

        match outcome {
            Ok(response) => {
                let ProviderGenerateResponse {
                    payload: image,
                    provider_request,
                    provider_response,
                    mut warnings,
                } = response;
                if let Some(declared) = image.declared_mime() {
                    if !declared.eq_ignore_ascii_case(DATA_URI_MIME) {
                        push_unique_warning(
                            &mut warnings,
                            format!("Service returned {declared}; result is labelled {DATA_URI_MIME}."),
                        );
                    }
                }
                payload.insert(
                    "declared_mime".to_string(),
                    image
                        .declared_mime()
                        .map(|mime| Value::String(mime.to_string()))
                        .unwrap_or(Value::Null),
                );

                self.state
                    .complete_generation(pending, Ok(image), Utc::now());
                self.counters.succeeded += 1;
                if let Some(entry) = self.state.history().latest() {
                    payload.insert("entry_id".to_string(), Value::String(entry.id.clone()));
                    payload.insert(
                        "bytes".to_string(),
                        Value::Number((entry.payload.len() as u64).into()),
                    );
                }
                payload.insert("warnings".to_string(), json!(warnings));
                payload.insert("provider_request".to_string(), Value::Object(provider_request));
                payload.insert(
                    "provider_response".to_string(),
                    Value::Object(provider_response),
                );
                self.events.emit("generation_succeeded", payload)?;
            }
            Err(err) => {
                payload.insert("error".to_string(), Value::String(err.to_string()));
                let state = self
                    .state
                    .complete_generation(pending, Err(err), Utc::now());
                if let Some(message) = state.error() {
                    payload.insert("message".to_string(), Value::String(message.to_string()));
                }
                self.counters.failed += 1;
                self.events.emit("generation_failed", payload)?;
            }
        }
        Ok(self.state.generation())
    }

    /// Runs one generation on the calling thread.
    pub fn generate(&mut self) -> Result<&GenerationState> {
        let job = self.begin_generation()?;
        let completed = job.run();
        self.complete(completed)
    }

    pub fn dismiss_error(&mut self) -> Result<bool> {
        let dismissed = self.state.dismiss_error();
        if dismissed {
            self.events.emit("error_dismissed", EventPayload::new())?;
        }
        Ok(dismissed)
    }

    /// Accepts a 1-based position (newest first) or an entry id.
    pub fn restore(&mut self, reference: &str) -> Result<&HistoryEntry> {
        let reference = reference.trim();
        let entry_id = self
            .state
            .history()
            .resolve(reference)
            .map(|entry| entry.id.clone())
            .ok_or_else(|| StudioError::UnknownHistoryEntry(reference.to_string()))?;
        let loading = self.state.is_loading();
        let entry = self.state.restore(&entry_id)?;
        let mut payload = entry.event_fields();
        payload.insert("loading".to_string(), Value::Bool(loading));
        self.events.emit("history_restored", payload)?;
        Ok(entry)
    }

    /// Writes the current result under `dir` (the output dir by default).
    pub fn download(&mut self, dir: Option<&Path>) -> Result<PathBuf> {
        let (file_name, payload) = self.state.download_target()?;
        let dir = dir.unwrap_or(&self.out_dir);
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create download dir {}", dir.display()))?;
        let path = dir.join(&file_name);
        fs::write(&path, payload.bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;

        let mut event = self.state.selection().event_fields();
        event.insert("file_name".to_string(), Value::String(file_name));
        event.insert(
            "path".to_string(),
            Value::String(path.to_string_lossy().to_string()),
        );
        event.insert(
            "bytes".to_string(),
            Value::Number((payload.len() as u64).into()),
        );
        self.events.emit("image_downloaded", event)?;
        Ok(path)
    }

    /// Writes `summary.json` next to the downloads and closes the event log.
    pub fn finish(&mut self) -> Result<PathBuf> {
        let summary = SessionSummary {
            session_id: self.events.session_id().to_string(),
            started_at: self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            model: self.model.name.clone(),
            generations_succeeded: self.counters.succeeded,
            generations_failed: self.counters.failed,
            generations_rejected: self.counters.rejected,
            history: self
                .state
                .history()
                .iter()
                .map(HistorySummary::from_entry)
                .collect(),
        };
        let summary_path = self.out_dir.join("summary.json");
        write_summary(&summary_path, &summary)?;

        self.events.emit(
            "session_finished",
            map_object(json!({
                "started_at": summary.started_at,
                "history_entries": summary.history.len(),
                "generations_succeeded": summary.generations_succeeded,
                "generations_failed": summary.generations_failed,
                "generations_rejected": summary.generations_rejected,
                "loading": self.state.is_loading(),
                "summary_path": summary_path.to_string_lossy().to_string(),
            })),
        )?;
        Ok(summary_path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use anyhow::Result;
    use persona_contracts::catalog::{find_archetype, find_style, Gender, ImageSize};
    use persona_contracts::studio::{
        GenerationError, GenerationState, ImagePayload, SelectionAxis, SelectionChange,
        StudioError,
    };
    use persona_contracts::summary::SessionSummary;
    use serde_json::{json, Map, Value};

    use super::Studio;
    use crate::config::EngineConfig;
    use crate::key_gate::{CredentialSlot, KeyGate, KeyGateCheck};
    use crate::providers::{
        DryrunProvider, ImageGenerator, ImageGeneratorRegistry, ProviderGenerateRequest,
        ProviderGenerateResponse,
    };

    type Calls = Arc<Mutex<Vec<ProviderGenerateRequest>>>;

    struct ScriptedGenerator {
        outcomes: Mutex<VecDeque<Result<ImagePayload, GenerationError>>>,
        calls: Calls,
    }

    impl ImageGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "gemini"
        }

        fn generate(
            &self,
            request: &ProviderGenerateRequest,
        ) -> Result<ProviderGenerateResponse, GenerationError> {
            self.calls.lock().unwrap().push(request.clone());
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerationError::NoImageInResponse));
            outcome.map(|payload| ProviderGenerateResponse {
                payload,
                provider_request: Map::new(),
                provider_response: Map::new(),
                warnings: Vec::new(),
            })
        }
    }

    fn png(tag: u8) -> ImagePayload {
        ImagePayload::new(vec![0x89, b'P', b'N', b'G', tag], Some("image/png".to_string()))
    }

    fn studio(
        root: &Path,
        outcomes: Vec<Result<ImagePayload, GenerationError>>,
    ) -> Result<(Studio, Calls)> {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let mut generators = ImageGeneratorRegistry::new();
        generators.register(ScriptedGenerator {
            outcomes: Mutex::new(outcomes.into()),
            calls: Arc::clone(&calls),
        });
        generators.register(DryrunProvider);
        let config = EngineConfig::default().with_out_dir(root.join("out"));
        let studio = Studio::with_generators(
            &config,
            KeyGate::permissive(),
            CredentialSlot::without_environment(),
            generators,
        )?;
        Ok((studio, calls))
    }

    fn select(studio: &mut Studio, code: &str, style: &str, gender: Gender, size: ImageSize) -> Result<()> {
        studio.select(SelectionChange::Archetype(find_archetype(code).unwrap()))?;
        studio.select(SelectionChange::Style(find_style(style).unwrap()))?;
        studio.select(SelectionChange::Gender(gender))?;
        studio.select(SelectionChange::Size(size))?;
        Ok(())
    }

    fn read_events(studio: &Studio) -> Result<Vec<Value>> {
        let content = fs::read_to_string(studio.events_path())?;
        content
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).map_err(anyhow::Error::from))
            .collect()
    }

    fn event_types(studio: &Studio) -> Result<Vec<String>> {
        Ok(read_events(studio)?
            .iter()
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect())
    }

    #[test]
    fn enfp_watercolor_generation_lands_in_history() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, calls) = studio(temp.path(), vec![Ok(png(1))])?;
        select(&mut studio, "ENFP", "watercolor", Gender::Male, ImageSize::FourK)?;

        let state = studio.generate()?;
        assert_eq!(state.payload(), Some(&png(1)));
        assert_eq!(studio.history().len(), 1);
        let entry = studio.history().latest().unwrap();
        assert_eq!(entry.request.archetype.code, "ENFP");
        assert_eq!(entry.request.style.id, "watercolor");
        assert_eq!(entry.request.gender, Gender::Male);
        assert_eq!(entry.request.size, ImageSize::FourK);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gemini-3-pro-image-preview");
        assert_eq!(calls[0].aspect_ratio, "1:1");
        assert_eq!(calls[0].selection.size, ImageSize::FourK);
        assert!(calls[0].prompt.contains("ENFP personality type"));

        let events = read_events(&studio)?;
        let succeeded = events
            .iter()
            .find(|event| event["type"] == json!("generation_succeeded"))
            .unwrap();
        assert_eq!(succeeded["archetype"], json!("ENFP"));
        assert_eq!(succeeded["size"], json!("4K"));
        assert_eq!(succeeded["entry_id"], json!(entry.id));
        Ok(())
    }

    #[test]
    fn failed_generation_shows_message_until_dismissed() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, _) = studio(temp.path(), vec![Err(GenerationError::NoImageInResponse)])?;

        let state = studio.generate()?;
        assert_eq!(
            state.error(),
            Some("Failed to generate image. Please try again. No image data found in response")
        );
        assert!(studio.history().is_empty());
        assert!(!studio.is_loading());

        assert!(studio.dismiss_error()?);
        assert_eq!(*studio.generation(), GenerationState::Idle);
        assert!(!studio.dismiss_error()?);

        let types = event_types(&studio)?;
        assert!(types.contains(&"generation_failed".to_string()));
        assert_eq!(
            types.iter().filter(|kind| *kind == "error_dismissed").count(),
            1
        );
        Ok(())
    }

    #[test]
    fn unwritable_event_log_does_not_leave_studio_loading() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, calls) = studio(temp.path(), vec![Ok(png(9))])?;
        let events_path = studio.events_path().to_path_buf();
        fs::remove_file(&events_path)?;
        fs::create_dir(&events_path)?;

        assert!(studio.begin_generation().is_err());
        assert!(!studio.is_loading());
        assert_eq!(*studio.generation(), GenerationState::Idle);

        fs::remove_dir(&events_path)?;
        let job = studio.begin_generation()?;
        assert!(studio.is_loading());
        let state = studio.complete(job.run())?;
        assert_eq!(state.payload(), Some(&png(9)));
        assert_eq!(calls.lock().unwrap().len(), 1);

        let started = read_events(&studio)?
            .into_iter()
            .find(|event| event["type"] == json!("generation_started"))
            .unwrap();
        assert!(started["started_at"].as_str().is_some());
        Ok(())
    }

    #[test]
    fn worker_thread_job_keeps_call_time_snapshot() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, _) = studio(temp.path(), vec![Ok(png(2))])?;
        select(&mut studio, "ISTJ", "oil", Gender::Female, ImageSize::OneK)?;

        let job = studio.begin_generation()?;
        assert!(studio.is_loading());
        let worker = thread::spawn(move || job.run());

        select(&mut studio, "ESTP", "comic", Gender::Male, ImageSize::TwoK)?;
        let err = studio.begin_generation().err().unwrap();
        assert_eq!(
            err.downcast_ref::<StudioError>(),
            Some(&StudioError::GenerationInFlight)
        );

        let completed = worker.join().unwrap();
        assert!(completed.is_success());
        studio.complete(completed)?;

        let entry = studio.history().latest().unwrap();
        assert_eq!(entry.request.archetype.code, "ISTJ");
        assert_eq!(studio.selection().archetype.code, "ESTP");
        assert_eq!(studio.counters().rejected, 1);
        assert!(event_types(&studio)?.contains(&"generation_rejected".to_string()));
        Ok(())
    }

    #[test]
    fn restore_by_position_or_id() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, _) = studio(temp.path(), vec![Ok(png(3)), Ok(png(4))])?;
        select(&mut studio, "INTJ", "anime", Gender::Female, ImageSize::OneK)?;
        studio.generate()?;
        select(&mut studio, "ESFJ", "pixel", Gender::Male, ImageSize::TwoK)?;
        studio.generate()?;

        let older = studio.restore("2")?;
        assert_eq!(older.payload, png(3));
        assert_eq!(studio.selection().archetype.code, "INTJ");
        assert_eq!(studio.generation().payload(), Some(&png(3)));

        let newest_id = studio.history().latest().unwrap().id.clone();
        studio.restore(&newest_id)?;
        assert_eq!(studio.selection().style.id, "pixel");

        let err = studio.restore("9").err().unwrap();
        assert_eq!(
            err.downcast_ref::<StudioError>(),
            Some(&StudioError::UnknownHistoryEntry("9".to_string()))
        );
        Ok(())
    }

    #[test]
    fn download_writes_current_result() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, _) = studio(temp.path(), vec![Ok(png(5))])?;
        assert!(studio.download(None).is_err());

        select(&mut studio, "INTJ", "cyberpunk", Gender::Female, ImageSize::TwoK)?;
        studio.generate()?;
        let target = temp.path().join("downloads");
        let path = studio.download(Some(&target))?;

        assert_eq!(path, target.join("persona-gen-INTJ-cyberpunk-2K.png"));
        assert_eq!(fs::read(&path)?, png(5).bytes());
        assert!(event_types(&studio)?.contains(&"image_downloaded".to_string()));
        Ok(())
    }

    #[test]
    fn mismatched_mime_is_recorded_as_warning() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let jpeg = ImagePayload::new(vec![0xFF, 0xD8, 0xFF], Some("image/jpeg".to_string()));
        let (mut studio, _) = studio(temp.path(), vec![Ok(jpeg)])?;
        studio.generate()?;

        let payload = studio.generation().payload().unwrap();
        assert!(payload.data_uri().starts_with("data:image/png;base64,"));
        let events = read_events(&studio)?;
        let succeeded = events
            .iter()
            .find(|event| event["type"] == json!("generation_succeeded"))
            .unwrap();
        assert_eq!(succeeded["declared_mime"], json!("image/jpeg"));
        assert!(succeeded["warnings"][0]
            .as_str()
            .unwrap_or_default()
            .contains("image/jpeg"));
        Ok(())
    }

    #[test]
    fn unknown_model_falls_back_and_dryrun_renders_offline() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, calls) = studio(temp.path(), Vec::new())?;

        let fallback = studio.set_model(Some("imaginary-model"))?.name.clone();
        assert_eq!(fallback, "gemini-3-pro-image-preview");
        assert!(studio
            .last_fallback_reason()
            .unwrap_or_default()
            .contains("imaginary-model"));

        studio.set_model(Some("dryrun-image-1"))?;
        assert_eq!(studio.last_fallback_reason(), None);
        studio.select_from_str(SelectionAxis::Size, "2k")?;
        let state = studio.generate()?;
        let decoded = image::load_from_memory(state.payload().unwrap().bytes())?;
        assert_eq!(decoded.width(), 512);
        assert!(calls.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn reselecting_emits_nothing() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, _) = studio(temp.path(), Vec::new())?;
        assert!(!studio.select_from_str(SelectionAxis::Archetype, "intj")?);
        assert!(studio.select_from_str(SelectionAxis::Gender, "nb")?);
        assert!(studio.select_from_str(SelectionAxis::Style, "nope").is_err());

        let types = event_types(&studio)?;
        assert_eq!(
            types.iter().filter(|kind| *kind == "selection_changed").count(),
            1
        );
        Ok(())
    }

    #[test]
    fn session_events_bracket_the_log_without_image_bytes() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut studio, _) = studio(temp.path(), vec![Ok(png(6))])?;
        assert_eq!(studio.check_key_gate()?, KeyGateCheck::HostAbsent);
        assert!(studio.is_key_usable());
        assert!(studio.select_key("secret-key")?);
        studio.generate()?;
        let summary_path = studio.finish()?;

        let types = event_types(&studio)?;
        assert_eq!(types.first().map(String::as_str), Some("session_started"));
        assert_eq!(types.last().map(String::as_str), Some("session_finished"));
        assert!(types.contains(&"key_gate_checked".to_string()));

        let raw = fs::read_to_string(studio.events_path())?;
        assert!(!raw.contains("secret-key"));
        assert!(!raw.contains(&png(6).data_uri()));
        let finished = read_events(&studio)?.pop().unwrap();
        assert_eq!(finished["generations_succeeded"], json!(1));
        assert_eq!(finished["history_entries"], json!(1));

        let summary = SessionSummary::load(&summary_path)?;
        assert_eq!(summary.session_id, studio.session_id());
        assert_eq!(summary.history.len(), 1);
        assert_eq!(summary.history[0].archetype, "INTJ");
        Ok(())
    }
}
