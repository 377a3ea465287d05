use chrono::{DateTime, Utc};

use super::error::{GenerationError, StudioError};
use super::history::{History, HistoryEntry};
use super::request::{GenerationRequest, ImagePayload, SelectionChange};

pub const FAILURE_PREFIX: &str = "Failed to generate image. Please try again. ";

/// What the result slot currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Loading {
        request: GenerationRequest,
    },
    Success {
        payload: ImagePayload,
    },
    Failed {
        message: String,
    },
}

impl GenerationState {
    pub fn payload(&self) -> Option<&ImagePayload> {
        match self {
            Self::Success { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading { .. } => "loading",
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Ticket for the single generation allowed in flight.
///
/// Only [`StudioState::begin_generation`] hands these out.
/// [`StudioState::complete_generation`] or
/// [`StudioState::abandon_generation`] consumes it.
#[derive(Debug)]
pub struct PendingGeneration {
    ticket: u64,
    request: GenerationRequest,
    started_at: DateTime<Utc>,
    previous: GenerationState,
}

impl PendingGeneration {
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Selection, result slot and history, with every transition as a method.
///
/// Nothing here performs I/O: callers run the generator between
/// `begin_generation` and `complete_generation`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StudioState {
    selection: GenerationRequest,
    generation: GenerationState,
    history: History,
    in_flight: Option<u64>,
    next_ticket: u64,
}

impl StudioState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &GenerationRequest {
        &self.selection
    }

    pub fn generation(&self) -> &GenerationState {
        &self.generation
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Updates one axis. Returns false when the value was already selected.
    pub fn select(&mut self, change: SelectionChange) -> bool {
        self.selection.apply(change)
    }

    pub fn begin_generation(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<PendingGeneration, StudioError> {
        if self.in_flight.is_some() {
            return Err(StudioError::GenerationInFlight);
        }
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight = Some(ticket);
        let request = self.selection;
        let previous = std::mem::replace(
            &mut self.generation,
            GenerationState::Loading { request },
        );
        Ok(PendingGeneration {
            ticket,
            request,
            started_at: now,
            previous,
        })
    }

    /// Releases a ticket whose job never ran. The result slot goes back to
    /// what it showed before, unless a restore replaced it meanwhile.
    pub fn abandon_generation(&mut self, pending: PendingGeneration) {
        if self.in_flight != Some(pending.ticket) {
            return;
        }
        self.in_flight = None;
        if matches!(self.generation, GenerationState::Loading { .. }) {
            self.generation = pending.previous;
        }
    }

    /// Folds a generator outcome back in. The result slot is last-write-wins:
    /// a restore performed while loading is overwritten here.
    pub fn complete_generation(
        &mut self,
        pending: PendingGeneration,
        outcome: Result<ImagePayload, GenerationError>,
        now: DateTime<Utc>,
    ) -> &GenerationState {
        if self.in_flight == Some(pending.ticket) {
            self.in_flight = None;
        }
        self.generation = match outcome {
            Ok(payload) => {
                self.history.record(pending.request, payload.clone(), now);
                GenerationState::Success { payload }
            }
            Err(err) => GenerationState::Failed {
                message: format!("{FAILURE_PREFIX}{err}"),
            },
        };
        &self.generation
    }

    pub fn dismiss_error(&mut self) -> bool {
        if matches!(self.generation, GenerationState::Failed { .. }) {
            self.generation = GenerationState::Idle;
            return true;
        }
        false
    }

    pub fn restore(&mut self, entry_id: &str) -> Result<&HistoryEntry, StudioError> {
        let Some(entry) = self.history.get(entry_id) else {
            return Err(StudioError::UnknownHistoryEntry(entry_id.to_string()));
        };
        self.selection = entry.request;
        self.generation = GenerationState::Success {
            payload: entry.payload.clone(),
        };
        Ok(entry)
    }

    pub fn download_target(&self) -> Result<(String, &ImagePayload), StudioError> {
        let payload = self
            .generation
            .payload()
            .ok_or(StudioError::NothingToDownload)?;
        Ok((self.selection.download_file_name(), payload))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::catalog::{find_archetype, find_style, Gender, ImageSize, ARCHETYPES, ART_STYLES};

    use super::super::request::SelectionAxis;
    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_750_000_000_000).unwrap()
    }

    fn select_all(state: &mut StudioState, code: &str, style: &str, gender: Gender, size: ImageSize) {
        state.select(SelectionChange::Archetype(find_archetype(code).unwrap()));
        state.select(SelectionChange::Style(find_style(style).unwrap()));
        state.select(SelectionChange::Gender(gender));
        state.select(SelectionChange::Size(size));
    }

    fn png(tag: u8) -> ImagePayload {
        ImagePayload::new(vec![0x89, b'P', b'N', b'G', tag], Some("image/png".to_string()))
    }

    #[test]
    fn successful_generation_prepends_one_entry_with_selection_snapshot() {
        let mut state = StudioState::new();
        select_all(&mut state, "ENFP", "watercolor", Gender::Male, ImageSize::FourK);
        let before = *state.selection();

        let pending = state.begin_generation(t0()).unwrap();
        assert!(state.is_loading());
        assert_eq!(state.generation().label(), "loading");
        state.complete_generation(pending, Ok(png(1)), t0());

        assert_eq!(state.generation().payload(), Some(&png(1)));
        assert_eq!(state.history().len(), 1);
        let entry = state.history().latest().unwrap();
        assert_eq!(entry.request, before);
        assert_eq!(entry.payload, png(1));
        assert_eq!(*state.selection(), before);
        assert!(!state.is_loading());
    }

    #[test]
    fn history_records_selection_at_call_time_not_resolution_time() {
        let mut state = StudioState::new();
        select_all(&mut state, "ISTJ", "oil", Gender::Female, ImageSize::OneK);
        let pending = state.begin_generation(t0()).unwrap();

        select_all(&mut state, "ESTP", "comic", Gender::Male, ImageSize::TwoK);
        state.complete_generation(pending, Ok(png(2)), t0());

        let entry = state.history().latest().unwrap();
        assert_eq!(entry.request.archetype.code, "ISTJ");
        assert_eq!(entry.request.style.id, "oil");
        assert_eq!(state.selection().archetype.code, "ESTP");
    }

    #[test]
    fn failure_formats_message_and_leaves_history_alone() {
        let mut state = StudioState::new();
        let pending = state.begin_generation(t0()).unwrap();
        state.complete_generation(pending, Err(GenerationError::NoImageInResponse), t0());

        assert_eq!(
            state.generation().error(),
            Some("Failed to generate image. Please try again. No image data found in response")
        );
        assert!(state.history().is_empty());
        assert!(!state.is_loading());
    }

    #[test]
    fn dismiss_error_clears_failure_only() {
        let mut state = StudioState::new();
        select_all(&mut state, "INFP", "sketch", Gender::NonBinary, ImageSize::TwoK);
        let ok = state.begin_generation(t0()).unwrap();
        state.complete_generation(ok, Ok(png(3)), t0());
        let failing = state.begin_generation(t0()).unwrap();
        state.complete_generation(
            failing,
            Err(GenerationError::Transport("connection reset".to_string())),
            t0(),
        );
        let selection = *state.selection();

        assert!(state.dismiss_error());
        assert_eq!(*state.generation(), GenerationState::Idle);
        assert_eq!(*state.selection(), selection);
        assert_eq!(state.history().len(), 1);
        assert!(!state.dismiss_error());
    }

    #[test]
    fn restore_overwrites_every_axis_and_shows_entry_payload() {
        for archetype in ARCHETYPES.iter() {
            for style in ART_STYLES.iter() {
                let mut state = StudioState::new();
                state.select(SelectionChange::Archetype(archetype));
                state.select(SelectionChange::Style(style));
                state.select(SelectionChange::Gender(Gender::NonBinary));
                state.select(SelectionChange::Size(ImageSize::FourK));
                let pending = state.begin_generation(t0()).unwrap();
                state.complete_generation(pending, Ok(png(4)), t0());
                let id = state.history().latest().unwrap().id.clone();

                state.select(SelectionChange::Archetype(&ARCHETYPES[15]));
                state.select(SelectionChange::Style(&ART_STYLES[7]));
                state.select(SelectionChange::Gender(Gender::Male));
                state.select(SelectionChange::Size(ImageSize::OneK));
                state.dismiss_error();

                state.restore(&id).unwrap();
                assert_eq!(state.selection().archetype, archetype);
                assert_eq!(state.selection().style, style);
                assert_eq!(state.selection().gender, Gender::NonBinary);
                assert_eq!(state.selection().size, ImageSize::FourK);
                assert_eq!(state.generation().payload(), Some(&png(4)));
            }
        }
    }

    #[test]
    fn restore_keeps_history_order() {
        let mut state = StudioState::new();
        for (idx, code) in ["INTJ", "ENTP", "ESFP"].into_iter().enumerate() {
            state.select(SelectionChange::Archetype(find_archetype(code).unwrap()));
            let pending = state.begin_generation(t0()).unwrap();
            state.complete_generation(pending, Ok(png(idx as u8)), t0() + Duration::seconds(idx as i64));
        }
        let oldest = state.history().resolve("3").unwrap().id.clone();
        let order_before: Vec<String> = state.history().iter().map(|e| e.id.clone()).collect();

        state.restore(&oldest).unwrap();

        let order_after: Vec<String> = state.history().iter().map(|e| e.id.clone()).collect();
        assert_eq!(order_before, order_after);
        assert_eq!(state.selection().archetype.code, "INTJ");
    }

    #[test]
    fn restore_unknown_entry_is_an_error() {
        let mut state = StudioState::new();
        assert_eq!(
            state.restore("nope").unwrap_err(),
            StudioError::UnknownHistoryEntry("nope".to_string())
        );
    }

    #[test]
    fn reselecting_current_value_changes_nothing() {
        let mut state = StudioState::new();
        let pending = state.begin_generation(t0()).unwrap();
        state.complete_generation(pending, Ok(png(5)), t0());
        let snapshot = state.clone();

        let current = *state.selection();
        for axis in SelectionAxis::ALL {
            let change = match axis {
                SelectionAxis::Archetype => SelectionChange::Archetype(current.archetype),
                SelectionAxis::Style => SelectionChange::Style(current.style),
                SelectionAxis::Gender => SelectionChange::Gender(current.gender),
                SelectionAxis::Size => SelectionChange::Size(current.size),
            };
            assert!(!state.select(change));
        }
        assert_eq!(state, snapshot);
    }

    #[test]
    fn second_begin_while_loading_is_rejected() {
        let mut state = StudioState::new();
        let pending = state.begin_generation(t0()).unwrap();
        assert_eq!(
            state.begin_generation(t0()).unwrap_err(),
            StudioError::GenerationInFlight
        );
        state.complete_generation(pending, Ok(png(6)), t0());
        assert!(state.begin_generation(t0()).is_ok());
    }

    #[test]
    fn abandoned_generation_frees_the_slot_and_restores_the_result() {
        let mut state = StudioState::new();
        let first = state.begin_generation(t0()).unwrap();
        state.complete_generation(first, Ok(png(12)), t0());

        let pending = state.begin_generation(t0()).unwrap();
        assert_eq!(pending.started_at(), t0());
        state.abandon_generation(pending);

        assert!(!state.is_loading());
        assert_eq!(state.generation().payload(), Some(&png(12)));
        assert_eq!(state.history().len(), 1);
        assert!(state.begin_generation(t0()).is_ok());
    }

    #[test]
    fn late_result_overwrites_restored_entry() {
        let mut state = StudioState::new();
        let first = state.begin_generation(t0()).unwrap();
        state.complete_generation(first, Ok(png(7)), t0());
        let id = state.history().latest().unwrap().id.clone();

        let pending = state.begin_generation(t0()).unwrap();
        state.restore(&id).unwrap();
        assert!(state.is_loading());
        state.complete_generation(pending, Ok(png(8)), t0());

        assert_eq!(state.generation().payload(), Some(&png(8)));
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn two_generations_are_listed_newest_first() {
        let mut state = StudioState::new();
        select_all(&mut state, "INTJ", "anime", Gender::Female, ImageSize::OneK);
        let first = state.begin_generation(t0()).unwrap();
        state.complete_generation(first, Ok(png(9)), t0());

        select_all(&mut state, "ESFJ", "pixel", Gender::Male, ImageSize::TwoK);
        let second = state.begin_generation(t0()).unwrap();
        state.complete_generation(second, Ok(png(10)), t0() + Duration::milliseconds(5));

        let codes: Vec<&str> = state
            .history()
            .iter()
            .map(|entry| entry.request.archetype.code)
            .collect();
        assert_eq!(codes, vec!["ESFJ", "INTJ"]);
    }

    #[test]
    fn download_target_requires_a_result() {
        let mut state = StudioState::new();
        assert_eq!(
            state.download_target().unwrap_err(),
            StudioError::NothingToDownload
        );
        select_all(&mut state, "INTJ", "cyberpunk", Gender::Female, ImageSize::TwoK);
        let pending = state.begin_generation(t0()).unwrap();
        state.complete_generation(pending, Ok(png(11)), t0());

        let (name, payload) = state.download_target().unwrap();
        assert_eq!(name, "persona-gen-INTJ-cyberpunk-2K.png");
        assert_eq!(payload, &png(11));
    }
}
