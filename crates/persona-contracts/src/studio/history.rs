use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::request::{GenerationRequest, ImagePayload};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub payload: ImagePayload,
    pub request: GenerationRequest,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn event_fields(&self) -> Map<String, Value> {
        let mut fields = self.request.event_fields();
        fields.insert("entry_id".to_string(), Value::String(self.id.clone()));
        fields.insert(
            "created_at".to_string(),
            Value::String(self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        fields.insert(
            "bytes".to_string(),
            Value::Number((self.payload.len() as u64).into()),
        );
        fields
    }
}

/// Newest-first record of every successful generation in this session.
///
/// Entries are never edited, reordered or evicted; the list grows for as long
/// as the session lives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    next_seq: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(
        &mut self,
        request: GenerationRequest,
        payload: ImagePayload,
        created_at: DateTime<Utc>,
    ) -> &HistoryEntry {
        self.next_seq += 1;
        let id = format!("{}-{:04}", created_at.timestamp_millis(), self.next_seq);
        self.entries.push_front(HistoryEntry {
            id,
            payload,
            request,
            created_at,
        });
        &self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Looks an entry up by 1-based position (1 = newest) or by id.
    pub fn resolve(&self, reference: &str) -> Option<&HistoryEntry> {
        let trimmed = reference.trim();
        if let Ok(position) = trimmed.parse::<usize>() {
            if position >= 1 {
                if let Some(entry) = self.entries.get(position - 1) {
                    return Some(entry);
                }
            }
        }
        self.get(trimmed)
    }
}
