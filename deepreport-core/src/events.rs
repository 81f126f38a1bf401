//! Progress events for observers of a running request.
//!
//! Events are emitted after the state change they describe has happened, so
//! an observer never sees a section reported before it is in the completed
//! list. Sinks receive read-only copies; nothing an observer does can
//! affect the pipeline.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::classifier::ResearchMode;
use crate::retrieval::EvidenceOrigin;

/// Read-only projection of section progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionProgress {
    pub completed_index: usize,
    pub name: String,
    pub description: String,
    pub completed_count: usize,
    pub total: usize,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressKind {
    ModeSelected {
        mode: ResearchMode,
        target_word_count: Option<usize>,
    },
    QueriesGenerated {
        queries: Vec<String>,
    },
    EvidenceRetrieved {
        origin: EvidenceOrigin,
        query: String,
        count: usize,
    },
    Reflected {
        loop_count: u32,
        is_sufficient: bool,
        follow_ups: usize,
    },
    AnswerFinalized {
        sources: usize,
    },
    PlanGenerated {
        title: String,
        sections: Vec<String>,
        fallback: bool,
    },
    SectionProcessed(SectionProgress),
    ReportCompiled {
        word_count: usize,
        sections: usize,
        missing: usize,
    },
    Cancelled {
        stage: String,
    },
}

impl std::fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModeSelected { .. } => write!(f, "MODE_SELECTED"),
            Self::QueriesGenerated { .. } => write!(f, "QUERIES_GENERATED"),
            Self::EvidenceRetrieved { .. } => write!(f, "EVIDENCE_RETRIEVED"),
            Self::Reflected { .. } => write!(f, "REFLECTED"),
            Self::AnswerFinalized { .. } => write!(f, "ANSWER_FINALIZED"),
            Self::PlanGenerated { .. } => write!(f, "PLAN_GENERATED"),
            Self::SectionProcessed(_) => write!(f, "SECTION_PROCESSED"),
            Self::ReportCompiled { .. } => write!(f, "REPORT_COMPILED"),
            Self::Cancelled { .. } => write!(f, "CANCELLED"),
        }
    }
}

/// A progress event for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProgressKind,
}

impl ProgressEvent {
    pub fn new(request_id: Uuid, kind: ProgressKind) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Section progress carried by this event, if any.
    pub fn section(&self) -> Option<&SectionProgress> {
        match &self.kind {
            ProgressKind::SectionProcessed(progress) => Some(progress),
            _ => None,
        }
    }

    /// Format as a single-line log entry.
    pub fn as_log_line(&self) -> String {
        let detail = match &self.kind {
            ProgressKind::ModeSelected { mode, .. } => mode.to_string(),
            ProgressKind::QueriesGenerated { queries } => queries.join(" | "),
            ProgressKind::EvidenceRetrieved { origin, query, count } => {
                format!("{} x{} for '{}'", origin, count, query)
            }
            ProgressKind::Reflected {
                loop_count,
                is_sufficient,
                ..
            } => format!("loop {} sufficient={}", loop_count, is_sufficient),
            ProgressKind::AnswerFinalized { sources } => format!("{} sources", sources),
            ProgressKind::PlanGenerated { title, sections, .. } => {
                format!("{} ({} sections)", title, sections.len())
            }
            ProgressKind::SectionProcessed(p) => {
                format!("{}/{} {}", p.completed_count, p.total, p.name)
            }
            ProgressKind::ReportCompiled { word_count, .. } => format!("{} words", word_count),
            ProgressKind::Cancelled { stage } => stage.clone(),
        };
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.kind,
            detail
        )
    }
}

/// Receives progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Broadcast-based sink; any number of subscribers.
pub struct BroadcastSink {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastSink {
    /// Create new broadcast sink with channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream. Lagged events are skipped; the stream ends
    /// when the sink is dropped.
    pub fn stream(&self) -> impl Stream<Item = ProgressEvent> {
        stream::unfold(self.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ProgressSink for BroadcastSink {
    fn emit(&self, event: ProgressEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

/// Collecting sink that stores events in a Vec.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    events: Arc<RwLock<Vec<ProgressEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Section progress events, in emission order.
    pub fn sections(&self) -> Vec<SectionProgress> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.kind {
                ProgressKind::SectionProcessed(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
