//! Scripted collaborators for pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ResearchConfig;
use crate::error::{Error, Result};
use crate::events::CollectingSink;
use crate::generator::{GenerationRequest, Generator, Purpose};
use crate::retrieval::{Evidence, RagRetriever, Resource, WebResult, WebRetriever};
use crate::runtime::Toolkit;

/// Shared, ordered log of collaborator calls ("web:q", "rag:q", "gen:purpose").
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }
}

enum Reply {
    Text(String),
    Fail,
    Hang,
}

/// Generator answering from per-purpose scripts. Queued replies are used
/// first, then the purpose's default; with neither the call fails.
pub struct ScriptedGenerator {
    queued: Mutex<HashMap<Purpose, VecDeque<Reply>>>,
    defaults: Mutex<HashMap<Purpose, String>>,
    log: CallLog,
}

impl ScriptedGenerator {
    pub fn new(log: CallLog) -> Self {
        Self {
            queued: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
            log,
        }
    }

    pub fn then(self, purpose: Purpose, text: impl Into<String>) -> Self {
        self.push(purpose, Reply::Text(text.into()));
        self
    }

    pub fn then_fail(self, purpose: Purpose) -> Self {
        self.push(purpose, Reply::Fail);
        self
    }

    pub fn then_hang(self, purpose: Purpose) -> Self {
        self.push(purpose, Reply::Hang);
        self
    }

    pub fn always(self, purpose: Purpose, text: impl Into<String>) -> Self {
        self.defaults
            .lock()
            .unwrap()
            .insert(purpose, text.into());
        self
    }

    fn push(&self, purpose: Purpose, reply: Reply) {
        self.queued
            .lock()
            .unwrap()
            .entry(purpose)
            .or_default()
            .push_back(reply);
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn invoke(&self, request: GenerationRequest) -> Result<String> {
        self.log.push(format!("gen:{}", request.purpose));
        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&request.purpose)
            .and_then(VecDeque::pop_front);
        let reply = match queued {
            Some(reply) => reply,
            None => match self.defaults.lock().unwrap().get(&request.purpose) {
                Some(text) => Reply::Text(text.clone()),
                None => Reply::Fail,
            },
        };
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail => Err(Error::LLM(format!("no script for {}", request.purpose))),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::LLM("hung call finished".into()))
            }
        }
    }
}

/// Web search returning two results per query, or nothing when `empty`.
pub struct MockWeb {
    pub log: CallLog,
    pub empty: bool,
    pub fail: bool,
}

#[async_trait]
impl WebRetriever for MockWeb {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>> {
        self.log.push(format!("web:{}", query));
        if self.fail {
            return Err(Error::retrieval("mock", "unavailable"));
        }
        if self.empty {
            return Ok(Vec::new());
        }
        let slug = query.replace(' ', "-");
        Ok((0..2.min(max_results))
            .map(|i| {
                WebResult::new(
                    format!("{} result {}", query, i + 1),
                    format!("https://example.com/{}/{}", slug, i + 1),
                    format!("Findings about {}", query),
                )
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock-web"
    }
}

/// Knowledge base returning fixed evidence for every query.
pub struct MockRag {
    pub log: CallLog,
    pub evidence: Vec<Evidence>,
}

#[async_trait]
impl RagRetriever for MockRag {
    async fn query(&self, query: &str, _resources: &[Resource]) -> Result<Vec<Evidence>> {
        self.log.push(format!("rag:{}", query));
        Ok(self.evidence.clone())
    }
}

/// A toolkit over scripted collaborators, plus handles to inspect them.
pub struct Harness {
    pub toolkit: Toolkit,
    pub log: CallLog,
    pub sink: CollectingSink,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator, log: CallLog, config: ResearchConfig) -> Self {
        Self::with_web(generator, log.clone(), config, MockWeb {
            log,
            empty: false,
            fail: false,
        })
    }

    pub fn with_web(
        generator: ScriptedGenerator,
        log: CallLog,
        config: ResearchConfig,
        web: MockWeb,
    ) -> Self {
        let sink = CollectingSink::new();
        let toolkit = Toolkit::new(Arc::new(generator), Arc::new(web), config)
            .with_sink(Arc::new(sink.clone()));
        Self { toolkit, log, sink }
    }

    pub fn with_rag(mut self, evidence: Vec<Evidence>) -> Self {
        self.toolkit = self.toolkit.with_rag(Arc::new(MockRag {
            log: self.log.clone(),
            evidence,
        }));
        self
    }
}
