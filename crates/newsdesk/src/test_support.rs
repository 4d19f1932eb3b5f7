//! Scripted providers, backends and critics for tests

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    brain::{BackendError, ChatMessage, GenerationBackend},
    retrieval::{ProviderAdapter, ProviderError, ProviderResult},
    review::{CritiqueBackend, CritiqueError, CritiqueVerdict},
    types::{EvidenceClass, EvidenceItem},
};

#[derive(Debug, Clone)]
pub enum Behavior {
    Items(Vec<EvidenceItem>),
    Partial(Vec<EvidenceItem>),
    Delayed(Duration, Vec<EvidenceItem>),
    Fail(ProviderError),
    Hang,
    Panic,
}

pub struct FakeProvider {
    id: String,
    class: EvidenceClass,
    behavior: Behavior,
    calls: AtomicU32,
}

impl FakeProvider {
    pub fn new(id: &str, class: EvidenceClass, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            class,
            behavior,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn items(label: &str, headlines: &[&str]) -> Vec<EvidenceItem> {
    headlines
        .iter()
        .map(|h| EvidenceItem::new(label, *h, 0.8))
        .collect()
}

pub fn as_adapters(providers: &[Arc<FakeProvider>]) -> Vec<Arc<dyn ProviderAdapter>> {
    providers
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn ProviderAdapter>)
        .collect()
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn class(&self) -> EvidenceClass {
        self.class
    }

    async fn fetch(&self, _query: &str, _timeout: Duration) -> Result<ProviderResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Items(items) => Ok(ProviderResult::new(self.id.clone(), items.clone())),
            Behavior::Partial(items) => Ok(ProviderResult::new(self.id.clone(), items.clone()).partial()),
            Behavior::Delayed(delay, items) => {
                tokio::time::sleep(*delay).await;
                Ok(ProviderResult::new(self.id.clone(), items.clone()))
            }
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("provider {} exploded", self.id),
        }
    }
}

/// Generation backend answering from a script, one entry per call
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    models: Mutex<Vec<String>>,
    hang: bool,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, BackendError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            models: Mutex::new(Vec::new()),
            hang: false,
        }
    }

    /// Never answers
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.models.lock().unwrap().len()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, model: &str, _messages: &[ChatMessage]) -> Result<String, BackendError> {
        self.models.lock().unwrap().push(model.to_string());
        if self.hang {
            return std::future::pending().await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(BackendError::RequestFailed("script exhausted".to_string())))
    }
}

/// Critic answering from a script; the last entry repeats once exhausted
pub struct ScriptedCritic {
    script: Mutex<VecDeque<Result<CritiqueVerdict, CritiqueError>>>,
    last: Mutex<Option<Result<CritiqueVerdict, CritiqueError>>>,
    invocations: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedCritic {
    pub fn new(script: Vec<Result<CritiqueVerdict, CritiqueError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            invocations: AtomicU32::new(0),
            delay: None,
        })
    }

    pub fn always_revise(issue: &str) -> Arc<Self> {
        Self::new(vec![Ok(CritiqueVerdict::revise(vec![issue.to_string()]))])
    }

    /// Sleeps before answering
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(vec![Ok(CritiqueVerdict::accept())].into()),
            last: Mutex::new(None),
            invocations: AtomicU32::new(0),
            delay: Some(delay),
        })
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CritiqueBackend for ScriptedCritic {
    fn name(&self) -> &str {
        "scripted-critic"
    }

    async fn critique(&self, _content: &str) -> Result<CritiqueVerdict, CritiqueError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(answer) => {
                *last = Some(answer.clone());
                answer
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(CritiqueError::Backend("script exhausted".to_string()))),
        }
    }
}
