//! Shared fakes for unit tests: a scripted chat backend, a recording clock,
//! a canned model response and a throwaway SQLite store.

use crate::api::{AskAsync, ChatRequest, Clock, Completion};
use crate::error::{Error, Result};
use crate::store::ArticleStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A well-formed six-section response as the model would return it.
pub fn sample_response_json() -> String {
    serde_json::json!({
        "main_facts": "Regeringen kritiseras efter beslutet om Natos nya styrkor.",
        "bias_assessment": {
            "label": "neutral",
            "explanation": "Rubriken återger kritiken utan att ta ställning.",
            "balance": "Regeringens motiv saknas."
        },
        "factual_accuracy": {
            "claim_verification": "- Sverige är medlem i Nato | Säkerhet: hög | Korrigering:\n- Beslutet fattades i helgen | Säkerhet: medel | Korrigering:\n- Hela oppositionen är emot | Säkerhet: låg | Korrigering: Flera partier stöder beslutet",
            "unsupported_assertions": "- Att beslutet saknar folkligt stöd"
        },
        "quality_scores": {
            "accuracy": 78,
            "source_reliability": 60,
            "balance": 70,
            "depth": 52
        },
        "macro_perspective": {
            "context": "Sverige blev Natomedlem 2024.",
            "implications": "Debatten om försvarsanslag kan skärpas."
        },
        "sources": ["Regeringskansliet", "Nato", "Regeringskansliet"]
    })
    .to_string()
}

/// Shared view of how many times a [`ScriptedChat`] was called.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared view of the requests a [`ScriptedChat`] received.
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<ChatRequest>>>);

impl RequestLog {
    pub fn models(&self) -> Vec<String> {
        self.0
            .lock()
            .expect("request log lock")
            .iter()
            .map(|request| request.model.clone())
            .collect()
    }

    pub fn max_tokens(&self) -> Vec<u32> {
        self.0
            .lock()
            .expect("request log lock")
            .iter()
            .map(|request| request.max_tokens)
            .collect()
    }
}

/// Chat backend that replays a fixed script, then fails forever.
#[derive(Debug)]
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<Completion>>>,
    calls: CallCounter,
    requests: RequestLog,
}

impl ScriptedChat {
    pub fn new(script: Vec<Result<Completion>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: CallCounter::default(),
            requests: RequestLog::default(),
        }
    }

    pub fn always_failing() -> Self {
        Self::new(Vec::new())
    }

    /// Succeeds with the canned response every time.
    pub fn always_ok(tokens: u32) -> Self {
        let script = (0..64)
            .map(|_| Self::ok(&sample_response_json(), tokens))
            .collect();
        Self::new(script)
    }

    pub fn ok(content: &str, total_tokens: u32) -> Result<Completion> {
        Ok(Completion {
            content: content.to_string(),
            total_tokens,
        })
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }

    pub fn requests(&self) -> RequestLog {
        self.requests.clone()
    }
}

impl AskAsync for ScriptedChat {
    type Response = Completion;

    async fn ask(&self, request: &ChatRequest) -> Result<Completion> {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        self.requests.0.lock().expect("request log lock").push(request.clone());
        let next = self.script.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| Err(Error::Upstream("connection refused".to_string())))
    }
}

/// Clock that records requested sleeps instead of waiting.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl FakeClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps lock").clone()
    }
}

impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("sleeps lock").push(duration);
    }
}

/// A fresh store in a temporary directory; keep the `TempDir` alive.
pub async fn temp_store() -> (ArticleStore, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("test.db");
    let url = format!("sqlite://{}", path.display());
    let store = ArticleStore::open(&url).await.expect("open store");
    (store, dir)
}
