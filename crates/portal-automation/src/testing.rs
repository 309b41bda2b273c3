//! Test doubles: a scripted browser and a failing artifact store.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{BrowserLauncher, BrowserSession, BrowserTimeouts};
use crate::error::{BrowserError, StoreError};
use crate::ports::ArtifactStore;
use crate::selectors::Selector;

pub fn fast_timeouts() -> BrowserTimeouts {
    BrowserTimeouts {
        navigation: Duration::from_millis(200),
        element: Duration::from_millis(50),
        poll_interval: Duration::from_millis(5),
    }
}

#[derive(Default)]
struct State {
    present: HashSet<String>,
    actions: Vec<String>,
    sessions: Vec<Arc<AtomicBool>>,
    fail_launch: bool,
}

/// Browser whose page contains a fixed set of selectors.
///
/// Selectors are matched by their display form, e.g. `css=#login` or
/// `text=Upload`.
#[derive(Clone, Default)]
pub struct ScriptedBrowser {
    state: Arc<Mutex<State>>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_present(self, selectors: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .present
            .extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    pub fn without(self, selector: &str) -> Self {
        self.state.lock().unwrap().present.remove(selector);
        self
    }

    pub fn failing_launch(self) -> Self {
        self.state.lock().unwrap().fail_launch = true;
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn launches(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn all_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .all(|closed| closed.load(Ordering::SeqCst))
    }

    pub fn launch_session(&self) -> Box<dyn BrowserSession> {
        let closed = Arc::new(AtomicBool::new(false));
        self.state.lock().unwrap().sessions.push(closed.clone());
        Box::new(ScriptedSession {
            state: self.state.clone(),
            closed,
        })
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        if self.state.lock().unwrap().fail_launch {
            return Err(BrowserError::Launch("no chrome binary".to_string()));
        }
        Ok(self.launch_session())
    }
}

struct ScriptedSession {
    state: Arc<Mutex<State>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedSession {
    fn record(&self, action: String) -> Result<(), BrowserError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        self.state.lock().unwrap().actions.push(action);
        Ok(())
    }

    fn require(&self, selector: &Selector) -> Result<(), BrowserError> {
        if self.state.lock().unwrap().present.contains(&selector.to_string()) {
            Ok(())
        } else {
            Err(BrowserError::Interaction {
                target: selector.to_string(),
                reason: "not found".to_string(),
            })
        }
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.record(format!("goto {url}"))
    }

    async fn count(&mut self, selector: &Selector) -> Result<usize, BrowserError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        let present = self.state.lock().unwrap().present.contains(&selector.to_string());
        Ok(usize::from(present))
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        self.require(selector)?;
        self.record(format!("click {selector}"))
    }

    async fn fill(&mut self, selector: &Selector, _value: &str) -> Result<(), BrowserError> {
        self.require(selector)?;
        self.record(format!("fill {selector}"))
    }

    async fn set_input_files(
        &mut self,
        selector: &Selector,
        files: &[PathBuf],
    ) -> Result<(), BrowserError> {
        self.require(selector)?;
        let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
        self.record(format!("upload {selector} {}", names.join(",")))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
        self.record("screenshot".to_string())?;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.lock().unwrap().actions.push("close".to_string());
        }
        Ok(())
    }
}

/// Artifact store whose uploads always fail.
pub struct FailingArtifactStore;

#[async_trait]
impl ArtifactStore for FailingArtifactStore {
    async fn put_png(&self, key: &str, _bytes: Vec<u8>) -> Result<String, StoreError> {
        Err(StoreError::Storage(format!("bucket unavailable for {key}")))
    }
}
