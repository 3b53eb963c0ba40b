//! In-memory session used by tests
//!
//! A page is a sequence of frames. Each frame maps locator keys to the
//! elements they match. A reload advances to the next frame (staying on the
//! last one), which models a remote pipeline progressing between polls.
//! Clicks can be wired to jump to a frame or change the URL.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Locator, Session, SessionError, SessionResult, Transport};

/// A fake DOM element: just its attributes
#[derive(Debug, Clone, Default)]
pub struct Element {
    attrs: HashMap<String, String>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

/// One state of the page
#[derive(Debug, Clone, Default)]
pub struct Frame {
    elements: HashMap<String, Vec<Element>>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the elements `locator` matches, ignoring its final index
    pub fn with(mut self, locator: &Locator, elements: Vec<Element>) -> Self {
        self.elements.insert(key_of(locator).0, elements);
        self
    }
}

/// What a click does besides being recorded
#[derive(Debug, Clone)]
pub enum Effect {
    GoTo(String),
    Frame(usize),
}

#[derive(Debug, Default)]
pub struct State {
    pub url: String,
    pub title: String,
    pub frames: Vec<Frame>,
    pub frame: usize,
    pub reloads: usize,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub scripts: Vec<String>,
    pub closed: bool,
    pub fail_reload: bool,
    pub fail_navigation: bool,
    pub failing_clicks: HashSet<String>,
    pub effects: HashMap<String, Vec<Effect>>,
}

/// Scripted [`Session`] sharing its state with the test through an `Arc`
#[derive(Debug, Clone)]
pub struct ScriptedSession {
    state: Arc<Mutex<State>>,
}

impl ScriptedSession {
    pub fn new(url: &str, frames: Vec<Frame>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                url: url.to_string(),
                title: "GitLab".to_string(),
                frames,
                ..State::default()
            })),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn on_click(&self, locator: &Locator, effect: Effect) -> &Self {
        self.state()
            .effects
            .entry(locator.to_string())
            .or_default()
            .push(effect);
        self
    }

    pub fn fail_click(&self, locator: &Locator) -> &Self {
        self.state().failing_clicks.insert(locator.to_string());
        self
    }

    fn lookup(&self, locator: &Locator) -> SessionResult<Element> {
        let state = self.state();
        ensure_open(&state)?;
        let (key, index) = key_of(locator);
        current_frame(&state)
            .and_then(|frame| frame.elements.get(&key))
            .and_then(|elements| elements.get(index))
            .cloned()
            .ok_or_else(|| SessionError::NoSuchElement(locator.to_string()))
    }
}

/// Key of the final step's candidates and the index pinned on it
fn key_of(locator: &Locator) -> (String, usize) {
    let steps = locator.steps();
    let Some((last, parents)) = steps.split_last() else {
        return (String::new(), 0);
    };

    let mut parts: Vec<String> = parents
        .iter()
        .map(|step| format!("{}:nth({})", step.css, step.nth.unwrap_or(0)))
        .collect();
    parts.push(last.css.clone());

    (parts.join(" >> "), last.nth.unwrap_or(0))
}

fn current_frame(state: &State) -> Option<&Frame> {
    state.frames.get(state.frame)
}

fn ensure_open(state: &State) -> SessionResult<()> {
    if state.closed {
        Err(SessionError::Closed)
    } else {
        Ok(())
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn navigate(&self, url: &str) -> SessionResult<()> {
        let mut state = self.state();
        ensure_open(&state)?;
        if state.fail_navigation {
            return Err(SessionError::Browser("navigation refused".into()));
        }
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }

    async fn reload(&self) -> SessionResult<()> {
        let mut state = self.state();
        ensure_open(&state)?;
        if state.fail_reload {
            return Err(SessionError::Browser("reload refused".into()));
        }
        state.reloads += 1;
        if state.frame + 1 < state.frames.len() {
            state.frame += 1;
        }
        Ok(())
    }

    async fn current_url(&self) -> SessionResult<String> {
        let state = self.state();
        ensure_open(&state)?;
        Ok(state.url.clone())
    }

    async fn title(&self) -> SessionResult<String> {
        let state = self.state();
        ensure_open(&state)?;
        Ok(state.title.clone())
    }

    async fn count(&self, locator: &Locator) -> SessionResult<usize> {
        let state = self.state();
        ensure_open(&state)?;
        let (key, _) = key_of(locator);
        Ok(current_frame(&state)
            .and_then(|frame| frame.elements.get(&key))
            .map_or(0, Vec::len))
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> SessionResult<Option<String>> {
        Ok(self.lookup(locator)?.attrs.get(name).cloned())
    }

    async fn attributes(
        &self,
        locator: &Locator,
        name: &str,
    ) -> SessionResult<Vec<Option<String>>> {
        let state = self.state();
        ensure_open(&state)?;
        let (key, _) = key_of(locator);
        let elements = current_frame(&state).and_then(|frame| frame.elements.get(&key));
        Ok(elements
            .map(|list| list.iter().map(|e| e.attrs.get(name).cloned()).collect())
            .unwrap_or_default())
    }

    async fn click(&self, locator: &Locator) -> SessionResult<()> {
        self.lookup(locator)?;

        let mut state = self.state();
        let key = locator.to_string();
        if state.failing_clicks.contains(&key) {
            return Err(SessionError::Browser(format!("click intercepted: {}", key)));
        }
        state.clicks.push(key.clone());

        for effect in state.effects.get(&key).cloned().unwrap_or_default() {
            match effect {
                Effect::GoTo(url) => state.url = url,
                Effect::Frame(index) => state.frame = index,
            }
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> SessionResult<()> {
        self.lookup(locator)?;
        self.state()
            .fills
            .push((locator.to_string(), text.to_string()));
        Ok(())
    }

    async fn execute(&self, script: &str) -> SessionResult<()> {
        let mut state = self.state();
        ensure_open(&state)?;
        state.scripts.push(script.to_string());
        Ok(())
    }

    async fn close(&mut self) -> SessionResult<()> {
        let mut state = self.state();
        ensure_open(&state)?;
        state.closed = true;
        Ok(())
    }
}

/// Transport handing out a clone of a scripted session, or refusing to
pub struct ScriptedTransport {
    name: String,
    session: Option<ScriptedSession>,
}

impl ScriptedTransport {
    pub fn serving(name: &str, session: &ScriptedSession) -> Self {
        Self {
            name: name.to_string(),
            session: Some(session.clone()),
        }
    }

    pub fn refusing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            session: None,
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> SessionResult<Box<dyn Session>> {
        match &self.session {
            Some(session) => Ok(Box::new(session.clone())),
            None => Err(SessionError::Connect(format!("{} unavailable", self.name))),
        }
    }
}
