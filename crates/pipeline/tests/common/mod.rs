//! Shared fixtures: a scripted generation client and small image helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atelier_album::{AlbumCompositor, AlbumConfig};
use atelier_core::types::{GenerationTask, ImageData};
use atelier_generation::{GenerationClient, GenerationError};
use image::{ImageFormat, Rgba, RgbaImage};
use tokio::sync::Semaphore;

pub fn png(color: [u8; 4]) -> ImageData {
    let mut buf = Cursor::new(Vec::new());
    RgbaImage::from_pixel(16, 16, Rgba(color))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    ImageData::new("image/png", buf.into_inner())
}

pub fn source_photo() -> ImageData {
    png([90, 60, 40, 255])
}

/// Tasks whose prompt equals their key.
pub fn tasks(keys: &[&str]) -> Vec<GenerationTask> {
    let source = source_photo();
    keys.iter()
        .map(|key| GenerationTask::new(*key, source.clone(), *key))
        .collect()
}

/// Compositor without fonts so tests do not depend on the host.
pub fn compositor() -> AlbumCompositor {
    AlbumCompositor::with_fonts(
        AlbumConfig::default(),
        Arc::new(usvg::fontdb::Database::new()),
    )
}

/// Poll `check` until it holds or a second has passed.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

// ---------------------------------------------------------------------------
// MockClient
// ---------------------------------------------------------------------------

/// Generation client whose behaviour is chosen per prompt.
///
/// Succeeds with a small PNG unless the prompt is marked failing or
/// panicking. Tracks calls and the peak number of concurrent calls.
pub struct MockClient {
    delay: Duration,
    failure_message: String,
    failing: Mutex<HashSet<String>>,
    panicking: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            failure_message: "model refused the request".into(),
            failing: Mutex::new(HashSet::new()),
            panicking: HashSet::new(),
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_with(self, prompt: &str) -> Self {
        self.set_failing(prompt, true);
        self
    }

    pub fn with_failure_message(mut self, message: &str) -> Self {
        self.failure_message = message.into();
        self
    }

    pub fn panicking_on(mut self, prompt: &str) -> Self {
        self.panicking.insert(prompt.into());
        self
    }

    /// Every call waits for a permit from `gate` before answering.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_failing(&self, prompt: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(prompt.into());
        } else {
            set.remove(prompt);
        }
    }

    /// Prompts in the order calls started.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, prompt: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == prompt)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls_by_prompt(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for prompt in self.calls() {
            *counts.entry(prompt).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl GenerationClient for MockClient {
    async fn generate(&self, _source: &ImageData, prompt: &str) -> Result<ImageData, GenerationError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(prompt) {
            panic!("scripted panic for {prompt}");
        }
        if self.failing.lock().unwrap().contains(prompt) {
            return Err(GenerationError::Other(self.failure_message.clone()));
        }
        Ok(png([200, 40, 40, 255]))
    }
}
