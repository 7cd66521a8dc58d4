//! Scripted transports, classifiers, and fixtures shared by unit tests.

use std::{
    collections::VecDeque,
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::{sync::Notify, time::Instant};

use crate::{
    detection::{AnalysisDetail, ClassificationVerdict, Classifier, transport::{HttpResponse, HttpTransport}},
    error::ClassificationError,
    raster::{ImageMime, SourceImage},
};

pub fn status(code: u16) -> Result<HttpResponse, ClassificationError> {
    Ok(HttpResponse {
        status: code,
        body: String::new(),
    })
}

pub fn verdict(is_ai: bool, confidence: u8) -> ClassificationVerdict {
    let detail = |v: &str| AnalysisDetail {
        verdict: v.into(),
        explanation: format!("{} explanation", v),
    };

    ClassificationVerdict {
        is_ai,
        confidence,
        overall_justification: "The image has likely been re-compressed.".into(),
        visual_analysis: detail("visual"),
        noise_analysis: detail("noise"),
        fingerprint_analysis: detail("fingerprint"),
    }
}

pub fn success_body(is_ai: bool, confidence: u8) -> String {
    let text = serde_json::to_string(&verdict(is_ai, confidence)).unwrap();
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .unwrap();
    buffer.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 140, 200]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

pub fn jpeg_source(width: u32, height: u32) -> SourceImage {
    SourceImage::from_bytes(jpeg_bytes(width, height), ImageMime::Jpeg, usize::MAX).unwrap()
}

pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, ClassificationError>>>,
    fallback: Option<u16>,
    calls: Mutex<Vec<(String, Value, Instant)>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<HttpResponse, ClassificationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Status returned once the script runs out.
    pub fn with_fallback(mut self, code: u16) -> Self {
        self.fallback = Some(code);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(_, _, at)| *at).collect()
    }

    pub fn last_request(&self) -> Option<(String, Value)> {
        self.calls
            .lock()
            .last()
            .map(|(url, body, _)| (url.clone(), body.clone()))
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, ClassificationError> {
        self.calls
            .lock()
            .push((url.to_string(), body.clone(), Instant::now()));

        let next = self.script.lock().pop_front();
        match (next, self.fallback) {
            (Some(response), _) => response,
            (None, Some(code)) => status(code),
            (None, None) => Err(ClassificationError::Transport("script exhausted".into())),
        }
    }
}

/// Answers with a fixed verdict, optionally after a delay.
pub struct StaticClassifier {
    verdict: ClassificationVerdict,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticClassifier {
    pub fn new(verdict: ClassificationVerdict) -> Self {
        Self {
            verdict,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for StaticClassifier {
    async fn classify(&self, _image: &SourceImage) -> Result<ClassificationVerdict, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.verdict.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Fails with an HTTP status after a delay.
pub struct FailingClassifier {
    pub status: u16,
    pub delay: Duration,
}

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(&self, _image: &SourceImage) -> Result<ClassificationVerdict, ClassificationError> {
        tokio::time::sleep(self.delay).await;
        Err(ClassificationError::HttpStatus(self.status))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Blocks each call until the gate is opened, then answers with a verdict
/// carrying the classified image's width as its confidence.
pub struct GatedClassifier {
    pub gate: Arc<Notify>,
    pub started: Arc<Notify>,
}

impl GatedClassifier {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Notify::new()),
            started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl Classifier for GatedClassifier {
    async fn classify(&self, image: &SourceImage) -> Result<ClassificationVerdict, ClassificationError> {
        self.started.notify_one();
        self.gate.notified().await;
        let (width, _) = image.dimensions();
        Ok(verdict(true, width.min(100) as u8))
    }

    fn name(&self) -> &str {
        "gated"
    }
}
