use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{
    AnalysisOutcome,
    analysis::{ela::ElaEngine, spectrum::SpectrumRenderer},
    config::{AnalysisConfig, ProgressConfig},
    detection::Classifier,
    error::{AnalysisError, Result},
    raster::{ImageMime, SourceImage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    ImageLoaded,
    Analyzing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    Progress(u8),
    /// User-visible failure notice.
    Failed(String),
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SessionEvent);
}

/// Forwards session events to the `log` facade.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged(state) => info!("Session state: {:?}", state),
            SessionEvent::Progress(progress) => debug!("Analysis progress: {}%", progress),
            SessionEvent::Failed(message) => warn!("Analysis failed: {}", message),
        }
    }
}

/// Runs classification, ELA and the spectrum render concurrently against one image.
pub struct AnalysisOrchestrator {
    classifier: Arc<dyn Classifier>,
    ela: Arc<ElaEngine>,
    spectrum: Arc<SpectrumRenderer>,
}

impl AnalysisOrchestrator {
    pub fn new(config: &AnalysisConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            ela: Arc::new(ElaEngine::from_config(&config.ela)),
            spectrum: Arc::new(SpectrumRenderer::new(config.spectrum.clone())),
        }
    }

    /// All-succeed/any-fail join. The first error wins and the remaining
    /// tasks are detached; their results are dropped when they finish.
    pub async fn analyze(&self, source: Arc<SourceImage>) -> Result<AnalysisOutcome> {
        let (width, height) = source.dimensions();
        info!(
            "Starting analysis of {}x{} image with classifier '{}', {:?} spectrum",
            width,
            height,
            self.classifier.name(),
            self.spectrum.mode()
        );

        let classify_task = {
            let classifier = self.classifier.clone();
            let source = source.clone();
            tokio::spawn(async move { classifier.classify(&source).await })
        };

        // CPU-bound stages go to the blocking pool so the progress ticker keeps running.
        let ela_task = {
            let ela = self.ela.clone();
            let source = source.clone();
            tokio::task::spawn_blocking(move || ela.analyze(source.pixels()))
        };

        let spectrum_task = {
            let spectrum = self.spectrum.clone();
            let source = source.clone();
            tokio::task::spawn_blocking(move || Ok::<_, AnalysisError>(spectrum.render_for(source.pixels())))
        };

        let (classification, ela, spectrum) = tokio::try_join!(
            join_stage(classify_task, "classification"),
            join_stage(ela_task, "ela"),
            join_stage(spectrum_task, "spectrum")
        )?;

        info!(
            "Analysis finished: is_ai={}, confidence={}, ELA max difference {:.2}",
            classification.is_ai, classification.confidence, ela.max_difference
        );

        Ok(AnalysisOutcome {
            classification,
            ela,
            spectrum,
        })
    }
}

async fn join_stage<T, E>(handle: JoinHandle<std::result::Result<T, E>>, stage: &str) -> Result<T>
where
    E: Into<AnalysisError>,
{
    match handle.await {
        Ok(result) => result.map_err(Into::into),
        Err(e) => Err(AnalysisError::TaskFailed(format!("{} stage: {}", stage, e))),
    }
}

struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct SessionInner {
    state: SessionState,
    // Bumped on every new image or reset; runs tagged with an older value are stale.
    generation: u64,
    source: Option<Arc<SourceImage>>,
    outcome: Option<Arc<AnalysisOutcome>>,
    progress: u8,
    last_failure: Option<String>,
    ticker: Option<ProgressTicker>,
}

impl SessionInner {
    fn stop_ticker(&mut self) {
        self.ticker.take();
    }
}

/// Per-submission state machine: `Idle -> ImageLoaded -> Analyzing -> Completed | Failed`.
///
/// `Completed` and `Failed` keep the source image, so a run can be repeated
/// without resubmitting. Loading a new image while a run is in flight
/// supersedes it: the old run's result is discarded without touching state.
pub struct AnalysisSession {
    orchestrator: Arc<AnalysisOrchestrator>,
    inner: Arc<Mutex<SessionInner>>,
    events: Arc<dyn EventSink>,
    max_upload_bytes: usize,
    progress: ProgressConfig,
}

impl AnalysisSession {
    pub fn new(config: AnalysisConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            orchestrator: Arc::new(AnalysisOrchestrator::new(&config, classifier)),
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Idle,
                generation: 0,
                source: None,
                outcome: None,
                progress: 0,
                last_failure: None,
                ticker: None,
            })),
            events: Arc::new(LogSink),
            max_upload_bytes: config.max_upload_bytes,
            progress: config.progress,
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn progress(&self) -> u8 {
        self.inner.lock().progress
    }

    pub fn outcome(&self) -> Option<Arc<AnalysisOutcome>> {
        self.inner.lock().outcome.clone()
    }

    pub fn source(&self) -> Option<Arc<SourceImage>> {
        self.inner.lock().source.clone()
    }

    pub fn last_failure(&self) -> Option<String> {
        self.inner.lock().last_failure.clone()
    }

    /// Parses the MIME type, then loads as [`AnalysisSession::load_image`].
    pub fn submit(&self, bytes: Vec<u8>, mime_type: &str) -> Result<Arc<SourceImage>> {
        let mime = mime_type
            .parse::<ImageMime>()
            .map_err(AnalysisError::from)
            .inspect_err(|e| self.notify_failure(e))?;
        self.load_image(bytes, mime)
    }

    /// Rejected payloads leave the session untouched.
    pub fn load_image(&self, bytes: Vec<u8>, mime: ImageMime) -> Result<Arc<SourceImage>> {
        let source = SourceImage::from_bytes(bytes, mime, self.max_upload_bytes)
            .map(Arc::new)
            .inspect_err(|e| self.notify_failure(e))?;

        {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.stop_ticker();
            inner.source = Some(source.clone());
            inner.outcome = None;
            inner.progress = 0;
            inner.last_failure = None;
            inner.state = SessionState::ImageLoaded;
        }

        let (width, height) = source.dimensions();
        info!("Loaded {} image {}x{}", source.mime(), width, height);
        self.events.emit(&SessionEvent::StateChanged(SessionState::ImageLoaded));

        Ok(source)
    }

    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.stop_ticker();
            inner.source = None;
            inner.outcome = None;
            inner.progress = 0;
            inner.last_failure = None;
            inner.state = SessionState::Idle;
        }
        self.events.emit(&SessionEvent::StateChanged(SessionState::Idle));
    }

    pub async fn run_analysis(&self) -> Result<Arc<AnalysisOutcome>> {
        let (source, generation) = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Idle => return Err(AnalysisError::NoImageLoaded),
                SessionState::Analyzing => return Err(AnalysisError::AlreadyAnalyzing),
                _ => {}
            }
            let source = inner.source.clone().ok_or(AnalysisError::NoImageLoaded)?;

            inner.state = SessionState::Analyzing;
            inner.progress = 0;
            inner.outcome = None;
            inner.last_failure = None;
            inner.ticker = Some(spawn_ticker(
                Arc::downgrade(&self.inner),
                inner.generation,
                self.progress.clone(),
                self.events.clone(),
            ));

            (source, inner.generation)
        };

        self.events.emit(&SessionEvent::StateChanged(SessionState::Analyzing));
        self.events.emit(&SessionEvent::Progress(0));

        let mut guard = RunGuard {
            inner: self.inner.clone(),
            generation,
            armed: true,
        };
        let result = self.orchestrator.analyze(source).await;
        guard.armed = false;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!("Discarding result of superseded run {}", generation);
            return Err(AnalysisError::Superseded);
        }
        inner.stop_ticker();

        match result {
            Ok(outcome) => {
                let outcome = Arc::new(outcome);
                inner.outcome = Some(outcome.clone());
                inner.progress = 100;
                inner.state = SessionState::Completed;
                drop(inner);

                self.events.emit(&SessionEvent::Progress(100));
                self.events.emit(&SessionEvent::StateChanged(SessionState::Completed));
                Ok(outcome)
            }
            Err(err) => {
                inner.progress = 0;
                inner.state = SessionState::Failed;
                inner.last_failure = Some(err.to_string());
                drop(inner);

                self.events.emit(&SessionEvent::Progress(0));
                self.events.emit(&SessionEvent::StateChanged(SessionState::Failed));
                self.notify_failure(&err);
                Err(err)
            }
        }
    }

    fn notify_failure(&self, err: &AnalysisError) {
        self.events.emit(&SessionEvent::Failed(err.to_string()));
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.stop_ticker();
    }
}

// Returns the session to `ImageLoaded` if the future driving a run is dropped mid-flight.
struct RunGuard {
    inner: Arc<Mutex<SessionInner>>,
    generation: u64,
    armed: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.generation == self.generation && inner.state == SessionState::Analyzing {
            debug!("Run {} abandoned, returning to ImageLoaded", self.generation);
            inner.stop_ticker();
            inner.progress = 0;
            inner.state = SessionState::ImageLoaded;
        }
    }
}

/// Advances progress by `step` every `interval` up to `ceiling`, independent
/// of actual task completion.
fn spawn_ticker(
    session: Weak<Mutex<SessionInner>>,
    generation: u64,
    config: ProgressConfig,
    events: Arc<dyn EventSink>,
) -> ProgressTicker {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.interval());
        interval.tick().await;

        loop {
            interval.tick().await;

            let Some(inner) = session.upgrade() else {
                break;
            };
            let progress = {
                let mut inner = inner.lock();
                if inner.generation != generation || inner.state != SessionState::Analyzing {
                    break;
                }
                inner.progress = inner.progress.saturating_add(config.step).min(config.ceiling);
                inner.progress
            };

            events.emit(&SessionEvent::Progress(progress));
            if progress >= config.ceiling {
                break;
            }
        }
    });

    ProgressTicker { handle }
}
