//! Fake services and event helpers shared by the pipeline tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{ArtifactStore, AttemptStore, CertificateRenderer, NotificationMailer, ServiceFuture};
use certificate_core::{
    ArtifactLocation, CertificateJob, PipelineEvent, QuizId, RenderResult, StudentId,
};
use db::DbError;
use mailer::{Email, MailError};
use render::RenderError;
use storage::{Storage, StorageConfig, StorageError};
use tokio::sync::broadcast;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const EVENT_WAIT: Duration = Duration::from_secs(10);

pub fn asha_job() -> CertificateJob {
    CertificateJob::new(
        StudentId::new("student-asha"),
        "Asha Rao",
        "asha@example.com",
        "Falcons",
        QuizId::new("quiz-algebra"),
        "Algebra Basics",
        92.0,
    )
}

pub fn job_for(student: &str, name: &str) -> CertificateJob {
    CertificateJob::new(
        StudentId::new(student),
        name,
        format!("{student}@example.com"),
        "Falcons",
        QuizId::new("quiz-algebra"),
        "Algebra Basics",
        75.0,
    )
}

pub async fn memory_storage() -> TestResult<Storage> {
    Ok(Storage::new(StorageConfig::memory()).await?)
}

/// Counts sessions torn down, on every path including cancellation.
struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Renderer that "prints" the HTML itself as the PDF body.
#[derive(Clone, Default)]
pub struct FakeRenderer {
    delay: Option<Duration>,
    panic_on: Option<String>,
    pub calls: Arc<AtomicUsize>,
    pub closed_sessions: Arc<AtomicUsize>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panic when the certificate mentions `name`.
    pub fn panicking_on(mut self, name: impl Into<String>) -> Self {
        self.panic_on = Some(name.into());
        self
    }
}

impl CertificateRenderer for FakeRenderer {
    fn render_pdf<'a>(&'a self, html: &'a str) -> ServiceFuture<'a, Vec<u8>, RenderError> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(name) = &self.panic_on
                && html.contains(name.as_str())
            {
                panic!("renderer crashed on {name}");
            }

            let _session = SessionGuard(self.closed_sessions.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(html.as_bytes().to_vec())
        })
    }
}

/// Storage that fails the first `failures` uploads.
#[derive(Clone)]
pub struct FlakyStore {
    inner: Storage,
    failures_left: Arc<AtomicUsize>,
    pub uploads: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: Storage, failures: usize) -> Self {
        Self {
            inner,
            failures_left: Arc::new(AtomicUsize::new(failures)),
            uploads: Arc::default(),
        }
    }
}

impl ArtifactStore for FlakyStore {
    fn put_pdf<'a>(
        &'a self,
        key: &'a str,
        pdf: Vec<u8>,
    ) -> ServiceFuture<'a, ArtifactLocation, StorageError> {
        Box::pin(async move {
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StorageError::Io(std::io::Error::other("bucket unavailable")));
            }
            self.uploads.fetch_add(1, Ordering::SeqCst);
            self.inner.put_pdf(key, pdf).await
        })
    }
}

/// Mailer that remembers what it was asked to send.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    fail: bool,
    pub sent: Arc<Mutex<Vec<Email>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl NotificationMailer for RecordingMailer {
    fn send<'a>(&'a self, email: &'a Email) -> ServiceFuture<'a, (), MailError> {
        Box::pin(async move {
            if self.fail {
                return Err(MailError::Rejected {
                    status: 503,
                    body: "mail service down".into(),
                });
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email.clone());
            }
            Ok(())
        })
    }
}

/// Attempt store that records writes instead of hitting a database.
#[derive(Clone, Default)]
pub struct RecordingAttempts {
    pub writes: Arc<Mutex<Vec<(StudentId, QuizId, String)>>>,
}

impl RecordingAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(StudentId, QuizId, String)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl AttemptStore for RecordingAttempts {
    fn mark_certificate_generated<'a>(
        &'a self,
        student_id: &'a StudentId,
        quiz_id: &'a QuizId,
        certificate_url: &'a str,
    ) -> ServiceFuture<'a, (), DbError> {
        Box::pin(async move {
            if let Ok(mut writes) = self.writes.lock() {
                writes.push((
                    student_id.clone(),
                    quiz_id.clone(),
                    certificate_url.to_string(),
                ));
            }
            Ok(())
        })
    }
}

/// Receive events until one matches, returning everything seen up to and
/// including it.
pub async fn collect_until<F>(
    rx: &mut broadcast::Receiver<PipelineEvent>,
    mut done: F,
) -> TestResult<Vec<PipelineEvent>>
where
    F: FnMut(&PipelineEvent) -> bool,
{
    let mut seen = Vec::new();
    tokio::time::timeout(EVENT_WAIT, async {
        loop {
            let event = rx.recv().await?;
            let finished = done(&event);
            seen.push(event);
            if finished {
                return Ok::<_, broadcast::error::RecvError>(());
            }
        }
    })
    .await
    .map_err(|_| "timed out waiting for pipeline event")??;
    Ok(seen)
}

/// Render results among `events`, in the order they were reported.
pub fn render_results(events: &[PipelineEvent]) -> Vec<RenderResult> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::RenderFinished { result, .. } => Some(result.clone()),
            _ => None,
        })
        .collect()
}

pub fn count_persistence_scheduled(events: &[PipelineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::PersistenceScheduled { .. }))
        .count()
}
