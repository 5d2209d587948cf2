//! Service seams the workers call through.
//!
//! Each worker holds `Arc<dyn ...>` handles built once at start-up. The
//! production implementations wrap the `render`, `storage`, `mailer` and `db`
//! crates; tests substitute fakes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use certificate_core::{ArtifactLocation, QuizId, StudentId};
use db::DbError;
use db::repositories::ParticipationRepository;
use mailer::{Email, MailError, Mailer};
use render::{ChromiumRenderer, RenderError};
use storage::{PDF_CONTENT_TYPE, Storage, StorageError};

/// Future type returned by service calls.
pub type ServiceFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Turns certificate HTML into PDF bytes.
pub trait CertificateRenderer: Send + Sync + 'static {
    fn render_pdf<'a>(&'a self, html: &'a str) -> ServiceFuture<'a, Vec<u8>, RenderError>;
}

/// Stores a rendered certificate and says where it can be fetched.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Upload `pdf` under `key`, overwriting whatever is there.
    fn put_pdf<'a>(
        &'a self,
        key: &'a str,
        pdf: Vec<u8>,
    ) -> ServiceFuture<'a, ArtifactLocation, StorageError>;
}

/// Delivers the "your certificate is ready" email.
pub trait NotificationMailer: Send + Sync + 'static {
    fn send<'a>(&'a self, email: &'a Email) -> ServiceFuture<'a, (), MailError>;
}

/// Records that an attempt has its certificate.
pub trait AttemptStore: Send + Sync + 'static {
    fn mark_certificate_generated<'a>(
        &'a self,
        student_id: &'a StudentId,
        quiz_id: &'a QuizId,
        certificate_url: &'a str,
    ) -> ServiceFuture<'a, (), DbError>;
}

impl CertificateRenderer for ChromiumRenderer {
    fn render_pdf<'a>(&'a self, html: &'a str) -> ServiceFuture<'a, Vec<u8>, RenderError> {
        Box::pin(ChromiumRenderer::render_pdf(self, html))
    }
}

impl ArtifactStore for Storage {
    fn put_pdf<'a>(
        &'a self,
        key: &'a str,
        pdf: Vec<u8>,
    ) -> ServiceFuture<'a, ArtifactLocation, StorageError> {
        Box::pin(async move {
            let url = self
                .put_object(key, Bytes::from(pdf), PDF_CONTENT_TYPE)
                .await?;
            Ok(ArtifactLocation {
                key: key.to_string(),
                url,
            })
        })
    }
}

impl NotificationMailer for Mailer {
    fn send<'a>(&'a self, email: &'a Email) -> ServiceFuture<'a, (), MailError> {
        Box::pin(Mailer::send(self, email))
    }
}

impl AttemptStore for ParticipationRepository {
    fn mark_certificate_generated<'a>(
        &'a self,
        student_id: &'a StudentId,
        quiz_id: &'a QuizId,
        certificate_url: &'a str,
    ) -> ServiceFuture<'a, (), DbError> {
        Box::pin(async move {
            ParticipationRepository::mark_certificate_generated(
                self,
                student_id,
                quiz_id,
                certificate_url,
            )
            .await?;
            Ok(())
        })
    }
}

/// Handles shared by the coordinator and both workers.
///
/// Cloning is cheap; a restarted worker gets the same handles as the one it
/// replaces.
#[derive(Clone)]
pub struct PipelineServices {
    pub renderer: Arc<dyn CertificateRenderer>,
    pub store: Arc<dyn ArtifactStore>,
    pub mailer: Arc<dyn NotificationMailer>,
    pub attempts: Arc<dyn AttemptStore>,
}

impl PipelineServices {
    pub fn new(
        renderer: impl CertificateRenderer,
        store: impl ArtifactStore,
        mailer: impl NotificationMailer,
        attempts: impl AttemptStore,
    ) -> Self {
        Self {
            renderer: Arc::new(renderer),
            store: Arc::new(store),
            mailer: Arc::new(mailer),
            attempts: Arc::new(attempts),
        }
    }
}
