//! Pipeline behaviour with fake renderer, mailer and attempt store.

mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use actors::{
    PipelineError, PipelineRegistry, PipelineServices, PipelineSettings, start_pipeline,
};
use certificate_core::{
    JobValidationError, PersistenceOutcome, PipelineEvent, RenderOutcome, RenderStage,
    WorkerKind,
};
use common::*;
use db::repositories::{Participation, ParticipationRepository};

#[tokio::test]
async fn end_to_end_certificate_is_rendered_uploaded_emailed_and_recorded() -> TestResult {
    let db = db::init(&db::DbConfig::memory()).await?;
    let participations = ParticipationRepository::new(db);
    let job = asha_job();
    participations
        .create(&Participation::new(
            job.student_id.clone(),
            job.quiz_id.clone(),
            "Falcons",
            92.0,
        ))
        .await?;

    let storage = memory_storage().await?;
    let mailer = RecordingMailer::new();
    let services = PipelineServices::new(
        FakeRenderer::new(),
        storage.clone(),
        mailer.clone(),
        participations.clone(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;
    let mut events = pipeline.subscribe();

    let job_id = pipeline.submit(job.clone())?;
    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::PersistenceFinished { .. })
    })
    .await?;

    let results = render_results(&seen);
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.job_id, job_id);
    assert_eq!(result.student_id, job.student_id);
    assert_eq!(result.quiz_id, job.quiz_id);
    let artifact = result.artifact().ok_or("render should succeed")?;
    assert_eq!(artifact.key, "certificates/algebra-basics/falcons/asha-rao");
    assert_eq!(
        artifact.url,
        "memory:///certificates/algebra-basics/falcons/asha-rao"
    );

    let stored = storage.get_bytes(&artifact.key).await?;
    assert!(String::from_utf8_lossy(&stored).contains("Asha Rao"));

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "asha@example.com");
    assert_eq!(sent[0].subject, "Your certificate for Algebra Basics is here!");
    assert!(sent[0].html.contains(&artifact.url));

    assert_eq!(count_persistence_scheduled(&seen), 1);
    let record = participations.get(&job.student_id, &job.quiz_id).await?;
    assert!(record.certificate_generated);
    assert_eq!(record.certificate_url.as_deref(), Some(artifact.url.as_str()));

    let stages: Vec<(WorkerKind, RenderStage)> = seen
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageEntered { worker, stage, .. } => Some((*worker, *stage)),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            (WorkerKind::Render, RenderStage::Rendering),
            (WorkerKind::Render, RenderStage::Uploading),
            (WorkerKind::Render, RenderStage::Notifying),
            (WorkerKind::Render, RenderStage::Reporting),
            (WorkerKind::Persistence, RenderStage::Writing),
            (WorkerKind::Persistence, RenderStage::Reporting),
        ]
    );

    let stats = pipeline.stats().await?;
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.rendered, 1);
    assert_eq!(stats.persisted, 1);
    assert_eq!(stats.in_flight(), 0);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn storage_failure_skips_email_and_persistence_and_next_job_proceeds() -> TestResult {
    let store = FlakyStore::new(memory_storage().await?, 1);
    let mailer = RecordingMailer::new();
    let attempts = RecordingAttempts::new();
    let services = PipelineServices::new(
        FakeRenderer::new(),
        store.clone(),
        mailer.clone(),
        attempts.clone(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;
    let mut events = pipeline.subscribe();

    let failing = pipeline.submit(job_for("s-1", "Ravi Kumar"))?;
    let succeeding = pipeline.submit(job_for("s-2", "Meera Iyer"))?;

    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::PersistenceFinished { result, .. } if result.job_id == succeeding)
    })
    .await?;

    let results = render_results(&seen);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].job_id, failing);
    let detail = results[0].error_detail().ok_or("first job should fail")?;
    assert!(detail.contains("uploading failed"), "{detail}");
    assert!(detail.contains("bucket unavailable"), "{detail}");
    assert!(results[1].is_done());

    // Only the second job reached the mailer and the database
    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(mailer.sent()[0].to, "s-2@example.com");
    assert_eq!(count_persistence_scheduled(&seen), 1);
    let writes = attempts.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0.as_str(), "s-2");
    assert_eq!(store.uploads.load(Ordering::SeqCst), 1);

    let stats = pipeline.stats().await?;
    assert_eq!(stats.render_failed, 1);
    assert_eq!(stats.rendered, 1);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn email_failure_leaves_the_uploaded_certificate_in_place() -> TestResult {
    let storage = memory_storage().await?;
    let attempts = RecordingAttempts::new();
    let services = PipelineServices::new(
        FakeRenderer::new(),
        storage.clone(),
        RecordingMailer::failing(),
        attempts.clone(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;
    let mut events = pipeline.subscribe();

    pipeline.submit(asha_job())?;
    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::RenderFinished { .. })
    })
    .await?;

    let results = render_results(&seen);
    let detail = results[0].error_detail().ok_or("email failure should fail the job")?;
    assert!(detail.contains("notifying failed"), "{detail}");

    let orphan = storage
        .get_bytes("certificates/algebra-basics/falcons/asha-rao")
        .await?;
    assert!(!orphan.is_empty());
    assert_eq!(count_persistence_scheduled(&seen), 0);

    let stats = pipeline.stats().await?;
    assert_eq!(stats.render_failed, 1);
    assert!(attempts.writes().is_empty());

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn slow_render_times_out_and_tears_down_the_session() -> TestResult {
    let renderer = FakeRenderer::new().with_delay(Duration::from_secs(30));
    let services = PipelineServices::new(
        renderer.clone(),
        memory_storage().await?,
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let settings = PipelineSettings::default().with_render_timeout(Duration::from_millis(200));
    let (pipeline, _handle) = start_pipeline(services, settings).await?;
    let mut events = pipeline.subscribe();

    let started = Instant::now();
    pipeline.submit(asha_job())?;
    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::RenderFinished { .. })
    })
    .await?;

    assert!(started.elapsed() < Duration::from_secs(5));
    let results = render_results(&seen);
    let detail = results[0].error_detail().ok_or("render should time out")?;
    assert!(detail.contains("rendering failed"), "{detail}");
    assert!(detail.contains("timed out"), "{detail}");
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.closed_sessions.load(Ordering::SeqCst), 1);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn colliding_keys_overwrite_the_earlier_certificate() -> TestResult {
    let storage = memory_storage().await?;
    let services = PipelineServices::new(
        FakeRenderer::new(),
        storage.clone(),
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;
    let mut events = pipeline.subscribe();

    pipeline.submit(job_for("s-1", "Asha Rao"))?;
    let second = pipeline.submit(job_for("s-2", "ASHA   rao"))?;
    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::RenderFinished { result, .. } if result.job_id == second)
    })
    .await?;

    let results = render_results(&seen);
    assert_eq!(results.len(), 2);
    let keys: Vec<&str> = results
        .iter()
        .filter_map(|r| r.artifact().map(|a| a.key.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            "certificates/algebra-basics/falcons/asha-rao",
            "certificates/algebra-basics/falcons/asha-rao",
        ]
    );

    let stored = storage.get_bytes(keys[0]).await?;
    let stored = String::from_utf8_lossy(&stored);
    assert!(stored.contains("ASHA   rao"));
    assert!(!stored.contains("Asha Rao"));

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn jobs_are_rendered_in_submission_order() -> TestResult {
    let services = PipelineServices::new(
        FakeRenderer::new().with_delay(Duration::from_millis(20)),
        memory_storage().await?,
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;
    let mut events = pipeline.subscribe();

    let submitted = vec![
        pipeline.submit(job_for("s-1", "Ravi Kumar"))?,
        pipeline.submit(job_for("s-2", "Meera Iyer"))?,
        pipeline.submit(job_for("s-3", "Kabir Shah"))?,
    ];
    let last = submitted[2];
    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::PersistenceFinished { result, .. } if result.job_id == last)
    })
    .await?;

    let rendered: Vec<_> = render_results(&seen).iter().map(|r| r.job_id).collect();
    assert_eq!(rendered, submitted);

    let persisted: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PersistenceFinished { result, .. } => Some(result.job_id),
            _ => None,
        })
        .collect();
    assert_eq!(persisted, submitted);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn missing_attempt_fails_persistence_and_is_journaled() -> TestResult {
    let journal_dir = tempfile::tempdir()?;
    let db = db::init(&db::DbConfig::memory()).await?;
    let services = PipelineServices::new(
        FakeRenderer::new(),
        memory_storage().await?,
        RecordingMailer::new(),
        ParticipationRepository::new(db),
    );
    let settings = PipelineSettings::default().with_failure_journal(journal_dir.path());
    let (pipeline, _handle) = start_pipeline(services, settings).await?;
    let mut events = pipeline.subscribe();

    let job_id = pipeline.submit(asha_job())?;
    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::PersistenceFinished { .. })
    })
    .await?;

    let outcome = seen.iter().find_map(|e| match e {
        PipelineEvent::PersistenceFinished { result, .. } => Some(result.outcome.clone()),
        _ => None,
    });
    match outcome {
        Some(PersistenceOutcome::Error { error }) => {
            assert!(error.contains("not found"), "{error}")
        }
        other => return Err(format!("expected persistence error, got {other:?}").into()),
    }

    let stats = pipeline.stats().await?;
    assert_eq!(stats.rendered, 1);
    assert_eq!(stats.persist_failed, 1);

    let journaled = actors::FailureJournal::new(journal_dir.path()).list().await?;
    assert_eq!(journaled.len(), 1);
    assert_eq!(journaled[0].job_id, job_id);
    assert_eq!(journaled[0].stage, WorkerKind::Persistence);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn invalid_jobs_are_rejected_at_submission() -> TestResult {
    let services = PipelineServices::new(
        FakeRenderer::new(),
        memory_storage().await?,
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;

    let mut job = asha_job();
    job.student_email = "asha.example.com".into();
    assert!(matches!(
        pipeline.submit(job),
        Err(PipelineError::InvalidJob(JobValidationError::InvalidEmail(_)))
    ));

    let mut job = asha_job();
    job.score = 140.0;
    assert!(matches!(
        pipeline.submit(job),
        Err(PipelineError::InvalidJob(JobValidationError::InvalidScore(_)))
    ));

    assert_eq!(pipeline.stats().await?.submitted, 0);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn panicking_render_reports_an_error_and_the_worker_keeps_going() -> TestResult {
    let services = PipelineServices::new(
        FakeRenderer::new().panicking_on("Crash Test"),
        memory_storage().await?,
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;
    let mut events = pipeline.subscribe();

    let crashed = pipeline.submit(job_for("s-1", "Crash Test"))?;
    let next = pipeline.submit(job_for("s-2", "Meera Iyer"))?;
    let mut finished = 0;
    let seen = collect_until(&mut events, |e| {
        if matches!(e, PipelineEvent::RenderFinished { .. }) {
            finished += 1;
        }
        finished == 2
    })
    .await?;

    let results = render_results(&seen);
    assert_eq!(results[0].job_id, crashed);
    let detail = results[0].error_detail().unwrap_or_default();
    assert!(detail.contains("panicked"), "{detail}");
    assert!(detail.contains("renderer crashed on Crash Test"), "{detail}");
    assert_eq!(results[1].job_id, next);
    assert!(matches!(results[1].outcome, RenderOutcome::Done { .. }));
    assert!(
        !seen
            .iter()
            .any(|e| matches!(e, PipelineEvent::WorkerRestarted { .. }))
    );

    let stats = pipeline.stats().await?;
    assert_eq!(stats.restarts, 0);
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.render_failed, 1);
    assert_eq!(stats.rendered, 1);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn killed_workers_are_restarted() -> TestResult {
    let services = PipelineServices::new(
        FakeRenderer::new(),
        memory_storage().await?,
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;
    let mut events = pipeline.subscribe();

    for worker in pipeline.coordinator().get_children() {
        worker.kill_and_wait(None).await?;
    }
    let mut restarted = Vec::new();
    collect_until(&mut events, |e| {
        if let PipelineEvent::WorkerRestarted { worker, .. } = e {
            restarted.push(*worker);
        }
        restarted.len() == 2
    })
    .await?;
    assert!(restarted.contains(&WorkerKind::Render));
    assert!(restarted.contains(&WorkerKind::Persistence));

    let job_id = pipeline.submit(job_for("s-1", "Meera Iyer"))?;
    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::PersistenceFinished { .. })
    })
    .await?;
    let results = render_results(&seen);
    assert_eq!(results[0].job_id, job_id);
    assert!(matches!(results[0].outcome, RenderOutcome::Done { .. }));

    let stats = pipeline.stats().await?;
    assert_eq!(stats.restarts, 2);
    assert_eq!(stats.persisted, 1);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn jobs_for_a_dead_worker_fail_when_restarts_are_disabled() -> TestResult {
    let services = PipelineServices::new(
        FakeRenderer::new(),
        memory_storage().await?,
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let settings = PipelineSettings::default().with_restart_workers(false);
    let (pipeline, _handle) = start_pipeline(services, settings).await?;
    let mut events = pipeline.subscribe();

    for worker in pipeline.coordinator().get_children() {
        worker.kill_and_wait(None).await?;
    }

    let job_id = pipeline.submit(job_for("s-1", "Meera Iyer"))?;
    let seen = collect_until(&mut events, |e| {
        matches!(e, PipelineEvent::RenderFinished { .. })
    })
    .await?;
    assert!(
        !seen
            .iter()
            .any(|e| matches!(e, PipelineEvent::WorkerRestarted { .. }))
    );
    let results = render_results(&seen);
    assert_eq!(results[0].job_id, job_id);
    let detail = results[0].error_detail().unwrap_or_default();
    assert!(detail.contains("render worker unavailable"), "{detail}");

    let stats = pipeline.stats().await?;
    assert_eq!(stats.restarts, 0);
    assert_eq!(stats.render_failed, 1);
    assert_eq!(stats.in_flight(), 0);

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn registry_refuses_a_second_pipeline() -> TestResult {
    let services = PipelineServices::new(
        FakeRenderer::new(),
        memory_storage().await?,
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let (pipeline, _handle) = start_pipeline(services, PipelineSettings::default()).await?;

    let registry = PipelineRegistry::new();
    registry.register(pipeline.clone())?;
    assert!(matches!(
        registry.register(pipeline.clone()),
        Err(PipelineError::AlreadyStarted)
    ));
    assert!(registry.get().is_some());

    assert!(registry.take().is_some());
    assert!(registry.get().is_none());

    pipeline.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_the_coordinator() -> TestResult {
    let services = PipelineServices::new(
        FakeRenderer::new(),
        memory_storage().await?,
        RecordingMailer::new(),
        RecordingAttempts::new(),
    );
    let (pipeline, handle) = start_pipeline(services, PipelineSettings::default()).await?;

    pipeline.shutdown()?;
    tokio::time::timeout(Duration::from_secs(5), handle).await??;

    assert!(matches!(
        pipeline.submit(asha_job()),
        Err(PipelineError::Unavailable(_))
    ));
    Ok(())
}
