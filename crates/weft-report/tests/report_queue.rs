#![forbid(unsafe_code)]

//! Report queue lifecycle: submission, ordering, processing, failure and the
//! background runner.

use std::fs;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tempfile::TempDir;
use weft_report::{
    CreatorRunner, CycleOutcome, QueueReporter, ReportCreator, ReportError, ReportId, ReportJob,
    ReportMode, ReportOutput, ReportPosition, ReportQueueConfig, ReportType, ReportValues,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn setup() -> (TempDir, ReportQueueConfig, QueueReporter) {
    let tmp = TempDir::new().unwrap();
    let config = ReportQueueConfig::default()
        .with_base_dir(tmp.path())
        .with_short_poll(Duration::from_millis(5))
        .with_idle_poll(Duration::from_millis(10));
    let reporter = QueueReporter::new(&config).unwrap();
    (tmp, config, reporter)
}

fn job(id: &str, mode: ReportMode, report_type: ReportType) -> ReportJob {
    ReportJob::new(mode, report_type, "template").with_id(ReportId::new(id).unwrap())
}

fn backdate(reporter: &QueueReporter, file: &str, secs: u64) {
    let when = SystemTime::now() - Duration::from_secs(secs);
    fs::File::options()
        .write(true)
        .open(reporter.dirs().open.join(file))
        .unwrap()
        .set_modified(when)
        .unwrap();
}

/// Echoes the template into a document, or the input values back.
fn echo(job: &ReportJob) -> Result<ReportOutput, ReportError> {
    match job.mode {
        ReportMode::Get => Ok(ReportOutput::Document(job.template.clone().into_bytes())),
        ReportMode::Set => Ok(ReportOutput::Values(job.values.clone())),
    }
}

fn creator(config: &ReportQueueConfig) -> ReportCreator {
    ReportCreator::new(config)
        .unwrap()
        .with_backend(ReportType::Document, echo)
        .with_backend(ReportType::Spreadsheet, echo)
}

// ── Ordering ────────────────────────────────────────────────────────────────

#[test]
fn get_jobs_rank_before_older_set_jobs() {
    let (_tmp, _config, reporter) = setup();
    let r1 = reporter
        .create_report(&job("r1", ReportMode::Get, ReportType::Document))
        .unwrap();
    let r2 = reporter
        .create_report(&job("r2", ReportMode::Set, ReportType::Document))
        .unwrap();
    backdate(&reporter, "r2-set.ser", 60);

    assert_eq!(reporter.report_position(&r1), ReportPosition::Queued(0));
    assert_eq!(reporter.report_position(&r2), ReportPosition::Queued(1));
}

#[test]
fn creator_follows_queue_order() {
    let (_tmp, config, reporter) = setup();
    for (id, mode, age) in [
        ("s-old", ReportMode::Set, 30),
        ("g-new", ReportMode::Get, 0),
        ("g-old", ReportMode::Get, 20),
    ] {
        let queued = job(id, mode, ReportType::Document);
        reporter.create_report(&queued).unwrap();
        backdate(&reporter, &queued.file_name(), age);
    }

    let creator = creator(&config);
    let order: Vec<_> = std::iter::from_fn(|| match creator.run_cycle().unwrap() {
        CycleOutcome::Completed(id) => Some(id.to_string()),
        _ => None,
    })
    .collect();
    assert_eq!(order, ["g-old", "g-new", "s-old"]);
}

// ── Lifecycle ───────────────────────────────────────────────────────────────

#[test]
fn get_job_produces_document() {
    let (_tmp, config, reporter) = setup();
    let id = reporter
        .create_report(&job("sheet", ReportMode::Get, ReportType::Spreadsheet))
        .unwrap();

    assert_eq!(creator(&config).run_cycle().unwrap(), CycleOutcome::Completed(id.clone()));
    let result = reporter.report_result(&id).unwrap();
    assert_eq!(result.file_name().unwrap(), "sheet.xls");
    assert_eq!(fs::read(&result).unwrap(), b"template");
    assert_eq!(reporter.report_position(&id), ReportPosition::Done);
    assert_eq!(fs::read_dir(&reporter.dirs().work).unwrap().count(), 0);
}

#[test]
fn set_job_produces_value_map() {
    let (_tmp, config, reporter) = setup();
    let queued = job("vals", ReportMode::Set, ReportType::Document).with_value("total", 42);
    let id = reporter.create_report(&queued).unwrap();

    creator(&config).run_cycle().unwrap();
    let result = reporter.report_result(&id).unwrap();
    assert_eq!(result.file_name().unwrap(), "vals.ser");
    let values: ReportValues = serde_json::from_slice(&fs::read(result).unwrap()).unwrap();
    assert_eq!(values["total"], 42);
}

#[test]
fn failing_job_moves_to_error_and_queue_continues() {
    let (_tmp, config, reporter) = setup();
    let broken = reporter
        .create_report(&job("broken", ReportMode::Get, ReportType::Presentation))
        .unwrap();
    let fine = reporter
        .create_report(&job("fine", ReportMode::Set, ReportType::Document))
        .unwrap();

    let creator = creator(&config);
    assert_eq!(creator.run_cycle().unwrap(), CycleOutcome::Failed(broken.clone()));
    assert_eq!(creator.run_cycle().unwrap(), CycleOutcome::Completed(fine.clone()));
    assert_eq!(creator.run_cycle().unwrap(), CycleOutcome::Idle);

    assert!(reporter.dirs().error.join("broken-get.ser").is_file());
    assert_eq!(reporter.report_position(&broken), ReportPosition::Failed);
    assert_eq!(reporter.report_position(&fine), ReportPosition::Done);
}

#[test]
fn panicking_backend_fails_only_its_job() {
    let (_tmp, config, reporter) = setup();
    let id = reporter
        .create_report(&job("boom", ReportMode::Get, ReportType::Document))
        .unwrap();
    let creator = ReportCreator::new(&config).unwrap().with_backend(
        ReportType::Document,
        |_: &ReportJob| -> Result<ReportOutput, ReportError> { panic!("template missing") },
    );

    assert_eq!(creator.run_cycle().unwrap(), CycleOutcome::Failed(id.clone()));
    assert_eq!(reporter.report_position(&id), ReportPosition::Failed);
}

#[test]
fn leftover_work_is_resumed_first() {
    let (_tmp, config, reporter) = setup();
    let first = reporter
        .create_report(&job("first", ReportMode::Get, ReportType::Document))
        .unwrap();
    let crashed = reporter
        .create_report(&job("crashed", ReportMode::Set, ReportType::Document))
        .unwrap();
    let dirs = reporter.dirs();
    fs::rename(dirs.open.join("crashed-set.ser"), dirs.work.join("crashed-set.ser")).unwrap();
    assert_eq!(reporter.report_position(&crashed), ReportPosition::Working);

    let creator = creator(&config);
    assert_eq!(creator.run_cycle().unwrap(), CycleOutcome::Completed(crashed));
    assert_eq!(creator.run_cycle().unwrap(), CycleOutcome::Completed(first));
}

#[test]
fn unknown_report_has_no_position() {
    let (_tmp, _config, reporter) = setup();
    let id = ReportId::new("nope").unwrap();
    assert_eq!(reporter.report_position(&id), ReportPosition::Unknown);
    assert!(reporter.report_result(&id).is_none());
}

// ── Runner ──────────────────────────────────────────────────────────────────

#[test]
fn runner_drains_queue_and_stops() {
    let (_tmp, config, reporter) = setup();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let creator = ReportCreator::new(&config).unwrap().with_backend(
        ReportType::Document,
        move |job: &ReportJob| {
            counter.fetch_add(1, Ordering::SeqCst);
            echo(job)
        },
    );
    let runner = CreatorRunner::spawn(creator, &config).unwrap();

    let ids: Vec<_> = (0..3)
        .map(|n| {
            reporter
                .create_report(&job(&format!("j{n}"), ReportMode::Get, ReportType::Document))
                .unwrap()
        })
        .collect();

    let deadline = Instant::now() + Duration::from_secs(10);
    while ids
        .iter()
        .any(|id| reporter.report_position(id) != ReportPosition::Done)
    {
        assert!(Instant::now() < deadline, "runner did not finish in time");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(runner.is_running());
    runner.stop();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
