use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use num_complex::Complex64;

use crate::config::ProcessorConfig;
use crate::engine::DispatchEngine;
use crate::error::NmrProcError;
use crate::indexing::NusSchedule;
use crate::pipeline::session::{ProcessingSession, RegistryPolicy, SessionState};
use crate::raw::MemoryFid;
use crate::types::AcquisitionModel;

// Test Helpers
fn session_with(engine: DispatchEngine) -> ProcessingSession {
    ProcessingSession::new(Arc::new(ProcessorConfig::default()), Box::new(engine))
}

/// Every point encodes its record and position: `(10r + p, 100 + 10r + p)`.
fn coded_fid(records: usize, points: usize) -> MemoryFid {
    MemoryFid::from_fn(records, points, true, |r, p| {
        let v = (10 * r + p) as f64;
        Complex64::new(v, 100.0 + v)
    })
}

/// A 2D acquisition of 3 increments with a real/imaginary pair in dimension 2.
fn paired_session(dataset: &str) -> ProcessingSession {
    let mut session = session_with(DispatchEngine::new());
    let model = AcquisitionModel::new(dataset, vec![4, 3], vec![true, true], vec![1, 2]).unwrap();
    session
        .open_fid(model, Box::new(coded_fid(6, 4)), RegistryPolicy::default())
        .unwrap();
    session
}

#[test]
fn test_2d_load_produces_one_group() {
    let mut session = session_with(DispatchEngine::new());
    let model = AcquisitionModel::new("exp1", vec![1024, 16], vec![true, true], vec![2, 1])
        .unwrap()
        .with_acq_order("d2")
        .unwrap();
    session
        .open_fid(model, Box::new(coded_fid(32, 1024)), RegistryPolicy::default())
        .unwrap();
    assert_eq!(session.state(), SessionState::Idle);

    assert_eq!(session.load_vectors(&[]).unwrap(), 2);
    let live = session.live_vectors();
    assert_eq!(live[0].len(), 1024);
    assert_eq!(live[1].len(), 1024);
    assert_eq!(live[0].data[3], Complex64::new(3.0, 103.0));
    assert_eq!(live[1].data[3], Complex64::new(13.0, 113.0));
    assert_eq!(session.saved_vectors(), live);
    assert_eq!(session.state(), SessionState::Loaded);
}

#[test]
fn test_execute_before_load_is_invalid_state() {
    let mut session = paired_session("exp");
    let result = session.execute("DIM(1)\nSCALE(factor=2)\nrun()\n", false);
    assert!(matches!(result, Err(NmrProcError::InvalidState(_))));
}

#[test]
fn test_successful_runs_start_from_loaded_data() {
    let mut session = paired_session("exp");
    let renders = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&renders);
    session.set_render_callback(move |vectors| {
        assert_eq!(vectors.len(), 2);
        counter.fetch_add(1, Ordering::SeqCst);
    });
    session.registry_mut().put_text("D1", &["SCALE(factor=2)"]).unwrap();
    session.load_vectors(&[]).unwrap();

    for _ in 0..2 {
        let built = session.process(false).unwrap();
        assert!(built.text.contains("SCALE(factor=2)"));
        assert_eq!(session.live_vectors()[1].data[0], Complex64::new(20.0, 220.0));
    }
    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert_eq!(session.saved_vectors()[1].data[0], Complex64::new(10.0, 110.0));
}

#[test]
fn test_failure_restores_vectors_and_keeps_registry() {
    let mut session = paired_session("exp");
    session
        .registry_mut()
        .put_text("D1", &["SCALE(factor=5)", "FAIL(message='bad_window')"])
        .unwrap();
    session.load_vectors(&[]).unwrap();
    let registry_before = session.registry().clone();

    let err = session.process(false).unwrap_err();
    assert_eq!(err.fault_locator(), Some(("D1", 1)));
    assert_eq!(session.live_vectors(), session.saved_vectors());
    assert_eq!(session.registry(), &registry_before);
    assert_eq!(session.state(), SessionState::Loaded);
}

#[test]
fn test_cancel_before_run_is_reported_once() {
    let mut session = paired_session("exp");
    session.load_vectors(&[]).unwrap();
    session.cancel_flag().cancel();

    let script = "DIM(1)\nSCALE(factor=3)\nrun()\n";
    assert!(matches!(session.execute(script, false), Err(NmrProcError::Cancelled)));
    assert_eq!(session.live_vectors(), session.saved_vectors());

    session.execute(script, false).unwrap();
    assert_eq!(session.live_vectors()[0].data[1], Complex64::new(3.0, 303.0));
}

#[test]
fn test_background_run_can_be_cancelled() {
    let engine = DispatchEngine::new().with_handler("SLOW", |_, _| {
        thread::sleep(Duration::from_millis(20));
        Ok(())
    });
    let mut session = session_with(engine);
    let model = AcquisitionModel::new("exp", vec![4, 3], vec![true, true], vec![1, 2]).unwrap();
    session
        .open_fid(model, Box::new(coded_fid(6, 4)), RegistryPolicy::default())
        .unwrap();
    session.load_vectors(&[]).unwrap();

    let script = format!("DIM(1)\nSCALE(factor=3)\n{}run()\n", "SLOW()\n".repeat(200));
    let handle = session.execute_in_background(script, false);
    thread::sleep(Duration::from_millis(50));
    handle.cancel();

    let (session, result) = handle.join();
    assert!(matches!(result, Err(NmrProcError::Cancelled)));
    assert_eq!(session.live_vectors(), session.saved_vectors());
    assert_eq!(session.state(), SessionState::Loaded);
}

#[test]
fn test_background_run_returns_processed_session() {
    let mut session = paired_session("exp");
    session.load_vectors(&[]).unwrap();
    let handle = session.execute_in_background("DIM(1)\nSCALE(factor=2)\nrun()\n".to_string(), false);
    let (session, result) = handle.join();
    result.unwrap();
    assert_eq!(session.live_vectors()[0].data[2], Complex64::new(4.0, 204.0));
}

#[test]
fn test_late_cancel_does_not_reach_next_run() {
    let mut session = paired_session("exp");
    session.load_vectors(&[]).unwrap();
    let script = "DIM(1)\nSCALE(factor=2)\nrun()\n";

    let handle = session.execute_in_background(script.to_string(), false);
    while !handle.is_finished() {
        thread::sleep(Duration::from_millis(1));
    }
    handle.cancel();
    let (mut session, result) = handle.join();
    result.unwrap();

    session.execute(script, false).unwrap();
    assert_eq!(session.live_vectors()[0].data[2], Complex64::new(4.0, 204.0));
}

#[test]
fn test_unsampled_nus_rows_load_as_zeros() {
    let mut session = session_with(DispatchEngine::new());
    let schedule = NusSchedule::new(vec![vec![0], vec![2]]).unwrap();
    let model = AcquisitionModel::new("nus", vec![8, 4], vec![true, true], vec![1, 1])
        .unwrap()
        .with_nus(schedule)
        .unwrap();
    session
        .open_fid(model, Box::new(coded_fid(2, 8)), RegistryPolicy::default())
        .unwrap();

    session.load_vectors(&[1]).unwrap();
    let missing = &session.live_vectors()[0];
    assert!(!missing.acquired);
    assert!(missing.data.iter().all(|z| *z == Complex64::default()));

    session.load_vectors(&[2]).unwrap();
    let sampled = &session.live_vectors()[0];
    assert!(sampled.acquired);
    assert_eq!(sampled.data[0], Complex64::new(10.0, 110.0));
}

#[test]
fn test_skip_group_zeroes_one_component() {
    let mut session = paired_session("exp");
    session.set_skip_groups_text("[1]@R").unwrap();
    assert_eq!(session.skip_groups_text(), "[1]@R");

    // Row 2 is the real half of increment 1.
    session.load_vectors(&[2]).unwrap();
    let live = session.live_vectors();
    assert!(!live[0].acquired);
    assert_eq!(live[0].data[0], Complex64::default());
    assert_eq!(live[1].data[0], Complex64::new(30.0, 130.0));
    assert_eq!(live[1].rows, vec![3]);
}

#[test]
fn test_echo_antiecho_pairs_are_combined() {
    let mut session = session_with(DispatchEngine::new());
    let model = AcquisitionModel::new("ea", vec![4, 3], vec![true, true], vec![1, 2]).unwrap();
    let fid = MemoryFid::from_fn(6, 4, true, |r, _| {
        if r % 2 == 0 {
            Complex64::new(1.0, 0.0)
        } else {
            Complex64::new(0.0, 1.0)
        }
    });
    session.open_fid(model, Box::new(fid), RegistryPolicy::default()).unwrap();
    session.registry_mut().put_text("D2", &["TDCOMB(dim=2,coef=ea)"]).unwrap();

    session.load_vectors(&[]).unwrap();
    let live = session.live_vectors();
    assert_eq!(live[0].data[0], Complex64::new(1.0, 1.0));
    assert_eq!(live[1].data[0], Complex64::new(-1.0, -1.0));
}

#[test]
fn test_vectors_along_indirect_dimension_split_components() {
    let mut session = paired_session("exp");
    assert_eq!(session.load_vectors_along(2, 3, &[0]).unwrap(), 2);
    assert_eq!(session.vector_dim(), 2);

    let live = session.live_vectors();
    assert_eq!(live[0].len(), 3);
    // Increment 1 reads records 2 and 3 at point 3.
    assert_eq!(live[0].data[1], Complex64::new(23.0, 33.0));
    assert_eq!(live[1].data[1], Complex64::new(123.0, 133.0));

    assert!(matches!(
        session.load_vectors_along(1, 0, &[0]),
        Err(NmrProcError::Configuration(_))
    ));
    assert!(matches!(
        session.load_vectors_along(2, 4, &[0]),
        Err(NmrProcError::Configuration(_))
    ));
}

#[test]
fn test_registry_follows_dataset_policy() {
    let mut session = paired_session("exp");
    session.registry_mut().put_text("D1", &["SCALE(factor=2)"]).unwrap();
    let reopen = |session: &mut ProcessingSession, dataset: &str, policy| {
        let model = AcquisitionModel::new(dataset, vec![4, 3], vec![true, true], vec![1, 2]).unwrap();
        session.open_fid(model, Box::new(coded_fid(6, 4)), policy).unwrap();
    };

    reopen(&mut session, "exp", RegistryPolicy::SameDatasetOnly);
    assert_eq!(session.registry().len(), 1);
    reopen(&mut session, "other", RegistryPolicy::Preserve);
    assert_eq!(session.registry().len(), 1);
    reopen(&mut session, "third", RegistryPolicy::SameDatasetOnly);
    assert!(session.registry().is_empty());
}

#[test]
fn test_read_error_keeps_previous_vectors() {
    let mut session = session_with(DispatchEngine::new());
    let model = AcquisitionModel::new("short", vec![8, 4], vec![true, true], vec![1, 1]).unwrap();
    session
        .open_fid(model, Box::new(coded_fid(2, 8)), RegistryPolicy::default())
        .unwrap();

    session.load_vectors(&[0]).unwrap();
    let before = session.live_vectors().to_vec();
    assert!(matches!(session.load_vectors(&[3]), Err(NmrProcError::Io(_))));
    assert_eq!(session.live_vectors(), before.as_slice());
}

#[test]
fn test_mismatched_record_length_is_rejected() {
    let mut session = session_with(DispatchEngine::new());
    let model = AcquisitionModel::new("bad", vec![16, 2], vec![true, true], vec![1, 1]).unwrap();
    let result = session.open_fid(model, Box::new(coded_fid(2, 8)), RegistryPolicy::default());
    assert!(matches!(result, Err(NmrProcError::Configuration(_))));
    assert!(session.model().is_none());
}
