//! Integration test: drive the supervisor with a shell child that replays a
//! recorded solver transcript, and check what reaches the caller and the
//! store.
#![cfg(unix)]

use std::fs;
use std::time::Duration;

use flowshop_core::config::SolverConfig;
use flowshop_core::supervisor::{EndReason, JsonlSink, RunOutcome};
use flowshop_core::{Iteration, RunHandle, RunUpdate, Supervisor, SupervisorConfig};

const TRANSCRIPT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/neh_run.txt");

fn config(follow_after_end: bool) -> SupervisorConfig {
    SupervisorConfig {
        grace_period: Duration::from_millis(500),
        follow_after_end,
    }
}

fn sh(script: &str) -> [String; 2] {
    ["-c".to_string(), script.to_string()]
}

/// Everything the run sends, up to and including `Finished`.
fn collect(handle: &RunHandle) -> (Vec<RunUpdate>, RunOutcome) {
    let mut updates = Vec::new();
    loop {
        match handle.updates().recv_timeout(Duration::from_secs(10)) {
            Ok(RunUpdate::Finished(outcome)) => return (updates, outcome),
            Ok(update) => updates.push(update),
            Err(err) => panic!("run never finished: {err}"),
        }
    }
}

fn wait_for_layout(handle: &RunHandle) {
    loop {
        match handle.updates().recv_timeout(Duration::from_secs(10)) {
            Ok(RunUpdate::Layout(_)) => return,
            Ok(RunUpdate::Finished(outcome)) => panic!("run ended early: {outcome:?}"),
            Ok(_) => {}
            Err(err) => panic!("no layout arrived: {err}"),
        }
    }
}

#[test]
fn replayed_transcript_reaches_caller_and_store() {
    let mut supervisor = Supervisor::new(config(false));
    let handle = supervisor
        .start_run("sh", &sh(&format!("cat '{TRANSCRIPT}'")))
        .unwrap();
    let (updates, outcome) = collect(&handle);

    assert_eq!(outcome.reason, EndReason::Terminated);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.success());
    assert!(!handle.is_running());

    let kinds: Vec<&str> = updates
        .iter()
        .map(|u| match u {
            RunUpdate::Layout(_) => "layout",
            RunUpdate::Progress(_) => "progress",
            RunUpdate::Choice(_) => "choice",
            RunUpdate::Best(_) => "best",
            RunUpdate::Warning(_) => "warning",
            RunUpdate::DecodeFailed { .. } => "decode_failed",
            RunUpdate::Finished(_) => "finished",
        })
        .collect();
    assert_eq!(
        kinds,
        [
            "progress",
            "choice",
            "layout",
            "decode_failed",
            "layout",
            "layout",
            "warning",
            "best",
        ]
    );

    let layouts: Vec<_> = updates
        .iter()
        .filter_map(|u| match u {
            RunUpdate::Layout(model) => Some(model),
            _ => None,
        })
        .collect();

    // Frame 1: one bar, no setup.
    let first = layouts[0];
    assert_eq!(first.iteration, Some(Iteration::Step(1)));
    assert_eq!(first.rows.len(), 1);
    let bar = &first.rows[0].bars[0];
    assert_eq!((bar.job, bar.start, bar.end), (3, 0, 10));
    assert!(!bar.has_setup());

    // Frame 2: machine rows ascending, setup overlay only on job 5.
    let second = layouts[1];
    let machines: Vec<u32> = second.rows.iter().map(|r| r.machine).collect();
    assert_eq!(machines, [0, 1]);
    let row = second.row(1).unwrap();
    assert_eq!(row.bars.len(), 2);
    assert_eq!((row.bars[0].job, row.bars[0].setup_start), (5, Some(0)));
    assert_eq!(row.bars[0].start, 2);
    assert_eq!((row.bars[1].job, row.bars[1].setup_start), (7, None));
    assert_eq!(row.bars[0].end, row.bars[1].start);
    // Job 3 kept the color it got in frame 1.
    assert_eq!(first.colors.get(3), second.colors.get(3));
    assert_eq!(second.colors.get(3), Some(0));

    // Frame 7 ended before any slot arrived.
    assert!(layouts[2].is_empty());
    assert_eq!(layouts[2].iteration, Some(Iteration::Step(7)));

    match &updates[3] {
        RunUpdate::DecodeFailed { line, .. } => assert_eq!(line, "SLOT;iter=x;machine=1"),
        other => panic!("expected decode failure, got {other:?}"),
    }

    let best = handle.latest_best().unwrap();
    assert_eq!(best.cmax, 14.0);
    assert_eq!(best.sequence, [3, 5, 7]);
    assert_eq!(best.variant.as_deref(), Some("NEH"));

    // Nothing after END was read; the malformed line left no trace.
    let store = supervisor.store();
    assert_eq!(store.slot_count(), 4);
    assert!(store.snapshot(Iteration::Step(9)).is_empty());
    assert_eq!(store.last_complete(), Some(Iteration::Step(7)));
}

#[test]
fn follow_after_end_reads_until_eof() {
    let mut supervisor = Supervisor::new(config(true));
    let handle = supervisor
        .start_run("sh", &sh(&format!("cat '{TRANSCRIPT}'")))
        .unwrap();
    let (updates, outcome) = collect(&handle);

    assert_eq!(outcome.reason, EndReason::EndOfStream);
    let last_layout = updates
        .iter()
        .rev()
        .find_map(|u| match u {
            RunUpdate::Layout(model) => Some(model),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_layout.iteration, Some(Iteration::Step(9)));
    // Job 1 is new to this run.
    assert_eq!(last_layout.colors.get(1), Some(3));
    assert_eq!(supervisor.store().last_complete(), Some(Iteration::Step(9)));
}

#[test]
fn multi_phase_run_survives_first_end() {
    let mut supervisor = Supervisor::new(SolverConfig::default().supervisor());
    let handle = supervisor
        .start_run(
            "sh",
            &sh(concat!(
                "printf 'NEH_RESULT;perm=0,1;cmax=9\\nEND\\n'; sleep 1; ",
                "printf 'SLOT;iter=FINAL;machine=0;job=1;start=0;end=5\\n",
                "FRAME_END;iter=FINAL\\nSA_RESULT;perm=1,0;cmax=5\\n'"
            )),
        )
        .unwrap();
    let (updates, outcome) = collect(&handle);

    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.success());
    let final_frame = updates.iter().find_map(|u| match u {
        RunUpdate::Layout(model) if model.iteration == Some(Iteration::Final) => Some(model),
        _ => None,
    });
    assert_eq!(final_frame.unwrap().bar_count(), 1);
    assert_eq!(supervisor.store().last_complete(), Some(Iteration::Final));
    let best = handle.latest_best().unwrap();
    assert_eq!(best.variant.as_deref(), Some("SA"));
    assert_eq!(best.cmax, 5.0);
}

#[test]
fn stop_at_end_leaves_the_child_to_exit() {
    let mut supervisor = Supervisor::new(config(false));
    let handle = supervisor
        .start_run("sh", &sh("printf 'END\\n'; sleep 1; printf 'late\\n'"))
        .unwrap();
    let (updates, outcome) = collect(&handle);

    assert!(updates.is_empty());
    assert_eq!(outcome.reason, EndReason::Terminated);
    assert_eq!(outcome.exit_code, Some(0));
}

#[test]
fn nonzero_exit_marks_run_failed() {
    let mut supervisor = Supervisor::new(config(false));
    let handle = supervisor
        .start_run("sh", &sh("printf 'FRAME_END;iter=1\\n'; exit 3"))
        .unwrap();
    let (updates, outcome) = collect(&handle);

    assert_eq!(updates.len(), 1);
    assert_eq!(outcome.reason, EndReason::EndOfStream);
    assert_eq!(outcome.exit_code, Some(3));
    assert!(!outcome.success());
}

#[test]
fn stop_ends_a_stalled_run_and_keeps_the_store() {
    let mut supervisor = Supervisor::new(config(false));
    let handle = supervisor
        .start_run(
            "sh",
            &sh("printf 'SLOT;iter=1;machine=0;job=2;start=0;end=4\\nFRAME_END;iter=1\\n'; exec sleep 30"),
        )
        .unwrap();
    wait_for_layout(&handle);
    assert!(supervisor.is_running(&handle));

    supervisor.stop(&handle);
    let (_, outcome) = collect(&handle);
    assert_eq!(outcome.reason, EndReason::Stopped);
    assert_eq!(outcome.exit_code, None);
    assert!(!supervisor.is_running(&handle));
    assert_eq!(supervisor.store().slot_count(), 1);
}

#[test]
fn stop_drains_output_written_after_the_request() {
    let mut supervisor = Supervisor::new(SupervisorConfig {
        grace_period: Duration::from_secs(3),
        follow_after_end: true,
    });
    let handle = supervisor
        .start_run(
            "sh",
            &sh(concat!(
                "printf 'SLOT;iter=1;machine=0;job=2;start=0;end=4\\nFRAME_END;iter=1\\n'; ",
                "(sleep 1; printf 'SLOT;iter=2;machine=0;job=3;start=0;end=6\\nFRAME_END;iter=2\\n') & ",
                "exec sleep 30"
            )),
        )
        .unwrap();
    wait_for_layout(&handle);
    supervisor.stop(&handle);
    let (updates, outcome) = collect(&handle);

    assert_eq!(outcome.reason, EndReason::Stopped);
    assert!(updates.iter().any(|u| matches!(
        u,
        RunUpdate::Layout(model) if model.iteration == Some(Iteration::Step(2))
    )));
    let store = supervisor.store();
    assert_eq!(store.frame_count(), 2);
    assert_eq!(store.slot_count(), 2);
    assert_eq!(store.last_complete(), Some(Iteration::Step(2)));
}

#[test]
fn starting_a_new_run_replaces_the_old_one() {
    let mut supervisor = Supervisor::new(config(false));
    let first = supervisor
        .start_run(
            "sh",
            &sh("printf 'SLOT;iter=1;machine=0;job=8;start=0;end=4\\nFRAME_END;iter=1\\n'; exec sleep 30"),
        )
        .unwrap();
    wait_for_layout(&first);

    let second = supervisor
        .start_run(
            "sh",
            &sh("printf 'SLOT;iter=1;machine=2;job=4;start=0;end=6\\nFRAME_END;iter=1\\nEND\\n'"),
        )
        .unwrap();
    assert_ne!(first.id(), second.id());

    let (_, old) = collect(&first);
    assert_eq!(old.reason, EndReason::Stopped);

    let (updates, new) = collect(&second);
    assert_eq!(new.reason, EndReason::Terminated);
    let RunUpdate::Layout(model) = &updates[0] else {
        panic!("expected a layout, got {:?}", updates[0]);
    };
    // Colors restart with the run.
    assert_eq!(model.colors.get(4), Some(0));
    assert_eq!(model.colors.get(8), None);
    assert_eq!(supervisor.store().slot_count(), 1);
}

#[test]
fn transcript_sink_records_every_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");
    let file = fs::File::create(&path).unwrap();

    let mut supervisor = Supervisor::new(config(false));
    let handle = supervisor
        .start_run_with_sink(
            "sh",
            &sh("printf 'hello\\nSLOT;iter=1;machine=z\\nEND\\n'; printf 'oops\\n' >&2"),
            Box::new(JsonlSink::new(file)),
        )
        .unwrap();
    let (_, outcome) = collect(&handle);
    assert_eq!(outcome.reason, EndReason::Terminated);

    let text = fs::read_to_string(&path).unwrap();
    let rows: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let stdout: Vec<&serde_json::Value> =
        rows.iter().filter(|r| r["stream"] == "stdout").collect();
    assert_eq!(stdout[0]["text"], "hello");
    assert_eq!(stdout[0]["kind"], "raw_log");
    assert_eq!(stdout[1]["status"], "failed");
    assert_eq!(stdout[2]["kind"], "terminate");
    for (seq, row) in rows.iter().enumerate() {
        assert_eq!(row["seq"], seq as u64);
    }
}
