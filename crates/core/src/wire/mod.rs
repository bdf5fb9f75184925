//! The solver's line protocol.
//!
//! ```text
//! NEH_PROGRESS;iter=<int>;percent=<float>;cmax=<float>;delta=<float>;seq=<int,...>
//! NEH_CHOICE;iter=<int>;job=<int>;best_pos=<int>;cmax_after=<float>
//! SLOT;iter=<int>;machine=<int>;prev=<int>;job=<int>;setup=<float>;start=<float>;end=<float>
//! FRAME_END;iter=<int>
//! <TAG>_RESULT;perm=<int,...>;cmax=<float>
//! ERROR;<free text>
//! END
//! ```
//!
//! `iter` may also be `FINAL`. Anything else is opaque log text.

mod encode;
mod fields;

pub use encode::encode;

use thiserror::Error;

use crate::model::{Choice, Progress, Slot, SlotError, SolverEvent, SolverResult};
use fields::Fields;

pub const TAG_PROGRESS: &str = "NEH_PROGRESS";
pub const TAG_CHOICE: &str = "NEH_CHOICE";
pub const TAG_SLOT: &str = "SLOT";
pub const TAG_FRAME_END: &str = "FRAME_END";
pub const TAG_ERROR: &str = "ERROR";
pub const RESULT_SUFFIX: &str = "_RESULT";
pub const END_SENTINEL: &str = "END";

/// A line carried a known tag but its fields did not parse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("{tag}: missing field `{key}`")]
    MissingField {
        tag: &'static str,
        key: &'static str,
    },
    #[error("{tag}: field `{key}` is not a valid integer: {value:?}")]
    InvalidInteger {
        tag: &'static str,
        key: &'static str,
        value: String,
    },
    #[error("{tag}: field `{key}` is not a finite number: {value:?}")]
    InvalidReal {
        tag: &'static str,
        key: &'static str,
        value: String,
    },
    #[error("{tag}: field `{key}` is not a list of job ids: {value:?}")]
    InvalidList {
        tag: &'static str,
        key: &'static str,
        value: String,
    },
    #[error("SLOT: {0}")]
    InvalidSlot(#[from] SlotError),
}

/// Decode one line of solver output.
///
/// Blank and unrecognized lines become [`SolverEvent::RawLog`]; `END`
/// becomes [`SolverEvent::Terminate`]. Only a known tag with a malformed
/// field produces an error, and that error concerns this line alone.
pub fn decode(line: &str) -> Result<SolverEvent, DecodeError> {
    let text = line.trim_end_matches(['\r', '\n']);
    let trimmed = text.trim();

    if trimmed == END_SENTINEL {
        return Ok(SolverEvent::Terminate);
    }

    let Some((tag, rest)) = trimmed.split_once(';') else {
        return Ok(raw(text));
    };

    match tag {
        TAG_PROGRESS => decode_progress(rest),
        TAG_CHOICE => decode_choice(rest),
        TAG_SLOT => decode_slot(rest),
        TAG_FRAME_END => {
            let fields = Fields::parse(TAG_FRAME_END, rest);
            Ok(SolverEvent::FrameEnd {
                iteration: fields.iteration()?,
            })
        }
        TAG_ERROR => Ok(SolverEvent::ErrorNotice {
            message: rest.to_string(),
        }),
        _ => match tag.strip_suffix(RESULT_SUFFIX) {
            Some(variant) if !variant.is_empty() => decode_result(variant, rest),
            _ => Ok(raw(text)),
        },
    }
}

fn raw(text: &str) -> SolverEvent {
    SolverEvent::RawLog {
        text: text.to_string(),
    }
}

fn decode_progress(rest: &str) -> Result<SolverEvent, DecodeError> {
    let f = Fields::parse(TAG_PROGRESS, rest);
    Ok(SolverEvent::Progress(Progress {
        iteration: f.iteration()?,
        percent: f.real_or("percent", 0.0)?,
        cmax: f.real_or("cmax", 0.0)?,
        delta: f.real_or("delta", 0.0)?,
        sequence: f.list("seq")?,
    }))
}

fn decode_choice(rest: &str) -> Result<SolverEvent, DecodeError> {
    let f = Fields::parse(TAG_CHOICE, rest);
    Ok(SolverEvent::Choice(Choice {
        iteration: f.iteration()?,
        job: f.id("job")?,
        best_position: f.id_or("best_pos", 0)?,
        cmax_after: f.real_or("cmax_after", 0.0)?,
    }))
}

fn decode_slot(rest: &str) -> Result<SolverEvent, DecodeError> {
    let f = Fields::parse(TAG_SLOT, rest);
    let slot = Slot::new(
        f.iteration()?,
        f.id("machine")?,
        f.optional_job("prev")?,
        f.id("job")?,
        f.time_or("setup", 0)?,
        f.time("start")?,
        f.time("end")?,
    )?;
    Ok(SolverEvent::Slot(slot))
}

fn decode_result(variant: &str, rest: &str) -> Result<SolverEvent, DecodeError> {
    let f = Fields::parse(RESULT_SUFFIX, rest);
    Ok(SolverEvent::Result(SolverResult {
        variant: variant.to_string(),
        cmax: f.real("cmax")?,
        permutation: f.list("perm")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Iteration;

    fn slot(line: &str) -> Slot {
        match decode(line) {
            Ok(SolverEvent::Slot(s)) => s,
            other => panic!("expected slot, got {other:?}"),
        }
    }

    #[test]
    fn decodes_slot_line() {
        let s = slot("SLOT;iter=1;machine=0;prev=-1;job=3;setup=0;start=0;end=10");
        assert_eq!(s.iteration, Iteration::Step(1));
        assert_eq!(s.machine, 0);
        assert_eq!(s.previous_job, None);
        assert_eq!(s.job, 3);
        assert_eq!((s.setup, s.start, s.end), (0, 0, 10));
    }

    #[test]
    fn truncates_fractional_times() {
        let s = slot("SLOT;iter=2;machine=1;prev=4;job=5;setup=2.9;start=3.7;end=8.2");
        assert_eq!(s.previous_job, Some(4));
        assert_eq!((s.setup, s.start, s.end), (2, 3, 8));
    }

    #[test]
    fn slot_defaults_prev_setup_and_iter() {
        // The final-schedule dump writes an empty segment where `iter` goes.
        let s = slot("SLOT;;machine=2;job=7;start=4;end=9");
        assert_eq!(s.iteration, Iteration::Step(0));
        assert_eq!(s.previous_job, None);
        assert_eq!(s.setup, 0);
    }

    #[test]
    fn accepts_final_iteration() {
        let s = slot("SLOT;iter=FINAL;machine=0;prev=-1;job=1;setup=0;start=0;end=5");
        assert_eq!(s.iteration, Iteration::Final);
        assert_eq!(
            decode("FRAME_END;iter=FINAL"),
            Ok(SolverEvent::FrameEnd {
                iteration: Iteration::Final
            })
        );
    }

    #[test]
    fn malformed_slot_is_a_line_local_failure() {
        let err = decode("SLOT;iter=x;machine=1").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidInteger { key: "iter", .. }));
    }

    #[test]
    fn slot_missing_required_field() {
        let err = decode("SLOT;iter=1;machine=1;job=2;start=0").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                tag: TAG_SLOT,
                key: "end"
            }
        );
    }

    #[test]
    fn slot_geometry_is_checked() {
        let err = decode("SLOT;iter=1;machine=0;job=2;setup=0;start=9;end=3").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSlot(_)));
    }

    #[test]
    fn extreme_times_fail_the_line() {
        let err = decode("SLOT;iter=1;machine=0;job=1;setup=1e300;start=-1e300;end=0").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidSlot(SlotError::TimeOverflow { .. })
        ));
        let err = decode("SLOT;iter=1;machine=0;job=1;start=-1e300;end=1e300").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidSlot(SlotError::TimeOverflow { .. })
        ));
    }

    #[test]
    fn non_finite_reals_are_rejected() {
        let err = decode("SLOT;iter=1;machine=0;job=2;start=NaN;end=3").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidReal { key: "start", .. }));
    }

    #[test]
    fn decodes_progress_with_sequence() {
        let event = decode("NEH_PROGRESS;iter=3;percent=30.0;cmax=412;delta=-7;seq=4,0,2").unwrap();
        let SolverEvent::Progress(p) = event else {
            panic!("expected progress");
        };
        assert_eq!(p.iteration, Iteration::Step(3));
        assert_eq!(p.percent, 30.0);
        assert_eq!(p.cmax, 412.0);
        assert_eq!(p.delta, -7.0);
        assert_eq!(p.sequence, vec![4, 0, 2]);
    }

    #[test]
    fn empty_sequence_is_not_an_error() {
        let SolverEvent::Progress(p) = decode("NEH_PROGRESS;iter=0;cmax=0;seq=").unwrap() else {
            panic!("expected progress");
        };
        assert!(p.sequence.is_empty());
    }

    #[test]
    fn bad_sequence_item_fails() {
        let err = decode("NEH_PROGRESS;iter=0;seq=1,x,3").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidList { key: "seq", .. }));
    }

    #[test]
    fn decodes_choice() {
        let event = decode("NEH_CHOICE;iter=2;job=6;best_pos=1;cmax_after=99.5").unwrap();
        assert_eq!(
            event,
            SolverEvent::Choice(Choice {
                iteration: Iteration::Step(2),
                job: 6,
                best_position: 1,
                cmax_after: 99.5,
            })
        );
    }

    #[test]
    fn decodes_any_result_tag() {
        for (line, variant) in [
            ("NEH_RESULT;perm=2,0,1;cmax=123", "NEH"),
            ("SA_RESULT;perm=1,2,0;cmax=118", "SA"),
            ("ASA_RESULT;perm=;cmax=118", "ASA"),
        ] {
            let SolverEvent::Result(r) = decode(line).unwrap() else {
                panic!("expected result for {line}");
            };
            assert_eq!(r.variant, variant);
        }
    }

    #[test]
    fn result_requires_cmax() {
        assert!(decode("NEH_RESULT;perm=1,2").is_err());
    }

    #[test]
    fn error_keeps_free_text_verbatim() {
        assert_eq!(
            decode("ERROR;cannot open file; check path\r\n"),
            Ok(SolverEvent::ErrorNotice {
                message: "cannot open file; check path".into()
            })
        );
    }

    #[test]
    fn end_sentinel_terminates() {
        assert_eq!(decode("END"), Ok(SolverEvent::Terminate));
        assert_eq!(decode("END\n"), Ok(SolverEvent::Terminate));
    }

    #[test]
    fn unknown_and_blank_lines_are_raw_log() {
        assert_eq!(
            decode("garbage not a protocol line"),
            Ok(SolverEvent::RawLog {
                text: "garbage not a protocol line".into()
            })
        );
        assert_eq!(decode(""), Ok(SolverEvent::RawLog { text: String::new() }));
        assert!(matches!(
            decode("=== Phase: NEH ==="),
            Ok(SolverEvent::RawLog { .. })
        ));
        // A bare tag without fields is not protocol either.
        assert!(matches!(decode("FRAME_END"), Ok(SolverEvent::RawLog { .. })));
        assert!(matches!(decode("_RESULT;cmax=1"), Ok(SolverEvent::RawLog { .. })));
    }

    #[test]
    fn slot_line_roundtrips_through_encoder() {
        let line = "SLOT;iter=4;machine=1;prev=5;job=7;setup=3;start=11;end=20";
        let event = decode(line).unwrap();
        assert_eq!(encode(&event), line);
        assert_eq!(decode(&encode(&event)), Ok(event));
    }
}
