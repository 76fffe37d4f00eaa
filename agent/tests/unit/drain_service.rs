//! Unit tests for the `drain_job` loop.
//!
//! A non-negative answer waits that many seconds and finishes; a negative one
//! waits `|n|` seconds and asks again with status-check parameters.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use node_agent::application::services::drain::{DrainOutcome, drain_job};
use node_agent::domain::{ApplySpec, DrainParams, JobChange};

use crate::mocks::{RecordingSleeper, ScriptedDrain};

fn update_params() -> DrainParams {
    DrainParams::update(ApplySpec::default(), ApplySpec::default())
}

#[tokio::test]
async fn drain_job_skips_missing_script() {
    let mut script = ScriptedDrain::new(&[5]);
    script.exists = false;
    let sleeper = RecordingSleeper::default();

    let outcome = drain_job(&script, &update_params(), &sleeper).await.unwrap();

    assert_eq!(outcome, DrainOutcome::Skipped);
    assert!(script.seen().is_empty());
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn drain_job_waits_positive_answer_once() {
    let script = ScriptedDrain::new(&[7]);
    let sleeper = RecordingSleeper::default();

    let outcome = drain_job(&script, &update_params(), &sleeper).await.unwrap();

    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            waited: Duration::from_secs(7)
        }
    );
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(7)]);
}

#[tokio::test]
async fn drain_job_zero_answer_does_not_sleep() {
    let script = ScriptedDrain::new(&[0]);
    let sleeper = RecordingSleeper::default();

    let outcome = drain_job(&script, &update_params(), &sleeper).await.unwrap();

    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            waited: Duration::ZERO
        }
    );
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn drain_job_polls_status_while_negative() {
    let script = ScriptedDrain::new(&[-3, -2, 0]);
    let sleeper = RecordingSleeper::default();

    let outcome = drain_job(&script, &update_params(), &sleeper).await.unwrap();

    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            waited: Duration::from_secs(5)
        }
    );
    assert_eq!(
        script.seen(),
        vec![JobChange::New, JobChange::CheckStatus, JobChange::CheckStatus]
    );
}

#[tokio::test]
async fn drain_job_total_wait_saturates_instead_of_overflowing() {
    let script = ScriptedDrain::new(&[i64::MIN, i64::MIN, 0]);
    let sleeper = RecordingSleeper::default();

    let outcome = drain_job(&script, &update_params(), &sleeper).await.unwrap();

    assert_eq!(
        outcome,
        DrainOutcome::Drained {
            waited: Duration::MAX
        }
    );
    assert_eq!(sleeper.sleeps().len(), 2);
}

#[tokio::test]
async fn drain_job_propagates_script_error() {
    let script = ScriptedDrain::new(&[-1]);
    let sleeper = RecordingSleeper::default();

    let err = drain_job(&script, &update_params(), &sleeper)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "no more answers");
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(1)]);
}
