//! Failure propagation of the in-process communication backend

mod common;

use std::time::Duration;

use common::quick_config;
use lu3d::prelude::*;

#[test]
fn test_mismatched_collective_aborts_every_group() {
    let results = run_ranks(4, &quick_config(), |world| {
        let pair = world.split(world.rank() / 2, world.rank())?;
        let outcome = if world.rank() < 2 {
            if pair.rank() == 0 {
                let mut v = [1.0];
                pair.broadcast_f64(&mut v, 0)
            } else {
                pair.barrier()
            }
        } else {
            // Never completes: ranks 0 and 1 do not join
            world.barrier()
        };
        Ok((outcome, world.abort_reason().is_some(), world.check_alive()))
    });
    for r in results {
        let (outcome, aborted, alive) = r.unwrap();
        assert!(matches!(outcome, Err(Error::CommunicationFailure { .. })));
        assert!(aborted);
        assert!(alive.is_err());
    }
}

#[test]
fn test_missing_member_times_out() {
    let config = LocalConfig::with_timeout(Duration::from_millis(100));
    let results = run_ranks(2, &config, |world| {
        if world.rank() == 0 {
            world.barrier()?;
        }
        world.check_alive()
    });
    assert!(matches!(
        results[0],
        Err(Error::CommunicationFailure { op: "barrier", .. })
    ));
}

#[test]
fn test_abort_reason_reaches_other_ranks() {
    let results = run_ranks(2, &quick_config(), |world| {
        if world.rank() == 1 {
            world.abort("bad input");
            return Ok(None);
        }
        let err = world.barrier().unwrap_err();
        Ok(Some(err.to_string()))
    });
    let message = results[0].as_ref().unwrap().clone().unwrap();
    assert!(message.contains("bad input"), "{message}");
    assert!(results[1].as_ref().unwrap().is_none());
}
