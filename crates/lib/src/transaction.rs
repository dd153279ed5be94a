//! Try / compensate / continue.
//!
//! [`try_with`] runs an action, then a continuation over its result. When the
//! continuation fails, or panics, the compensation undoes the action before
//! the failure is returned. Scopes nest: a failure in an inner continuation
//! unwinds every enclosing scope, innermost first.
//!
//! A failing compensation replaces the original error.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

/// Run `action`, then `continuation` over its result.
///
/// - `action` fails: its error is returned and nothing is compensated.
/// - `continuation` fails: `compensation` runs, then the continuation's error
///   is returned, or the compensation's error if it also fails.
/// - `continuation` panics: `compensation` runs, then the panic resumes.
pub fn try_with<A, B, E>(
  action: impl FnOnce() -> Result<A, E>,
  compensation: impl FnOnce(A) -> Result<(), E>,
  continuation: impl FnOnce(&A) -> Result<B, E>,
) -> Result<B, E> {
  let effect = action()?;

  match panic::catch_unwind(AssertUnwindSafe(|| continuation(&effect))) {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(error)) => match compensation(effect) {
      Ok(()) => Err(error),
      Err(masking) => {
        warn!("compensation failed; its error replaces the original failure");
        Err(masking)
      }
    },
    Err(payload) => {
      if compensation(effect).is_err() {
        warn!("compensation failed while unwinding a panic");
      }
      panic::resume_unwind(payload)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::{Cell, RefCell};

  #[derive(Debug, PartialEq)]
  enum Failure {
    Action,
    Continuation,
    Compensation,
  }

  #[test]
  fn failed_continuation_restores_state() {
    let state = Cell::new(1);
    let result: Result<(), Failure> = try_with(
      || {
        let before = state.get();
        state.set(2);
        Ok(before)
      },
      |before| {
        state.set(before);
        Ok(())
      },
      |_| Err(Failure::Continuation),
    );
    assert_eq!(result, Err(Failure::Continuation));
    assert_eq!(state.get(), 1);
  }

  #[test]
  fn failed_action_compensates_nothing() {
    let compensated = Cell::new(false);
    let result: Result<(), Failure> = try_with(
      || Err::<(), _>(Failure::Action),
      |_| {
        compensated.set(true);
        Ok(())
      },
      |_| Ok(()),
    );
    assert_eq!(result, Err(Failure::Action));
    assert!(!compensated.get());
  }

  #[test]
  fn success_never_compensates() {
    let compensated = Cell::new(false);
    let result = try_with(
      || Ok::<_, Failure>(20),
      |_| {
        compensated.set(true);
        Ok(())
      },
      |value| Ok(value + 1),
    );
    assert_eq!(result, Ok(21));
    assert!(!compensated.get());
  }

  #[test]
  fn compensation_error_masks_original() {
    let result: Result<(), Failure> = try_with(
      || Ok(()),
      |_| Err(Failure::Compensation),
      |_| Err(Failure::Continuation),
    );
    assert_eq!(result, Err(Failure::Compensation));
  }

  #[test]
  fn nested_scopes_unwind_innermost_first() {
    let log = RefCell::new(Vec::new());
    let result: Result<(), Failure> = try_with(
      || Ok("outer"),
      |name| {
        log.borrow_mut().push(name);
        Ok(())
      },
      |_| {
        try_with(
          || Ok("inner"),
          |name| {
            log.borrow_mut().push(name);
            Ok(())
          },
          |_| Err(Failure::Continuation),
        )
      },
    );
    assert_eq!(result, Err(Failure::Continuation));
    assert_eq!(*log.borrow(), vec!["inner", "outer"]);
  }

  #[test]
  fn panicking_continuation_still_compensates() {
    let state = Cell::new(0);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
      let _: Result<(), Failure> = try_with(
        || {
          state.set(5);
          Ok(())
        },
        |_| {
          state.set(0);
          Ok(())
        },
        |_| panic!("boom"),
      );
    }));
    assert!(outcome.is_err());
    assert_eq!(state.get(), 0);
  }
}
