//! Runs every registered validator against the pending read state and
//! aggregates failures.

use cadence_core::{CadenceError, CadenceResult, ReadEngine, ReadState, Validator};
use std::sync::Arc;

/// Runs a fixed set of validators, always to completion, and raises
/// [`CadenceError::ValidationFailed`] with every failure if any occurred.
pub struct ValidatorRunner<R: ReadEngine> {
    validators: Vec<Arc<dyn Validator<R>>>,
}

impl<R: ReadEngine> ValidatorRunner<R> {
    /// Build a runner over the given validators, run in registration order.
    pub fn new(validators: Vec<Arc<dyn Validator<R>>>) -> Self {
        ValidatorRunner { validators }
    }

    /// Run every validator against `state`. All validators run even after
    /// one fails. Returns `Ok(())` if none failed, otherwise
    /// `Err(ValidationFailed)` carrying every failure in encounter order.
    pub fn run(&self, state: &ReadState<R>) -> CadenceResult<()> {
        let mut failures = Vec::new();
        for validator in &self.validators {
            if let Err(e) = validator.validate(state) {
                failures.push(format!("{}: {e}", validator.name()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CadenceError::ValidationFailed { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_state::MemoryReadEngine;

    struct AlwaysFails(&'static str);
    impl Validator<MemoryReadEngine> for AlwaysFails {
        fn validate(&self, _state: &ReadState<MemoryReadEngine>) -> CadenceResult<()> {
            Err(CadenceError::Populator("rejected".into()))
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    struct AlwaysPasses;
    impl Validator<MemoryReadEngine> for AlwaysPasses {
        fn validate(&self, _state: &ReadState<MemoryReadEngine>) -> CadenceResult<()> {
            Ok(())
        }
    }

    #[test]
    fn all_validators_run_even_after_one_fails() {
        let runner: ValidatorRunner<MemoryReadEngine> = ValidatorRunner::new(vec![
            Arc::new(AlwaysFails("first")),
            Arc::new(AlwaysPasses),
            Arc::new(AlwaysFails("third")),
        ]);
        let state = ReadState::new(cadence_core::Version(1), MemoryReadEngine::default());
        let result = runner.run(&state);
        match result {
            Err(CadenceError::ValidationFailed { failures }) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("first"));
                assert!(failures[1].starts_with("third"));
            }
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn no_validators_is_success() {
        let runner: ValidatorRunner<MemoryReadEngine> = ValidatorRunner::new(vec![]);
        let state = ReadState::new(cadence_core::Version(1), MemoryReadEngine::default());
        assert!(runner.run(&state).is_ok());
    }
}
