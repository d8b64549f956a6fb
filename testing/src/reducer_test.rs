//! Ergonomic testing utilities for reducers
//!
//! A fluent Given-When-Then API: seed a state, feed it one or more actions,
//! then assert on the final state and the effects of the last action.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use medcamp_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion = Box<dyn FnOnce(&[Effect])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use medcamp_testing::ReducerTest;
///
/// ReducerTest::new(RegistryReducer::new())
///     .with_env(test_environment())
///     .given_state(state_with_camp(camp_id))
///     .when_actions([join(alice), join(bob)])
///     .then_state(move |state| {
///         assert_eq!(state.catalog.get(&camp_id).unwrap().participant_count, 2);
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to reduce (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add several actions, reduced in order (When)
    #[must_use]
    pub fn when_actions(mut self, actions: impl IntoIterator<Item = A>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Add an assertion about the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use medcamp_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if any effect does real work.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects(effects: &[Effect]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count(effects: &[Effect], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect(effects: &[Effect]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcamp_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

    #[derive(Clone, Debug)]
    struct SeatState {
        taken: u32,
    }

    #[derive(Clone, Debug)]
    enum SeatAction {
        Take,
        Release,
        Announce,
    }

    struct SeatReducer;

    struct NoEnv;

    impl Reducer for SeatReducer {
        type State = SeatState;
        type Action = SeatAction;
        type Environment = NoEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect; 4]> {
            match action {
                SeatAction::Take => {
                    state.taken += 1;
                    smallvec![Effect::None]
                },
                SeatAction::Release => {
                    state.taken = state.taken.saturating_sub(1);
                    SmallVec::new()
                },
                SeatAction::Announce => smallvec![Effect::fire_and_forget(async {})],
            }
        }
    }

    #[test]
    fn test_single_action() {
        ReducerTest::new(SeatReducer)
            .with_env(NoEnv)
            .given_state(SeatState { taken: 0 })
            .when_action(SeatAction::Take)
            .then_state(|state| assert_eq!(state.taken, 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_action_sequence_keeps_last_effects() {
        ReducerTest::new(SeatReducer)
            .with_env(NoEnv)
            .given_state(SeatState { taken: 0 })
            .when_actions([SeatAction::Take, SeatAction::Take, SeatAction::Announce])
            .then_state(|state| assert_eq!(state.taken, 2))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_release_clamps_at_zero() {
        ReducerTest::new(SeatReducer)
            .with_env(NoEnv)
            .given_state(SeatState { taken: 0 })
            .when_action(SeatAction::Release)
            .then_state(|state| assert_eq!(state.taken, 0))
            .then_effects(|effects| assertions::assert_effects_count(effects, 0))
            .run();
    }
}
