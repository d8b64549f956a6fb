//! # Medcamp Core
//!
//! The abstractions every medcamp aggregate is written against.
//!
//! A feature is described by four pieces:
//!
//! - **State**: owned, cloneable domain data (camps, registrations, feedback)
//! - **Action**: every input the feature accepts, commands and the events they produce
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`, synchronous and deterministic
//! - **Effect**: a description of fire-and-forget work for the runtime to perform afterwards
//!
//! Reducers never perform I/O. Anything that touches the outside world (publishing
//! an event, recording a metric) is returned as an [`effect::Effect`] and executed
//! by the runtime once the state change is committed.
//!
//! ## Example
//!
//! ```ignore
//! use medcamp_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for CampReducer {
//!     type State = CampState;
//!     type Action = CampAction;
//!     type Environment = CampEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CampState,
//!         action: CampAction,
//!         env: &CampEnvironment,
//!     ) -> SmallVec<[Effect; 4]> {
//!         match action {
//!             CampAction::Open { camp_id } => {
//!                 state.open(camp_id, env.clock.now());
//!                 smallvec![Effect::None]
//!             }
//!         }
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the trait all business logic implements
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// A reducer validates an action against the current state, mutates the
    /// state in place, and describes follow-up work as effects. It must not
    /// block, sleep or perform I/O; the runtime holds a write lock for the
    /// whole call.
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Most actions produce zero or one effect, so the result is stored
        /// inline for up to four effects.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect; 4]>;
    }
}

/// Effect module - side effect descriptions
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed by the reducer. They are values returned from
    /// [`Reducer::reduce`](super::reducer::Reducer::reduce) and run by the
    /// store after the state change has been committed. An effect never feeds
    /// an action back into the store; everything a command decides is in the
    /// state it leaves behind.
    pub enum Effect {
        /// No-op effect
        None,

        /// Fire-and-forget async work (recording metrics, notifying a sink)
        Future(Pin<Box<dyn Future<Output = ()> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl std::fmt::Debug for Effect {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl Effect {
        /// Wrap a future to run once the state change is committed
        #[must_use]
        pub fn fire_and_forget<F>(future: F) -> Self
        where
            F: Future<Output = ()> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }

        /// Whether this effect does nothing at all
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Environment module - dependency injection traits
///
/// Everything a reducer needs from outside its state is reached through a
/// trait object in its environment, so tests can substitute fixed values.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time for production use
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
