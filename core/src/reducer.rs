//! The reducer abstraction.
//!
//! Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
//! They validate the action, update state in place and return descriptions
//! of side effects. The runtime executes the effects and feeds the resulting
//! actions back in.

use smallvec::SmallVec;

/// Effects returned from a single reduction. Most actions produce zero to
/// three effects, so they stay on the stack.
pub type Effects<E> = SmallVec<[E; 4]>;

/// Core abstraction for business logic.
///
/// # Example
///
/// ```
/// use booking_core::reducer::{Effects, Reducer};
/// use booking_core::smallvec;
///
/// struct Counter;
///
/// impl Reducer for Counter {
///     type State = i32;
///     type Action = i32;
///     type Effect = String;
///     type Environment = ();
///
///     fn reduce(&self, state: &mut i32, action: i32, _env: &()) -> Effects<String> {
///         *state += action;
///         smallvec![format!("now {state}")]
///     }
/// }
///
/// let mut state = 1;
/// let effects = Counter.reduce(&mut state, 2, &());
/// assert_eq!(state, 3);
/// assert_eq!(effects[0], "now 3");
/// ```
pub trait Reducer {
    /// The state type this reducer operates on
    type State;

    /// The action type this reducer processes
    type Action;

    /// Side effect descriptions this reducer emits
    type Effect;

    /// The environment type with injected dependencies
    type Environment;

    /// Reduce an action into state changes and effects.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Effect>;
}
