//! Workflow definition as an explicit finite-state machine.
//!
//! `START → BATCH_0 → … → BATCH_{N-1} → END`, and every `BATCH_i` has a
//! failure edge to `ERROR`. The definition is data: the driver in
//! [`crate::executor`] interprets it and never hard-codes the sequence.

use serde::Serialize;

use crate::models::Batch;

/// A state of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum State {
    /// Publish "run started".
    Start,
    /// Invoke the worker for the batch with this index.
    Batch(usize),
    /// Publish "run finished"; terminal, success.
    End,
    /// Publish the failure cause; terminal, failure.
    Error,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::End | Self::Error)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Batch(i) => write!(f, "BATCH_{i}"),
            Self::End => write!(f, "END"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of executing a non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Succeeded,
    /// Caught by the state's `on_error` edge.
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "success"),
            Self::Failed => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: State,
    pub on: Outcome,
    pub to: State,
}

/// The states and transition table of one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateMachineDefinition {
    name: String,
    batches: Vec<Batch>,
    transitions: Vec<Transition>,
}

impl StateMachineDefinition {
    /// Chain `batches` in order between START and END.
    ///
    /// The batch sequence is fixed here; a run can never reorder it.
    pub fn sequential(name: impl Into<String>, batches: Vec<Batch>) -> Self {
        let mut transitions = Vec::with_capacity(batches.len() * 2 + 1);
        let first = if batches.is_empty() { State::End } else { State::Batch(0) };
        transitions.push(Transition { from: State::Start, on: Outcome::Succeeded, to: first });

        for i in 0..batches.len() {
            let next = if i + 1 < batches.len() { State::Batch(i + 1) } else { State::End };
            transitions.push(Transition { from: State::Batch(i), on: Outcome::Succeeded, to: next });
            transitions.push(Transition { from: State::Batch(i), on: Outcome::Failed, to: State::Error });
        }

        Self { name: name.into(), batches, transitions }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial(&self) -> State {
        State::Start
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, index: usize) -> Option<&Batch> {
        self.batches.get(index)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Where `from` leads on `outcome`, if anywhere.
    pub fn next(&self, from: State, outcome: Outcome) -> Option<State> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.on == outcome)
            .map(|t| t.to)
    }

    /// All states in definition order.
    pub fn states(&self) -> Vec<State> {
        std::iter::once(State::Start)
            .chain((0..self.batches.len()).map(State::Batch))
            .chain([State::End, State::Error])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batches(n: usize) -> Vec<Batch> {
        (0..n).map(|index| Batch { index, schools: vec![format!("S{index}")] }).collect()
    }

    #[test]
    fn success_path_walks_batches_in_order() {
        let def = StateMachineDefinition::sequential("syllabus-scraper", batches(3));
        let mut state = def.initial();
        let mut path = vec![state];
        while !state.is_terminal() {
            state = def.next(state, Outcome::Succeeded).expect("success edge");
            path.push(state);
        }
        assert_eq!(
            path,
            vec![State::Start, State::Batch(0), State::Batch(1), State::Batch(2), State::End]
        );
    }

    #[test]
    fn every_batch_fails_into_error() {
        let def = StateMachineDefinition::sequential("syllabus-scraper", batches(9));
        for i in 0..9 {
            assert_eq!(def.next(State::Batch(i), Outcome::Failed), Some(State::Error));
        }
        assert_eq!(def.next(State::Start, Outcome::Failed), None);
        assert_eq!(def.next(State::End, Outcome::Succeeded), None);
        assert_eq!(def.next(State::Error, Outcome::Succeeded), None);
    }

    #[test]
    fn no_batches_goes_straight_to_end() {
        let def = StateMachineDefinition::sequential("empty", Vec::new());
        assert_eq!(def.next(State::Start, Outcome::Succeeded), Some(State::End));
        assert_eq!(def.states(), vec![State::Start, State::End, State::Error]);
    }

    #[test]
    fn states_render_like_the_diagram() {
        let names: Vec<String> = StateMachineDefinition::sequential("x", batches(2))
            .states()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["START", "BATCH_0", "BATCH_1", "END", "ERROR"]);
    }
}
