//! Application lifecycle state machine.
//!
//! A machine is a directed graph of [`State`] nodes joined by
//! predicate-guarded transitions. Driving it with [`StateMachine::cycle`]
//! evaluates the current state's outgoing edges strictly in declaration
//! order and follows the first whose predicate holds; a state's `enter`
//! hook can return [`StateOutcome::Continue`] to chain zero-duration
//! transitions without handing control back to the caller.
//!
//! States are compared by identity, never by name: two states built with
//! the same name are distinct nodes. Stepping methods take `&mut self`, so
//! serializing concurrent access is the caller's responsibility.

use crate::container::Container;
use crate::error::{BoxError, Error};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// What the machine should do after a state's `enter` hook completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOutcome {
    /// Immediately re-evaluate outgoing transitions from this state.
    Continue,
    /// Return control to the caller; advance again on the next `cycle()`.
    Suspend,
}

/// Behavior attached to a state node.
///
/// `enter` receives the dependency [`Container`] so a state can request its
/// collaborators (a database controller, a router) without owning them.
#[async_trait]
pub trait StateBehavior: Send + Sync {
    async fn enter(&self, cx: &Container) -> Result<StateOutcome, BoxError>;

    async fn exit(&self, _cx: &Container) -> Result<(), BoxError> {
        Ok(())
    }
}

struct StateInner {
    name: OnceLock<String>,
    behavior: Option<Arc<dyn StateBehavior>>,
}

/// A node in the lifecycle graph.
///
/// Cheaply clonable; all clones refer to the same node. Marker states
/// (initial, stopped) carry no behavior.
#[derive(Clone)]
pub struct State(Arc<StateInner>);

impl State {
    /// A state with behavior and no name yet; the name binds lazily.
    pub fn new(behavior: impl StateBehavior + 'static) -> Self {
        Self(Arc::new(StateInner {
            name: OnceLock::new(),
            behavior: Some(Arc::new(behavior)),
        }))
    }

    /// A named state with behavior.
    pub fn named(name: impl Into<String>, behavior: impl StateBehavior + 'static) -> Self {
        let state = Self::new(behavior);
        state.bind_name(name);
        state
    }

    /// A behaviorless marker state.
    pub fn marker(name: impl Into<String>) -> Self {
        let state = Self(Arc::new(StateInner {
            name: OnceLock::new(),
            behavior: None,
        }));
        state.bind_name(name);
        state
    }

    /// Bind the human-readable name. First binding wins; later calls are
    /// ignored so a name acquired on first use stays stable.
    pub fn bind_name(&self, name: impl Into<String>) {
        let _ = self.0.name.set(name.into());
    }

    pub fn name(&self) -> &str {
        self.0.name.get().map(String::as_str).unwrap_or("<unnamed>")
    }

    fn behavior(&self) -> Option<Arc<dyn StateBehavior>> {
        self.0.behavior.clone()
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.key().hash(hasher);
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("State").field(&self.name()).finish()
    }
}

/// An async, no-argument transition guard.
pub type Predicate = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Wrap an async closure as a [`Predicate`].
pub fn predicate<F, Fut>(f: F) -> Predicate
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// A predicate that always holds.
pub fn always() -> Predicate {
    predicate(|| async { true })
}

/// Collects states and transitions, then validates the graph.
#[derive(Default)]
pub struct StateMachineBuilder {
    first: Option<State>,
    transitions: Vec<(State, State, Predicate)>,
}

impl StateMachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state entered by the synthesized initial transition.
    pub fn start_at(mut self, state: &State) -> Self {
        self.first = Some(state.clone());
        self
    }

    /// Declare a guarded edge. Outgoing edges of a state are evaluated in
    /// the order they were declared here.
    pub fn transition(mut self, from: &State, to: &State, when: Predicate) -> Self {
        self.transitions.push((from.clone(), to.clone(), when));
        self
    }

    /// Build the machine, rejecting duplicate `(from, to)` edges and a
    /// missing starting state. These are configuration errors: they abort
    /// startup rather than surfacing later.
    pub fn build(self) -> Result<StateMachine, Error> {
        let first = self
            .first
            .ok_or_else(|| Error::Config("state machine has no starting state".into()))?;

        let mut edges: HashMap<State, Vec<(State, Predicate)>> = HashMap::new();
        let mut unnamed = 0usize;
        for (from, to, when) in self.transitions {
            for state in [&from, &to] {
                if state.0.name.get().is_none() {
                    unnamed += 1;
                    state.bind_name(format!("state-{unnamed}"));
                }
            }
            let outgoing = edges.entry(from.clone()).or_default();
            if outgoing.iter().any(|(existing, _)| existing == &to) {
                return Err(Error::Config(format!(
                    "duplicate transition {} -> {}",
                    from.name(),
                    to.name()
                )));
            }
            outgoing.push((to, when));
        }

        let initial = State::marker("initial");
        let current = initial.clone();
        Ok(StateMachine {
            initial,
            stopped: State::marker("stopped"),
            first,
            edges,
            current,
            started: false,
        })
    }
}

/// The lifecycle machine: always in exactly one state.
pub struct StateMachine {
    #[allow(dead_code)]
    initial: State,
    stopped: State,
    first: State,
    edges: HashMap<State, Vec<(State, Predicate)>>,
    current: State,
    started: bool,
}

impl StateMachine {
    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::new()
    }

    pub fn current(&self) -> &State {
        &self.current
    }

    /// Whether the machine has reached its terminal marker.
    pub fn is_stopped(&self) -> bool {
        self.current == self.stopped
    }

    /// Advance the machine until a state suspends or no edge matches.
    ///
    /// A machine that has not started first takes the synthesized
    /// always-true transition into its declared first state. Cycling a
    /// stopped machine is a no-op.
    pub async fn cycle(&mut self, cx: &Container) -> Result<&State, Error> {
        if self.is_stopped() {
            trace!("cycle() on a stopped machine is a no-op");
            return Ok(&self.current);
        }

        if !self.started {
            self.started = true;
            let first = self.first.clone();
            if self.run_transition(first, cx).await? == StateOutcome::Suspend {
                return Ok(&self.current);
            }
        }

        self.drive(cx).await
    }

    /// Transition directly to `target`, bypassing predicate evaluation.
    ///
    /// The edge from the current state to `target` must still exist; its
    /// absence is [`Error::TransitionImpossible`].
    pub async fn to(&mut self, target: &State, cx: &Container) -> Result<&State, Error> {
        let has_edge = self
            .edges
            .get(&self.current)
            .is_some_and(|outgoing| outgoing.iter().any(|(to, _)| to == target));
        if !has_edge {
            return Err(Error::TransitionImpossible {
                from: self.current.name().to_string(),
                to: target.name().to_string(),
            });
        }

        self.started = true;
        if self.run_transition(target.clone(), cx).await? == StateOutcome::Suspend {
            return Ok(&self.current);
        }
        self.drive(cx).await
    }

    /// The re-entrancy loop: keep following first-matching edges while
    /// states ask to continue.
    async fn drive(&mut self, cx: &Container) -> Result<&State, Error> {
        loop {
            let Some(next) = self.select_next().await else {
                self.halt(cx).await?;
                return Ok(&self.current);
            };
            if self.run_transition(next, cx).await? == StateOutcome::Suspend {
                return Ok(&self.current);
            }
        }
    }

    /// First outgoing edge, in declaration order, whose predicate holds.
    /// Predicates are awaited one at a time, never concurrently.
    async fn select_next(&self) -> Option<State> {
        let outgoing = self.edges.get(&self.current)?;
        for (to, when) in outgoing {
            if when().await {
                return Some(to.clone());
            }
        }
        None
    }

    async fn run_transition(&mut self, to: State, cx: &Container) -> Result<StateOutcome, Error> {
        let from = self.current.clone();
        let wrap = |source: BoxError| Error::TransitionFailed {
            from: from.name().to_string(),
            to: to.name().to_string(),
            source,
        };

        if let Some(behavior) = from.behavior() {
            behavior.exit(cx).await.map_err(wrap)?;
        }

        debug!(from = from.name(), to = to.name(), "state transition");
        self.current = to.clone();

        match to.behavior() {
            Some(behavior) => behavior.enter(cx).await.map_err(wrap),
            None => Ok(StateOutcome::Suspend),
        }
    }

    /// No edge matched: run the current state's exit hook and settle into
    /// the terminal marker.
    async fn halt(&mut self, cx: &Container) -> Result<(), Error> {
        let from = self.current.clone();
        if let Some(behavior) = from.behavior() {
            behavior.exit(cx).await.map_err(|source| Error::TransitionFailed {
                from: from.name().to_string(),
                to: self.stopped.name().to_string(),
                source,
            })?;
        }
        debug!(from = from.name(), "no transition matched, machine stopped");
        self.current = self.stopped.clone();
        Ok(())
    }
}
