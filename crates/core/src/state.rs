//! Stack-based game state machine
//!
//! The head of the stack is the one active state; everything beneath it is
//! paused. States never touch the stack directly: lifecycle and tick methods
//! hand back a [`Transition`] and the manager applies it once the call has
//! returned.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::StateError;
use crate::invariants::assert_stack_invariants;

/// Registry key for a state
pub type StateId = &'static str;

/// Lifecycle status of a state instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Active,
    Paused,
}

/// Types a concrete state machine plugs in
pub trait Machine: 'static {
    /// Shared world the states operate on
    type Context;
    /// Payload carried by push, pop and collapse
    type Args: Default;
    /// Input routed to the active state
    type Event;
    /// Render target
    type Canvas;
}

/// Requested change to the stack
pub enum Transition<A> {
    None,
    Push(StateId, A),
    Pop(A),
    Collapse(StateId, A),
    Quit,
}

impl<A> Transition<A> {
    pub fn push(id: StateId) -> Self
    where
        A: Default,
    {
        Transition::Push(id, A::default())
    }

    pub fn pop() -> Self
    where
        A: Default,
    {
        Transition::Pop(A::default())
    }

    pub fn collapse(id: StateId) -> Self
    where
        A: Default,
    {
        Transition::Collapse(id, A::default())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Transition::None)
    }
}

impl<A> fmt::Debug for Transition<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::None => write!(f, "None"),
            Transition::Push(id, _) => write!(f, "Push({})", id),
            Transition::Pop(_) => write!(f, "Pop"),
            Transition::Collapse(id, _) => write!(f, "Collapse({})", id),
            Transition::Quit => write!(f, "Quit"),
        }
    }
}

/// One gameplay mode.
///
/// `pause` and `leave` run while the stack is being rearranged and so cannot
/// request a transition of their own.
pub trait GameState<M: Machine> {
    fn id(&self) -> StateId;

    fn enter(&mut self, _ctx: &mut M::Context, _args: M::Args) -> Transition<M::Args> {
        Transition::None
    }

    fn pause(&mut self, _ctx: &mut M::Context, _next: StateId) {}

    fn resume(&mut self, _ctx: &mut M::Context, _args: M::Args) -> Transition<M::Args> {
        Transition::None
    }

    fn leave(&mut self, _ctx: &mut M::Context) {}

    fn input(&mut self, _ctx: &mut M::Context, _event: &M::Event) -> Transition<M::Args> {
        Transition::None
    }

    fn update(&mut self, _ctx: &mut M::Context, _dt: Duration) -> Transition<M::Args> {
        Transition::None
    }

    fn render(&self, _ctx: &M::Context, _canvas: &mut M::Canvas) {}
}

type Constructor<M> = Box<dyn Fn() -> Box<dyn GameState<M>>>;

/// Constructors for every state the manager may push
pub struct StateRegistry<M: Machine> {
    constructors: HashMap<StateId, Constructor<M>>,
}

impl<M: Machine> Default for StateRegistry<M> {
    fn default() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }
}

impl<M: Machine> StateRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S, F>(&mut self, id: StateId, constructor: F) -> &mut Self
    where
        S: GameState<M> + 'static,
        F: Fn() -> S + 'static,
    {
        self.constructors
            .insert(id, Box::new(move || -> Box<dyn GameState<M>> { Box::new(constructor()) }));
        self
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn build(&self, id: StateId) -> Result<Box<dyn GameState<M>>, StateError> {
        self.constructors
            .get(id)
            .map(|construct| construct())
            .ok_or(StateError::Unregistered(id))
    }
}

struct Entry<M: Machine> {
    state: Box<dyn GameState<M>>,
    status: Status,
}

impl<M: Machine> Entry<M> {
    fn require(&self, action: &'static str, allowed: &[Status]) -> Result<(), StateError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(StateError::Lifecycle {
                state: self.state.id(),
                action,
                status: self.status,
            })
        }
    }
}

/// Owns the state stack and applies transitions
pub struct StateManager<M: Machine> {
    registry: StateRegistry<M>,
    stack: Vec<Entry<M>>,
    quit: bool,
}

impl<M: Machine> StateManager<M> {
    pub fn new(registry: StateRegistry<M>) -> Self {
        Self {
            registry,
            stack: Vec::new(),
            quit: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Id of the active state
    pub fn active(&self) -> Option<StateId> {
        self.stack.last().map(|e| e.state.id())
    }

    /// Stack from bottom to top
    pub fn statuses(&self) -> Vec<(StateId, Status)> {
        self.stack
            .iter()
            .map(|e| (e.state.id(), e.status))
            .collect()
    }

    pub fn push(
        &mut self,
        ctx: &mut M::Context,
        id: StateId,
        args: M::Args,
    ) -> Result<(), StateError> {
        self.apply(ctx, Transition::Push(id, args))
    }

    pub fn pop(&mut self, ctx: &mut M::Context, args: M::Args) -> Result<(), StateError> {
        self.apply(ctx, Transition::Pop(args))
    }

    pub fn collapse(
        &mut self,
        ctx: &mut M::Context,
        id: StateId,
        args: M::Args,
    ) -> Result<(), StateError> {
        self.apply(ctx, Transition::Collapse(id, args))
    }

    /// Apply a transition and any transitions it causes in turn
    pub fn apply(
        &mut self,
        ctx: &mut M::Context,
        transition: Transition<M::Args>,
    ) -> Result<(), StateError> {
        let mut next = transition;
        loop {
            next = match next {
                Transition::None => break,
                Transition::Quit => {
                    tracing::info!("Quit requested");
                    self.quit = true;
                    break;
                }
                Transition::Push(id, args) => self.push_one(ctx, id, args)?,
                Transition::Pop(args) => self.pop_one(ctx, args)?,
                Transition::Collapse(id, args) => self.collapse_one(ctx, id, args)?,
            };
            if cfg!(debug_assertions) {
                assert_stack_invariants(&self.statuses());
            }
        }
        Ok(())
    }

    /// Route one event to the active state
    pub fn input(&mut self, ctx: &mut M::Context, event: &M::Event) -> Result<(), StateError> {
        let transition = self.active_entry()?.state.input(ctx, event);
        self.apply(ctx, transition)
    }

    pub fn update(&mut self, ctx: &mut M::Context, dt: Duration) -> Result<(), StateError> {
        let transition = self.active_entry()?.state.update(ctx, dt);
        self.apply(ctx, transition)
    }

    pub fn render(&self, ctx: &M::Context, canvas: &mut M::Canvas) -> Result<(), StateError> {
        let entry = self.stack.last().ok_or(StateError::EmptyStack)?;
        entry.require("render", &[Status::Active])?;
        entry.state.render(ctx, canvas);
        Ok(())
    }

    /// One tick: at most one event, then update, then render. Stops early
    /// when a transition empties the stack or asks to quit.
    pub fn tick(
        &mut self,
        ctx: &mut M::Context,
        event: Option<&M::Event>,
        dt: Duration,
        canvas: &mut M::Canvas,
    ) -> Result<(), StateError> {
        if let Some(event) = event {
            self.input(ctx, event)?;
            if self.is_finished() {
                return Ok(());
            }
        }
        self.update(ctx, dt)?;
        if self.is_finished() {
            return Ok(());
        }
        self.render(ctx, canvas)
    }

    /// Nothing left to run
    pub fn is_finished(&self) -> bool {
        self.quit || self.stack.is_empty()
    }

    fn active_entry(&mut self) -> Result<&mut Entry<M>, StateError> {
        let entry = self.stack.last_mut().ok_or(StateError::EmptyStack)?;
        entry.require("tick", &[Status::Active])?;
        Ok(entry)
    }

    fn push_one(
        &mut self,
        ctx: &mut M::Context,
        id: StateId,
        args: M::Args,
    ) -> Result<Transition<M::Args>, StateError> {
        let state = self.registry.build(id)?;

        if let Some(top) = self.stack.last_mut() {
            top.require("pause", &[Status::Active])?;
            top.state.pause(ctx, id);
            top.status = Status::Paused;
        }

        tracing::debug!(state = id, "Entering state");
        let mut entry = Entry {
            state,
            status: Status::Ready,
        };
        entry.require("enter", &[Status::Ready])?;
        entry.status = Status::Active;
        self.stack.push(entry);

        let top = self.active_entry()?;
        Ok(top.state.enter(ctx, args))
    }

    fn pop_one(
        &mut self,
        ctx: &mut M::Context,
        args: M::Args,
    ) -> Result<Transition<M::Args>, StateError> {
        let mut entry = self.stack.pop().ok_or(StateError::EmptyStack)?;
        entry.require("leave", &[Status::Active])?;
        tracing::debug!(state = entry.state.id(), "Leaving state");
        entry.state.leave(ctx);
        entry.status = Status::Ready;

        let Some(top) = self.stack.last_mut() else {
            return Ok(Transition::None);
        };
        top.require("resume", &[Status::Paused])?;
        top.status = Status::Active;
        tracing::debug!(state = top.state.id(), "Resuming state");
        Ok(top.state.resume(ctx, args))
    }

    fn collapse_one(
        &mut self,
        ctx: &mut M::Context,
        id: StateId,
        args: M::Args,
    ) -> Result<Transition<M::Args>, StateError> {
        if !self.registry.contains(id) {
            return Err(StateError::Unregistered(id));
        }

        tracing::debug!(state = id, depth = self.stack.len(), "Collapsing stack");
        while let Some(mut entry) = self.stack.pop() {
            entry.require("leave", &[Status::Active, Status::Paused])?;
            entry.state.leave(ctx);
            entry.status = Status::Ready;
        }

        self.push_one(ctx, id, args)
    }
}
