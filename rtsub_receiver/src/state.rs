//! Receiver lifecycle state machine.
//!
//! Start → ConfiguringSchedule → SchedulingOk → OpeningChannel → ChannelOpen
//! → Connecting → Connected → Receiving → Stopped.
//!
//! Every step before `Receiving` may abort. `Stopped` is reachable only
//! from `Receiving` through the external shutdown flag; the receive loop
//! never ends on its own.

use std::fmt;

/// Lifecycle state of the receiver process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Nothing done yet.
    Start,
    /// Scheduling request in flight.
    ConfiguringSchedule,
    /// Real-time class applied.
    SchedulingOk,
    /// Local port registration in flight.
    OpeningChannel,
    /// Local port registered.
    ChannelOpen,
    /// Connect handshake in flight.
    Connecting,
    /// Remote publisher routed to the local port.
    Connected,
    /// Consuming messages.
    Receiving,
    /// Shutdown flag observed, loop left cleanly.
    Stopped,
    /// A fatal step failed.
    Aborted,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded, with the new state.
    Ok(ReceiverState),
    /// Transition rejected, with the reason.
    Rejected(&'static str),
}

/// Event that drives the receiver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// Startup begins with the scheduling request.
    Begin,
    /// The OS accepted the scheduling request.
    ScheduleApplied,
    /// Local port registration requested.
    OpenRequested,
    /// Local port registered.
    ChannelOpened,
    /// Connect handshake started.
    ConnectRequested,
    /// Publisher acknowledged the route.
    ConnectAccepted,
    /// Receive loop entered.
    ReceiveStarted,
    /// Shutdown flag observed by the receive loop.
    ShutdownObserved,
    /// The current step failed.
    Failed,
}

/// Receiver lifecycle holder.
#[derive(Debug, Clone)]
pub struct ReceiverStateMachine {
    state: ReceiverState,
}

impl Default for ReceiverStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverStateMachine {
    /// New machine in `Start`.
    pub const fn new() -> Self {
        Self {
            state: ReceiverState::Start,
        }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> ReceiverState {
        self.state
    }

    /// Attempt a transition given an event.
    pub fn handle_event(&mut self, event: ReceiverEvent) -> TransitionResult {
        use ReceiverEvent::*;
        use ReceiverState::*;

        let next = match (self.state, event) {
            (Start, Begin) => ConfiguringSchedule,
            (ConfiguringSchedule, ScheduleApplied) => SchedulingOk,
            (SchedulingOk, OpenRequested) => OpeningChannel,
            (OpeningChannel, ChannelOpened) => ChannelOpen,
            (ChannelOpen, ConnectRequested) => Connecting,
            (Connecting, ConnectAccepted) => Connected,
            (Connected, ReceiveStarted) => Receiving,
            (Receiving, ShutdownObserved) => Stopped,

            (ConfiguringSchedule | OpeningChannel | Connecting | Receiving, Failed) => Aborted,

            _ => return TransitionResult::Rejected(invalid_transition_reason(self.state)),
        };

        self.state = next;
        TransitionResult::Ok(next)
    }

    /// True once the process has left the lifecycle (cleanly or not).
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.state, ReceiverState::Stopped | ReceiverState::Aborted)
    }
}

fn invalid_transition_reason(state: ReceiverState) -> &'static str {
    use ReceiverState::*;
    match state {
        Start => "Start: only Begin allowed",
        ConfiguringSchedule => "ConfiguringSchedule: only ScheduleApplied or Failed allowed",
        SchedulingOk => "SchedulingOk: only OpenRequested allowed",
        OpeningChannel => "OpeningChannel: only ChannelOpened or Failed allowed",
        ChannelOpen => "ChannelOpen: only ConnectRequested allowed",
        Connecting => "Connecting: only ConnectAccepted or Failed allowed",
        Connected => "Connected: only ReceiveStarted allowed",
        Receiving => "Receiving: only ShutdownObserved or Failed allowed",
        Stopped | Aborted => "terminal state",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
