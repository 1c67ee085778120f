//! Session lifecycle values shared by the streaming controllers.
//!
//! A session is one attempt-to-termination run of a single network stream.
//! Every `start()`/`connect()` mints a fresh [`SessionToken`] from the
//! controller's [`Generation`]; asynchronous work captures its token and
//! must check [`Generation::is_current`] before touching shared state. A
//! superseded token means the callback belongs to a dead session and its
//! result is discarded.

use serde::Serialize;

/// Lifecycle status of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session has been started yet.
    Idle,
    /// The request/socket is being opened.
    Connecting,
    /// The stream is open and delivering data.
    Active,
    /// Terminated by the user.
    Stopped,
    /// Terminated by a transport failure.
    Errored,
    /// The server closed the stream normally.
    Ended,
}

impl SessionStatus {
    /// `Connecting` or `Active`: a session that still owns the controller.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }

    /// `Stopped`, `Errored` or `Ended`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Errored | Self::Ended)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one session as seen by its asynchronous callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic generation counter owned by a controller.
///
/// Not thread-safe on its own; it lives inside the controller's locked
/// state so that the check and the mutation it guards happen atomically.
#[derive(Debug, Default)]
pub struct Generation {
    current: u64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, superseding every previously minted token.
    pub fn mint(&mut self) -> SessionToken {
        self.current += 1;
        SessionToken(self.current)
    }

    /// Supersede the current session without starting a new one.
    pub fn invalidate(&mut self) {
        self.current += 1;
    }

    /// Whether `token` still belongs to the live session.
    pub fn is_current(&self, token: SessionToken) -> bool {
        token.0 == self.current
    }
}
