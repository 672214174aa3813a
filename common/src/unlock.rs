//! Client-side disclosure sequencing.
//!
//! Composes the optional gates in front of paste content (password entry,
//! a fixed countdown, discrete acknowledgement steps) as an explicit state
//! machine with pure transitions. Embedders own every timer and network
//! call; the machine only records where the flow stands and arms the
//! one-shot view-count trigger when content is first revealed. Events that
//! are invalid for the current state are ignored.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Seconds the countdown gate holds before content unlocks; zero
    /// disables the gate. The countdown is client-local and restarts with
    /// every fresh machine.
    pub wait_seconds: u32,
    /// Discrete acknowledgements required before content unlocks; zero
    /// disables the gate.
    pub interaction_steps: u8,
}

impl GateConfig {
    /// No optional gates; open pastes reveal immediately after loading.
    pub const NONE: Self = Self {
        wait_seconds: 0,
        interaction_steps: 0,
    };
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::NONE
    }
}

/// How the initial metadata fetch resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Paste fetched with content included.
    Open,
    /// The server withheld content pending a credential.
    PasswordRequired,
    /// The fetch failed outright; only a fresh navigation recovers.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockState {
    Init,
    /// Awaiting a credential; `error` carries the last rejection, retries
    /// are unlimited.
    PasswordGate { error: Option<String> },
    WaitGate { remaining: u32 },
    InteractionGate { completed: u8, required: u8 },
    /// Terminal: content may be rendered.
    Revealed,
    /// Terminal: the paste could not be loaded.
    Failed,
}

#[derive(Debug, Clone)]
pub struct UnlockMachine {
    config: GateConfig,
    state: UnlockState,
    view_counted: bool,
}

impl UnlockMachine {
    #[must_use]
    pub const fn new(config: GateConfig) -> Self {
        Self {
            config,
            state: UnlockState::Init,
            view_counted: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &UnlockState {
        &self.state
    }

    /// Resolves the initial fetch. Only meaningful in `Init`.
    pub fn load(&mut self, outcome: LoadOutcome) {
        if self.state != UnlockState::Init {
            return;
        }
        self.state = match outcome {
            LoadOutcome::Open => self.first_timed_gate(),
            LoadOutcome::PasswordRequired => UnlockState::PasswordGate { error: None },
            LoadOutcome::Failed => UnlockState::Failed,
        };
    }

    /// Reports the outcome of one credential submission. A failure keeps
    /// the gate open with the error surfaced; a success re-enters the gate
    /// chain, so the countdown (if configured) starts over.
    pub fn submit_password(&mut self, result: Result<(), String>) {
        if !matches!(self.state, UnlockState::PasswordGate { .. }) {
            return;
        }
        self.state = match result {
            Ok(()) => self.first_timed_gate(),
            Err(error) => UnlockState::PasswordGate { error: Some(error) },
        };
    }

    /// Advances the countdown by one second.
    pub fn tick(&mut self) {
        if let UnlockState::WaitGate { remaining } = self.state {
            self.state = if remaining <= 1 {
                self.after_wait_gate()
            } else {
                UnlockState::WaitGate {
                    remaining: remaining - 1,
                }
            };
        }
    }

    /// Registers one user acknowledgement on the interaction gate.
    pub fn advance_interaction(&mut self) {
        if let UnlockState::InteractionGate {
            completed,
            required,
        } = self.state
        {
            let completed = completed + 1;
            self.state = if completed >= required {
                UnlockState::Revealed
            } else {
                UnlockState::InteractionGate {
                    completed,
                    required,
                }
            };
        }
    }

    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.state == UnlockState::Revealed
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == UnlockState::Failed
    }

    /// One-shot view-count trigger: returns `true` exactly once, the first
    /// time it is called after the machine reaches `Revealed`. The flag
    /// flips before the caller dispatches the count request, so a slow or
    /// failed request never re-arms it.
    pub fn take_view_trigger(&mut self) -> bool {
        if self.state == UnlockState::Revealed && !self.view_counted {
            self.view_counted = true;
            return true;
        }
        false
    }

    fn first_timed_gate(&self) -> UnlockState {
        if self.config.wait_seconds > 0 {
            UnlockState::WaitGate {
                remaining: self.config.wait_seconds,
            }
        } else {
            self.after_wait_gate()
        }
    }

    fn after_wait_gate(&self) -> UnlockState {
        if self.config.interaction_steps > 0 {
            UnlockState::InteractionGate {
                completed: 0,
                required: self.config.interaction_steps,
            }
        } else {
            UnlockState::Revealed
        }
    }
}
