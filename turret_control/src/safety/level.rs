//! Safety level state machine.
//!
//! Normal ↔ Warning → SafeMode / Emergency → (reset) → Normal.
//! Safe mode and emergency latch; only `Reset` leaves them.

/// Overall safety level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SafetyLevel {
    #[default]
    Normal,
    /// Watchdog or supply voltage close to its limit.
    Warning,
    /// Watchdog timeout or brownout. Emitter forced off.
    SafeMode,
    /// Emergency stop. Emitter forced off.
    Emergency,
}

impl SafetyLevel {
    pub const fn name(self) -> &'static str {
        match self {
            SafetyLevel::Normal => "NORMAL",
            SafetyLevel::Warning => "WARNING",
            SafetyLevel::SafeMode => "SAFE_MODE",
            SafetyLevel::Emergency => "EMERGENCY",
        }
    }

    /// Emitter must stay off until reset.
    #[inline]
    pub const fn is_latched(self) -> bool {
        matches!(self, SafetyLevel::SafeMode | SafetyLevel::Emergency)
    }
}

/// Events that drive the level machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelEvent {
    AllOk,
    Warning,
    SafeMode,
    Emergency,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelTransition {
    Ok(SafetyLevel),
    Rejected(&'static str),
}

#[derive(Debug, Clone, Default)]
pub struct LevelMachine {
    level: SafetyLevel,
}

impl LevelMachine {
    pub const fn new() -> Self {
        Self {
            level: SafetyLevel::Normal,
        }
    }

    #[inline]
    pub const fn level(&self) -> SafetyLevel {
        self.level
    }

    pub fn handle_event(&mut self, event: LevelEvent) -> LevelTransition {
        use LevelEvent as E;
        use SafetyLevel as S;

        let next = match (self.level, event) {
            (S::Normal | S::Warning, E::AllOk) => S::Normal,
            (S::Normal | S::Warning, E::Warning) => S::Warning,

            (S::Normal | S::Warning, E::SafeMode) => S::SafeMode,
            (S::Normal | S::Warning, E::Emergency) => S::Emergency,

            // Latched: the first cause stands.
            (S::SafeMode, E::SafeMode | E::Emergency) => S::SafeMode,
            (S::Emergency, E::SafeMode | E::Emergency) => S::Emergency,

            (S::SafeMode | S::Emergency, E::Reset) => S::Normal,

            (S::SafeMode | S::Emergency, E::AllOk | E::Warning) => {
                return LevelTransition::Rejected("latched level requires reset");
            }
            (S::Normal | S::Warning, E::Reset) => {
                return LevelTransition::Rejected("nothing to reset");
            }
        };

        self.level = next;
        LevelTransition::Ok(next)
    }
}
