//! Transaction option strategies.
//!
//! A strategy decides which [`TransactionOption`] each attempt runs under,
//! and when to stop. Strategy objects are stateless and shared; all mutable
//! progress lives in the [`ExecutionInfo`] a strategy creates per `execute`
//! call, which is never shared across concurrent calls.
//!
//! Attempt numbers are 1-based user-facing (attempt 1 is the first attempt,
//! not a retry); internal tier indices are 0-based.

use crate::error::{ClientError, Result};
use crate::option::TransactionOption;
use crate::retry::{RetryCode, RetryInstruction};

/// Verdict of a strategy for the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextOption {
    /// Run the next attempt under this option.
    Next(TransactionOption),
    /// The configured attempts are exhausted.
    RetryOver,
}

/// Escalating-strategy progress: which tier is active and how much of each
/// tier's budget has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EscalatingCursor {
    in_ltx_phase: bool,
    occ_used: u32,
    ltx_used: u32,
}

impl EscalatingCursor {
    /// Switch to the LTX tier, resetting its budget to the full configured
    /// value. Applies on first escalation and on any re-escalation.
    fn escalate(&mut self) {
        self.in_ltx_phase = true;
        self.ltx_used = 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cursor {
    /// Fixed strategy needs no progress beyond the attempt counter.
    Fixed,
    /// Tiered strategy: 0-based index of the next attempt.
    Tiered { index: u32 },
    Escalating(EscalatingCursor),
}

/// Per-`execute` mutable state.
///
/// Owned exclusively by one engine call; the attempt counter is incremented
/// once per begin.
#[derive(Debug)]
pub struct ExecutionInfo {
    attempt: u32,
    cursor: Cursor,
    last_instruction: Option<RetryInstruction>,
}

impl ExecutionInfo {
    fn new(cursor: Cursor) -> Self {
        Self {
            attempt: 0,
            cursor,
            last_instruction: None,
        }
    }

    /// 1-based number of attempts begun so far (0 before the first begin).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_instruction(&self) -> Option<&RetryInstruction> {
        self.last_instruction.as_ref()
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempt += 1;
    }

    pub(crate) fn record_instruction(&mut self, instruction: RetryInstruction) {
        self.last_instruction = Some(instruction);
    }
}

/// Pluggable policy choosing the option for each attempt.
pub trait OptionStrategy: Send + Sync {
    /// Fresh per-call state.
    fn execution_info(&self) -> ExecutionInfo;

    /// The option for attempt 1. Independent of prior calls on a fresh
    /// [`ExecutionInfo`].
    fn first_option(&self, info: &mut ExecutionInfo) -> TransactionOption;

    /// The option for the attempt after a retryable failure, or
    /// [`NextOption::RetryOver`] once the configured attempts are exhausted.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    fn retry_option(
        &self,
        info: &mut ExecutionInfo,
        attempt: u32,
        previous: &TransactionOption,
        instruction: &RetryInstruction,
    ) -> NextOption;
}

/// Always the same option; retryable failures retry indefinitely unless an
/// attempt cap is configured.
#[derive(Debug, Clone)]
pub struct FixedStrategy {
    option: TransactionOption,
    max_attempts: Option<u32>,
}

impl FixedStrategy {
    pub fn new(option: TransactionOption) -> Self {
        Self {
            option,
            max_attempts: None,
        }
    }

    /// Cap the total number of attempts. Zero is a configuration error.
    pub fn with_cap(option: TransactionOption, max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(ClientError::Configuration(
                "attempt cap must be at least 1".to_owned(),
            ));
        }
        Ok(Self {
            option,
            max_attempts: Some(max_attempts),
        })
    }
}

impl OptionStrategy for FixedStrategy {
    fn execution_info(&self) -> ExecutionInfo {
        ExecutionInfo::new(Cursor::Fixed)
    }

    fn first_option(&self, _info: &mut ExecutionInfo) -> TransactionOption {
        self.option.clone()
    }

    fn retry_option(
        &self,
        _info: &mut ExecutionInfo,
        attempt: u32,
        _previous: &TransactionOption,
        _instruction: &RetryInstruction,
    ) -> NextOption {
        match self.max_attempts {
            Some(cap) if attempt >= cap => NextOption::RetryOver,
            _ => NextOption::Next(self.option.clone()),
        }
    }
}

/// Ordered list of `(option, attempt_count)` tiers.
///
/// The final tier may be unbounded; adding another tier after an unbounded
/// one, or a zero-attempt tier, is rejected at build time.
#[derive(Debug, Clone)]
pub struct TieredStrategy {
    tiers: Vec<(TransactionOption, Option<u32>)>,
}

/// Builder validating tier configuration.
#[derive(Debug, Clone, Default)]
pub struct TieredStrategyBuilder {
    tiers: Vec<(TransactionOption, Option<u32>)>,
    unbounded_seen: bool,
}

impl TieredStrategyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tier of `attempts` attempts under `option`.
    pub fn tier(mut self, option: TransactionOption, attempts: u32) -> Result<Self> {
        if self.unbounded_seen {
            return Err(ClientError::Configuration(
                "no tier may follow an unbounded tier".to_owned(),
            ));
        }
        if attempts == 0 {
            return Err(ClientError::Configuration(
                "a tier must allow at least 1 attempt".to_owned(),
            ));
        }
        self.tiers.push((option, Some(attempts)));
        Ok(self)
    }

    /// Add a final tier retried without bound.
    pub fn unbounded_tier(mut self, option: TransactionOption) -> Result<Self> {
        if self.unbounded_seen {
            return Err(ClientError::Configuration(
                "no tier may follow an unbounded tier".to_owned(),
            ));
        }
        self.unbounded_seen = true;
        self.tiers.push((option, None));
        Ok(self)
    }

    pub fn build(self) -> Result<TieredStrategy> {
        if self.tiers.is_empty() {
            return Err(ClientError::Configuration(
                "at least one tier is required".to_owned(),
            ));
        }
        Ok(TieredStrategy { tiers: self.tiers })
    }
}

impl TieredStrategy {
    pub fn builder() -> TieredStrategyBuilder {
        TieredStrategyBuilder::new()
    }

    /// The option for the 0-based attempt index, or `None` past the total
    /// configured attempts.
    pub fn find_option(&self, index: u32) -> Option<&TransactionOption> {
        let mut remaining = index;
        for (option, count) in &self.tiers {
            match count {
                None => return Some(option),
                Some(count) if remaining < *count => return Some(option),
                Some(count) => remaining -= count,
            }
        }
        None
    }
}

impl OptionStrategy for TieredStrategy {
    fn execution_info(&self) -> ExecutionInfo {
        ExecutionInfo::new(Cursor::Tiered { index: 0 })
    }

    fn first_option(&self, info: &mut ExecutionInfo) -> TransactionOption {
        if let Cursor::Tiered { index } = &mut info.cursor {
            *index = 0;
        }
        // A built strategy always has a first tier with at least 1 attempt.
        self.tiers[0].0.clone()
    }

    fn retry_option(
        &self,
        info: &mut ExecutionInfo,
        _attempt: u32,
        _previous: &TransactionOption,
        _instruction: &RetryInstruction,
    ) -> NextOption {
        let Cursor::Tiered { index } = &mut info.cursor else {
            return NextOption::RetryOver;
        };
        // The attempt at the current index just failed; advance to the next.
        *index += 1;
        match self.find_option(*index) {
            Some(option) => NextOption::Next(option.clone()),
            None => NextOption::RetryOver,
        }
    }
}

/// Two-tier OCC→LTX strategy.
///
/// Up to `occ_attempts` attempts run under the OCC option; plain retryable
/// failures consume that budget, then the strategy moves to the LTX option
/// for up to `ltx_attempts` attempts. A [`RetryCode::RetryableLtx`] verdict
/// escalates to the LTX tier immediately, skipping any remaining OCC
/// attempts and resetting the LTX budget to its full configured value.
#[derive(Debug, Clone)]
pub struct EscalatingStrategy {
    occ_option: TransactionOption,
    occ_attempts: u32,
    ltx_option: TransactionOption,
    ltx_attempts: u32,
}

impl EscalatingStrategy {
    pub fn new(
        occ_option: TransactionOption,
        occ_attempts: u32,
        ltx_option: TransactionOption,
        ltx_attempts: u32,
    ) -> Result<Self> {
        if occ_attempts == 0 || ltx_attempts == 0 {
            return Err(ClientError::Configuration(
                "a tier must allow at least 1 attempt".to_owned(),
            ));
        }
        if !ltx_option.is_ltx() {
            return Err(ClientError::Configuration(
                "the escalation tier requires an LTX option".to_owned(),
            ));
        }
        Ok(Self {
            occ_option,
            occ_attempts,
            ltx_option,
            ltx_attempts,
        })
    }
}

impl OptionStrategy for EscalatingStrategy {
    fn execution_info(&self) -> ExecutionInfo {
        ExecutionInfo::new(Cursor::Escalating(EscalatingCursor {
            in_ltx_phase: false,
            occ_used: 0,
            ltx_used: 0,
        }))
    }

    fn first_option(&self, info: &mut ExecutionInfo) -> TransactionOption {
        if let Cursor::Escalating(cursor) = &mut info.cursor {
            cursor.in_ltx_phase = false;
            cursor.occ_used = 1;
            cursor.ltx_used = 0;
        }
        self.occ_option.clone()
    }

    fn retry_option(
        &self,
        info: &mut ExecutionInfo,
        _attempt: u32,
        _previous: &TransactionOption,
        instruction: &RetryInstruction,
    ) -> NextOption {
        let Cursor::Escalating(cursor) = &mut info.cursor else {
            return NextOption::RetryOver;
        };
        if instruction.code() == RetryCode::RetryableLtx {
            cursor.escalate();
            return NextOption::Next(self.ltx_option.clone());
        }
        if cursor.in_ltx_phase {
            if cursor.ltx_used < self.ltx_attempts {
                cursor.ltx_used += 1;
                NextOption::Next(self.ltx_option.clone())
            } else {
                NextOption::RetryOver
            }
        } else if cursor.occ_used < self.occ_attempts {
            cursor.occ_used += 1;
            NextOption::Next(self.occ_option.clone())
        } else {
            // OCC budget spent; move to the LTX tier.
            cursor.escalate();
            NextOption::Next(self.ltx_option.clone())
        }
    }
}
