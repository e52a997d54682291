//! Transaction options.
//!
//! An option describes the strategy a single attempt runs under: `OCC`
//! (short optimistic transaction), `LTX` (long transaction declaring the
//! tables it may write), or `RTX` (read-only). Options are immutable after
//! build, cheap to clone, and carry an optional free-text label used only
//! for diagnostics and metrics grouping.
//!
//! The wire-level form is computed eagerly by one exhaustive match at
//! construction, so there is no hidden mutable cache inside the value;
//! every re-labeling rebuilds it.

use serde::{Deserialize, Serialize};

/// Scheduling priority a long or read-only transaction may request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPriority {
    #[default]
    Unspecified,
    Interrupt,
    Wait,
    InterruptExclude,
    WaitExclude,
}

/// Transaction type discriminant on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireTransactionType {
    Occ,
    Ltx,
    Rtx,
}

/// Wire-level representation of a transaction option.
///
/// This is what the transport serializes into a begin request. It is a pure
/// function of the option's declared fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTransactionOption {
    pub transaction_type: WireTransactionType,
    pub label: Option<String>,
    pub priority: TransactionPriority,
    pub write_preserve: Vec<String>,
    pub inclusive_read_area: Vec<String>,
    pub exclusive_read_area: Vec<String>,
}

/// Fields shared by every option variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Common {
    label: Option<String>,
    priority: TransactionPriority,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OptionKind {
    Occ,
    Ltx {
        write_preserve: Vec<String>,
        inclusive_read_area: Vec<String>,
        exclusive_read_area: Vec<String>,
    },
    Rtx {
        inclusive_read_area: Vec<String>,
        exclusive_read_area: Vec<String>,
    },
}

/// Immutable-after-build description of a transaction strategy.
///
/// Equality is structural over the declared fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOption {
    common: Common,
    kind: OptionKind,
    wire: WireTransactionOption,
}

fn ordered_dedup(tables: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for table in tables {
        let table = table.into();
        if !out.contains(&table) {
            out.push(table);
        }
    }
    out
}

impl TransactionOption {
    /// A short optimistic transaction.
    pub fn occ() -> Self {
        Self::assemble(Common::default(), OptionKind::Occ)
    }

    /// A long transaction write-preserving the given tables.
    pub fn ltx(write_preserve: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::assemble(
            Common::default(),
            OptionKind::Ltx {
                write_preserve: ordered_dedup(write_preserve),
                inclusive_read_area: Vec::new(),
                exclusive_read_area: Vec::new(),
            },
        )
    }

    /// A read-only transaction.
    pub fn rtx() -> Self {
        Self::assemble(
            Common::default(),
            OptionKind::Rtx {
                inclusive_read_area: Vec::new(),
                exclusive_read_area: Vec::new(),
            },
        )
    }

    /// Relabel this option, rebuilding its wire form.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.common.label = Some(label.into());
        Self::assemble(self.common, self.kind)
    }

    /// Set the priority (meaningful for LTX and RTX).
    #[must_use]
    pub fn with_priority(mut self, priority: TransactionPriority) -> Self {
        self.common.priority = priority;
        Self::assemble(self.common, self.kind)
    }

    /// Restrict the tables this transaction reads (inclusive read area).
    #[must_use]
    pub fn with_inclusive_read_area(
        mut self,
        tables: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let tables = ordered_dedup(tables);
        match &mut self.kind {
            OptionKind::Ltx {
                inclusive_read_area,
                ..
            }
            | OptionKind::Rtx {
                inclusive_read_area,
                ..
            } => *inclusive_read_area = tables,
            OptionKind::Occ => {}
        }
        Self::assemble(self.common, self.kind)
    }

    /// Exclude tables from this transaction's read area.
    #[must_use]
    pub fn with_exclusive_read_area(
        mut self,
        tables: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let tables = ordered_dedup(tables);
        match &mut self.kind {
            OptionKind::Ltx {
                exclusive_read_area,
                ..
            }
            | OptionKind::Rtx {
                exclusive_read_area,
                ..
            } => *exclusive_read_area = tables,
            OptionKind::Occ => {}
        }
        Self::assemble(self.common, self.kind)
    }

    pub fn label(&self) -> Option<&str> {
        self.common.label.as_deref()
    }

    pub fn priority(&self) -> TransactionPriority {
        self.common.priority
    }

    pub fn is_ltx(&self) -> bool {
        matches!(self.kind, OptionKind::Ltx { .. })
    }

    pub fn is_rtx(&self) -> bool {
        matches!(self.kind, OptionKind::Rtx { .. })
    }

    /// Short type name for logs and metric labels.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            OptionKind::Occ => "OCC",
            OptionKind::Ltx { .. } => "LTX",
            OptionKind::Rtx { .. } => "RTX",
        }
    }

    /// The precomputed wire form.
    pub fn wire(&self) -> &WireTransactionOption {
        &self.wire
    }

    fn assemble(common: Common, kind: OptionKind) -> Self {
        let wire = Self::build_wire(&common, &kind);
        Self { common, kind, wire }
    }

    fn build_wire(common: &Common, kind: &OptionKind) -> WireTransactionOption {
        match kind {
            OptionKind::Occ => WireTransactionOption {
                transaction_type: WireTransactionType::Occ,
                label: common.label.clone(),
                priority: common.priority,
                write_preserve: Vec::new(),
                inclusive_read_area: Vec::new(),
                exclusive_read_area: Vec::new(),
            },
            OptionKind::Ltx {
                write_preserve,
                inclusive_read_area,
                exclusive_read_area,
            } => WireTransactionOption {
                transaction_type: WireTransactionType::Ltx,
                label: common.label.clone(),
                priority: common.priority,
                write_preserve: write_preserve.clone(),
                inclusive_read_area: inclusive_read_area.clone(),
                exclusive_read_area: exclusive_read_area.clone(),
            },
            OptionKind::Rtx {
                inclusive_read_area,
                exclusive_read_area,
            } => WireTransactionOption {
                transaction_type: WireTransactionType::Rtx,
                label: common.label.clone(),
                priority: common.priority,
                write_preserve: Vec::new(),
                inclusive_read_area: inclusive_read_area.clone(),
                exclusive_read_area: exclusive_read_area.clone(),
            },
        }
    }
}
