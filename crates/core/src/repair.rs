//! The repair/audit ledger.
//!
//! Every rewrite applied anywhere in the pipeline appends exactly one
//! [`RepairEntry`] to a [`RepairLog`]. Entries are never edited or removed;
//! their order is the order in which the transformations were applied
//! (lexical entries first, then parse-level, then value-level).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairTier {
    /// Meaning-preserving rewrite, always applied.
    Normalization,
    /// Bounded value-level correction with exactly one valid resolution.
    /// Applied only with `fix` enabled and a schema bound.
    Repair,
    /// A rewrite that would need inference. Recorded, never applied.
    ForbiddenAttempt,
}

/// Rewrites that are never performed automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForbiddenAction {
    InsertRequiredField,
    InventRoutingTarget,
    ReparentBlock,
    RewriteValueMeaning,
}

impl ForbiddenAction {
    pub fn rule_id(self) -> &'static str {
        match self {
            ForbiddenAction::InsertRequiredField => "insert_required_field",
            ForbiddenAction::InventRoutingTarget => "invent_routing_target",
            ForbiddenAction::ReparentBlock => "reparent_block",
            ForbiddenAction::RewriteValueMeaning => "rewrite_value_meaning",
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            ForbiddenAction::InsertRequiredField => {
                "a missing required value cannot be inferred; the author must supply it"
            }
            ForbiddenAction::InventRoutingTarget => {
                "a routing destination cannot be derived from a bare name"
            }
            ForbiddenAction::ReparentBlock => {
                "moving content between a block and a value changes document structure"
            }
            ForbiddenAction::RewriteValueMeaning => {
                "no conversion preserves the meaning of this value"
            }
        }
    }
}

impl fmt::Display for ForbiddenAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rule_id())
    }
}

/// One audited transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairEntry {
    pub rule_id: String,
    pub before: String,
    pub after: String,
    pub tier: RepairTier,
    pub semantics_changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RepairEntry {
    pub fn normalization(
        rule_id: &str,
        before: impl Into<String>,
        after: impl Into<String>,
        line: Option<u32>,
    ) -> Self {
        RepairEntry {
            rule_id: rule_id.to_owned(),
            before: before.into(),
            after: after.into(),
            tier: RepairTier::Normalization,
            semantics_changed: false,
            line,
            path: None,
        }
    }

    pub fn repair(
        rule_id: &str,
        path: &str,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        RepairEntry {
            rule_id: rule_id.to_owned(),
            before: before.into(),
            after: after.into(),
            tier: RepairTier::Repair,
            semantics_changed: false,
            line: None,
            path: Some(path.to_owned()),
        }
    }

    /// A refused rewrite. `before` and `after` are identical: nothing changed.
    pub fn forbidden(action: ForbiddenAction, path: &str, current: impl Into<String>) -> Self {
        let current = current.into();
        RepairEntry {
            rule_id: action.rule_id().to_owned(),
            before: current.clone(),
            after: current,
            tier: RepairTier::ForbiddenAttempt,
            semantics_changed: false,
            line: None,
            path: Some(path.to_owned()),
        }
    }
}

/// Append-only ledger of [`RepairEntry`] values for one pipeline call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairLog {
    entries: Vec<RepairEntry>,
}

impl RepairLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RepairEntry) {
        tracing::trace!(rule = %entry.rule_id, tier = ?entry.tier, "repair entry");
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = RepairEntry>) {
        for e in entries {
            self.push(e);
        }
    }

    pub fn entries(&self) -> &[RepairEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, tier: RepairTier) -> usize {
        self.entries.iter().filter(|e| e.tier == tier).count()
    }

    pub fn into_entries(self) -> Vec<RepairEntry> {
        self.entries
    }
}

/// Immutable per-call configuration of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Apply REPAIR-tier corrections (only effective with a schema bound).
    pub fix: bool,
    /// Accept recoverable layout problems (missing envelope, missing END)
    /// by synthesizing the canonical structure.
    pub lenient: bool,
    /// Envelope name used when one has to be synthesized.
    pub envelope_hint: Option<String>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        RepairConfig {
            fix: false,
            lenient: true,
            envelope_hint: None,
        }
    }
}

impl RepairConfig {
    pub fn strict() -> Self {
        RepairConfig {
            lenient: false,
            ..Self::default()
        }
    }

    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        self
    }

    pub fn with_envelope_hint(mut self, hint: impl Into<String>) -> Self {
        self.envelope_hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_entry_records_no_change() {
        let e = RepairEntry::forbidden(ForbiddenAction::InsertRequiredField, "ID", "<missing>");
        assert_eq!(e.tier, RepairTier::ForbiddenAttempt);
        assert_eq!(e.before, e.after);
        assert!(!e.semantics_changed);
        assert_eq!(e.rule_id, "insert_required_field");
    }

    #[test]
    fn log_preserves_insertion_order_and_counts_tiers() {
        let mut log = RepairLog::new();
        log.push(RepairEntry::normalization("ascii_alias_flow", "->", "→", Some(1)));
        log.push(RepairEntry::repair("enum_case_fold", "STATUS", "active", "ACTIVE"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].rule_id, "ascii_alias_flow");
        assert_eq!(log.count(RepairTier::Repair), 1);
        assert_eq!(log.count(RepairTier::ForbiddenAttempt), 0);
    }

    #[test]
    fn tier_serializes_screaming_snake() {
        let v = serde_json::to_value(RepairTier::ForbiddenAttempt).unwrap();
        assert_eq!(v, serde_json::json!("FORBIDDEN_ATTEMPT"));
    }
}
