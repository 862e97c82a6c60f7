//! # Reconciliation Engine
//!
//! Given an authoritative current-statement list (freshly retrieved, not
//! the advisory cache) and a proposed-statement list, produce the final
//! statement list that becomes the write payload: what is inserted, what is
//! marked for removal, and how pre-existing references merge with proposed
//! ones.
//!
//! The engine is pure: inputs are never mutated, the output is a new list.
//! Statements needing no change are neither flagged for removal nor
//! reinserted.

use crate::model::{CmpOptions, MergeMode, PropertyId, RefMode, Reference, Statement, Value};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Caller-supplied reference merge function; only the references of the
/// returned statement are used
pub type CustomRefMerge<'a> = &'a dyn Fn(&Statement, &Statement) -> Statement;

/// One acceptance template for the good-reference predicate: each entry is
/// a property that must be present in the block, optionally with a required
/// value (`None` is a wildcard, presence suffices).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefTemplate {
    pub requirements: Vec<(PropertyId, Option<Value>)>,
}

impl RefTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the property with this exact value
    pub fn require(mut self, property: PropertyId, value: Value) -> Self {
        self.requirements.push((property, Some(value)));
        self
    }

    /// Require only that the property is present
    pub fn require_any(mut self, property: PropertyId) -> Self {
        self.requirements.push((property, None));
        self
    }
}

/// Options steering one reconciliation run
pub struct ReconcileOptions<'a> {
    /// Default reference-merge policy; proposals may override per statement
    pub ref_mode: RefMode,
    /// Merge function used when the policy is [`RefMode::Custom`]
    pub custom_merge: Option<CustomRefMerge<'a>>,
    /// Good-reference templates
    pub good_refs: Vec<RefTemplate>,
    /// Spare from removal any statement holding at least one good block
    pub keep_good_ref_statements: bool,
    /// Comparison context for statement equality
    pub cmp: CmpOptions,
}

impl Default for ReconcileOptions<'_> {
    fn default() -> Self {
        Self {
            ref_mode: RefMode::KeepGood,
            custom_merge: None,
            good_refs: Vec::new(),
            keep_good_ref_statements: false,
            cmp: CmpOptions::default(),
        }
    }
}

impl std::fmt::Debug for ReconcileOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileOptions")
            .field("ref_mode", &self.ref_mode)
            .field("custom_merge", &self.custom_merge.map(|_| "<fn>"))
            .field("good_refs", &self.good_refs)
            .field("keep_good_ref_statements", &self.keep_good_ref_statements)
            .field("cmp", &self.cmp)
            .finish()
    }
}

/// Is the block accepted by at least one template?
pub fn is_good_reference(block: &Reference, templates: &[RefTemplate], fold: bool) -> bool {
    templates.iter().any(|template| {
        !template.requirements.is_empty()
            && template.requirements.iter().all(|(property, required)| {
                block.snaks.iter().any(|snak| {
                    snak.property == *property
                        && match required {
                            None => true,
                            Some(value) => snak
                                .value
                                .as_ref()
                                .is_some_and(|v| v.equals(value, fold)),
                        }
                })
            })
    })
}

/// Merge the references of a retained current statement with a matching
/// proposal's, honoring the per-statement override and the policy priority
/// order: no current refs / strict overwrite, strict keep, strict
/// keep-append, custom, keep-good.
fn merge_references(
    current: &Statement,
    proposal: &Statement,
    opts: &ReconcileOptions<'_>,
) -> Result<Vec<Reference>> {
    let mode = proposal.ref_mode.unwrap_or(opts.ref_mode);
    if current.references.is_empty() || mode == RefMode::StrictOverwrite {
        return Ok(proposal.references.clone());
    }
    match mode {
        RefMode::StrictOverwrite => unreachable!("handled above"),
        RefMode::StrictKeep => Ok(current.references.clone()),
        RefMode::StrictKeepAppend => {
            let mut merged = current.references.clone();
            merged.extend(proposal.references.iter().cloned());
            Ok(merged)
        }
        RefMode::Custom => {
            let merge = opts.custom_merge.ok_or_else(|| {
                anyhow!("custom reference merge selected but no merge function supplied")
            })?;
            // The function may only change references; everything else of
            // its result is discarded.
            Ok(merge(current, proposal).references)
        }
        RefMode::KeepGood => {
            let fold = opts.cmp.fold_subvalues;
            let mut merged: Vec<Reference> = current
                .references
                .iter()
                .filter(|block| is_good_reference(block, &opts.good_refs, fold))
                .cloned()
                .collect();
            for block in &proposal.references {
                if !merged.iter().any(|kept| kept.equals(block, fold)) {
                    merged.push(block.clone());
                }
            }
            Ok(merged)
        }
    }
}

/// A working entry: the evolving statement plus whether this round already
/// inserted or updated it (updated entries are exempt from replace-removal).
struct Entry {
    statement: Statement,
    touched: bool,
}

/// Produce the final statement list from authoritative current statements
/// and a set of proposals, each proposal carrying its merge mode.
pub fn reconcile(
    current: &[Statement],
    proposed: &[Statement],
    opts: &ReconcileOptions<'_>,
) -> Result<Vec<Statement>> {
    let mut out: Vec<Entry> = current
        .iter()
        .map(|statement| Entry {
            statement: statement.clone(),
            touched: false,
        })
        .collect();

    // Group proposals per property, in order of first appearance
    let mut order: Vec<&PropertyId> = Vec::new();
    let mut seen: BTreeSet<&PropertyId> = BTreeSet::new();
    for statement in proposed {
        if seen.insert(statement.property()) {
            order.push(statement.property());
        }
    }

    for property in order {
        let group: Vec<&Statement> = proposed
            .iter()
            .filter(|s| s.property() == property)
            .collect();

        // 1. Global deletion marker: remove everything, skip the rest
        if group.iter().any(|s| s.is_deletion_marker()) {
            let mut marked = 0;
            for entry in out.iter_mut().filter(|e| e.statement.property() == property) {
                entry.statement.removed = true;
                marked += 1;
            }
            debug!(property = %property, marked, "deletion marker removes property");
            continue;
        }

        // 2. KEEP: discard when the property already has statements
        for proposal in group.iter().copied().filter(|s| s.mode == MergeMode::Keep) {
            if out.iter().any(|e| e.statement.property() == property) {
                trace!(property = %property, "keep proposal discarded, property present");
            } else {
                insert_new(&mut out, proposal);
            }
        }

        // 3. APPEND / FORCE_APPEND
        for proposal in group
            .iter()
            .copied()
            .filter(|s| matches!(s.mode, MergeMode::Append | MergeMode::ForceAppend))
        {
            // FORCE_APPEND skips the counterpart search entirely, so it can
            // create exact duplicates; that is its contract.
            let counterpart = if proposal.mode == MergeMode::ForceAppend {
                None
            } else {
                out.iter().position(|e| {
                    e.statement.property() == property
                        && e.statement.equal_value(proposal, &opts.cmp)
                })
            };
            match counterpart {
                Some(idx) => {
                    let merged = merge_references(&out[idx].statement, proposal, opts)?;
                    let entry = &mut out[idx];
                    entry.statement.rank = proposal.rank;
                    entry.statement.removed = false;
                    entry.statement.references = merged;
                    entry.touched = true;
                }
                None => insert_new(&mut out, proposal),
            }
        }

        // 4. REPLACE_ALL (default): pair equal-valued statements, remove the
        //    rest, insert what had no counterpart
        let replacements: Vec<&Statement> = group
            .iter()
            .filter(|s| s.mode == MergeMode::Replace)
            .copied()
            .collect();
        if replacements.is_empty() {
            continue;
        }
        let mut used = vec![false; replacements.len()];
        for entry in out
            .iter_mut()
            .filter(|e| e.statement.property() == property && !e.touched)
        {
            let matched = (0..replacements.len()).find(|&i| {
                !used[i] && entry.statement.equal_value(replacements[i], &opts.cmp)
            });
            match matched {
                Some(i) => {
                    used[i] = true;
                    let proposal = replacements[i];
                    let merged = merge_references(&entry.statement, proposal, opts)?;
                    entry.statement.removed = false;
                    entry.statement.rank = proposal.rank;
                    entry.statement.references = merged;
                    entry.touched = true;
                }
                None => {
                    let fold = opts.cmp.fold_subvalues;
                    let spared = opts.keep_good_ref_statements
                        && entry
                            .statement
                            .references
                            .iter()
                            .any(|block| is_good_reference(block, &opts.good_refs, fold));
                    if spared {
                        trace!(property = %property, "statement spared by good reference");
                    } else {
                        entry.statement.removed = true;
                    }
                }
            }
        }
        for (i, proposal) in replacements.iter().enumerate() {
            if !used[i] {
                insert_new(&mut out, proposal);
            }
        }
    }

    // Removal-flagged statements the remote store never saw need no removal
    // instruction
    Ok(out
        .into_iter()
        .map(|entry| entry.statement)
        .filter(|statement| !statement.is_droppable_removal())
        .collect())
}

/// Insert a proposal as a brand-new statement, positioned immediately after
/// the last statement of the same property so same-property statements stay
/// contiguous
fn insert_new(out: &mut Vec<Entry>, proposal: &Statement) {
    let mut statement = proposal.clone();
    statement.remote_id = None;
    statement.removed = false;
    let position = out
        .iter()
        .rposition(|e| e.statement.property() == statement.property())
        .map(|i| i + 1)
        .unwrap_or(out.len());
    out.insert(
        position,
        Entry {
            statement,
            touched: true,
        },
    );
}
