//! Transaction matching
//!
//! Pairs statement lines to unreconciled ledger entries with a greedy,
//! highest-confidence-first, one-to-one assignment. Amount agreement
//! (within the rounding epsilon) is a hard filter; dates, references,
//! and descriptions only contribute to the confidence score.
//!
//! Given identical inputs the output is byte-for-byte identical across
//! runs: candidates are fully ordered (score, date distance, line
//! number, entry id) and no hash-ordered iteration is involved.

use std::collections::BTreeSet;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    rounding_epsilon, LedgerEntry, Match, MatchReason, MatchSet, StatementLine,
};

/// Tunable scoring weights and thresholds.
///
/// Defaults: auto at 0.9, suggested at 0.7, date window ±3 days,
/// component weights 0.5 (exact date) / 0.25 (near date) / 0.3
/// (reference) / 0.2 (description overlap). The date components are
/// mutually exclusive; all other components are additive and the total
/// is clamped to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Score at or above which a pairing is accepted without review
    pub auto_threshold: f64,
    /// Score at or above which a pairing is offered for review
    pub suggested_threshold: f64,
    /// Maximum date distance, in days, for the near-date signal
    pub date_window_days: i64,
    /// Hard filter: amounts must agree within this epsilon
    pub amount_epsilon: BigDecimal,
    pub exact_date_weight: f64,
    pub near_date_weight: f64,
    pub reference_weight: f64,
    pub description_weight: f64,
    /// Minimum token-overlap ratio for the description signal
    pub token_overlap_ratio: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            auto_threshold: 0.9,
            suggested_threshold: 0.7,
            date_window_days: 3,
            amount_epsilon: rounding_epsilon(),
            exact_date_weight: 0.5,
            near_date_weight: 0.25,
            reference_weight: 0.3,
            description_weight: 0.2,
            token_overlap_ratio: 0.5,
        }
    }
}

struct Candidate {
    line_no: u32,
    entry_id: String,
    score: f64,
    date_distance: i64,
    reasons: Vec<MatchReason>,
}

/// Classify statement lines against unreconciled ledger entries.
///
/// Never fails on well-formed input; a statement with zero lines
/// yields an empty [`MatchSet`] carrying every entry as unmatched.
pub fn match_statement(
    lines: &[StatementLine],
    entries: &[LedgerEntry],
    config: &MatcherConfig,
) -> MatchSet {
    let mut candidates = Vec::new();
    for line in lines {
        for entry in entries {
            if (&line.amount - &entry.amount).abs() > config.amount_epsilon {
                continue;
            }
            let (score, reasons, date_distance) = score_pair(line, entry, config);
            if score >= config.suggested_threshold {
                candidates.push(Candidate {
                    line_no: line.line_no,
                    entry_id: entry.entry_id.clone(),
                    score,
                    date_distance,
                    reasons,
                });
            }
        }
    }

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.date_distance.cmp(&b.date_distance))
            .then(a.line_no.cmp(&b.line_no))
            .then(a.entry_id.cmp(&b.entry_id))
    });

    let mut used_lines: BTreeSet<u32> = BTreeSet::new();
    let mut used_entries: BTreeSet<String> = BTreeSet::new();
    let mut auto = Vec::new();
    let mut suggested = Vec::new();

    for candidate in candidates {
        if used_lines.contains(&candidate.line_no) || used_entries.contains(&candidate.entry_id) {
            continue;
        }
        used_lines.insert(candidate.line_no);
        used_entries.insert(candidate.entry_id.clone());

        let accepted = Match {
            line_no: candidate.line_no,
            entry_id: candidate.entry_id,
            score: candidate.score,
            reasons: candidate.reasons,
        };
        if candidate.score >= config.auto_threshold {
            auto.push(accepted);
        } else {
            suggested.push(accepted);
        }
    }

    auto.sort_by_key(|m| m.line_no);
    suggested.sort_by_key(|m| m.line_no);

    let unmatched_lines = lines
        .iter()
        .filter(|l| !used_lines.contains(&l.line_no))
        .cloned()
        .collect();
    let mut unmatched_entries: Vec<LedgerEntry> = entries
        .iter()
        .filter(|e| !used_entries.contains(&e.entry_id))
        .cloned()
        .collect();
    unmatched_entries.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));

    MatchSet {
        auto,
        suggested,
        unmatched_lines,
        unmatched_entries,
    }
}

fn score_pair(
    line: &StatementLine,
    entry: &LedgerEntry,
    config: &MatcherConfig,
) -> (f64, Vec<MatchReason>, i64) {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    let date_distance = (line.date - entry.date).num_days().abs();
    if date_distance == 0 {
        score += config.exact_date_weight;
        reasons.push(MatchReason::ExactDate);
    } else if date_distance <= config.date_window_days {
        score += config.near_date_weight;
        reasons.push(MatchReason::NearDate);
    }

    if reference_matches(line, entry) {
        score += config.reference_weight;
        reasons.push(MatchReason::ReferenceMatch);
    }

    let line_tokens = tokens(&join_text(line.description.as_str(), line.reference.as_deref()));
    let entry_tokens = tokens(&join_text(
        entry.description.as_str(),
        entry.reference.as_deref(),
    ));
    if token_overlap(&line_tokens, &entry_tokens) >= config.token_overlap_ratio {
        score += config.description_weight;
        reasons.push(MatchReason::DescriptionOverlap);
    }

    (score.min(1.0), reasons, date_distance)
}

/// A reference signal fires when the entry's reference appears in the
/// line (or vice versa) as a case-insensitive substring, or when all
/// of its tokens appear in the line in any order. The token form
/// covers reordered references such as "SMITH J" vs "J SMITH".
fn reference_matches(line: &StatementLine, entry: &LedgerEntry) -> bool {
    let needle = match entry.reference.as_deref() {
        Some(r) if !r.trim().is_empty() => r.to_uppercase(),
        _ => return false,
    };
    let hay = join_text(line.description.as_str(), line.reference.as_deref()).to_uppercase();

    if hay.contains(&needle) {
        return true;
    }
    if let Some(line_ref) = line.reference.as_deref() {
        let line_ref = line_ref.to_uppercase();
        if !line_ref.trim().is_empty() && needle.contains(&line_ref) {
            return true;
        }
    }

    let needle_tokens = tokens(&needle);
    !needle_tokens.is_empty() && needle_tokens.is_subset(&tokens(&hay))
}

fn join_text(description: &str, reference: Option<&str>) -> String {
    match reference {
        Some(r) => format!("{} {}", description, r),
        None => description.to_string(),
    }
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_uppercase())
        .collect()
}

fn token_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / a.len().min(b.len()) as f64
}
