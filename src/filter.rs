//! Interlinked multi-dimension filtering.
//!
//! A row survives `apply` when, for every dimension with a non-empty
//! selection, its value is one of the selected values. Option lists are
//! always recomputed from the surviving rows, so selectors narrow each other.

use crate::schema::{AnalyticalRow, Dimension};
use crate::utils::{month_label_index, MONTH_ABBREVIATIONS};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Active selections per dimension. A missing or empty set means no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FilterState {
    selections: BTreeMap<Dimension, BTreeSet<String>>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(dimension, values);
        self
    }

    /// Replaces the selection for one dimension.
    pub fn set<I, S>(&mut self, dimension: Dimension, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.selections.remove(&dimension);
        } else {
            self.selections.insert(dimension, values);
        }
    }

    pub fn clear(&mut self, dimension: Dimension) {
        self.selections.remove(&dimension);
    }

    pub fn selected(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        self.selections.get(&dimension).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.selections.values().all(BTreeSet::is_empty)
    }

    pub fn matches(&self, row: &AnalyticalRow) -> bool {
        self.selections
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .all(|(dimension, values)| values.contains(dimension.value_of(row)))
    }

    /// Drops selected values that are not offered in `options`.
    pub fn pruned(&self, options: &BTreeMap<Dimension, Vec<String>>) -> FilterState {
        let mut next = FilterState::new();
        for (dimension, values) in &self.selections {
            let offered = options.get(dimension);
            let kept: Vec<&String> = values
                .iter()
                .filter(|v| offered.is_some_and(|o| o.contains(*v)))
                .collect();
            if kept.len() < values.len() {
                debug!(
                    "Dropping {} stale {} selection(s)",
                    values.len() - kept.len(),
                    dimension
                );
            }
            next.set(*dimension, kept.into_iter().cloned());
        }
        next
    }
}

/// Rows matching every active selection, in input order.
pub fn apply<'a>(rows: &'a [AnalyticalRow], state: &FilterState) -> Vec<&'a AnalyticalRow> {
    rows.iter().filter(|row| state.matches(row)).collect()
}

/// Positions of the rows matching every active selection.
pub fn matching_indices(rows: &[AnalyticalRow], state: &FilterState) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| state.matches(row))
        .map(|(i, _)| i)
        .collect()
}

/// Distinct non-empty values of `dimension` in `rows`.
///
/// Sorted lexicographically, except months, which follow calendar order.
pub fn available_options<'a, I>(rows: I, dimension: Dimension) -> Vec<String>
where
    I: IntoIterator<Item = &'a AnalyticalRow>,
{
    let distinct: BTreeSet<&str> = rows
        .into_iter()
        .map(|row| dimension.value_of(row))
        .filter(|v| !v.is_empty())
        .collect();

    match dimension {
        Dimension::Month => MONTH_ABBREVIATIONS
            .iter()
            .filter(|m| distinct.contains(*m))
            .map(|m| m.to_string())
            .collect(),
        _ => distinct.into_iter().map(str::to_string).collect(),
    }
}

pub fn options_for_all<'a>(rows: &[&'a AnalyticalRow]) -> BTreeMap<Dimension, Vec<String>> {
    Dimension::ALL
        .iter()
        .map(|d| (*d, available_options(rows.iter().copied(), *d)))
        .collect()
}

/// The subset for `state`, every dimension's option list over that subset,
/// and the state with values no longer offered removed.
#[derive(Debug, Clone)]
pub struct FilterOutcome<'a> {
    pub indices: Vec<usize>,
    pub subset: Vec<&'a AnalyticalRow>,
    pub options: BTreeMap<Dimension, Vec<String>>,
    pub effective_state: FilterState,
}

pub fn compute_options_and_subset<'a>(
    rows: &'a [AnalyticalRow],
    state: &FilterState,
) -> FilterOutcome<'a> {
    let indices = matching_indices(rows, state);
    let subset: Vec<&AnalyticalRow> = indices.iter().map(|&i| &rows[i]).collect();
    let options = options_for_all(&subset);
    let effective_state = state.pruned(&options);

    debug!(
        "Filter recompute: {} of {} rows kept",
        subset.len(),
        rows.len()
    );

    FilterOutcome {
        indices,
        subset,
        options,
        effective_state,
    }
}

/// Sort key placing month labels in calendar order.
pub fn month_order(label: &str) -> usize {
    month_label_index(label).unwrap_or(MONTH_ABBREVIATIONS.len())
}
