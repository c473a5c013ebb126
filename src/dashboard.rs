use crate::aggregation::{
    distinct_values, kpis, top_by_count, top_by_sum, ChartSeries, KpiSummary, TopByCount, TopBySum,
};
use crate::filter::{compute_options_and_subset, FilterState};
use crate::forecast::{forecast, ForecastResult};
use crate::ingestion::NormalizedDataset;
use crate::schema::{AnalyticalRow, Dimension, Measure};
use log::debug;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Highlights {
    pub top_selling_product: Option<TopByCount>,
    pub most_profitable_product: Option<TopBySum>,
    pub most_active_country: Option<TopByCount>,
    pub best_category_by_profit: Option<TopBySum>,
}

impl Highlights {
    pub fn build(subset: &[&AnalyticalRow]) -> Self {
        Self {
            top_selling_product: top_by_count(subset, Dimension::Product),
            most_profitable_product: top_by_sum(subset, Dimension::Product, Measure::Profit),
            most_active_country: top_by_count(subset, Dimension::Country),
            best_category_by_profit: top_by_sum(subset, Dimension::Category, Measure::Profit),
        }
    }
}

/// Everything the dashboard renders for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct DashboardView {
    /// Indices into the dataset's rows, in dataset order.
    pub subset: Vec<usize>,
    pub options: BTreeMap<Dimension, Vec<String>>,
    /// The submitted state minus selections that are no longer offered.
    pub effective_state: FilterState,
    pub kpis: KpiSummary,
    pub highlights: Highlights,
    /// Chip lists for category, product and age group.
    pub chips: BTreeMap<Dimension, Vec<String>>,
    pub charts: ChartSeries,
}

impl DashboardView {
    pub fn compute(rows: &[AnalyticalRow], state: &FilterState) -> Self {
        let outcome = compute_options_and_subset(rows, state);
        let subset = &outcome.subset;

        let chips = [Dimension::Category, Dimension::Product, Dimension::AgeGroup]
            .into_iter()
            .map(|d| (d, distinct_values(subset, d)))
            .collect();

        Self {
            kpis: kpis(subset),
            highlights: Highlights::build(subset),
            charts: ChartSeries::build(subset),
            chips,
            subset: outcome.indices,
            options: outcome.options,
            effective_state: outcome.effective_state,
        }
    }

    pub fn rows<'a>(&self, rows: &'a [AnalyticalRow]) -> Vec<&'a AnalyticalRow> {
        self.subset.iter().filter_map(|&i| rows.get(i)).collect()
    }
}

/// A pending recompute for one submitted filter state.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub revision: u64,
    pub state: FilterState,
}

/// Filter state for one viewer of a loaded dataset.
///
/// Recomputes may run concurrently; only the result for the most recently
/// submitted state is committed.
pub struct FilterSession {
    dataset: Arc<NormalizedDataset>,
    latest: AtomicU64,
    committed: Mutex<Committed>,
}

#[derive(Debug, Clone, Default)]
struct Committed {
    /// Revision of the last accepted commit or reset.
    revision: u64,
    /// The state whose subset is on screen.
    applied: FilterState,
    /// `applied` with stale values removed; the next recompute starts here.
    selection: FilterState,
}

impl FilterSession {
    pub fn new(dataset: Arc<NormalizedDataset>) -> Self {
        Self {
            dataset,
            latest: AtomicU64::new(0),
            committed: Mutex::new(Committed::default()),
        }
    }

    pub fn dataset(&self) -> &NormalizedDataset {
        &self.dataset
    }

    pub fn submit(&self, state: FilterState) -> Ticket {
        let revision = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { revision, state }
    }

    pub fn compute(&self, ticket: &Ticket) -> DashboardView {
        DashboardView::compute(&self.dataset.rows, &ticket.state)
    }

    /// Stores the view's effective state if `ticket` is still the latest
    /// submission; superseded results are discarded.
    ///
    /// The revision check runs under the same lock as the write, so a result
    /// that waited on the lock cannot overwrite a newer one.
    pub fn commit(&self, ticket: Ticket, view: DashboardView) -> Option<DashboardView> {
        let mut committed = self.lock_committed();
        let latest = self.latest.load(Ordering::SeqCst);
        if ticket.revision != latest || ticket.revision <= committed.revision {
            debug!(
                "Discarding filter result for revision {} (latest is {})",
                ticket.revision, latest
            );
            return None;
        }
        *committed = Committed {
            revision: ticket.revision,
            applied: ticket.state,
            selection: view.effective_state.clone(),
        };
        Some(view)
    }

    /// Submits, computes and commits in one step.
    pub fn update(&self, state: FilterState) -> Option<DashboardView> {
        let ticket = self.submit(state);
        let view = self.compute(&ticket);
        self.commit(ticket, view)
    }

    pub fn reset(&self) -> DashboardView {
        {
            let mut committed = self.lock_committed();
            let revision = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
            *committed = Committed {
                revision,
                ..Committed::default()
            };
        }
        DashboardView::compute(&self.dataset.rows, &FilterState::new())
    }

    /// The active selection, with stale values already dropped.
    pub fn current_state(&self) -> FilterState {
        self.lock_committed().selection.clone()
    }

    /// Forecast over the subset of the last committed view.
    pub fn forecast_current(&self, horizon: i64) -> ForecastResult {
        let state = self.lock_committed().applied.clone();
        let rows = &self.dataset.rows;
        forecast(rows.iter().filter(|row| state.matches(row)), horizon)
    }

    fn lock_committed(&self) -> MutexGuard<'_, Committed> {
        self.committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::{normalize, RawTable};

    const CSV: &str = "\
Customer Name,Age,Country,Product,Purchase Date,Purchase Amount,Payment Mode,Category,Selling Price
Asha,22,India,Phone,2025-01-05,60,UPI,Electronics,100
Ben,35,UK,Lamp,2025-02-11,80,Card,Home,150
Chen,52,India,Desk,2025-03-20,90,Cash,Home,200
Dara,17,USA,Phone,2025-03-22,70,UPI,Electronics,120
";

    fn session() -> FilterSession {
        let raw = RawTable::from_csv_reader(CSV.as_bytes()).unwrap();
        FilterSession::new(Arc::new(normalize(&raw).unwrap()))
    }

    #[test]
    fn test_view_for_filtered_state() {
        let session = session();
        let state = FilterState::new().with(Dimension::Country, ["India"]);
        let view = session.update(state.clone()).unwrap();

        assert_eq!(view.subset, vec![0, 2]);
        assert_eq!(view.kpis.turnover, 300.0);
        assert_eq!(view.kpis.transaction_count, 2);
        assert_eq!(view.options[&Dimension::Product], vec!["Desk", "Phone"]);
        assert_eq!(view.options[&Dimension::Month], vec!["Jan", "Mar"]);
        assert_eq!(view.chips[&Dimension::AgeGroup], vec!["Middle", "Youth"]);
        assert_eq!(
            view.highlights.best_category_by_profit.as_ref().map(|t| t.value.as_str()),
            Some("Home")
        );
        assert_eq!(session.current_state(), state);

        let rows = view.rows(&session.dataset().rows);
        assert_eq!(rows[1].customer, "Chen");
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let session = session();
        let first = session.submit(FilterState::new().with(Dimension::Category, ["Home"]));
        let second = session.submit(FilterState::new().with(Dimension::Category, ["Electronics"]));

        let second_view = session.compute(&second);
        let first_view = session.compute(&first);

        assert!(session.commit(second, second_view).is_some());
        assert!(session.commit(first, first_view).is_none());
        assert_eq!(
            session.current_state(),
            FilterState::new().with(Dimension::Category, ["Electronics"])
        );
    }

    #[test]
    fn test_commit_waiting_on_lock_loses_to_newer_submission() {
        let session = session();
        let first = session.submit(FilterState::new().with(Dimension::Country, ["UK"]));

        std::thread::scope(|scope| {
            let guard = session.lock_committed();
            let waiting = scope.spawn(|| {
                let view = session.compute(&first);
                session.commit(first, view)
            });

            let second = session.submit(FilterState::new().with(Dimension::Country, ["India"]));
            drop(guard);

            assert!(waiting.join().unwrap().is_none());
            let view = session.compute(&second);
            assert!(session.commit(second, view).is_some());
        });

        assert_eq!(
            session.current_state(),
            FilterState::new().with(Dimension::Country, ["India"])
        );
    }

    #[test]
    fn test_reset_supersedes_pending_result() {
        let session = session();
        let ticket = session.submit(FilterState::new().with(Dimension::Country, ["UK"]));
        let view = session.compute(&ticket);
        session.reset();
        assert!(session.commit(ticket, view).is_none());
        assert!(session.current_state().is_empty());
    }

    #[test]
    fn test_stale_values_leave_the_selection() {
        let session = session();
        let state = FilterState::new()
            .with(Dimension::Category, ["Home"])
            .with(Dimension::Product, ["Phone", "Lamp"]);
        let view = session.update(state).unwrap();

        assert_eq!(view.subset, vec![1]);
        assert_eq!(
            session.current_state(),
            FilterState::new()
                .with(Dimension::Category, ["Home"])
                .with(Dimension::Product, ["Lamp"])
        );
    }

    #[test]
    fn test_forecast_uses_current_filters() {
        let session = session();
        session.update(FilterState::new().with(Dimension::Category, ["Electronics"]));

        let result = session.forecast_current(3);
        let periods: Vec<&str> = result.history.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2025-01", "2025-03"]);
        assert_eq!(result.history[1].sales, 120.0);
        assert_eq!(result.next_month_value, 120.0);
        assert!(!result.note.is_empty());
    }

    #[test]
    fn test_reset_clears_selection() {
        let session = session();
        session.update(FilterState::new().with(Dimension::Country, ["UK"]));
        let view = session.reset();
        assert!(session.current_state().is_empty());
        assert_eq!(view.subset.len(), 4);
        assert_eq!(session.forecast_current(1).history.len(), 3);
    }
}
