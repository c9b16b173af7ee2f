// Filter state - Validated, atomically replaced filter selection
use crate::domain::error::DashboardError;
use crate::domain::filter::{FilterDomains, FilterRequest, FilterSelection};
use tokio::sync::watch;

pub struct FilterState {
    tx: watch::Sender<FilterSelection>,
}

impl FilterState {
    pub fn new(initial: FilterSelection) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Validate every field, then swap in the whole selection. On error the
    /// active selection is left as it was.
    pub fn set(&self, request: &FilterRequest) -> Result<FilterSelection, DashboardError> {
        let selection = FilterSelection::try_from(request)?;
        self.replace(selection);
        Ok(selection)
    }

    pub fn replace(&self, selection: FilterSelection) {
        let previous = self.tx.send_replace(selection);
        if previous != selection {
            tracing::debug!(
                "Filters changed: dateRange={} category={} region={}",
                selection.date_range.as_str(),
                selection.category.as_str(),
                selection.region.as_str()
            );
        }
    }

    pub fn current(&self) -> FilterSelection {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterSelection> {
        self.tx.subscribe()
    }

    pub fn domains(&self) -> FilterDomains {
        FilterDomains::new()
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(FilterSelection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::{Category, DateRange, Region};
    use std::sync::Arc;

    #[test]
    fn test_invalid_value_keeps_prior_selection() {
        let state = FilterState::default();
        state.set(&FilterRequest::new("30d", "sales", "europe")).unwrap();
        let before = state.current();

        let err = state
            .set(&FilterRequest::new("7d", "bogus", "all"))
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidFilterValue { field: "category", .. }));
        assert_eq!(state.current(), before);
    }

    #[test]
    fn test_set_replaces_every_field() {
        let state = FilterState::default();
        let selection = state.set(&FilterRequest::new("1y", "support", "latam")).unwrap();

        assert_eq!(selection, state.current());
        assert_eq!(state.current().date_range, DateRange::LastYear);
        assert_eq!(state.current().category, Category::Support);
        assert_eq!(state.current().region, Region::Latam);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let state = FilterState::default();
        let mut rx = state.subscribe();

        state.set(&FilterRequest::new("24h", "all", "asia")).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().region, Region::Asia);
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_selection() {
        let state = Arc::new(FilterState::default());
        let a = FilterSelection {
            date_range: DateRange::Last24Hours,
            category: Category::Sales,
            region: Region::Europe,
        };
        let b = FilterSelection {
            date_range: DateRange::LastYear,
            category: Category::Product,
            region: Region::Latam,
        };
        state.replace(a);

        let reader = {
            let state = state.clone();
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    let seen = state.current();
                    assert!(seen == a || seen == b, "torn selection: {:?}", seen);
                }
            })
        };

        for i in 0..10_000 {
            state.replace(if i % 2 == 0 { b } else { a });
        }
        reader.join().unwrap();
    }
}
