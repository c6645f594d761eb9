use std::collections::HashMap;
use chrono::{Duration, NaiveDate};
use futures_util::future::join_all;
use serde::Serialize;
use fareline_core::{CoreResult, TrendKey};
use crate::aggregator::ResultAggregator;
use crate::session::SearchSnapshot;
use crate::trend_cache::{FareTrendCache, TrendPrice};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CellPrice {
    Loading,
    Available { amount: i64, currency: String },
    Unavailable,
    Past,
}

impl From<TrendPrice> for CellPrice {
    fn from(price: TrendPrice) -> Self {
        match price {
            TrendPrice::Available { amount, currency } => CellPrice::Available { amount, currency },
            TrendPrice::Unavailable => CellPrice::Unavailable,
            TrendPrice::Past => CellPrice::Past,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrendCell {
    pub date: NaiveDate,
    pub selected: bool,
    pub price: CellPrice,
}

/// Sliding window of days around the selected date, each with its cheapest fare.
///
/// The selected day is priced from the live search; every other visible day
/// comes from the [`FareTrendCache`].
pub struct PriceTrendStrip {
    key: TrendKey,
    window_start: NaiveDate,
    window_days: u32,
    shift_days: u32,
    today: NaiveDate,
    aggregator: ResultAggregator,
    resolved: HashMap<NaiveDate, CellPrice>,
    live: CellPrice,
    search_in_flight: bool,
}

impl PriceTrendStrip {
    pub fn new(
        key: TrendKey,
        today: NaiveDate,
        window_days: u32,
        shift_days: u32,
        aggregator: ResultAggregator,
    ) -> Self {
        let window_days = window_days.max(1);
        let window_start = key.date - Duration::days((window_days / 2) as i64);
        Self {
            key,
            window_start,
            window_days,
            shift_days: shift_days.max(1),
            today,
            aggregator,
            resolved: HashMap::new(),
            live: CellPrice::Loading,
            search_in_flight: false,
        }
    }

    pub fn selected(&self) -> NaiveDate {
        self.key.date
    }

    pub fn key(&self) -> &TrendKey {
        &self.key
    }

    pub fn window_start(&self) -> NaiveDate {
        self.window_start
    }

    pub fn search_in_flight(&self) -> bool {
        self.search_in_flight
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.window_days as i64)
            .map(|offset| self.window_start + Duration::days(offset))
            .collect()
    }

    fn is_past(&self, date: NaiveDate) -> bool {
        date < self.today
    }

    /// Fold a live search snapshot into the selected day's cell. Snapshots
    /// for another route, day or passenger mix are ignored.
    pub fn apply_search(&mut self, snapshot: &SearchSnapshot) -> bool {
        if snapshot.request.trend_key() != self.key {
            return false;
        }
        self.search_in_flight = !snapshot.is_complete();
        self.live = match self.aggregator.cheapest(&snapshot.flights, &self.key.passengers) {
            Some(fare) => CellPrice::Available { amount: fare.amount, currency: fare.currency },
            None if snapshot.is_complete() => CellPrice::Unavailable,
            None => CellPrice::Loading,
        };
        true
    }

    /// Visible days still waiting on the cache.
    pub fn pending_dates(&self) -> Vec<NaiveDate> {
        self.dates()
            .into_iter()
            .filter(|date| !self.is_past(*date) && *date != self.key.date && !self.resolved.contains_key(date))
            .collect()
    }

    /// Resolve every pending day concurrently.
    pub async fn load(&mut self, cache: &FareTrendCache) -> CoreResult<()> {
        let dates = self.pending_dates();
        let keys: Vec<TrendKey> = dates.iter().map(|date| self.key.on(*date)).collect();
        let prices = join_all(keys.iter().map(|key| cache.get(key))).await;

        for (date, price) in dates.into_iter().zip(prices) {
            self.resolved.insert(date, price?.into());
        }
        Ok(())
    }

    pub fn cells(&self) -> Vec<TrendCell> {
        self.dates()
            .into_iter()
            .map(|date| {
                let selected = date == self.key.date;
                let price = if self.is_past(date) {
                    CellPrice::Past
                } else if selected {
                    self.live.clone()
                } else {
                    self.resolved.get(&date).cloned().unwrap_or(CellPrice::Loading)
                };
                TrendCell { date, selected, price }
            })
            .collect()
    }

    /// Shift the window back. Never starts earlier than today once it has
    /// moved past it; returns false when there is nothing earlier to show.
    pub fn previous(&mut self) -> bool {
        if self.window_start <= self.today {
            return false;
        }
        let shifted = self.window_start - Duration::days(self.shift_days as i64);
        self.window_start = shifted.max(self.today);
        true
    }

    pub fn next(&mut self) -> bool {
        self.window_start += Duration::days(self.shift_days as i64);
        true
    }

    /// Pick a new day. Ignored for past days, the current selection, days
    /// outside the window and while a search is still running. On success
    /// returns the key the caller should search next.
    pub fn select(&mut self, date: NaiveDate) -> Option<TrendKey> {
        if self.search_in_flight
            || self.is_past(date)
            || date == self.key.date
            || !self.dates().contains(&date)
        {
            return None;
        }
        self.key = self.key.on(date);
        self.live = CellPrice::Loading;
        self.search_in_flight = true;
        Some(self.key.clone())
    }
}
