//! The four cleaning steps, applied in a fixed order:
//! null-fill, price filter, date coercion, bounding-box filter.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, info, instrument, warn};

use crate::constants::{
    is_missing, LAST_REVIEW, LATITUDE, LONGITUDE, MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE,
    MIN_LONGITUDE, PRICE, REVIEWS_FILL_VALUE, REVIEWS_PER_MONTH,
};
use crate::dataset::{parse_number, Dataset};
use crate::error::Result;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const DATE_OUTPUT: &str = "%Y-%m-%d";
const DATETIME_OUTPUT: &str = "%Y-%m-%d %H:%M:%S";

/// Inclusive price bounds supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

impl PriceRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min as f64 <= price && price <= self.max as f64
    }
}

/// Runs every cleaning step over `dataset`.
#[instrument(skip(dataset), fields(rows_in = dataset.height()))]
pub fn clean(mut dataset: Dataset, prices: &PriceRange) -> Result<Dataset> {
    let rows_in = dataset.height();

    info!("fillna for '{}'", REVIEWS_PER_MONTH);
    fill_missing_reviews(&mut dataset)?;

    info!(
        "Drop outliers '{}' outside of {} and {}",
        PRICE, prices.min, prices.max
    );
    if prices.min > prices.max {
        warn!("min_price is greater than max_price, every row will be dropped");
    }
    filter_price(&mut dataset, prices)?;
    debug!(rows = dataset.height(), "after price filter");

    info!("Convert '{}' to datetime", LAST_REVIEW);
    parse_last_review(&mut dataset)?;

    info!("Drop rows outside of the NYC bounding box");
    filter_bounding_box(&mut dataset)?;
    debug!(rows = dataset.height(), "after bounding box filter");

    info!(rows_in, rows_out = dataset.height(), "Cleaning finished");
    Ok(dataset)
}

/// Step 1: missing `reviews_per_month` becomes `0`. Never drops rows.
pub fn fill_missing_reviews(dataset: &mut Dataset) -> Result<()> {
    dataset.map_column(REVIEWS_PER_MONTH, |cell| {
        if is_missing(cell) {
            REVIEWS_FILL_VALUE.to_string()
        } else {
            cell.to_string()
        }
    })
}

/// Step 2: keep rows with `min <= price <= max`. Missing prices are dropped.
pub fn filter_price(dataset: &mut Dataset, prices: &PriceRange) -> Result<()> {
    let idx = dataset.column_index(PRICE)?;
    dataset.retain(|row| parse_number(&row[idx]).is_some_and(|p| prices.contains(p)));
    Ok(())
}

/// Step 3: coerce `last_review` to a date. Unparseable values become null
/// (an empty cell) and the row is kept.
///
/// The whole column is rendered as plain dates when every parsed value falls
/// on midnight, otherwise as full timestamps.
pub fn parse_last_review(dataset: &mut Dataset) -> Result<()> {
    let parsed: Vec<Option<NaiveDateTime>> = dataset
        .column(LAST_REVIEW)?
        .into_iter()
        .map(parse_datetime)
        .collect();

    let date_only = parsed.iter().flatten().all(|dt| is_midnight(dt));
    let format = if date_only { DATE_OUTPUT } else { DATETIME_OUTPUT };

    let rendered = parsed
        .into_iter()
        .map(|dt| dt.map(|d| d.format(format).to_string()).unwrap_or_default())
        .collect();
    dataset.replace_column(LAST_REVIEW, rendered)
}

/// Step 4: keep rows inside the fixed NYC bounding box.
pub fn filter_bounding_box(dataset: &mut Dataset) -> Result<()> {
    let lon_idx = dataset.column_index(LONGITUDE)?;
    let lat_idx = dataset.column_index(LATITUDE)?;
    dataset.retain(|row| {
        match (parse_number(&row[lon_idx]), parse_number(&row[lat_idx])) {
            (Some(lon), Some(lat)) => in_bounding_box(lon, lat),
            _ => false,
        }
    });
    Ok(())
}

pub fn in_bounding_box(longitude: f64, latitude: f64) -> bool {
    (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude)
        && (MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude)
}

fn is_midnight(dt: &NaiveDateTime) -> bool {
    dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 && dt.nanosecond() == 0
}

/// Parses a date or timestamp cell; missing and malformed values give `None`.
pub fn parse_datetime(cell: &str) -> Option<NaiveDateTime> {
    if is_missing(cell) {
        return None;
    }
    let cell = cell.trim();

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cell, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(cell).ok().map(|dt| dt.naive_utc())
}
