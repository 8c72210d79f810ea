/// Job type recorded on every run of this step
pub const JOB_TYPE: &str = "basic_cleaning";

/// Local file the cleaned dataset is written to before upload
pub const PROCESSED_FILENAME: &str = "processed_data.csv";

// Columns touched by the cleaning steps
pub const REVIEWS_PER_MONTH: &str = "reviews_per_month";
pub const PRICE: &str = "price";
pub const LAST_REVIEW: &str = "last_review";
pub const LONGITUDE: &str = "longitude";
pub const LATITUDE: &str = "latitude";

/// Value written into missing `reviews_per_month` cells
pub const REVIEWS_FILL_VALUE: &str = "0";

// NYC bounding box, inclusive on every edge
pub const MIN_LONGITUDE: f64 = -74.25;
pub const MAX_LONGITUDE: f64 = -73.50;
pub const MIN_LATITUDE: f64 = 40.5;
pub const MAX_LATITUDE: f64 = 41.2;

/// Cell values read as missing, matching the default NA set of pandas' CSV reader
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Returns true if the cell would be read as a missing value
pub fn is_missing(cell: &str) -> bool {
    NA_TOKENS.contains(&cell.trim())
}
