//! Row forwarding from sqlx result streams into a sample sink.

use futures_util::{Stream, TryStreamExt};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::domain::{MetricDesc, MetricSample, SampleSink};
use crate::error::CollectorError;

/// Column every collector query aliases its sample value to.
pub const VALUE_COLUMN: &str = "value";

/// Map rows to samples and push them as they arrive.
///
/// Stops at the first row that fails to map (`RowScan`) or the first
/// stream error (`Query`); samples pushed before that stay in the sink
/// and later rows are never touched. Returns the number of samples pushed.
pub async fn forward_rows<St, T, F>(
    mut rows: St,
    sink: &mut dyn SampleSink,
    mut to_sample: F,
) -> Result<usize, CollectorError>
where
    St: Stream<Item = Result<T, sqlx::Error>> + Unpin,
    F: FnMut(&T) -> Result<MetricSample, sqlx::Error>,
{
    let mut pushed = 0;
    while let Some(row) = rows.try_next().await? {
        let sample =
            to_sample(&row).map_err(|source| CollectorError::RowScan { row: pushed, source })?;
        sink.push(sample);
        pushed += 1;
    }
    Ok(pushed)
}

/// Build a sample from a row whose columns are named after `desc.labels`.
///
/// NULL label columns become empty strings.
pub fn row_to_sample(desc: &'static MetricDesc, row: &PgRow) -> Result<MetricSample, sqlx::Error> {
    let value: f64 = row.try_get(VALUE_COLUMN)?;
    let labels = desc
        .labels
        .iter()
        .map(|column| {
            row.try_get::<Option<String>, _>(*column)
                .map(Option::unwrap_or_default)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MetricSample::new(desc, value, labels))
}
