use sqlx::postgres::PgRow;
use sqlx::Row;

use servicing_api::{ServicingError, ServicingResult};

/// Read a VARCHAR column and parse it into its domain enum.
pub(crate) fn parse_col<T>(row: &PgRow, column: &str) -> ServicingResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row
        .try_get(column)
        .map_err(ServicingError::from)?;
    raw.parse().map_err(|e: T::Err| ServicingError::ValidationError {
        field: column.to_string(),
        message: e.to_string(),
    })
}

/// Read a nullable VARCHAR column and parse it when present.
pub(crate) fn parse_col_opt<T>(row: &PgRow, column: &str) -> ServicingResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = row
        .try_get(column)
        .map_err(ServicingError::from)?;
    raw.map(|value| {
        value.parse().map_err(|e: T::Err| ServicingError::ValidationError {
            field: column.to_string(),
            message: e.to_string(),
        })
    })
    .transpose()
}
