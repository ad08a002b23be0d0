// sqlx::Error -> AppError

use medtrack_core::error::AppError;

/// Convert sqlx::Error to AppError with structured information
///
/// Constraint violations surface as Conflict / Validation so the API can
/// answer 409 / 400 instead of 500.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let Some(code) = db_err.code() else {
                return AppError::Database(format!("Database error: {}", db_err.message()));
            };

            // SQLite extended result codes: https://www.sqlite.org/rescode.html
            match code.as_ref() {
                // UNIQUE / PRIMARY KEY constraint failed
                "2067" | "1555" => AppError::Conflict(db_err.message().to_string()),
                // FOREIGN KEY constraint failed
                "787" => AppError::Validation(format!(
                    "Referenced record does not exist: {}",
                    db_err.message()
                )),
                // CHECK constraint failed
                "275" => AppError::Validation(db_err.message().to_string()),
                "5" => AppError::Database(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                other => AppError::Database(format!(
                    "Database error [{}]: {}",
                    other,
                    db_err.message()
                )),
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}
