//! Conversions from external infrastructure errors into domain errors.

use landfall_domain::LandfallError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub LandfallError);

impl From<InfraError> for LandfallError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<LandfallError> for InfraError {
    fn from(value: LandfallError) -> Self {
        InfraError(value)
    }
}

trait IntoLandfallError {
    fn into_landfall(self) -> LandfallError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → LandfallError */
/* -------------------------------------------------------------------------- */

impl IntoLandfallError for SqlError {
    fn into_landfall(self) -> LandfallError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        LandfallError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        LandfallError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => LandfallError::Database(format!(
                        "unique constraint violation: {message}"
                    )),
                    (ErrorCode::NotADatabase, _) => {
                        LandfallError::Database("file is not a SQLite database".into())
                    }
                    _ => LandfallError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => LandfallError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                LandfallError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                LandfallError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => LandfallError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => LandfallError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_landfall())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → LandfallError */
/* -------------------------------------------------------------------------- */

impl IntoLandfallError for r2d2::Error {
    fn into_landfall(self) -> LandfallError {
        LandfallError::Database(format!("connection pool: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_landfall())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → LandfallError */
/* -------------------------------------------------------------------------- */

impl IntoLandfallError for HttpError {
    fn into_landfall(self) -> LandfallError {
        if self.is_timeout() {
            return LandfallError::Timeout("HTTP request timed out".into());
        }

        if self.is_decode() {
            return LandfallError::Format(format!("response body could not be decoded: {self}"));
        }

        if self.is_connect() {
            return LandfallError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return LandfallError::Network(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            ));
        }

        LandfallError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_landfall())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
