use std::fmt;

/// Error kinds raised by basket, order and ledger stores
#[derive(Debug, Clone)]
pub enum StoreErrorKind {
    /// Connection pool is exhausted
    PoolExhausted,
    /// Connection timeout
    ConnectionTimeout,
    /// Record not found
    NotFound {
        entity: String,
        id: String,
    },
    /// Unique constraint violation (duplicate order number, resubmitted basket)
    UniqueConstraintViolation {
        column: String,
        value: String,
    },
    /// Foreign key constraint violation
    ForeignKeyViolation {
        table: String,
        column: String,
    },
    /// Query execution error
    QueryError {
        message: String,
    },
    /// Unit of work error
    TransactionError {
        message: String,
    },
    /// Database connection error
    ConnectionError {
        message: String,
    },
    /// Stored row could not be mapped onto an entity
    InvalidData {
        message: String,
    },
    /// Configuration error
    ConfigError {
        message: String,
    },
    /// Unknown error
    Unknown {
        message: String,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub context: Option<String>,
    pub is_retryable: bool,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind) -> Self {
        let is_retryable = matches!(
            kind,
            StoreErrorKind::ConnectionTimeout
                | StoreErrorKind::PoolExhausted
                | StoreErrorKind::ConnectionError { .. }
        );

        Self {
            kind,
            context: None,
            is_retryable,
        }
    }

    pub fn duplicate(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::UniqueConstraintViolation {
            column: column.into(),
            value: value.into(),
        })
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound {
            entity: entity.into(),
            id: id.into(),
        })
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::TransactionError {
            message: message.into(),
        })
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidData {
            message: message.into(),
        })
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, StoreErrorKind::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::UniqueConstraintViolation { .. }
                | StoreErrorKind::ForeignKeyViolation { .. }
        )
    }

    /// Map SQLx error to the store error type
    #[cfg(feature = "database")]
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => Self::new(StoreErrorKind::PoolExhausted),
            sqlx::Error::PoolClosed => Self::new(StoreErrorKind::ConnectionError {
                message: "Connection pool is closed".to_string(),
            }),
            sqlx::Error::Configuration(msg) => Self::new(StoreErrorKind::ConfigError {
                message: msg.to_string(),
            }),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                match code.as_deref() {
                    // Postgres unique_violation
                    Some("23505") => Self::duplicate(
                        db_err.constraint().unwrap_or("unknown").to_string(),
                        "provided value",
                    ),
                    // Postgres foreign_key_violation
                    Some("23503") => Self::new(StoreErrorKind::ForeignKeyViolation {
                        table: db_err.table().unwrap_or("unknown").to_string(),
                        column: db_err.constraint().unwrap_or("unknown").to_string(),
                    }),
                    // Postgres serialization_failure
                    Some("40001") => {
                        let mut err = Self::transaction(db_err.message().to_string());
                        err.is_retryable = true;
                        err
                    }
                    _ => Self::new(StoreErrorKind::QueryError {
                        message: db_err.message().to_string(),
                    }),
                }
            }
            sqlx::Error::Io(io_err) => Self::new(StoreErrorKind::ConnectionError {
                message: io_err.to_string(),
            }),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::invalid_data(format!("column {}: {}", index, source))
            }
            _ => Self::new(StoreErrorKind::Unknown {
                message: error.to_string(),
            }),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            StoreErrorKind::PoolExhausted => {
                "Database connection pool exhausted. Please try again.".to_string()
            }
            StoreErrorKind::ConnectionTimeout => {
                "Database connection timed out. Please try again.".to_string()
            }
            StoreErrorKind::NotFound { entity, id } => {
                format!("{} with ID '{}' not found", entity, id)
            }
            StoreErrorKind::UniqueConstraintViolation { column, value } => {
                format!("A record with {} '{}' already exists", column, value)
            }
            StoreErrorKind::ForeignKeyViolation { table, column } => {
                format!(
                    "Cannot perform operation: referenced {} in {} does not exist",
                    column, table
                )
            }
            StoreErrorKind::QueryError { message } => {
                format!("Database query failed: {}", message)
            }
            StoreErrorKind::TransactionError { message } => {
                format!("Transaction failed: {}", message)
            }
            StoreErrorKind::ConnectionError { message } => {
                format!("Database connection error: {}", message)
            }
            StoreErrorKind::InvalidData { message } => {
                format!("Stored data is invalid: {}", message)
            }
            StoreErrorKind::ConfigError { message } => {
                format!("Database configuration error: {}", message)
            }
            StoreErrorKind::Unknown { message } => {
                format!("Unknown database error: {}", message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for StoreError {}

impl PartialEq for StoreError {
    fn eq(&self, other: &Self) -> bool {
        // For testing purposes
        format!("{:?}", self.kind) == format!("{:?}", other.kind)
    }
}
