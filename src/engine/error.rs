use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// `start > end`, or zero units requested.
    InvalidRange,
    CapacityExceeded {
        available: u32,
        requested: u32,
    },
    ItemUnderMaintenance(Ulid),
    ItemInactive(Ulid),
    /// The item lock was not acquired within the caller's bound.
    ConcurrentModification(Ulid),
    LimitExceeded(&'static str),
    JournalError(String),
}

impl EngineError {
    /// Only lock timeouts are worth retrying; the engine never retries itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrentModification(_))
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::InvalidRange => "invalid_range",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::ItemUnderMaintenance(_) => "under_maintenance",
            EngineError::ItemInactive(_) => "inactive",
            EngineError::ConcurrentModification(_) => "concurrent_modification",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::JournalError(_) => "journal_error",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidRange => {
                write!(f, "invalid range: start must not be after end and units must be positive")
            }
            EngineError::CapacityExceeded {
                available,
                requested,
            } => write!(
                f,
                "Exceeded maximum units available for selected date range for one or more places \
                 (available: {available}, requested: {requested})"
            ),
            EngineError::ItemUnderMaintenance(id) => write!(f, "item {id} is under maintenance"),
            EngineError::ItemInactive(id) => write!(f, "item {id} is inactive"),
            EngineError::ConcurrentModification(id) => {
                write!(f, "item {id} is being modified concurrently; retry")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::JournalError(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
