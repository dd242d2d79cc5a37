pub mod order;
pub mod shop;
pub mod repository;
pub mod payment;

pub use order::{Buyer, NewOrder, Order, OrderStatus, OrderSummary, SummaryLine};
pub use shop::{SalePeriod, StoreClosure};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,
    /// A write lost a race: duplicate key, serialization or commit failure.
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
    #[error("Storage backend error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
