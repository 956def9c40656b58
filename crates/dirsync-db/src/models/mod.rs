//! Row types and their queries.

pub mod connector;
pub mod task;
pub mod user;

pub use connector::ConnectorRow;
pub use task::{NewTask, TaskRow};
pub use user::UserRow;

use dirsync_core::ConnectorId;

use crate::error::DbError;

/// Connector ids are `BIGSERIAL` in storage.
pub(crate) fn db_id(id: ConnectorId) -> Result<i64, DbError> {
    i64::try_from(id.as_u64())
        .map_err(|_| DbError::ValidationFailed(format!("connector id {id} out of range")))
}

pub(crate) fn connector_id(raw: i64) -> Result<ConnectorId, DbError> {
    u64::try_from(raw)
        .map(ConnectorId::new)
        .map_err(|_| DbError::ValidationFailed(format!("negative connector id {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_conversions() {
        assert_eq!(db_id(ConnectorId::new(42)).unwrap(), 42);
        assert!(db_id(ConnectorId::new(u64::MAX)).is_err());
        assert_eq!(connector_id(7).unwrap(), ConnectorId::new(7));
        assert!(connector_id(-1).is_err());
    }
}
