mod categories;
mod comments;
mod listings;
mod sessions;
mod users;

pub use categories::PostgresCategoryRepository;
pub use comments::PostgresCommentRepository;
pub use listings::PostgresListingRepository;
pub use sessions::PostgresSessionRepository;
pub use users::PostgresUserRepository;

use crate::db::DbError;

/// Map a unique-constraint violation to a conflict, everything else through.
fn map_unique_violation(err: sqlx::Error, message: &str) -> DbError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DbError::Conflict(message.to_string())
        }
        _ => DbError::Sqlx(err),
    }
}
