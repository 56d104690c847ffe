use sqlx::{Executor, Pool, Postgres};
use tracing::{info, warn};

const CREATE_USERS: &str = include_str!("../migrations/0001_create_users.sql");
const CREATE_CONVERSATIONS: &str = include_str!("../migrations/0002_create_conversations.sql");
const CREATE_CONVERSATION_MEMBERS: &str =
    include_str!("../migrations/0003_create_conversation_members.sql");
const CREATE_MESSAGES: &str = include_str!("../migrations/0004_create_messages.sql");
const CREATE_CONTACTS: &str = include_str!("../migrations/0005_create_contacts.sql");

/// Applies the embedded schema migrations in order. Statements are written
/// with IF NOT EXISTS so re-running against an existing database is safe.
pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    let migrations = [
        ("0001_create_users", CREATE_USERS),
        ("0002_create_conversations", CREATE_CONVERSATIONS),
        ("0003_create_conversation_members", CREATE_CONVERSATION_MEMBERS),
        ("0004_create_messages", CREATE_MESSAGES),
        ("0005_create_contacts", CREATE_CONTACTS),
    ];

    for (label, sql) in migrations {
        // `db.execute` sends the file as a single simple-protocol batch so
        // multi-statement migrations work.
        match db.execute(sql).await {
            Ok(_) => info!(migration = %label, "chat-service migration applied"),
            Err(e) => {
                warn!(migration = %label, error = %e, "migration failed, may have been applied already");
            }
        }
    }

    Ok(())
}
