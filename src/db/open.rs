use std::path::Path;

use log::{info, warn};
use rusqlite::Connection;

static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/schema.sql"));

/// Open `portti.db` in the working directory, creating it if needed
pub fn open_db(wd: &Path) -> rusqlite::Result<Connection> {
    let path = wd.join("portti.db");
    if !path.exists() {
        info!("Creating new database {}", path.display())
    }
    let conn = Connection::open(&path)?;
    prepare(&conn)?;
    Ok(conn)
}

/// Apply the schema and open the dry run save point
///
/// Everything written through the connection afterwards is kept or discarded by [release_or_rollback].
pub fn prepare(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    conn.pragma_update(None, "foreign_keys", true)?;

    info!("Creating dry run save point");
    conn.execute_batch("SAVEPOINT dry_run")
}

pub fn release_or_rollback(conn: &Connection, dry_run: bool) -> rusqlite::Result<()> {
    if dry_run {
        info!("--dry-run set, rolling back database state");
        conn.execute_batch("ROLLBACK TO dry_run; RELEASE dry_run")
    } else {
        info!("--dry-run not set, releasing dry run save point");
        conn.execute_batch("RELEASE dry_run")
    }
}

/// Run `f` inside a named save point: released if `f` succeeds, rolled back otherwise
pub fn atomically<T, E, F>(conn: &Connection, name: &str, f: F) -> Result<T, E>
where
    E: From<rusqlite::Error>,
    F: FnOnce(&Connection) -> Result<T, E>,
{
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(err) => {
            warn!("Rolling back save point {name}");
            conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
            Err(err)
        }
    }
}
