//! DDL for the benchmark table

use tracing::info;

use crate::config::{RunConfig, TABLE_NAME};
use crate::error::Result;
use crate::sink::Connection;

/// Statements that (re)create TestTable with the requested indexes and trigger
pub fn setup_statements(config: &RunConfig) -> Vec<(&'static str, String)> {
    let mut statements = vec![
        ("Dropping table", format!("DROP TABLE IF EXISTS {}", TABLE_NAME)),
        (
            "Creating table",
            format!(
                "CREATE TABLE {} (\n  \
                 id int unsigned NOT NULL PRIMARY KEY,\n  \
                 intCol int unsigned DEFAULT NULL,\n  \
                 stringCol varchar(100) DEFAULT NULL,\n  \
                 textCol text\n\
                 ) ENGINE=InnoDB",
                TABLE_NAME
            ),
        ),
    ];
    if config.indexes >= 1 {
        statements.push((
            "Creating first index",
            format!("ALTER TABLE {} ADD INDEX (intCol)", TABLE_NAME),
        ));
    }
    if config.indexes >= 2 {
        statements.push((
            "Creating second index",
            format!("ALTER TABLE {} ADD INDEX (stringCol)", TABLE_NAME),
        ));
    }
    if config.trigger {
        statements.push((
            "Creating a trigger before INSERT",
            format!(
                "CREATE TRIGGER TestTrigger BEFORE INSERT ON {} \
                 FOR EACH ROW SET NEW.stringCol = UPPER(NEW.stringCol)",
                TABLE_NAME
            ),
        ));
    }
    statements
}

/// Run the setup statements on an open connection
pub fn prepare_table<C: Connection>(conn: &mut C, config: &RunConfig) -> Result<()> {
    for (step, sql) in setup_statements(config) {
        info!("{}", step);
        conn.execute_ddl(&sql)?;
    }
    Ok(())
}
