use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Display-name cache, overwritten on every name-change signal
CREATE TABLE IF NOT EXISTS names (
    kind       TEXT NOT NULL,              -- 'contact' | 'group'
    id         TEXT NOT NULL,
    name       TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    PRIMARY KEY (kind, id)
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
