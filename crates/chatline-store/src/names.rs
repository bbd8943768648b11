use chrono::Utc;
use rusqlite::params;

use chatline_shared::NameKind;

use crate::database::Database;
use crate::error::Result;
use crate::models::NameRecord;

fn kind_str(kind: NameKind) -> &'static str {
    match kind {
        NameKind::Contact => "contact",
        NameKind::Group => "group",
    }
}

impl Database {
    pub fn upsert_name(&self, kind: NameKind, id: &str, name: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO names (kind, id, name, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(kind, id) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
            params![kind_str(kind), id, name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn load_names(&self) -> Result<Vec<NameRecord>> {
        let mut stmt = self.conn().prepare("SELECT kind, id, name FROM names")?;

        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(0)?;
            Ok((kind, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut names = Vec::new();
        for row in rows {
            let (kind, id, name) = row?;
            let kind = match kind.as_str() {
                "group" => NameKind::Group,
                "contact" => NameKind::Contact,
                other => {
                    tracing::warn!(kind = %other, id = %id, "skipping name with unknown kind");
                    continue;
                }
            };
            names.push(NameRecord { kind, id, name });
        }
        Ok(names)
    }
}
