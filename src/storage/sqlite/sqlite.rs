#[cfg(test)]
#[path = "sqlite_test.rs"]
mod tests;

use async_trait::async_trait;
use eyre::{Context, Result};
use tokio_rusqlite::{Connection, OpenFlags, named_params, params};

use crate::config::utils::init_parent_dir;
use crate::storage::Storage;

use super::migration::MIGRATION;

pub struct Sqlite {
    conn: Connection,
}

impl Sqlite {
    pub async fn new(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(path) => {
                init_parent_dir(path).wrap_err(format!("creating directory of {}", path))?;
                Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
                )
                .await
                .wrap_err(format!("opening database path: {}", path))?
            }
            None => Connection::open_in_memory()
                .await
                .wrap_err("opening in-memory database")?,
        };

        let ret = Self { conn };
        ret.run_migration().await.wrap_err("running migration")?;
        Ok(ret)
    }

    async fn run_migration(&self) -> Result<()> {
        self.conn
            .call(|conn| Ok(conn.execute_batch(MIGRATION)?))
            .await
            .wrap_err("executing migration")?;
        Ok(())
    }
}

#[async_trait]
impl Storage for Sqlite {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?")?;
                let mut rows = stmt.query(params![key])?;
                let value = match rows.next()? {
                    Some(row) => Some(row.get::<_, String>(0)?),
                    None => None,
                };
                Ok(value)
            })
            .await
            .wrap_err("getting item")?;
        Ok(value)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        let updated_at = chrono::Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO kv (key, value, updated_at) VALUES (:key, :value, :updated_at)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    named_params! {
                        ":key": key,
                        ":value": value,
                        ":updated_at": updated_at,
                    },
                )?;
                Ok(tx.commit()?)
            })
            .await
            .wrap_err("setting item")?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM kv WHERE key = ?", params![key])?;
                Ok(tx.commit()?)
            })
            .await
            .wrap_err("removing item")?;
        Ok(())
    }
}
