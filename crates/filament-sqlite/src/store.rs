//! [`CacheStore`] implementation over a [`SqlitePool`].

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, ToSql};
use tracing::warn;

use filament_core::{
    CacheStore, DocumentRecord, RunFilter, RunPrune, RunRecord, RunStatus, StoreResult,
    TagEmbeddingRecord,
};

use crate::blob::{bytes_to_vector, vector_to_bytes};
use crate::config::SqliteConfig;
use crate::connection::SqlitePool;
use crate::error::{SqliteError, SqliteResult};

/// SQLite-backed cache store.
///
/// Opening the store applies pragmas and schema migrations; the handle is
/// cheap to clone and safe to share.
#[derive(Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    pub fn open(config: SqliteConfig) -> SqliteResult<Self> {
        Ok(Self {
            pool: SqlitePool::new(config)?,
        })
    }

    /// In-memory store for tests.
    pub fn memory() -> SqliteResult<Self> {
        Ok(Self {
            pool: SqlitePool::memory()?,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Timestamps are stored as fixed-width RFC 3339 text so lexicographic
// ordering in SQL matches chronological ordering.
fn timestamp_to_text(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_from_text(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

const RUN_COLUMNS: &str = "run_id, timestamp, tool, operation, vault_path, \
     files_total, files_new, files_modified, files_unchanged, files_deleted, \
     links_added, links_removed, tags_applied, tags_removed, parameters, \
     duration_seconds, embedding_seconds, cache_hit_ratio, status, \
     error_count, error_message, model, dimensions";

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    let timestamp_text: String = row.get(1)?;
    let status_text: String = row.get(18)?;
    let status = RunStatus::parse(&status_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            18,
            rusqlite::types::Type::Text,
            format!("unknown run status {status_text:?}").into(),
        )
    })?;

    Ok(RunRecord {
        run_id: row.get(0)?,
        timestamp: timestamp_from_text(1, &timestamp_text)?,
        tool: row.get(2)?,
        operation: row.get(3)?,
        vault_path: row.get(4)?,
        files_total: row.get::<_, i64>(5)? as usize,
        files_new: row.get::<_, i64>(6)? as usize,
        files_modified: row.get::<_, i64>(7)? as usize,
        files_unchanged: row.get::<_, i64>(8)? as usize,
        files_deleted: row.get::<_, i64>(9)? as usize,
        links_added: row.get::<_, i64>(10)? as usize,
        links_removed: row.get::<_, i64>(11)? as usize,
        tags_applied: row.get::<_, i64>(12)? as usize,
        tags_removed: row.get::<_, i64>(13)? as usize,
        parameters: row.get(14)?,
        duration_seconds: row.get(15)?,
        embedding_seconds: row.get(16)?,
        cache_hit_ratio: row.get(17)?,
        status,
        error_count: row.get::<_, i64>(19)? as usize,
        error_message: row.get(20)?,
        model: row.get(21)?,
        dimensions: row.get::<_, Option<i64>>(22)?.map(|d| d as usize),
    })
}

impl CacheStore for SqliteCacheStore {
    fn document(&self, path: &str, model: &str) -> StoreResult<Option<DocumentRecord>> {
        let record = self.pool.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT path, model, content_hash, mtime_ns, size_bytes, dimensions, updated_at
                     FROM file_metadata WHERE path = ? AND model = ?",
                    params![path, model],
                    |row| {
                        let updated_text: String = row.get(6)?;
                        Ok(DocumentRecord {
                            path: row.get(0)?,
                            model: row.get(1)?,
                            content_hash: row.get(2)?,
                            mtime_ns: row.get(3)?,
                            size_bytes: row.get::<_, i64>(4)? as u64,
                            dimensions: row.get::<_, i64>(5)? as usize,
                            updated_at: timestamp_from_text(6, &updated_text)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })?;
        Ok(record)
    }

    fn document_paths(&self, model: &str) -> StoreResult<Vec<String>> {
        let paths = self.pool.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT path FROM file_metadata WHERE model = ? ORDER BY path")?;
            let rows = stmt.query_map(params![model], |row| row.get(0))?;
            Ok(rows.collect::<Result<Vec<String>, _>>()?)
        })?;
        Ok(paths)
    }

    fn upsert_document(&self, record: &DocumentRecord, embedding: &[f32]) -> StoreResult<()> {
        self.pool.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            // REPLACE on the metadata row cascades away the old embedding,
            // so the order here matters.
            tx.execute(
                "INSERT OR REPLACE INTO file_metadata
                 (path, model, content_hash, mtime_ns, size_bytes, dimensions, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    record.path,
                    record.model,
                    record.content_hash,
                    record.mtime_ns,
                    record.size_bytes as i64,
                    record.dimensions as i64,
                    timestamp_to_text(&record.updated_at),
                ],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO file_embeddings (path, model, embedding)
                 VALUES (?, ?, ?)",
                params![record.path, record.model, vector_to_bytes(embedding)],
            )?;
            tx.commit()?;
            Ok(())
        })?;
        Ok(())
    }

    fn embedding(&self, path: &str, model: &str) -> StoreResult<Option<Vec<f32>>> {
        let bytes: Option<Vec<u8>> = self.pool.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT embedding FROM file_embeddings WHERE path = ? AND model = ?",
                    params![path, model],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row)
        })?;

        match bytes {
            None => Ok(None),
            Some(bytes) => match bytes_to_vector(&bytes) {
                Ok(vector) => Ok(Some(vector)),
                // A bad blob is recoverable: report a miss so the caller
                // re-embeds and overwrites it.
                Err(err) => {
                    warn!(path, model, error = %err, "discarding undecodable embedding");
                    Ok(None)
                }
            },
        }
    }

    fn remove_document(&self, path: &str, model: &str) -> StoreResult<()> {
        self.pool.with_connection(|conn| {
            conn.execute(
                "DELETE FROM file_metadata WHERE path = ? AND model = ?",
                params![path, model],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn refresh_mtime(&self, path: &str, model: &str, mtime_ns: i64) -> StoreResult<()> {
        self.pool.with_connection(|conn| {
            conn.execute(
                "UPDATE file_metadata SET mtime_ns = ? WHERE path = ? AND model = ?",
                params![mtime_ns, path, model],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn clear_model(&self, model: &str) -> StoreResult<usize> {
        let removed = self.pool.with_connection(|conn| {
            let removed = conn.execute("DELETE FROM file_metadata WHERE model = ?", params![model])?;
            Ok(removed)
        })?;
        Ok(removed)
    }

    fn tag_embedding(&self, tag: &str, model: &str) -> StoreResult<Option<TagEmbeddingRecord>> {
        let row: Option<(String, String, Vec<u8>, String)> =
            self.pool.with_connection(|conn| {
                let row = conn
                    .query_row(
                        "SELECT description, content_hash, embedding, updated_at
                         FROM tag_embeddings WHERE tag = ? AND model = ?",
                        params![tag, model],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                    )
                    .optional()?;
                Ok(row)
            })?;

        let Some((description, content_hash, bytes, updated_text)) = row else {
            return Ok(None);
        };
        let embedding = match bytes_to_vector(&bytes) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(tag, model, error = %err, "discarding undecodable tag embedding");
                return Ok(None);
            }
        };
        let updated_at = DateTime::parse_from_rfc3339(&updated_text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SqliteError::Corrupt(format!("bad timestamp {updated_text:?}: {e}")))?;

        Ok(Some(TagEmbeddingRecord {
            tag: tag.to_string(),
            model: model.to_string(),
            description,
            content_hash,
            embedding,
            updated_at,
        }))
    }

    fn upsert_tag_embedding(&self, record: &TagEmbeddingRecord) -> StoreResult<()> {
        self.pool.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO tag_embeddings
                 (tag, model, description, content_hash, embedding, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    record.tag,
                    record.model,
                    record.description,
                    record.content_hash,
                    vector_to_bytes(&record.embedding),
                    timestamp_to_text(&record.updated_at),
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn record_run(&self, run: &RunRecord) -> StoreResult<()> {
        self.pool.with_connection(|conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO run_logs ({RUN_COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    run.run_id,
                    timestamp_to_text(&run.timestamp),
                    run.tool,
                    run.operation,
                    run.vault_path,
                    run.files_total as i64,
                    run.files_new as i64,
                    run.files_modified as i64,
                    run.files_unchanged as i64,
                    run.files_deleted as i64,
                    run.links_added as i64,
                    run.links_removed as i64,
                    run.tags_applied as i64,
                    run.tags_removed as i64,
                    run.parameters,
                    run.duration_seconds,
                    run.embedding_seconds,
                    run.cache_hit_ratio,
                    run.status.as_str(),
                    run.error_count as i64,
                    run.error_message,
                    run.model,
                    run.dimensions.map(|d| d as i64),
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn recent_runs(&self, filter: &RunFilter) -> StoreResult<Vec<RunRecord>> {
        let runs = self.pool.with_connection(|conn| {
            let mut sql = format!("SELECT {RUN_COLUMNS} FROM run_logs WHERE 1=1");
            let mut params: Vec<Box<dyn ToSql>> = Vec::new();

            if let Some(vault) = &filter.vault {
                sql.push_str(" AND vault_path = ?");
                params.push(Box::new(vault.clone()));
            }
            if let Some(tool) = &filter.tool {
                sql.push_str(" AND tool = ?");
                params.push(Box::new(tool.clone()));
            }
            sql.push_str(" ORDER BY timestamp DESC");
            if filter.limit > 0 {
                sql.push_str(" LIMIT ?");
                params.push(Box::new(filter.limit as i64));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params_from_iter(params.iter().map(|p| p.as_ref())),
                run_from_row,
            )?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })?;
        Ok(runs)
    }

    fn prune_runs(&self, prune: &RunPrune) -> StoreResult<usize> {
        let count = self.pool.with_connection(|conn| {
            let mut clause = String::new();
            let mut params: Vec<Box<dyn ToSql>> = Vec::new();

            if let Some(cutoff) = prune.cutoff {
                clause.push_str("timestamp < ?");
                params.push(Box::new(timestamp_to_text(&cutoff)));
                if let Some(tool) = &prune.tool {
                    clause.push_str(" AND tool = ?");
                    params.push(Box::new(tool.clone()));
                }
            } else if let Some(keep) = prune.keep_last {
                match &prune.tool {
                    Some(tool) => {
                        clause.push_str(
                            "tool = ? AND run_id NOT IN (SELECT run_id FROM run_logs \
                             WHERE tool = ? ORDER BY timestamp DESC LIMIT ?)",
                        );
                        params.push(Box::new(tool.clone()));
                        params.push(Box::new(tool.clone()));
                        params.push(Box::new(keep as i64));
                    }
                    None => {
                        clause.push_str(
                            "run_id NOT IN (SELECT run_id FROM run_logs \
                             ORDER BY timestamp DESC LIMIT ?)",
                        );
                        params.push(Box::new(keep as i64));
                    }
                }
            } else {
                return Ok(0);
            }

            if prune.dry_run {
                let count: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM run_logs WHERE {clause}"),
                    params_from_iter(params.iter().map(|p| p.as_ref())),
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            } else {
                let removed = conn.execute(
                    &format!("DELETE FROM run_logs WHERE {clause}"),
                    params_from_iter(params.iter().map(|p| p.as_ref())),
                )?;
                Ok(removed)
            }
        })?;
        Ok(count)
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self.pool.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT value FROM metadata WHERE key = ?",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row)
        })?;
        Ok(value)
    }

    fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        self.pool.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
                params![key, value],
            )?;
            Ok(())
        })?;
        Ok(())
    }
}
