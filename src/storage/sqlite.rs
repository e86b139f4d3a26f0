//! SQLite storage backend

use super::traits::{
    MemoryStore, MergeOutcome, MergePlan, OpenStore, SimilarElement, StorageError, StorageResult,
};
use crate::cancel::CancellationToken;
use crate::embedding::cosine_similarity;
use crate::graph::{
    clamp_strength, concat_json, AccessPattern, Association, AssociationId, Element, ElementId,
    ElementPair, ElementType, MergeCandidate, MERGED_AT_KEY, MERGED_INTO_KEY,
};
use crate::query::{
    AdjacencyIndex, ConnectedElement, ConnectedQuery, Cycle, CycleQuery, Direction, GraphPath,
    PathQuery,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row, TransactionBehavior};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const ELEMENT_COLUMNS: &str = "id, element_type, content_json, embedding, created_at, updated_at";
const ASSOCIATION_COLUMNS: &str =
    "id, source_id, target_id, pattern_type, strength, metadata_json, created_at, updated_at";
const ACCESS_COLUMNS: &str = "id, element_id, access_count, successful_recalls, avg_recall_time, \
     certaindex, last_accessed_at, created_at, updated_at";
const CANDIDATE_COLUMNS: &str = "element1_id, element2_id, similarity, metadata_json, created_at";

/// SQLite-backed memory store
///
/// Uses a single SQLite database file with tables for elements,
/// associations, access patterns and merge candidates.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS elements (
                id TEXT PRIMARY KEY,
                element_type TEXT NOT NULL
                    CHECK (element_type IN ('code', 'concept', 'context')),
                content_json TEXT NOT NULL,
                embedding BLOB,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_elements_created
                ON elements(created_at);

            -- Parallel associations between one pair are allowed
            CREATE TABLE IF NOT EXISTS associations (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                pattern_type TEXT NOT NULL,
                strength REAL NOT NULL CHECK (strength >= 0.0 AND strength <= 1.0),
                metadata_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (source_id) REFERENCES elements(id) ON DELETE CASCADE,
                FOREIGN KEY (target_id) REFERENCES elements(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_associations_source
                ON associations(source_id, strength);
            CREATE INDEX IF NOT EXISTS idx_associations_target
                ON associations(target_id, strength);

            CREATE TABLE IF NOT EXISTS access_patterns (
                element_id TEXT PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                access_count INTEGER NOT NULL,
                successful_recalls INTEGER NOT NULL,
                avg_recall_time REAL NOT NULL,
                certaindex REAL NOT NULL,
                last_accessed_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (element_id) REFERENCES elements(id) ON DELETE CASCADE
            );

            -- Pairs are stored in canonical order (element1_id <= element2_id)
            CREATE TABLE IF NOT EXISTS merge_candidates (
                element1_id TEXT NOT NULL,
                element2_id TEXT NOT NULL,
                similarity REAL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                PRIMARY KEY (element1_id, element2_id),
                CHECK (element1_id <= element2_id),
                FOREIGN KEY (element1_id) REFERENCES elements(id) ON DELETE CASCADE,
                FOREIGN KEY (element2_id) REFERENCES elements(id) ON DELETE CASCADE
            );

            PRAGMA foreign_keys = ON;

            -- Concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn insert_element(conn: &Connection, element: &Element) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO elements (id, element_type, content_json, embedding, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                element.id.to_string(),
                element.element_type.as_str(),
                serde_json::to_string(&element.content)?,
                element.embedding.as_deref().map(embedding_to_blob),
                encode_time(&element.created_at),
                encode_time(&element.updated_at),
            ],
        )?;
        Ok(())
    }

    fn load_element(conn: &Connection, id: &ElementId) -> StorageResult<Option<Element>> {
        let sql = format!("SELECT {ELEMENT_COLUMNS} FROM elements WHERE id = ?1");
        conn.query_row(&sql, params![id.to_string()], ElementRow::from_row)
            .optional()?
            .map(ElementRow::into_element)
            .transpose()
    }

    fn query_elements<P: Params>(conn: &Connection, sql: &str, params: P) -> StorageResult<Vec<Element>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ElementRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ElementRow::into_element).collect()
    }

    fn query_associations<P: Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> StorageResult<Vec<Association>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, AssociationRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(AssociationRow::into_association).collect()
    }

    fn load_association(conn: &Connection, id: &AssociationId) -> StorageResult<Association> {
        let sql = format!("SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE id = ?1");
        conn.query_row(&sql, params![id.to_string()], AssociationRow::from_row)
            .optional()?
            .ok_or_else(|| StorageError::AssociationNotFound(id.to_string()))?
            .into_association()
    }

    fn load_access_pattern(conn: &Connection, id: &ElementId) -> StorageResult<Option<AccessPattern>> {
        let sql = format!("SELECT {ACCESS_COLUMNS} FROM access_patterns WHERE element_id = ?1");
        conn.query_row(&sql, params![id.to_string()], AccessRow::from_row)
            .optional()?
            .map(AccessRow::into_pattern)
            .transpose()
    }

    fn load_candidate(conn: &Connection, pair: &ElementPair) -> StorageResult<MergeCandidate> {
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM merge_candidates
             WHERE element1_id = ?1 AND element2_id = ?2"
        );
        conn.query_row(
            &sql,
            params![pair.first().to_string(), pair.second().to_string()],
            CandidateRow::from_row,
        )
        .optional()?
        .ok_or_else(|| StorageError::CandidateNotFound(pair.to_string()))?
        .into_candidate()
    }

    /// Collect every association reachable from `seed` within `max_depth`
    /// hops through edges with strength >= `min_strength`.
    ///
    /// Frontier expansion, one query per frontier element and direction.
    fn load_reachable(
        conn: &Connection,
        seed: &ElementId,
        max_depth: usize,
        min_strength: f32,
        direction: Direction,
    ) -> StorageResult<Vec<Association>> {
        let mut edges: HashMap<AssociationId, Association> = HashMap::new();
        let mut visited: HashSet<ElementId> = HashSet::new();
        visited.insert(*seed);
        let mut frontier = vec![*seed];

        let outgoing = format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE source_id = ?1 AND strength >= ?2"
        );
        let incoming = format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE target_id = ?1 AND strength >= ?2"
        );

        for _depth in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for id in &frontier {
                let key = id.to_string();
                let mut found =
                    Self::query_associations(conn, &outgoing, params![key, min_strength as f64])?;
                if direction == Direction::Undirected {
                    found.extend(Self::query_associations(
                        conn,
                        &incoming,
                        params![key, min_strength as f64],
                    )?);
                }
                for assoc in found {
                    let neighbor = if assoc.source == *id { assoc.target } else { assoc.source };
                    if visited.insert(neighbor) {
                        next_frontier.push(neighbor);
                    }
                    edges.entry(assoc.id).or_insert(assoc);
                }
            }
            frontier = next_frontier;
        }

        debug!(seed = %seed, max_depth, edges = edges.len(), "loaded reachable associations");
        Ok(edges.into_values().collect())
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl MemoryStore for SqliteStore {
    // === Element Operations ===

    fn create_element(&self, element: &Element) -> StorageResult<()> {
        let conn = self.conn()?;
        Self::insert_element(&conn, element)
    }

    fn get_element(&self, id: &ElementId) -> StorageResult<Element> {
        let conn = self.conn()?;
        Self::load_element(&conn, id)?.ok_or_else(|| StorageError::ElementNotFound(id.to_string()))
    }

    fn update_element(&self, element: &Element) -> StorageResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE elements
             SET element_type = ?2, content_json = ?3, embedding = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                element.id.to_string(),
                element.element_type.as_str(),
                serde_json::to_string(&element.content)?,
                element.embedding.as_deref().map(embedding_to_blob),
                encode_time(&Utc::now()),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::ElementNotFound(element.id.to_string()));
        }
        Ok(())
    }

    fn delete_element(&self, id: &ElementId) -> StorageResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM elements WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(StorageError::ElementNotFound(id.to_string()));
        }
        Ok(())
    }

    fn get_recent_elements(&self, limit: usize) -> StorageResult<Vec<Element>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ELEMENT_COLUMNS} FROM elements
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1"
        );
        Self::query_elements(&conn, &sql, params![limit as i64])
    }

    fn find_similar_elements(
        &self,
        embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> StorageResult<Vec<SimilarElement>> {
        if limit == 0 || embedding.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let sql = format!("SELECT {ELEMENT_COLUMNS} FROM elements WHERE embedding IS NOT NULL");
        let candidates = Self::query_elements(&conn, &sql, [])?;
        let scanned = candidates.len();

        let mut matches: Vec<SimilarElement> = candidates
            .into_iter()
            .filter_map(|element| {
                let stored = element.embedding.as_deref()?;
                if stored.len() != embedding.len() {
                    return None;
                }
                let similarity = cosine_similarity(embedding, stored);
                (similarity >= min_similarity).then_some(SimilarElement {
                    element,
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.element.id.cmp(&b.element.id))
        });
        matches.truncate(limit);
        debug!(scanned, matched = matches.len(), "similarity search");
        Ok(matches)
    }

    // === Association Operations ===

    fn create_association(&self, association: &Association) -> StorageResult<()> {
        let conn = self.conn()?;
        let metadata = association
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            "INSERT INTO associations
                (id, source_id, target_id, pattern_type, strength, metadata_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                association.id.to_string(),
                association.source.to_string(),
                association.target.to_string(),
                association.pattern_type,
                clamp_strength(association.strength) as f64,
                metadata,
                encode_time(&association.created_at),
                encode_time(&association.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_association(&self, id: &AssociationId) -> StorageResult<Association> {
        let conn = self.conn()?;
        Self::load_association(&conn, id)
    }

    fn update_association_strength(
        &self,
        id: &AssociationId,
        delta: f32,
        metadata: Option<&Value>,
    ) -> StorageResult<Association> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut association = Self::load_association(&tx, id)?;
        association.strength = clamp_strength(association.strength + delta);
        if let Some(patch) = metadata {
            association.metadata = Some(match &association.metadata {
                Some(existing) => concat_json(existing, patch),
                None => patch.clone(),
            });
        }
        association.updated_at = Utc::now();

        let metadata_json = association
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        tx.execute(
            "UPDATE associations SET strength = ?2, metadata_json = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                id.to_string(),
                association.strength as f64,
                metadata_json,
                encode_time(&association.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(association)
    }

    fn delete_association(&self, id: &AssociationId) -> StorageResult<()> {
        let conn = self.conn()?;
        let changed =
            conn.execute("DELETE FROM associations WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(StorageError::AssociationNotFound(id.to_string()));
        }
        Ok(())
    }

    fn associations_for(&self, id: &ElementId) -> StorageResult<Vec<Association>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM associations
             WHERE source_id = ?1 OR target_id = ?1
             ORDER BY created_at, rowid"
        );
        Self::query_associations(&conn, &sql, params![id.to_string()])
    }

    fn count_associations(&self) -> StorageResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM associations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // === Graph Queries ===

    fn find_paths(
        &self,
        source: &ElementId,
        target: &ElementId,
        max_depth: usize,
        min_strength: f32,
    ) -> StorageResult<Vec<GraphPath>> {
        let edges = {
            let conn = self.conn()?;
            Self::load_reachable(&conn, source, max_depth, min_strength, Direction::Outgoing)?
        };
        let index = AdjacencyIndex::build(&edges, min_strength, Direction::Outgoing);
        debug!(adjacencies = index.adjacency_count(), max_depth, "path search");
        Ok(PathQuery::between(*source, *target)
            .max_depth(max_depth)
            .execute(&index))
    }

    fn detect_cycles(&self, id: &ElementId, max_depth: usize) -> StorageResult<Vec<Cycle>> {
        let edges = {
            let conn = self.conn()?;
            Self::load_reachable(&conn, id, max_depth, 0.0, Direction::Outgoing)?
        };
        let index = AdjacencyIndex::build(&edges, 0.0, Direction::Outgoing);
        Ok(CycleQuery::through(*id).max_depth(max_depth).execute(&index))
    }

    fn get_connected_elements(
        &self,
        id: &ElementId,
        max_depth: usize,
        min_strength: f32,
    ) -> StorageResult<Vec<ConnectedElement>> {
        let conn = self.conn()?;
        let edges = Self::load_reachable(&conn, id, max_depth, min_strength, Direction::Undirected)?;
        let index = AdjacencyIndex::build(&edges, min_strength, Direction::Undirected);
        let reached = ConnectedQuery::around(*id).max_depth(max_depth).execute(&index);

        let mut connected = Vec::with_capacity(reached.len());
        for reach in reached {
            if let Some(element) = Self::load_element(&conn, &reach.id)? {
                connected.push(ConnectedElement {
                    element,
                    depth: reach.depth,
                });
            }
        }
        Ok(connected)
    }

    // === Access Patterns ===

    fn record_access(
        &self,
        id: &ElementId,
        successful: bool,
        recall_time: f64,
        certaindex: f64,
    ) -> StorageResult<AccessPattern> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM elements WHERE id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::ElementNotFound(id.to_string()));
        }

        let pattern = match Self::load_access_pattern(&tx, id)? {
            Some(mut pattern) => {
                pattern.record(successful, recall_time, certaindex);
                pattern
            }
            None => AccessPattern::first(*id, successful, recall_time, certaindex),
        };

        tx.execute(
            "INSERT INTO access_patterns
                (element_id, id, access_count, successful_recalls, avg_recall_time, certaindex,
                 last_accessed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(element_id) DO UPDATE SET
                access_count = excluded.access_count,
                successful_recalls = excluded.successful_recalls,
                avg_recall_time = excluded.avg_recall_time,
                certaindex = excluded.certaindex,
                last_accessed_at = excluded.last_accessed_at,
                updated_at = excluded.updated_at",
            params![
                id.to_string(),
                pattern.id.to_string(),
                pattern.access_count as i64,
                pattern.successful_recalls as i64,
                pattern.avg_recall_time,
                pattern.certaindex,
                encode_time(&pattern.last_accessed_at),
                encode_time(&pattern.created_at),
                encode_time(&pattern.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(pattern)
    }

    fn get_access_pattern(&self, id: &ElementId) -> StorageResult<AccessPattern> {
        let conn = self.conn()?;
        Self::load_access_pattern(&conn, id)?
            .ok_or_else(|| StorageError::AccessPatternNotFound(id.to_string()))
    }

    // === Merge Candidates ===

    fn create_merge_candidate(&self, candidate: &MergeCandidate) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO merge_candidates (element1_id, element2_id, similarity, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                candidate.pair.first().to_string(),
                candidate.pair.second().to_string(),
                candidate.similarity.map(f64::from),
                serde_json::to_string(&candidate.metadata)?,
                encode_time(&candidate.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_merge_candidate(&self, pair: &ElementPair) -> StorageResult<MergeCandidate> {
        let conn = self.conn()?;
        Self::load_candidate(&conn, pair)
    }

    fn list_merge_candidates(&self) -> StorageResult<Vec<MergeCandidate>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM merge_candidates ORDER BY created_at, rowid");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], CandidateRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(CandidateRow::into_candidate).collect()
    }

    fn annotate_merge_candidate(&self, pair: &ElementPair, metadata: &Value) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let candidate = Self::load_candidate(&tx, pair)?;
        let updated = concat_json(&candidate.metadata, metadata);
        tx.execute(
            "UPDATE merge_candidates SET metadata_json = ?3 WHERE element1_id = ?1 AND element2_id = ?2",
            params![
                pair.first().to_string(),
                pair.second().to_string(),
                serde_json::to_string(&updated)?,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn apply_merge(
        &self,
        plan: &MergePlan,
        cancel: &CancellationToken,
    ) -> StorageResult<MergeOutcome> {
        let checkpoint = || {
            if cancel.is_cancelled() {
                Err(StorageError::Cancelled)
            } else {
                Ok(())
            }
        };

        let mut conn = self.conn()?;
        // Take the write lock up front so the liveness check below sees every
        // commit from other connections. Dropping without commit rolls back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        checkpoint()?;

        let mut originals = vec![plan.pair.first()];
        if !plan.pair.is_degenerate() {
            originals.push(plan.pair.second());
        }
        let mut loaded = Vec::with_capacity(originals.len());
        for id in originals {
            let original = Self::load_element(&tx, &id)?
                .ok_or_else(|| StorageError::ElementNotFound(id.to_string()))?;
            if let Some(successor) = original.merged_into() {
                return Err(StorageError::Conflict(format!(
                    "element {id} was already merged into {successor}"
                )));
            }
            loaded.push(original);
        }

        Self::insert_element(&tx, &plan.merged)?;
        checkpoint()?;

        let merged_id = plan.merged.id.to_string();
        let first = plan.pair.first().to_string();
        let second = plan.pair.second().to_string();
        let now = encode_time(&plan.merged_at);

        let redirected_sources = tx.execute(
            "UPDATE associations SET source_id = ?1, updated_at = ?4 WHERE source_id IN (?2, ?3)",
            params![merged_id, first, second, now],
        )?;
        checkpoint()?;

        let redirected_targets = tx.execute(
            "UPDATE associations SET target_id = ?1, updated_at = ?4 WHERE target_id IN (?2, ?3)",
            params![merged_id, first, second, now],
        )?;
        checkpoint()?;

        let tombstone = json!({
            MERGED_INTO_KEY: merged_id,
            MERGED_AT_KEY: plan.merged_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        let mut tombstoned = 0;
        for original in &loaded {
            let annotated = concat_json(&original.content, &tombstone);
            tombstoned += tx.execute(
                "UPDATE elements SET content_json = ?2, updated_at = ?3 WHERE id = ?1",
                params![original.id.to_string(), serde_json::to_string(&annotated)?, now],
            )?;
        }
        checkpoint()?;

        let cleared = tx.execute(
            "DELETE FROM merge_candidates WHERE element1_id = ?1 AND element2_id = ?2",
            params![first, second],
        )?;
        if cleared == 0 {
            return Err(StorageError::CandidateNotFound(plan.pair.to_string()));
        }
        checkpoint()?;

        tx.commit()?;
        debug!(
            merged = %plan.merged.id,
            redirected_sources,
            redirected_targets,
            "merge transaction committed"
        );
        Ok(MergeOutcome {
            redirected_sources,
            redirected_targets,
            tombstoned,
        })
    }
}

// === Row conversion ===

fn encode_time(time: &DateTime<Utc>) -> String {
    // Fixed-width so lexical order matches chronological order
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> StorageResult<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(StorageError::InvalidEmbedding(format!(
            "length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Parse a text column, surfacing failures as a column conversion error
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

struct ElementRow {
    id: ElementId,
    element_type: ElementType,
    content_json: String,
    embedding: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

impl ElementRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_column(row, 0)?,
            element_type: parse_column(row, 1)?,
            content_json: row.get(2)?,
            embedding: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_element(self) -> StorageResult<Element> {
        Ok(Element {
            id: self.id,
            element_type: self.element_type,
            content: serde_json::from_str(&self.content_json)?,
            embedding: self.embedding.as_deref().map(blob_to_embedding).transpose()?,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

struct AssociationRow {
    id: AssociationId,
    source: ElementId,
    target: ElementId,
    pattern_type: String,
    strength: f64,
    metadata_json: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AssociationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_column(row, 0)?,
            source: parse_column(row, 1)?,
            target: parse_column(row, 2)?,
            pattern_type: row.get(3)?,
            strength: row.get(4)?,
            metadata_json: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_association(self) -> StorageResult<Association> {
        Ok(Association {
            id: self.id,
            source: self.source,
            target: self.target,
            pattern_type: self.pattern_type,
            strength: self.strength as f32,
            metadata: self
                .metadata_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

struct AccessRow {
    id: Uuid,
    element_id: ElementId,
    access_count: i64,
    successful_recalls: i64,
    avg_recall_time: f64,
    certaindex: f64,
    last_accessed_at: String,
    created_at: String,
    updated_at: String,
}

impl AccessRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_column(row, 0)?,
            element_id: parse_column(row, 1)?,
            access_count: row.get(2)?,
            successful_recalls: row.get(3)?,
            avg_recall_time: row.get(4)?,
            certaindex: row.get(5)?,
            last_accessed_at: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_pattern(self) -> StorageResult<AccessPattern> {
        Ok(AccessPattern {
            id: self.id,
            element_id: self.element_id,
            access_count: self.access_count.max(0) as u64,
            successful_recalls: self.successful_recalls.max(0) as u64,
            avg_recall_time: self.avg_recall_time,
            certaindex: self.certaindex,
            last_accessed_at: parse_time(&self.last_accessed_at)?,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

struct CandidateRow {
    first: ElementId,
    second: ElementId,
    similarity: Option<f64>,
    metadata_json: String,
    created_at: String,
}

impl CandidateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            first: parse_column(row, 0)?,
            second: parse_column(row, 1)?,
            similarity: row.get(2)?,
            metadata_json: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_candidate(self) -> StorageResult<MergeCandidate> {
        Ok(MergeCandidate {
            pair: ElementPair::new(self.first, self.second),
            similarity: self.similarity.map(|s| s as f32),
            metadata: serde_json::from_str(&self.metadata_json)?,
            created_at: parse_time(&self.created_at)?,
        })
    }
}
