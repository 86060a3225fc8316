//! SQLite gateway: node/edge tables plus markdown artifacts on disk

use super::lexical::{self, Candidate};
use super::memory::DEFAULT_EDGE_LABEL;
use super::traits::{Gateway, GatewayError, GatewayResult, SearchMode, SearchResult};
use crate::graph::{
    Edge, EdgeId, GraphSnapshot, Metadata, Node, NodeId, NodeType, PropertyValue, META_X, META_Y,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// (id, node_type, title, content_path, metadata_json, created_at, updated_at)
type NodeRow = (String, String, String, String, String, String, String);

/// Directory holding one markdown file per node that has saved content
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, file_name: &str, content: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.root.join(file_name), content)
    }

    fn read(&self, file_name: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.root.join(file_name))
    }

    fn remove(&self, file_name: &str) -> std::io::Result<()> {
        let path = self.root.join(file_name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// SQLite-backed gateway
///
/// Thread-safe via internal mutex on the connection. Every call runs on the
/// blocking pool so database and artifact-file I/O never stalls the runtime.
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
    artifacts: ArtifactDir,
}

impl SqliteGateway {
    /// Open or create a database at `path`, storing artifacts under `artifacts`
    pub fn open(path: impl AsRef<Path>, artifacts: impl Into<PathBuf>) -> GatewayResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            artifacts: ArtifactDir::new(artifacts),
        })
    }

    /// In-memory database; artifacts still go to disk
    pub fn open_in_memory(artifacts: impl Into<PathBuf>) -> GatewayResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            artifacts: ArtifactDir::new(artifacts),
        })
    }

    pub fn artifacts(&self) -> &ArtifactDir {
        &self.artifacts
    }

    /// Run `f` against the connection on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> GatewayResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &ArtifactDir) -> GatewayResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let artifacts = self.artifacts.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            f(&conn, &artifacts)
        })
        .await?
    }

    fn init_schema(conn: &Connection) -> GatewayResult<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL,
                title TEXT NOT NULL,
                content_path TEXT NOT NULL DEFAULT '',
                metadata_json TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                label TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (source) REFERENCES nodes(id) ON DELETE CASCADE,
                FOREIGN KEY (target) REFERENCES nodes(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_edges_pair ON edges(source, target);
            "#,
        )?;
        Ok(())
    }

    fn row_to_node(row: NodeRow) -> GatewayResult<Node> {
        let (id, node_type, title, content_path, metadata_json, created_at, updated_at) = row;
        let node_type: NodeType = node_type.parse().map_err(GatewayError::Rejected)?;
        // Unreadable metadata degrades to empty rather than hiding the node
        let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
        Ok(Node {
            id: NodeId::from_string(id),
            node_type,
            title,
            content_path,
            metadata,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn read_node_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn load_node(conn: &Connection, id: &NodeId) -> GatewayResult<Option<Node>> {
        let row = conn
            .query_row(
                "SELECT id, node_type, title, content_path, metadata_json, created_at, updated_at
                 FROM nodes WHERE id = ?1",
                params![id.as_str()],
                Self::read_node_row,
            )
            .optional()?;
        row.map(Self::row_to_node).transpose()
    }

    fn load_all_nodes(conn: &Connection) -> GatewayResult<Vec<Node>> {
        let mut stmt = conn.prepare(
            "SELECT id, node_type, title, content_path, metadata_json, created_at, updated_at
             FROM nodes ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map([], Self::read_node_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::row_to_node).collect()
    }

    fn load_all_edges(conn: &Connection) -> GatewayResult<Vec<Edge>> {
        let mut stmt =
            conn.prepare("SELECT id, source, target, label FROM edges ORDER BY created_at, id")?;
        let edges = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let source: String = row.get(1)?;
                let target: String = row.get(2)?;
                let label: String = row.get(3)?;
                Ok(Edge::new(
                    EdgeId::from_string(id),
                    NodeId::from_string(source),
                    NodeId::from_string(target),
                )
                .with_label(label))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    fn require(conn: &Connection, id: &NodeId) -> GatewayResult<()> {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM nodes WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(GatewayError::NotFound(id.clone()))
        }
    }

    fn content_of(artifacts: &ArtifactDir, node: &Node) -> GatewayResult<String> {
        if node.content_path.is_empty() {
            return Ok(String::new());
        }
        match artifacts.read(&node.content_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_timestamp(s: &str) -> GatewayResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GatewayError::Rejected(format!("bad timestamp {:?}: {}", s, e)))
}

#[async_trait]
impl Gateway for SqliteGateway {
    async fn create_node(&self, title: &str, node_type: NodeType) -> GatewayResult<Node> {
        let node = Node::new(NodeId::generate(), node_type, title);
        self.blocking(move |conn, _| {
            conn.execute(
                "INSERT INTO nodes (id, node_type, title, content_path, metadata_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    node.id.as_str(),
                    node.node_type.as_str(),
                    node.title,
                    node.content_path,
                    serde_json::to_string(&node.metadata)?,
                    node.created_at.to_rfc3339(),
                    node.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(node)
        })
        .await
    }

    async fn get_node(&self, id: &NodeId) -> GatewayResult<Node> {
        let id = id.clone();
        self.blocking(move |conn, _| {
            Self::load_node(conn, &id)?.ok_or(GatewayError::NotFound(id))
        })
        .await
    }

    async fn save_node_content(&self, id: &NodeId, content: &str) -> GatewayResult<()> {
        let id = id.clone();
        let content = content.to_string();
        self.blocking(move |conn, artifacts| {
            Self::require(conn, &id)?;

            let file_name = format!("{}.md", id);
            artifacts.write(&file_name, &content)?;
            conn.execute(
                "UPDATE nodes SET content_path = ?1, updated_at = ?2 WHERE id = ?3",
                params![file_name, Utc::now().to_rfc3339(), id.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_node_content(&self, id: &NodeId) -> GatewayResult<String> {
        let id = id.clone();
        self.blocking(move |conn, artifacts| {
            let node = Self::load_node(conn, &id)?.ok_or(GatewayError::NotFound(id))?;
            Self::content_of(artifacts, &node)
        })
        .await
    }

    async fn delete_node(&self, id: &NodeId) -> GatewayResult<()> {
        let id = id.clone();
        self.blocking(move |conn, artifacts| {
            if let Some(node) = Self::load_node(conn, &id)? {
                if !node.content_path.is_empty() {
                    // A missing artifact file must not block the row delete
                    if let Err(e) = artifacts.remove(&node.content_path) {
                        tracing::warn!(node = %id, error = %e, "failed to remove artifact file");
                    }
                }
            }
            conn.execute("DELETE FROM nodes WHERE id = ?1", params![id.as_str()])?;
            Ok(())
        })
        .await
    }

    async fn update_node_position(&self, id: &NodeId, x: f64, y: f64) -> GatewayResult<()> {
        let id = id.clone();
        self.blocking(move |conn, _| {
            let current: Option<String> = conn
                .query_row(
                    "SELECT metadata_json FROM nodes WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let current = current.ok_or_else(|| GatewayError::NotFound(id.clone()))?;

            let mut metadata: Metadata = serde_json::from_str(&current).unwrap_or_default();
            metadata.insert(META_X.to_string(), PropertyValue::Float(x));
            metadata.insert(META_Y.to_string(), PropertyValue::Float(y));

            conn.execute(
                "UPDATE nodes SET metadata_json = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    serde_json::to_string(&metadata)?,
                    Utc::now().to_rfc3339(),
                    id.as_str()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn connect_nodes(
        &self,
        source: &NodeId,
        target: &NodeId,
        label: Option<&str>,
    ) -> GatewayResult<()> {
        let source = source.clone();
        let target = target.clone();
        let label = label.unwrap_or(DEFAULT_EDGE_LABEL).to_string();
        self.blocking(move |conn, _| {
            Self::require(conn, &source)?;
            Self::require(conn, &target)?;

            let existing: i64 = conn.query_row(
                "SELECT COUNT(*) FROM edges WHERE source = ?1 AND target = ?2",
                params![source.as_str(), target.as_str()],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Ok(());
            }

            conn.execute(
                "INSERT INTO edges (id, source, target, label, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    EdgeId::generate().as_str(),
                    source.as_str(),
                    target.as_str(),
                    label,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn disconnect_nodes(&self, source: &NodeId, target: &NodeId) -> GatewayResult<()> {
        let source = source.clone();
        let target = target.clone();
        self.blocking(move |conn, _| {
            conn.execute(
                "DELETE FROM edges WHERE source = ?1 AND target = ?2",
                params![source.as_str(), target.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_graph_data(&self) -> GatewayResult<GraphSnapshot> {
        self.blocking(|conn, _| {
            let nodes = Self::load_all_nodes(conn)?;
            let edges = Self::load_all_edges(conn)?;
            Ok(GraphSnapshot::new(nodes, edges))
        })
        .await
    }

    async fn search_nodes(&self, query: &str, mode: SearchMode) -> GatewayResult<Vec<SearchResult>> {
        let query = query.to_string();
        self.blocking(move |conn, artifacts| {
            let nodes = Self::load_all_nodes(conn)?;
            let mut documents = Vec::with_capacity(nodes.len());
            for node in &nodes {
                documents.push((node, Self::content_of(artifacts, node)?));
            }
            lexical::search(
                &query,
                mode,
                documents.iter().map(|(node, content)| Candidate {
                    id: &node.id,
                    title: &node.title,
                    content,
                }),
            )
        })
        .await
    }
}
