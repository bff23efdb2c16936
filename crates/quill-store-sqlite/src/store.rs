//! [`SqliteStore`]: the SQLite implementation of [`DocumentStore`] and
//! [`BlobStore`].

use std::{path::Path, sync::Arc};

use bytes::Bytes;
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use serde_json::{Map, Value};
use uuid::Uuid;

use quill_core::{
  AssetLocator, BlobStore, CollectionPath, DocumentStore, SortDirection,
  StoredDocument,
};

use crate::{
  Error, Result,
  encode::{RawDocument, content_hash, encode_body, encode_dt, json_path},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quill document and blob store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:            tokio_rusqlite::Connection,
  /// Prefix joined with a locator to form the URL handed to clients.
  public_base_url: Arc<str>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(
    path: impl AsRef<Path>,
    public_base_url: impl Into<String>,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, public_base_url: public_base_url.into().into() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, public_base_url: "memory://blobs".into() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Raw bytes and media type of a blob, for serving it.
  pub async fn read_blob(&self, locator: &AssetLocator) -> Result<(Bytes, String)> {
    let path = locator.as_str().to_owned();
    let row: Option<(Vec<u8>, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT bytes, media_type FROM blobs WHERE path = ?1",
            rusqlite::params![path],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?)
      })
      .await?;

    row
      .map(|(bytes, media_type)| (Bytes::from(bytes), media_type))
      .ok_or_else(|| Error::BlobNotFound(locator.as_str().to_owned()))
  }

  async fn blob_exists(&self, path: String) -> Result<bool> {
    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM blobs WHERE path = ?1",
            rusqlite::params![path],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;
    Ok(exists)
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn create(
    &self,
    collection: CollectionPath,
    body: Map<String, Value>,
  ) -> Result<String> {
    let id = Uuid::new_v4().hyphenated().to_string();
    let body_str = encode_body(&body)?;
    let coll_str = collection.as_str().to_owned();
    let id_str = id.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)",
          rusqlite::params![coll_str, id_str, body_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(%collection, %id, "document created");
    Ok(id)
  }

  async fn get(
    &self,
    collection: CollectionPath,
    id: String,
  ) -> Result<Option<StoredDocument>> {
    let coll_str = collection.as_str().to_owned();

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT doc_id, body FROM documents WHERE collection = ?1 AND doc_id = ?2",
            rusqlite::params![coll_str, id],
            |row| Ok(RawDocument { doc_id: row.get(0)?, body: row.get(1)? }),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDocument::into_document).transpose()
  }

  async fn update(
    &self,
    collection: CollectionPath,
    id: String,
    body: Map<String, Value>,
  ) -> Result<()> {
    let body_str = encode_body(&body)?;
    let coll_str = collection.as_str().to_owned();
    let id_str = id.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE documents SET body = ?3 WHERE collection = ?1 AND doc_id = ?2",
          rusqlite::params![coll_str, id_str, body_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::DocumentNotFound {
        collection: collection.to_string(),
        id,
      });
    }
    tracing::debug!(%collection, %id, "document overwritten");
    Ok(())
  }

  async fn delete(&self, collection: CollectionPath, id: String) -> Result<()> {
    let coll_str = collection.as_str().to_owned();
    let id_str = id.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2",
          rusqlite::params![coll_str, id_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(%collection, %id, "document deleted");
    Ok(())
  }

  async fn list_ordered(
    &self,
    collection: CollectionPath,
    order_field: &'static str,
    direction: SortDirection,
  ) -> Result<Vec<StoredDocument>> {
    let coll_str = collection.as_str().to_owned();
    let path = json_path(order_field);
    let dir = match direction {
      SortDirection::Ascending => "ASC",
      SortDirection::Descending => "DESC",
    };

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        // Missing order values go last in either direction.
        let sql = format!(
          "SELECT doc_id, body FROM documents
           WHERE collection = ?1
           ORDER BY json_extract(body, ?2) IS NULL,
                    json_extract(body, ?2) {dir},
                    doc_id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![coll_str, path], |row| {
            Ok(RawDocument { doc_id: row.get(0)?, body: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }
}

// ─── BlobStore impl ──────────────────────────────────────────────────────────

impl BlobStore for SqliteStore {
  type Error = Error;

  async fn put(
    &self,
    path: String,
    bytes: Bytes,
    media_type: String,
  ) -> Result<AssetLocator> {
    if self.blob_exists(path.clone()).await? {
      return Err(Error::BlobExists(path));
    }

    let hash = content_hash(&bytes);
    let at_str = encode_dt(Utc::now());
    let path_str = path.clone();
    let size = bytes.len();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO blobs (path, media_type, bytes, content_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![path_str, media_type, bytes.as_ref(), hash, at_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(%path, size, "blob stored");
    Ok(AssetLocator::new(path))
  }

  async fn resolve(&self, locator: AssetLocator) -> Result<String> {
    if !self.blob_exists(locator.as_str().to_owned()).await? {
      return Err(Error::BlobNotFound(locator.as_str().to_owned()));
    }
    Ok(format!(
      "{}/{}",
      self.public_base_url.trim_end_matches('/'),
      locator.as_str()
    ))
  }

  async fn delete(&self, locator: AssetLocator) -> Result<()> {
    let path = locator.as_str().to_owned();
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM blobs WHERE path = ?1", rusqlite::params![path])?)
      })
      .await?;

    if removed == 0 {
      return Err(Error::BlobNotFound(locator.as_str().to_owned()));
    }
    tracing::debug!(%locator, "blob deleted");
    Ok(())
  }
}
