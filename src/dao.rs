use crate::model::{Link, NewLink};
use crate::utils::with_timeout;
use async_trait::async_trait;
use sqlx::migrate::MigrateError;
use sqlx::{Pool, Sqlite};
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Hard cap on rows returned by a single `list` call.
pub const LIST_LIMIT: u32 = 50;
const STORE_TIMEOUT: u64 = 2000;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store operation timed out")]
    Timeout(#[from] Elapsed),
}

/// Persistent repository of saved links. Every call is atomic on its own;
/// nothing spans more than one call.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn create(&self, new_link: &NewLink) -> Result<i64, StoreError>;

    /// Newest first. `tag_filter` is a substring match on the normalized tags.
    async fn list(&self, tag_filter: Option<&str>, limit: u32) -> Result<Vec<Link>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Link>, StoreError>;

    /// Returns the removed row, or `None` if there was nothing to remove.
    async fn delete(&self, id: i64) -> Result<Option<Link>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteLinkStore {
    db_connection_pool: Pool<Sqlite>,
}

impl SqliteLinkStore {
    pub fn new(db_connection_pool: Pool<Sqlite>) -> Self {
        Self { db_connection_pool }
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!().run(&self.db_connection_pool).await
    }
}

#[async_trait]
impl LinkStore for SqliteLinkStore {
    async fn create(&self, new_link: &NewLink) -> Result<i64, StoreError> {
        let id: i64 = with_timeout(
            STORE_TIMEOUT,
            sqlx::query_scalar(
                r#"
                  insert into links(url, title, tags, added_by_id, added_by_name, added_at)
                  values (?, ?, ?, ?, ?, ?)
                  returning id
                "#,
            )
            .bind(&new_link.url)
            .bind(&new_link.title)
            .bind(&new_link.tags)
            .bind(new_link.added_by_id)
            .bind(&new_link.added_by_name)
            .bind(new_link.added_at)
            .fetch_one(&self.db_connection_pool),
        )
        .await??;
        Ok(id)
    }

    async fn list(&self, tag_filter: Option<&str>, limit: u32) -> Result<Vec<Link>, StoreError> {
        let limit = limit.min(LIST_LIMIT);
        let query = match tag_filter {
            Some(tag) => sqlx::query_as::<Sqlite, Link>(
                r#"
                  select id, url, title, tags, added_by_id, added_by_name, added_at from links
                  where instr(tags, ?) > 0 order by id desc limit ?
                "#,
            )
            .bind(tag.to_string())
            .bind(limit),
            None => sqlx::query_as::<Sqlite, Link>(
                r#"
                  select id, url, title, tags, added_by_id, added_by_name, added_at from links
                  order by id desc limit ?
                "#,
            )
            .bind(limit),
        };
        let links = with_timeout(STORE_TIMEOUT, query.fetch_all(&self.db_connection_pool)).await??;
        Ok(links)
    }

    async fn get(&self, id: i64) -> Result<Option<Link>, StoreError> {
        let link = with_timeout(
            STORE_TIMEOUT,
            sqlx::query_as(
                "select id, url, title, tags, added_by_id, added_by_name, added_at from links where id = ?",
            )
            .bind(id)
            .fetch_optional(&self.db_connection_pool),
        )
        .await??;
        Ok(link)
    }

    async fn delete(&self, id: i64) -> Result<Option<Link>, StoreError> {
        let link = with_timeout(
            STORE_TIMEOUT,
            sqlx::query_as(
                r#"
                  delete from links where id = ?
                  returning id, url, title, tags, added_by_id, added_by_name, added_at
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db_connection_pool),
        )
        .await??;
        Ok(link)
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> SqliteLinkStore {
    // Single connection so the pool never hands back a fresh, empty database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteLinkStore::new(pool);
    store.migrate().await.unwrap();
    store
}

#[cfg(test)]
pub(crate) fn new_link(url: &str, tags: Option<&str>, added_by_id: i64) -> NewLink {
    NewLink {
        url: url.to_string(),
        title: None,
        tags: tags.map(str::to_string),
        added_by_id,
        added_by_name: format!("member-{added_by_id}"),
        added_at: chrono::Utc::now(),
    }
}
