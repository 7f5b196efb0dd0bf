use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, QueryBuilder};

use crate::{
    db::DatasetStore,
    error::{AppError, AppResult},
    models::{
        BootstrapMarker, CuratedCollectionSnapshot, MediaKind, RecommendationRecord, RecordFilter,
        RejectedSuggestion, ResetMarker,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const RECORD_COLUMNS: &str = "user_id, library_id, external_id, media_kind, title, status, points, \
     download_approval, vote_average, vote_count, poster_ref, sent_at, created_at, updated_at";

#[derive(FromRow)]
struct RecordRow {
    user_id: String,
    library_id: String,
    external_id: String,
    media_kind: String,
    title: Option<String>,
    status: String,
    points: i32,
    download_approval: String,
    vote_average: Option<f64>,
    vote_count: Option<i64>,
    poster_ref: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for RecommendationRecord {
    type Error = AppError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(RecommendationRecord {
            user_id: row.user_id,
            library_id: row.library_id,
            media_kind: row.media_kind.parse()?,
            external_id: row.external_id,
            title: row.title,
            status: row.status.parse()?,
            points: u32::try_from(row.points).unwrap_or(0),
            download_approval: row.download_approval.parse()?,
            vote_average: row.vote_average,
            vote_count: row.vote_count,
            poster_ref: row.poster_ref,
            sent_at: row.sent_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct RejectionRow {
    user_id: String,
    media_kind: String,
    external_source: String,
    external_id: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RejectionRow> for RejectedSuggestion {
    type Error = AppError;

    fn try_from(row: RejectionRow) -> Result<Self, Self::Error> {
        Ok(RejectedSuggestion {
            user_id: row.user_id,
            media_kind: row.media_kind.parse()?,
            external_source: row.external_source,
            external_id: row.external_id,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

/// Appends `WHERE ...` for every set field of the filter
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &RecordFilter) {
    builder.push(" WHERE TRUE");
    if let Some(user_id) = &filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id.clone());
    }
    if let Some(library_id) = &filter.library_id {
        builder.push(" AND library_id = ").push_bind(library_id.clone());
    }
    if let Some(kind) = filter.media_kind {
        builder.push(" AND media_kind = ").push_bind(kind.as_str());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(ids) = &filter.external_ids {
        builder
            .push(" AND external_id = ANY(")
            .push_bind(ids.clone())
            .push(")");
    }
}

/// Dataset store backed by PostgreSQL
#[derive(Clone)]
pub struct PgDatasetStore {
    pool: PgPool,
}

impl PgDatasetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DatasetStore for PgDatasetStore {
    async fn upsert_record(&self, record: &RecommendationRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recommendation_records (
                user_id, library_id, external_id, media_kind, title, status, points,
                download_approval, vote_average, vote_count, poster_ref, sent_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (user_id, library_id, external_id) DO UPDATE SET
                media_kind = EXCLUDED.media_kind,
                title = EXCLUDED.title,
                status = EXCLUDED.status,
                points = EXCLUDED.points,
                download_approval = EXCLUDED.download_approval,
                vote_average = EXCLUDED.vote_average,
                vote_count = EXCLUDED.vote_count,
                poster_ref = EXCLUDED.poster_ref,
                sent_at = EXCLUDED.sent_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.library_id)
        .bind(&record.external_id)
        .bind(record.media_kind.as_str())
        .bind(&record.title)
        .bind(record.status.as_str())
        .bind(i32::try_from(record.points).unwrap_or(i32::MAX))
        .bind(record.download_approval.as_str())
        .bind(record.vote_average)
        .bind(record.vote_count)
        .bind(&record.poster_ref)
        .bind(record.sent_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_records(&self, filter: &RecordFilter) -> AppResult<Vec<RecommendationRecord>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {} FROM recommendation_records",
            RECORD_COLUMNS
        ));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at, external_id");

        let rows: Vec<RecordRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(RecommendationRecord::try_from).collect()
    }

    async fn delete_records(&self, filter: &RecordFilter) -> AppResult<u64> {
        let mut builder = QueryBuilder::new("DELETE FROM recommendation_records");
        push_filter(&mut builder, filter);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn count_records(&self, filter: &RecordFilter) -> AppResult<u64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM recommendation_records");
        push_filter(&mut builder, filter);
        let (count,): (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn upsert_rejection(&self, rejection: &RejectedSuggestion) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rejected_suggestions
                (user_id, media_kind, external_source, external_id, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, media_kind, external_source, external_id)
            DO UPDATE SET reason = EXCLUDED.reason
            "#,
        )
        .bind(&rejection.user_id)
        .bind(rejection.media_kind.as_str())
        .bind(&rejection.external_source)
        .bind(&rejection.external_id)
        .bind(&rejection.reason)
        .bind(rejection.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_rejection(
        &self,
        user_id: &str,
        kind: MediaKind,
        external_source: &str,
        external_id: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM rejected_suggestions
            WHERE user_id = $1 AND media_kind = $2 AND external_source = $3 AND external_id = $4
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(external_source)
        .bind(external_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_rejections(
        &self,
        user_id: &str,
        kind: MediaKind,
    ) -> AppResult<Vec<RejectedSuggestion>> {
        let rows: Vec<RejectionRow> = sqlx::query_as(
            r#"
            SELECT user_id, media_kind, external_source, external_id, reason, created_at
            FROM rejected_suggestions
            WHERE user_id = $1 AND media_kind = $2
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RejectedSuggestion::try_from).collect()
    }

    async fn reset_marker(
        &self,
        kind: MediaKind,
        library_id: &str,
    ) -> AppResult<Option<ResetMarker>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT created_at FROM reset_markers WHERE media_kind = $1 AND library_id = $2",
        )
        .bind(kind.as_str())
        .bind(library_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(created_at,)| ResetMarker {
            media_kind: kind,
            library_id: library_id.to_string(),
            created_at,
        }))
    }

    async fn put_reset_marker(&self, marker: &ResetMarker) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reset_markers (media_kind, library_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (media_kind, library_id) DO NOTHING
            "#,
        )
        .bind(marker.media_kind.as_str())
        .bind(&marker.library_id)
        .bind(marker.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn bootstrap_marker(
        &self,
        user_id: &str,
        kind: MediaKind,
        library_id: &str,
    ) -> AppResult<Option<BootstrapMarker>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT created_at FROM bootstrap_markers
            WHERE user_id = $1 AND media_kind = $2 AND library_id = $3
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(library_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(created_at,)| BootstrapMarker {
            user_id: user_id.to_string(),
            media_kind: kind,
            library_id: library_id.to_string(),
            created_at,
        }))
    }

    async fn put_bootstrap_marker(&self, marker: &BootstrapMarker) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bootstrap_markers (user_id, media_kind, library_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, media_kind, library_id) DO NOTHING
            "#,
        )
        .bind(&marker.user_id)
        .bind(marker.media_kind.as_str())
        .bind(&marker.library_id)
        .bind(marker.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_snapshot(&self, snapshot: &CuratedCollectionSnapshot) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO collection_snapshots
                (user_id, library_id, collection_name, external_ids, item_refs, applied_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, library_id, collection_name) DO UPDATE SET
                external_ids = EXCLUDED.external_ids,
                item_refs = EXCLUDED.item_refs,
                applied_at = EXCLUDED.applied_at
            "#,
        )
        .bind(&snapshot.user_id)
        .bind(&snapshot.library_id)
        .bind(&snapshot.collection_name)
        .bind(&snapshot.external_ids)
        .bind(&snapshot.item_refs)
        .bind(snapshot.applied_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_users(&self) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT user_id
            FROM recommendation_records
            GROUP BY user_id
            ORDER BY MIN(created_at), user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
    }
}
