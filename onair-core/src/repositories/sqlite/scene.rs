// File: onair-core/src/repositories/sqlite/scene.rs

use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{debug, info};

use onair_common::error::Error;
use onair_common::models::{Scene, Source};
use onair_common::traits::repository_traits::SceneRepository;

const SOURCE_COLUMNS: &str =
    "id, scene_id, name, source_type, source_order, is_visible, icon_url, color";

#[derive(Clone)]
pub struct SqliteSceneRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSceneRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SceneRepository for SqliteSceneRepository {
    async fn get_scene_by_name(&self, name: &str) -> Result<Option<Scene>, Error> {
        let scene = sqlx::query_as::<_, Scene>(
            r#"
            SELECT id, name, created_at
            FROM scenes
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(scene)
    }

    async fn get_scenes_by_names(&self, names: &[String]) -> Result<Vec<Scene>, Error> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name, created_at FROM scenes WHERE name IN (");
        let mut list = qb.separated(", ");
        for name in names {
            list.push_bind(name.as_str());
        }
        list.push_unseparated(") ORDER BY id ASC");

        let scenes = qb.build_query_as::<Scene>().fetch_all(&self.pool).await?;
        Ok(scenes)
    }

    async fn ensure_scene(&self, name: &str) -> Result<Scene, Error> {
        let inserted = sqlx::query("INSERT OR IGNORE INTO scenes (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if inserted.rows_affected() > 0 {
            info!("Created scene {}", name);
        }

        self.get_scene_by_name(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("scene {}", name)))
    }

    async fn list_sources(&self, scene_id: i64) -> Result<Vec<Source>, Error> {
        let sources = sqlx::query_as::<_, Source>(&format!(
            "SELECT {} FROM sources WHERE scene_id = ? ORDER BY source_order ASC, id ASC",
            SOURCE_COLUMNS
        ))
        .bind(scene_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn get_source(&self, scene_id: i64, name: &str) -> Result<Option<Source>, Error> {
        let source = sqlx::query_as::<_, Source>(&format!(
            "SELECT {} FROM sources WHERE scene_id = ? AND name = ?",
            SOURCE_COLUMNS
        ))
        .bind(scene_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    async fn create_source(
        &self,
        scene_id: i64,
        name: &str,
        source_type: &str,
        source_order: i64,
    ) -> Result<Source, Error> {
        let source = sqlx::query_as::<_, Source>(&format!(
            r#"
            INSERT INTO sources (scene_id, name, source_type, source_order, is_visible)
            VALUES (?, ?, ?, ?, 0)
            RETURNING {}
            "#,
            SOURCE_COLUMNS
        ))
        .bind(scene_id)
        .bind(name)
        .bind(source_type)
        .bind(source_order)
        .fetch_one(&self.pool)
        .await?;

        info!("Created source {} (type {}) in scene {}", name, source_type, scene_id);
        Ok(source)
    }

    async fn set_source_visibility(&self, source_id: i64, visible: bool) -> Result<(), Error> {
        let result = sqlx::query("UPDATE sources SET is_visible = ? WHERE id = ?")
            .bind(visible)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("source {}", source_id)));
        }
        debug!("Stored visibility {} for source {}", visible, source_id);
        Ok(())
    }

    async fn set_source_order(&self, scene_id: i64, name: &str, order: i64) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET source_order = ?
            WHERE scene_id = ? AND name = ?
            "#,
        )
        .bind(order)
        .bind(scene_id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
