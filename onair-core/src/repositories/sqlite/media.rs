// File: onair-core/src/repositories/sqlite/media.rs

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tracing::info;

use onair_common::error::Error;
use onair_common::models::{Episode, EpisodeMedia, EpisodeSource, GroupMediaEntry, MediaGroup};
use onair_common::traits::repository_traits::MediaRepository;

const EPISODE_SOURCE_COLUMNS: &str =
    "id, episode_id, source_name, media_id, group_id, assigned_by, updated_at";

#[derive(Clone)]
pub struct SqliteMediaRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMediaRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    async fn get_current_episode(&self) -> Result<Option<Episode>, Error> {
        let episode = sqlx::query_as::<_, Episode>(
            r#"
            SELECT id, season_id, episode_number, season_episode, title, is_current
            FROM episodes
            WHERE is_current = 1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(episode)
    }

    async fn get_media(&self, media_id: i64) -> Result<Option<EpisodeMedia>, Error> {
        let media = sqlx::query_as::<_, EpisodeMedia>(
            r#"
            SELECT id, episode_id, title, description, file_path, url
            FROM episode_media
            WHERE id = ?
            "#,
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(media)
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<MediaGroup>, Error> {
        let group = sqlx::query_as::<_, MediaGroup>(
            r#"
            SELECT id, episode_id, name, description, "order", is_system, current_in_scene
            FROM media_groups
            WHERE id = ?
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn get_group_by_name(&self, episode_id: i64, name: &str) -> Result<Option<MediaGroup>, Error> {
        let group = sqlx::query_as::<_, MediaGroup>(
            r#"
            SELECT id, episode_id, name, description, "order", is_system, current_in_scene
            FROM media_groups
            WHERE episode_id = ? AND name = ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(episode_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn list_group_media(&self, group_id: i64) -> Result<Vec<GroupMediaEntry>, Error> {
        let entries = sqlx::query_as::<_, GroupMediaEntry>(
            r#"
            SELECT emg.id AS membership_id,
                   em.id AS media_id,
                   emg."order" AS "order",
                   emg.current_in_scene,
                   em.title,
                   em.file_path
            FROM episode_media_groups emg
            JOIN episode_media em ON em.id = emg.episode_media_id
            WHERE emg.media_group_id = ?
            ORDER BY emg."order" ASC, emg.id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn get_episode_source(
        &self,
        episode_id: i64,
        source_name: &str,
    ) -> Result<Option<EpisodeSource>, Error> {
        let row = sqlx::query_as::<_, EpisodeSource>(&format!(
            "SELECT {} FROM episode_sources WHERE episode_id = ? AND source_name = ?",
            EPISODE_SOURCE_COLUMNS
        ))
        .bind(episode_id)
        .bind(source_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_episode_source_media(
        &self,
        episode_id: i64,
        source_name: &str,
        media_id: i64,
        assigned_by: &str,
    ) -> Result<EpisodeSource, Error> {
        let row = sqlx::query_as::<_, EpisodeSource>(&format!(
            r#"
            INSERT INTO episode_sources (episode_id, source_name, media_id, group_id, assigned_by)
            VALUES (?, ?, ?, NULL, ?)
            ON CONFLICT (episode_id, source_name) DO UPDATE
            SET media_id = excluded.media_id,
                group_id = NULL,
                assigned_by = excluded.assigned_by,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            EPISODE_SOURCE_COLUMNS
        ))
        .bind(episode_id)
        .bind(source_name)
        .bind(media_id)
        .bind(assigned_by)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Episode {}: {} now plays media {} ({})",
            episode_id, source_name, media_id, assigned_by
        );
        Ok(row)
    }

    async fn set_episode_source_group(
        &self,
        episode_id: i64,
        source_name: &str,
        group_id: i64,
        assigned_by: &str,
    ) -> Result<EpisodeSource, Error> {
        let row = sqlx::query_as::<_, EpisodeSource>(&format!(
            r#"
            INSERT INTO episode_sources (episode_id, source_name, media_id, group_id, assigned_by)
            VALUES (?, ?, NULL, ?, ?)
            ON CONFLICT (episode_id, source_name) DO UPDATE
            SET group_id = excluded.group_id,
                media_id = NULL,
                assigned_by = excluded.assigned_by,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            EPISODE_SOURCE_COLUMNS
        ))
        .bind(episode_id)
        .bind(source_name)
        .bind(group_id)
        .bind(assigned_by)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Episode {}: {} now plays group {} ({})",
            episode_id, source_name, group_id, assigned_by
        );
        Ok(row)
    }
}
