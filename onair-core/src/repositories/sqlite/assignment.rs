// File: onair-core/src/repositories/sqlite/assignment.rs

use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Sqlite, Transaction};
use tracing::{debug, info, warn};

use onair_common::error::Error;
use onair_common::models::{AssignmentScope, CurrentAssignment, SceneMarker, ALL_SCENES};
use onair_common::traits::repository_traits::CurrentAssignmentRepository;

/// Current-assignment rules over one membership table.
///
/// The same code serves media-in-group (`episode_media_groups`) and
/// group-in-episode (`media_groups`); [`AssignmentScope`] supplies the table
/// and column names.
#[derive(Clone)]
pub struct SqliteCurrentAssignmentRepository {
    pool: Pool<Sqlite>,
    scope: AssignmentScope,
    tracked_scenes: Vec<String>,
}

impl SqliteCurrentAssignmentRepository {
    pub fn new(pool: Pool<Sqlite>, scope: AssignmentScope, tracked_scenes: Vec<String>) -> Self {
        Self {
            pool,
            scope,
            tracked_scenes,
        }
    }

    pub fn media_in_group(pool: Pool<Sqlite>, tracked_scenes: Vec<String>) -> Self {
        Self::new(pool, AssignmentScope::MediaInGroup, tracked_scenes)
    }

    /// Group rotation within an episode. Nothing in this workspace claims
    /// groups yet; it is exposed for the episode and group management layer.
    pub fn group_in_episode(pool: Pool<Sqlite>, tracked_scenes: Vec<String>) -> Self {
        Self::new(pool, AssignmentScope::GroupInEpisode, tracked_scenes)
    }

    fn select_sql(&self, condition: &str) -> String {
        format!(
            r#"
            SELECT id AS row_id,
                   {scope} AS scope_id,
                   {target} AS target_id,
                   current_in_scene
            FROM {table}
            WHERE {condition}
            ORDER BY "order" ASC, id ASC
            "#,
            scope = self.scope.scope_column(),
            target = self.scope.target_column(),
            table = self.scope.table(),
        )
    }

    fn update_sql(&self, condition: &str) -> String {
        format!(
            "UPDATE {table} SET current_in_scene = ? WHERE {condition}",
            table = self.scope.table(),
        )
    }

    /// The tracked scene that is not `scene_id`. With more than two tracked
    /// scenes the lowest id wins.
    async fn complement_scene(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        scene_id: i64,
    ) -> Result<Option<i64>, Error> {
        if self.tracked_scenes.is_empty() {
            return Ok(None);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM scenes WHERE name IN (");
        let mut names = qb.separated(", ");
        for name in &self.tracked_scenes {
            names.push_bind(name.as_str());
        }
        names.push_unseparated(") ORDER BY id ASC");

        let ids: Vec<i64> = qb.build_query_scalar().fetch_all(&mut **tx).await?;
        let others: Vec<i64> = ids.into_iter().filter(|id| *id != scene_id).collect();
        if others.len() > 1 {
            warn!(
                "Scene {} has {} complements among tracked scenes; narrowing to scene {}",
                scene_id,
                others.len(),
                others[0]
            );
        }
        Ok(others.first().copied())
    }
}

#[async_trait]
impl CurrentAssignmentRepository for SqliteCurrentAssignmentRepository {
    fn scope(&self) -> AssignmentScope {
        self.scope
    }

    async fn set_current(&self, scope_id: i64, target_id: i64, scene_id: i64) -> Result<(), Error> {
        let scope_col = self.scope.scope_column();
        let target_col = self.scope.target_column();

        // Write lock before the membership read, or concurrent claims on a
        // file database fail with SQLITE_BUSY.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let assignment: Option<CurrentAssignment> = sqlx::query_as(
            &self.select_sql(&format!("{} = ? AND {} = ?", scope_col, target_col)),
        )
        .bind(scope_id)
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?;

        let assignment = assignment.ok_or_else(|| {
            Error::NotFound(format!(
                "{} {} is not a member of {} {}",
                self.scope.target_label(),
                target_id,
                self.scope.scope_label(),
                scope_id
            ))
        })?;

        match SceneMarker::from_scene_id(scene_id) {
            SceneMarker::AllScenes => {
                let cleared = sqlx::query(&self.update_sql(&format!(
                    "{} = ? AND id != ? AND current_in_scene IS NOT NULL",
                    scope_col
                )))
                .bind(None::<i64>)
                .bind(scope_id)
                .bind(assignment.row_id)
                .execute(&mut *tx)
                .await?;
                debug!(
                    "Cleared {} other current {}(s) in {} {}",
                    cleared.rows_affected(),
                    self.scope.target_label(),
                    self.scope.scope_label(),
                    scope_id
                );
            }
            SceneMarker::Scene(scene) => {
                let sentinel_holder: Option<CurrentAssignment> = sqlx::query_as(&self.select_sql(
                    &format!("{} = ? AND id != ? AND current_in_scene = ?", scope_col),
                ))
                .bind(scope_id)
                .bind(assignment.row_id)
                .bind(ALL_SCENES)
                .fetch_optional(&mut *tx)
                .await?;

                if let Some(holder) = sentinel_holder {
                    let narrowed = self.complement_scene(&mut tx, scene).await?;
                    if narrowed.is_none() {
                        warn!(
                            "No other tracked scene besides {}; deactivating {} {}",
                            scene,
                            self.scope.target_label(),
                            holder.target_id
                        );
                    }
                    sqlx::query(&self.update_sql("id = ?"))
                        .bind(narrowed)
                        .bind(holder.row_id)
                        .execute(&mut *tx)
                        .await?;
                    info!(
                        "Split {} {} in {} {} from all scenes to {:?}",
                        self.scope.target_label(),
                        holder.target_id,
                        self.scope.scope_label(),
                        scope_id,
                        narrowed
                    );
                }

                sqlx::query(&self.update_sql(&format!(
                    "{} = ? AND id != ? AND current_in_scene = ?",
                    scope_col
                )))
                .bind(None::<i64>)
                .bind(scope_id)
                .bind(assignment.row_id)
                .bind(scene)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(&self.update_sql("id = ?"))
            .bind(scene_id)
            .bind(assignment.row_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(
            "{} {} is now current in {} {} for scene {}",
            self.scope.target_label(),
            target_id,
            self.scope.scope_label(),
            scope_id,
            scene_id
        );
        Ok(())
    }

    async fn clear_current(&self, scope_id: i64, scene_id: i64) -> Result<u64, Error> {
        let scope_col = self.scope.scope_column();
        let result = match SceneMarker::from_scene_id(scene_id) {
            SceneMarker::AllScenes => {
                sqlx::query(&self.update_sql(&format!(
                    "{} = ? AND current_in_scene IS NOT NULL",
                    scope_col
                )))
                .bind(None::<i64>)
                .bind(scope_id)
                .execute(&self.pool)
                .await?
            }
            // An all-scenes target is current in every scene, so it goes too.
            SceneMarker::Scene(scene) => {
                sqlx::query(&self.update_sql(&format!(
                    "{} = ? AND (current_in_scene = ? OR current_in_scene = ?)",
                    scope_col
                )))
                .bind(None::<i64>)
                .bind(scope_id)
                .bind(scene)
                .bind(ALL_SCENES)
                .execute(&self.pool)
                .await?
            }
        };
        debug!(
            "Cleared {} current row(s) in {} {} for scene {}",
            result.rows_affected(),
            self.scope.scope_label(),
            scope_id,
            scene_id
        );
        Ok(result.rows_affected())
    }

    async fn get_current(&self, scope_id: i64, scene_id: i64) -> Result<CurrentAssignment, Error> {
        let scope_col = self.scope.scope_column();
        let found: Option<CurrentAssignment> = match SceneMarker::from_scene_id(scene_id) {
            SceneMarker::AllScenes => {
                sqlx::query_as(
                    &self.select_sql(&format!("{} = ? AND current_in_scene = ?", scope_col)),
                )
                .bind(scope_id)
                .bind(ALL_SCENES)
                .fetch_optional(&self.pool)
                .await?
            }
            SceneMarker::Scene(scene) => {
                sqlx::query_as(&self.select_sql(&format!(
                    "{} = ? AND (current_in_scene = ? OR current_in_scene = ?)",
                    scope_col
                )))
                .bind(scope_id)
                .bind(scene)
                .bind(ALL_SCENES)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        found.ok_or_else(|| {
            Error::NotFound(format!(
                "no current {} in {} {} for scene {}",
                self.scope.target_label(),
                self.scope.scope_label(),
                scope_id,
                scene_id
            ))
        })
    }

    async fn list_assignments(&self, scope_id: i64) -> Result<Vec<CurrentAssignment>, Error> {
        let rows = sqlx::query_as(
            &self.select_sql(&format!("{} = ?", self.scope.scope_column())),
        )
        .bind(scope_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
