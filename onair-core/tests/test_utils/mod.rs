// File: onair-core/tests/test_utils/mod.rs
#![allow(dead_code)]

use std::path::PathBuf;

use onair_core::{Database, Error};

/// Scene ids used by the fixtures. Deliberately not 1 and 2 so an id mix-up
/// with row ids shows.
pub const MEDIA_SCENE: i64 = 5;
pub const REPORTAZE_SCENE: i64 = 9;
pub const MIC_SCENE: i64 = 12;

pub fn tracked_scenes() -> Vec<String> {
    vec!["MEDIA".to_string(), "REPORTAZE".to_string()]
}

/// A fresh in-memory database with all migrations applied.
pub async fn setup_test_database() -> Result<Database, Error> {
    let db = Database::in_memory().await?;
    db.migrate().await?;
    Ok(db)
}

/// A SQLite file under the temp dir, removed again on drop.
pub struct TempDatabaseFile {
    pub path: PathBuf,
}

impl Drop for TempDatabaseFile {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// A migrated database on a fresh file, opened through the regular
/// multi-connection pool.
pub async fn setup_file_database() -> Result<(Database, TempDatabaseFile), Error> {
    let file = TempDatabaseFile {
        path: std::env::temp_dir().join(format!("onair-test-{}.db", uuid::Uuid::new_v4())),
    };
    let db = Database::new(&format!("sqlite://{}", file.path.display())).await?;
    db.migrate().await?;
    Ok((db, file))
}

/// Season 1, current episode 1 and the three show scenes. Returns the
/// episode id.
pub async fn seed_show(db: &Database) -> Result<i64, Error> {
    let pool = db.pool();
    sqlx::query("INSERT INTO seasons (id, number, is_current) VALUES (1, 1, 1)")
        .execute(pool)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO episodes (id, season_id, episode_number, season_episode, title, is_current)
        VALUES (1, 1, 1, 1, 'Pilot', 1)
        "#,
    )
    .execute(pool)
    .await?;
    for (id, name) in [
        (MEDIA_SCENE, "MEDIA"),
        (REPORTAZE_SCENE, "REPORTAZE"),
        (MIC_SCENE, "MIKROFONY"),
    ] {
        sqlx::query("INSERT INTO scenes (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await?;
    }
    Ok(1)
}

pub async fn add_media(db: &Database, episode_id: i64, title: &str) -> Result<i64, Error> {
    let id = sqlx::query_scalar(
        "INSERT INTO episode_media (episode_id, title, file_path) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(episode_id)
    .bind(title)
    .bind(format!("{}.mp4", title.to_lowercase()))
    .fetch_one(db.pool())
    .await?;
    Ok(id)
}

pub async fn add_group(db: &Database, episode_id: i64, name: &str, order: i64) -> Result<i64, Error> {
    let id = sqlx::query_scalar(
        r#"INSERT INTO media_groups (episode_id, name, "order") VALUES (?, ?, ?) RETURNING id"#,
    )
    .bind(episode_id)
    .bind(name)
    .bind(order)
    .fetch_one(db.pool())
    .await?;
    Ok(id)
}

pub async fn add_to_group(db: &Database, group_id: i64, media_id: i64, order: i64) -> Result<i64, Error> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO episode_media_groups (media_group_id, episode_media_id, "order")
        VALUES (?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(group_id)
    .bind(media_id)
    .bind(order)
    .fetch_one(db.pool())
    .await?;
    Ok(id)
}

/// Raw `current_in_scene` of a group member, bypassing the repository.
pub async fn member_marker(db: &Database, group_id: i64, media_id: i64) -> Result<Option<i64>, Error> {
    let marker = sqlx::query_scalar(
        "SELECT current_in_scene FROM episode_media_groups WHERE media_group_id = ? AND episode_media_id = ?",
    )
    .bind(group_id)
    .bind(media_id)
    .fetch_one(db.pool())
    .await?;
    Ok(marker)
}

pub async fn group_marker(db: &Database, group_id: i64) -> Result<Option<i64>, Error> {
    let marker = sqlx::query_scalar("SELECT current_in_scene FROM media_groups WHERE id = ?")
        .bind(group_id)
        .fetch_one(db.pool())
        .await?;
    Ok(marker)
}
