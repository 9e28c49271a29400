use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use super::actors::ActorResponse;
use super::{missing_ids, parse_id_list};
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{AuthUser, StaffUser};
use crate::models::{Actor, Genre, Play};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/plays", get(list_plays).post(create_play))
        .route("/plays/{id}", get(retrieve_play))
}

/* ---------- LIST ---------- */

#[derive(Debug, Default, Deserialize)]
pub struct PlaysQuery {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub actors: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlayListResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
}

/// Escapes `%`, `_` and `\` for a LIKE pattern.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// GET /api/theatre/plays?title=..&genres=1,2&actors=3
async fn list_plays(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(params): AppQuery<PlaysQuery>,
) -> AppResult<Json<Vec<PlayListResponse>>> {
    let title = params
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(like_pattern);
    let genre_ids = match params.genres.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(parse_id_list(raw, "genres")?),
        _ => None,
    };
    let actor_ids = match params.actors.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(parse_id_list(raw, "actors")?),
        _ => None,
    };

    // EXISTS keeps plays distinct when they match several genres or actors
    let mut q = String::from("SELECT p.id, p.title, p.description FROM plays p WHERE TRUE");
    let mut bind_idx = 1;
    if title.is_some() {
        q.push_str(&format!(" AND p.title ILIKE ${}", bind_idx));
        bind_idx += 1;
    }
    if genre_ids.is_some() {
        q.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM play_genres pg WHERE pg.play_id = p.id AND pg.genre_id = ANY(${}))",
            bind_idx
        ));
        bind_idx += 1;
    }
    if actor_ids.is_some() {
        q.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM play_actors pa WHERE pa.play_id = p.id AND pa.actor_id = ANY(${}))",
            bind_idx
        ));
    }
    q.push_str(" ORDER BY p.title, p.id");

    let mut dbq = sqlx::query_as::<_, Play>(&q);
    if let Some(t) = title {
        dbq = dbq.bind(t);
    }
    if let Some(ids) = genre_ids {
        dbq = dbq.bind(ids);
    }
    if let Some(ids) = actor_ids {
        dbq = dbq.bind(ids);
    }
    let plays = dbq.fetch_all(&state.db.pool).await?;

    let play_ids: Vec<i64> = plays.iter().map(|p| p.id).collect();
    let mut genre_names = names_by_play(
        &state.db.pool,
        "SELECT pg.play_id, g.name
         FROM play_genres pg JOIN genres g ON g.id = pg.genre_id
         WHERE pg.play_id = ANY($1)
         ORDER BY g.name",
        &play_ids,
    )
    .await?;
    let mut actor_names = names_by_play(
        &state.db.pool,
        "SELECT pa.play_id, a.first_name || ' ' || a.last_name
         FROM play_actors pa JOIN actors a ON a.id = pa.actor_id
         WHERE pa.play_id = ANY($1)
         ORDER BY a.last_name, a.first_name",
        &play_ids,
    )
    .await?;

    let payload = plays
        .into_iter()
        .map(|p| PlayListResponse {
            genres: genre_names.remove(&p.id).unwrap_or_default(),
            actors: actor_names.remove(&p.id).unwrap_or_default(),
            id: p.id,
            title: p.title,
            description: p.description,
        })
        .collect();

    Ok(Json(payload))
}

async fn names_by_play(
    pool: &PgPool,
    sql: &str,
    play_ids: &[i64],
) -> Result<HashMap<i64, Vec<String>>, sqlx::Error> {
    if play_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, (i64, String)>(sql)
        .bind(play_ids)
        .fetch_all(pool)
        .await?;

    let mut map: HashMap<i64, Vec<String>> = HashMap::new();
    for (play_id, name) in rows {
        map.entry(play_id).or_default().push(name);
    }
    Ok(map)
}

/* ---------- DETAIL ---------- */

#[derive(Debug, Serialize)]
pub struct PlayDetailResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub genres: Vec<Genre>,
    pub actors: Vec<ActorResponse>,
}

/// Play with its genres and actors, `None` when there is no such play.
pub async fn load_play_detail(pool: &PgPool, id: i64) -> Result<Option<PlayDetailResponse>, sqlx::Error> {
    let Some(play) = sqlx::query_as::<_, Play>("SELECT id, title, description FROM plays WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let genres = sqlx::query_as::<_, Genre>(
        "SELECT g.id, g.name FROM genres g
         JOIN play_genres pg ON pg.genre_id = g.id
         WHERE pg.play_id = $1
         ORDER BY g.name",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let actors = sqlx::query_as::<_, Actor>(
        "SELECT a.id, a.first_name, a.last_name FROM actors a
         JOIN play_actors pa ON pa.actor_id = a.id
         WHERE pa.play_id = $1
         ORDER BY a.last_name, a.first_name",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Some(PlayDetailResponse {
        id: play.id,
        title: play.title,
        description: play.description,
        genres,
        actors: actors.into_iter().map(ActorResponse::from).collect(),
    }))
}

// GET /api/theatre/plays/{id}
async fn retrieve_play(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<PlayDetailResponse>> {
    load_play_detail(&state.db.pool, id)
        .await?
        .map(Json)
        .ok_or_else(AppError::not_found)
}

/* ---------- CREATE ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreatePlayRequest {
    #[validate(length(min = 1, max = 128, message = "Ensure this field has 1 to 128 characters."))]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    genres: Vec<i64>,
    #[serde(default)]
    actors: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct PlayResponse {
    id: i64,
    title: String,
    description: String,
    genres: Vec<i64>,
    actors: Vec<i64>,
}

// POST /api/theatre/plays
async fn create_play(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    AppJson(mut req): AppJson<CreatePlayRequest>,
) -> AppResult<(StatusCode, Json<PlayResponse>)> {
    req.validate()?;
    req.genres.sort_unstable();
    req.genres.dedup();
    req.actors.sort_unstable();
    req.actors.dedup();

    let mut tx = state.db.pool.begin().await?;

    let found_genres: Vec<i64> = sqlx::query_scalar("SELECT id FROM genres WHERE id = ANY($1)")
        .bind(&req.genres)
        .fetch_all(&mut *tx)
        .await?;
    let found_actors: Vec<i64> = sqlx::query_scalar("SELECT id FROM actors WHERE id = ANY($1)")
        .bind(&req.actors)
        .fetch_all(&mut *tx)
        .await?;

    let mut errors = missing_ids(&req.genres, &found_genres, "genres");
    errors.merge(missing_ids(&req.actors, &found_actors, "actors"));
    errors.into_result()?;

    let play = sqlx::query_as::<_, Play>(
        "INSERT INTO plays (title, description) VALUES ($1, $2)
         RETURNING id, title, description",
    )
    .bind(req.title.trim())
    .bind(&req.description)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO play_genres (play_id, genre_id) SELECT $1, UNNEST($2::bigint[])")
        .bind(play.id)
        .bind(&req.genres)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO play_actors (play_id, actor_id) SELECT $1, UNNEST($2::bigint[])")
        .bind(play.id)
        .bind(&req.actors)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(play_id = play.id, "Play created");
    Ok((
        StatusCode::CREATED,
        Json(PlayResponse {
            id: play.id,
            title: play.title,
            description: play.description,
            genres: req.genres,
            actors: req.actors,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("romeo"), "%romeo%");
        assert_eq!(like_pattern("100%_fun\\"), "%100\\%\\_fun\\\\%");
    }
}
