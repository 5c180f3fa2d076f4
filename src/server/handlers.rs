// src/server/handlers.rs

use super::response::ApiError;
use super::store::{ActorChanges, MovieChanges, NewActor, NewMovie};
use super::AppState;
use crate::permission;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

type JsonResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
struct ActorPayload {
    name: Option<String>,
    age: Option<u32>,
    gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MoviePayload {
    title: Option<String>,
    release_date: Option<String>,
}

/// Body must be a non-empty JSON object; wrong field types are unprocessable.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::BadRequest)?;
    match &value {
        Value::Object(fields) if !fields.is_empty() => {}
        _ => return Err(ApiError::BadRequest),
    }
    serde_json::from_value(value).map_err(|_| ApiError::Unprocessable)
}

fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ApiError::BadRequest)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl ActorPayload {
    fn into_new(self) -> Result<NewActor, ApiError> {
        match (non_empty(self.name), self.age.filter(|age| *age > 0), non_empty(self.gender)) {
            (Some(name), Some(age), Some(gender)) => Ok(NewActor { name, age, gender }),
            _ => Err(ApiError::BadRequest),
        }
    }

    fn into_changes(self) -> ActorChanges {
        ActorChanges {
            name: non_empty(self.name),
            age: self.age.filter(|age| *age > 0),
            gender: non_empty(self.gender),
        }
    }
}

impl MoviePayload {
    fn into_new(self) -> Result<NewMovie, ApiError> {
        match (non_empty(self.title), non_empty(self.release_date)) {
            (Some(title), Some(date)) => Ok(NewMovie {
                title,
                release_date: parse_date(&date)?,
            }),
            _ => Err(ApiError::BadRequest),
        }
    }

    fn into_changes(self) -> Result<MovieChanges, ApiError> {
        Ok(MovieChanges {
            title: non_empty(self.title),
            release_date: non_empty(self.release_date).map(|d| parse_date(&d)).transpose()?,
        })
    }
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Casting Agency API is running!",
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn list_actors(State(state): State<AppState>, headers: HeaderMap) -> JsonResult {
    let actors = state
        .guard
        .authorize(permission::GET_ACTORS, &headers, |_| state.store.actors())
        .await?;
    Ok(Json(json!({ "success": true, "actors": actors })))
}

pub async fn create_actor(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> JsonResult {
    let store = state.store.clone();
    let actor = state
        .guard
        .authorize(permission::POST_ACTORS, &headers, |claims| async move {
            let new = parse_body::<ActorPayload>(&body)?.into_new()?;
            let actor = store.insert_actor(new).await;
            info!(id = actor.id, by = %claims.subject(), "Actor created");
            Ok::<_, ApiError>(actor)
        })
        .await??;
    Ok(Json(json!({ "success": true, "actor": actor })))
}

pub async fn update_actor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> JsonResult {
    let store = state.store.clone();
    let actor = state
        .guard
        .authorize(permission::PATCH_ACTORS, &headers, |claims| async move {
            let id = parse_id(&id)?;
            if store.actor(id).await.is_none() {
                return Err(ApiError::NotFound);
            }
            let changes = parse_body::<ActorPayload>(&body)?.into_changes();
            let actor = store.update_actor(id, changes).await.ok_or(ApiError::NotFound)?;
            info!(id, by = %claims.subject(), "Actor updated");
            Ok::<_, ApiError>(actor)
        })
        .await??;
    Ok(Json(json!({ "success": true, "actor": actor })))
}

pub async fn delete_actor(State(state): State<AppState>, Path(id): Path<String>, headers: HeaderMap) -> JsonResult {
    let store = state.store.clone();
    let id = state
        .guard
        .authorize(permission::DELETE_ACTORS, &headers, |claims| async move {
            let id = parse_id(&id)?;
            if !store.delete_actor(id).await {
                return Err(ApiError::NotFound);
            }
            info!(id, by = %claims.subject(), "Actor deleted");
            Ok::<_, ApiError>(id)
        })
        .await??;
    Ok(Json(json!({ "success": true, "delete": id })))
}

pub async fn list_movies(State(state): State<AppState>, headers: HeaderMap) -> JsonResult {
    let movies = state
        .guard
        .authorize(permission::GET_MOVIES, &headers, |_| state.store.movies())
        .await?;
    Ok(Json(json!({ "success": true, "movies": movies })))
}

pub async fn create_movie(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> JsonResult {
    let store = state.store.clone();
    let movie = state
        .guard
        .authorize(permission::POST_MOVIES, &headers, |claims| async move {
            let new = parse_body::<MoviePayload>(&body)?.into_new()?;
            let movie = store.insert_movie(new).await;
            info!(id = movie.id, by = %claims.subject(), "Movie created");
            Ok::<_, ApiError>(movie)
        })
        .await??;
    Ok(Json(json!({ "success": true, "movie": movie })))
}

pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> JsonResult {
    let store = state.store.clone();
    let movie = state
        .guard
        .authorize(permission::PATCH_MOVIES, &headers, |claims| async move {
            let id = parse_id(&id)?;
            if store.movie(id).await.is_none() {
                return Err(ApiError::NotFound);
            }
            let changes = parse_body::<MoviePayload>(&body)?.into_changes()?;
            let movie = store.update_movie(id, changes).await.ok_or(ApiError::NotFound)?;
            info!(id, by = %claims.subject(), "Movie updated");
            Ok::<_, ApiError>(movie)
        })
        .await??;
    Ok(Json(json!({ "success": true, "movie": movie })))
}

pub async fn delete_movie(State(state): State<AppState>, Path(id): Path<String>, headers: HeaderMap) -> JsonResult {
    let store = state.store.clone();
    let id = state
        .guard
        .authorize(permission::DELETE_MOVIES, &headers, |claims| async move {
            let id = parse_id(&id)?;
            if !store.delete_movie(id).await {
                return Err(ApiError::NotFound);
            }
            info!(id, by = %claims.subject(), "Movie deleted");
            Ok::<_, ApiError>(id)
        })
        .await??;
    Ok(Json(json!({ "success": true, "delete": id })))
}
