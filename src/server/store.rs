// src/server/store.rs

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: u64,
    pub name: String,
    pub age: u32,
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    #[serde(serialize_with = "serialize_date")]
    pub release_date: NaiveDate,
}

fn serialize_date<S: serde::Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone)]
pub struct NewActor {
    pub name: String,
    pub age: u32,
    pub gender: String,
}

#[derive(Debug, Clone, Default)]
pub struct ActorChanges {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMovie {
    pub title: String,
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct MovieChanges {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
}

#[derive(Default)]
struct Tables {
    actors: BTreeMap<u64, Actor>,
    movies: BTreeMap<u64, Movie>,
    last_actor_id: u64,
    last_movie_id: u64,
}

/// In-process storage for actors and movies, ordered by id.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub async fn actors(&self) -> Vec<Actor> {
        self.tables.read().await.actors.values().cloned().collect()
    }

    pub async fn actor(&self, id: u64) -> Option<Actor> {
        self.tables.read().await.actors.get(&id).cloned()
    }

    pub async fn insert_actor(&self, new: NewActor) -> Actor {
        let mut tables = self.tables.write().await;
        tables.last_actor_id += 1;
        let actor = Actor {
            id: tables.last_actor_id,
            name: new.name,
            age: new.age,
            gender: new.gender,
        };
        tables.actors.insert(actor.id, actor.clone());
        actor
    }

    /// Applies `changes` to actor `id`; `None` if it does not exist.
    pub async fn update_actor(&self, id: u64, changes: ActorChanges) -> Option<Actor> {
        let mut tables = self.tables.write().await;
        let actor = tables.actors.get_mut(&id)?;
        if let Some(name) = changes.name {
            actor.name = name;
        }
        if let Some(age) = changes.age {
            actor.age = age;
        }
        if let Some(gender) = changes.gender {
            actor.gender = gender;
        }
        Some(actor.clone())
    }

    pub async fn delete_actor(&self, id: u64) -> bool {
        self.tables.write().await.actors.remove(&id).is_some()
    }

    pub async fn movies(&self) -> Vec<Movie> {
        self.tables.read().await.movies.values().cloned().collect()
    }

    pub async fn movie(&self, id: u64) -> Option<Movie> {
        self.tables.read().await.movies.get(&id).cloned()
    }

    pub async fn insert_movie(&self, new: NewMovie) -> Movie {
        let mut tables = self.tables.write().await;
        tables.last_movie_id += 1;
        let movie = Movie {
            id: tables.last_movie_id,
            title: new.title,
            release_date: new.release_date,
        };
        tables.movies.insert(movie.id, movie.clone());
        movie
    }

    pub async fn update_movie(&self, id: u64, changes: MovieChanges) -> Option<Movie> {
        let mut tables = self.tables.write().await;
        let movie = tables.movies.get_mut(&id)?;
        if let Some(title) = changes.title {
            movie.title = title;
        }
        if let Some(release_date) = changes.release_date {
            movie.release_date = release_date;
        }
        Some(movie.clone())
    }

    pub async fn delete_movie(&self, id: u64) -> bool {
        self.tables.write().await.movies.remove(&id).is_some()
    }
}
