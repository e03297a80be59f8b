use chrono::Duration;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "film_category", rename_all = "UPPERCASE")]
pub enum FilmCategory {
    Action,
    Comedy,
    Drama,
    Fantasy,
    Horror,
    Thriller,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Film {
    pub id: i64,
    pub title: String,
    pub category: FilmCategory,
    pub year: i32,
    pub duration_in_minutes: i32,
}

impl Film {
    /// Running time; the scheduler derives a screening's end from it.
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_in_minutes))
    }
}

#[derive(Debug, Clone)]
pub struct NewFilm {
    pub title: String,
    pub category: FilmCategory,
    pub year: i32,
    pub duration_in_minutes: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilmFilter {
    pub title: Option<String>,
    pub category: Option<FilmCategory>,
}

impl FilmFilter {
    // Title match is a case-insensitive substring, same as the ILIKE query in PgStore.
    pub fn matches(&self, film: &Film) -> bool {
        let title_ok = self.title.as_ref().is_none_or(|needle| {
            film.title.to_lowercase().contains(&needle.to_lowercase())
        });
        let category_ok = self.category.is_none_or(|category| category == film.category);
        title_ok && category_ok
    }
}
