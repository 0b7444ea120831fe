use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A movie genre mirrored from TMDb
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct Genre {
    pub tmdb_id: i64,
    pub name: String,
}

/// A locally cached copy of one TMDb movie's metadata
///
/// Identity is the TMDb id; everything else is replaced wholesale whenever the
/// movie is re-synced from the upstream catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Movie {
    pub tmdb_id: i64,
    pub title: String,
    pub overview: String,
    pub release_date: Option<NaiveDate>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: f64,
    pub vote_count: i32,
    pub popularity: f64,
    pub adult: bool,
    pub original_language: String,
    pub original_title: String,
    /// Loaded with a second query; not a movies table column
    #[sqlx(skip)]
    pub genres: Vec<Genre>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    /// Full-size poster URL, if a poster exists
    pub fn poster_url(&self) -> Option<String> {
        self.poster_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| format!("https://image.tmdb.org/t/p/w500{}", p))
    }

    /// Full-size backdrop URL, if a backdrop exists
    pub fn backdrop_url(&self) -> Option<String> {
        self.backdrop_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| format!("https://image.tmdb.org/t/p/w1280{}", p))
    }

    pub fn genre_ids(&self) -> Vec<i64> {
        self.genres.iter().map(|g| g.tmdb_id).collect()
    }
}

// ============================================================================
// TMDb API Types
// ============================================================================

/// One movie as returned by TMDb list and detail endpoints
///
/// List endpoints carry `genre_ids`; detail endpoints carry nested `genres`.
/// Both shapes deserialize into this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i32,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub genre_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub genres: Option<Vec<TmdbGenre>>,
}

impl TmdbMovie {
    /// Release date parsed as `%Y-%m-%d`; malformed or empty dates become None
    pub fn parsed_release_date(&self) -> Option<NaiveDate> {
        self.release_date
            .as_deref()
            .filter(|d| !d.is_empty())
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    /// Genre ids from whichever shape the payload carried
    pub fn genre_id_set(&self) -> Vec<i64> {
        if let Some(ids) = &self.genre_ids {
            ids.clone()
        } else if let Some(genres) = &self.genres {
            genres.iter().map(|g| g.id).collect()
        } else {
            Vec::new()
        }
    }
}

/// TMDb genre object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

/// Paged TMDb list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbPage {
    #[serde(default)]
    pub page: i32,
    #[serde(default)]
    pub results: Vec<TmdbMovie>,
    #[serde(default)]
    pub total_pages: i32,
    #[serde(default)]
    pub total_results: i64,
}

/// Response from GET /genre/movie/list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbGenreList {
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_movie() -> Movie {
        Movie {
            tmdb_id: 27205,
            title: "Inception".to_string(),
            overview: "A thief who steals corporate secrets".to_string(),
            release_date: NaiveDate::from_ymd_opt(2010, 7, 16),
            poster_path: Some("/poster.jpg".to_string()),
            backdrop_path: None,
            vote_average: 8.4,
            vote_count: 34000,
            popularity: 98.5,
            adult: false,
            original_language: "en".to_string(),
            original_title: "Inception".to_string(),
            genres: vec![Genre {
                tmdb_id: 878,
                name: "Science Fiction".to_string(),
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_poster_url() {
        let movie = sample_movie();
        assert_eq!(
            movie.poster_url(),
            Some("https://image.tmdb.org/t/p/w500/poster.jpg".to_string())
        );
        assert_eq!(movie.backdrop_url(), None);
    }

    #[test]
    fn test_poster_url_empty_path() {
        let mut movie = sample_movie();
        movie.poster_path = Some(String::new());
        assert_eq!(movie.poster_url(), None);
    }

    #[test]
    fn test_tmdb_movie_list_shape() {
        let json = r#"{
            "id": 27205,
            "title": "Inception",
            "overview": "A thief who steals corporate secrets",
            "release_date": "2010-07-16",
            "vote_average": 8.4,
            "vote_count": 34000,
            "popularity": 98.5,
            "genre_ids": [28, 878]
        }"#;

        let movie: TmdbMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.id, 27205);
        assert_eq!(movie.genre_id_set(), vec![28, 878]);
        assert_eq!(
            movie.parsed_release_date(),
            NaiveDate::from_ymd_opt(2010, 7, 16)
        );
    }

    #[test]
    fn test_tmdb_movie_detail_shape() {
        let json = r#"{
            "id": 27205,
            "title": "Inception",
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}]
        }"#;

        let movie: TmdbMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.genre_id_set(), vec![28, 878]);
    }

    #[test]
    fn test_tmdb_movie_malformed_release_date() {
        let json = r#"{"id": 1, "title": "Unknown", "release_date": "not-a-date"}"#;
        let movie: TmdbMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.parsed_release_date(), None);

        let json = r#"{"id": 1, "title": "Unknown", "release_date": ""}"#;
        let movie: TmdbMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.parsed_release_date(), None);
    }

    #[test]
    fn test_tmdb_page_defaults() {
        let page: TmdbPage = serde_json::from_str("{}").unwrap();
        assert_eq!(page.page, 0);
        assert!(page.results.is_empty());
    }
}
