//! Ranking, normalization, and dedup helpers shared by all recommendation
//! modes.
//!
//! Everything here is pure: same inputs, same ordering. Ties always fall back
//! to ascending TMDb id so two identical requests produce identical output.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::models::ScoredMovie;

/// Scales raw scores into [0, 1] against the maximum in the batch
///
/// A batch whose maximum is zero (or negative) scores uniformly at zero
/// rather than dividing by it.
pub fn normalize_scores(candidates: &mut [ScoredMovie]) {
    let max = candidates
        .iter()
        .map(|c| c.score)
        .fold(0.0_f64, f64::max);

    for candidate in candidates.iter_mut() {
        candidate.score = if max > 0.0 {
            (candidate.score / max).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}

/// Upstream vote average (0..10) mapped to [0, 1]
pub fn rating_score(vote_average: f64) -> f64 {
    (vote_average / 10.0).clamp(0.0, 1.0)
}

/// Scores an upcoming release by proximity: releases today score 1.0,
/// releases a year or more out score 0.0, unknown dates score 0.0
pub fn recency_score(release_date: Option<NaiveDate>, today: NaiveDate) -> f64 {
    match release_date {
        Some(date) => {
            let days_until = (date - today).num_days().clamp(0, 365);
            1.0 - days_until as f64 / 365.0
        }
        None => 0.0,
    }
}

/// Number of genres shared between a movie and a reference set
pub fn genre_overlap(movie_genres: &[i64], reference: &HashSet<i64>) -> usize {
    movie_genres
        .iter()
        .filter(|id| reference.contains(id))
        .count()
}

/// Orders candidates by score desc, then popularity desc, then tmdb_id asc
///
/// The final tmdb_id key makes the ordering total, so repeat calls over
/// unchanged data return byte-identical sequences.
pub fn sort_candidates(candidates: &mut [ScoredMovie]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.movie.popularity.total_cmp(&a.movie.popularity))
            .then(a.movie.tmdb_id.cmp(&b.movie.tmdb_id))
    });
}

/// Thins genre-clustered near-duplicates from an already ranked list
///
/// Movies sharing an identical genre signature form a cluster. The diversity
/// knob in [0, 1] caps how many entries of one cluster survive relative to
/// the page size: at 0.0 nothing is thinned, at 1.0 each cluster keeps a
/// single representative. Order of survivors is unchanged.
pub fn apply_diversity(candidates: &mut Vec<ScoredMovie>, diversity: f64, page_size: usize) {
    let diversity = diversity.clamp(0.0, 1.0);
    if diversity == 0.0 || candidates.is_empty() {
        return;
    }

    let max_per_cluster = (((1.0 - diversity) * page_size as f64).ceil() as usize).max(1);

    let mut cluster_counts: HashMap<Vec<i64>, usize> = HashMap::new();
    candidates.retain(|candidate| {
        let mut signature = candidate.movie.genre_ids();
        signature.sort_unstable();

        let count = cluster_counts.entry(signature).or_insert(0);
        *count += 1;
        *count <= max_per_cluster
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Genre, Movie};
    use chrono::Utc;

    fn movie(tmdb_id: i64, popularity: f64, genre_ids: &[i64]) -> Movie {
        Movie {
            tmdb_id,
            title: format!("Movie {}", tmdb_id),
            overview: String::new(),
            release_date: None,
            poster_path: None,
            backdrop_path: None,
            vote_average: 7.0,
            vote_count: 100,
            popularity,
            adult: false,
            original_language: "en".to_string(),
            original_title: format!("Movie {}", tmdb_id),
            genres: genre_ids
                .iter()
                .map(|id| Genre {
                    tmdb_id: *id,
                    name: format!("Genre {}", id),
                })
                .collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scored(tmdb_id: i64, score: f64, popularity: f64, genre_ids: &[i64]) -> ScoredMovie {
        ScoredMovie {
            movie: movie(tmdb_id, popularity, genre_ids),
            score,
        }
    }

    #[test]
    fn test_normalize_scores_scales_to_unit_interval() {
        let mut candidates = vec![
            scored(1, 50.0, 0.0, &[]),
            scored(2, 100.0, 0.0, &[]),
            scored(3, 0.0, 0.0, &[]),
        ];
        normalize_scores(&mut candidates);
        assert_eq!(candidates[0].score, 0.5);
        assert_eq!(candidates[1].score, 1.0);
        assert_eq!(candidates[2].score, 0.0);
    }

    #[test]
    fn test_normalize_scores_all_zero() {
        let mut candidates = vec![scored(1, 0.0, 0.0, &[]), scored(2, 0.0, 0.0, &[])];
        normalize_scores(&mut candidates);
        assert!(candidates.iter().all(|c| c.score == 0.0));
    }

    #[test]
    fn test_rating_score_bounds() {
        assert!((rating_score(8.4) - 0.84).abs() < 1e-9);
        assert_eq!(rating_score(12.0), 1.0);
        assert_eq!(rating_score(-1.0), 0.0);
    }

    #[test]
    fn test_recency_score() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(recency_score(Some(today), today), 1.0);
        let year_out = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();
        assert_eq!(recency_score(Some(year_out), today), 0.0);
        assert_eq!(recency_score(None, today), 0.0);

        let soon = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert!(recency_score(Some(soon), today) > recency_score(Some(later), today));
    }

    #[test]
    fn test_genre_overlap() {
        let reference: HashSet<i64> = [28, 12].into_iter().collect();
        assert_eq!(genre_overlap(&[28, 12, 878], &reference), 2);
        assert_eq!(genre_overlap(&[878], &reference), 0);
        assert_eq!(genre_overlap(&[], &reference), 0);
    }

    #[test]
    fn test_sort_candidates_score_then_popularity_then_id() {
        let mut candidates = vec![
            scored(30, 0.5, 10.0, &[]),
            scored(10, 0.5, 20.0, &[]),
            scored(20, 0.9, 1.0, &[]),
            scored(5, 0.5, 20.0, &[]),
        ];
        sort_candidates(&mut candidates);
        let ids: Vec<i64> = candidates.iter().map(|c| c.movie.tmdb_id).collect();
        // Highest score first, then popularity, then ascending id among full ties
        assert_eq!(ids, vec![20, 5, 10, 30]);
    }

    #[test]
    fn test_sort_candidates_deterministic() {
        let build = || {
            vec![
                scored(3, 0.4, 5.0, &[]),
                scored(1, 0.4, 5.0, &[]),
                scored(2, 0.4, 5.0, &[]),
            ]
        };
        let mut a = build();
        let mut b = build();
        sort_candidates(&mut a);
        sort_candidates(&mut b);
        let ids = |v: &[ScoredMovie]| v.iter().map(|c| c.movie.tmdb_id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(ids(&a), vec![1, 2, 3]);
    }

    #[test]
    fn test_apply_diversity_zero_keeps_everything() {
        let mut candidates = vec![
            scored(1, 0.9, 1.0, &[28]),
            scored(2, 0.8, 1.0, &[28]),
            scored(3, 0.7, 1.0, &[28]),
        ];
        apply_diversity(&mut candidates, 0.0, 3);
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_apply_diversity_full_keeps_one_per_cluster() {
        let mut candidates = vec![
            scored(1, 0.9, 1.0, &[28]),
            scored(2, 0.8, 1.0, &[28]),
            scored(3, 0.7, 1.0, &[878]),
            scored(4, 0.6, 1.0, &[28]),
        ];
        apply_diversity(&mut candidates, 1.0, 4);
        let ids: Vec<i64> = candidates.iter().map(|c| c.movie.tmdb_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_apply_diversity_partial_caps_cluster() {
        let mut candidates: Vec<ScoredMovie> = (1..=6)
            .map(|id| scored(id, 1.0 - id as f64 / 10.0, 1.0, &[28]))
            .collect();
        // page_size 4, diversity 0.5 -> at most ceil(0.5 * 4) = 2 per cluster
        apply_diversity(&mut candidates, 0.5, 4);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_apply_diversity_distinct_signatures_untouched() {
        let mut candidates = vec![
            scored(1, 0.9, 1.0, &[28, 12]),
            scored(2, 0.8, 1.0, &[28]),
            scored(3, 0.7, 1.0, &[12]),
        ];
        apply_diversity(&mut candidates, 1.0, 3);
        assert_eq!(candidates.len(), 3);
    }
}
