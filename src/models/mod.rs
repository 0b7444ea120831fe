pub mod account;
pub mod interaction;
pub mod movie;
pub mod recommendation;

pub use account::{Account, ActivityEvent, ActivityKind, Preferences, Profile, Visibility};
pub use interaction::{Favorite, InteractionKind, Rating, WatchlistItem};
pub use movie::{Genre, Movie, TmdbGenre, TmdbGenreList, TmdbMovie, TmdbPage};
pub use recommendation::{
    RecommendationMode, RecommendationParams, RecommendationRecord, ScoredMovie,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
