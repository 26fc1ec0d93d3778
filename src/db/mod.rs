mod sqlite;

pub use sqlite::SqliteDatabase;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct NewVenue {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub facebook_link: Option<String>,
    pub website: Option<String>,
    #[serde(default = "default_seeking")]
    pub seeking_talent: bool,
    pub seeking_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewArtist {
    pub name: String,
    pub city: String,
    pub state: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub facebook_link: Option<String>,
    #[serde(default = "default_seeking")]
    pub seeking_venue: bool,
    pub seeking_description: Option<String>,
}

pub struct NewShow {
    pub venue_id: i64,
    pub artist_id: i64,
    pub start_time: DateTime<Utc>,
}

fn default_seeking() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct Venue {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub phone: Option<String>,
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub facebook_link: Option<String>,
    pub website: Option<String>,
    pub seeking_talent: bool,
    pub seeking_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub phone: Option<String>,
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_venue: bool,
    pub seeking_description: Option<String>,
}

/// A venue as shown in listings, with the raw start times of all its shows.
#[derive(Debug, Clone)]
pub struct VenueSummary {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub show_start_times: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueShow {
    pub artist_id: i64,
    pub artist_name: String,
    pub artist_image_link: Option<String>,
    pub start_time: String,
}

#[derive(Debug, Clone)]
pub struct ArtistSummary {
    pub id: i64,
    pub name: String,
    pub show_start_times: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtistShow {
    pub venue_id: i64,
    pub venue_name: String,
    pub venue_image_link: Option<String>,
    pub start_time: String,
}

/// A show with both sides of the booking.
#[derive(Debug, Clone, Serialize)]
pub struct ShowListing {
    pub venue_id: i64,
    pub venue_name: String,
    pub artist_id: i64,
    pub artist_name: String,
    pub artist_image_link: Option<String>,
    pub start_time: String,
}

pub trait Database: Send {
    /// Insert a venue and return its id.
    fn insert_venue(&mut self, venue: &NewVenue) -> Result<i64>;

    /// Insert an artist and return its id.
    fn insert_artist(&mut self, artist: &NewArtist) -> Result<i64>;

    /// Insert a show. Fails if the venue or artist does not exist.
    fn insert_show(&mut self, show: &NewShow) -> Result<i64>;

    /// All venues ordered by state, city and name.
    fn list_venues(&self) -> Result<Vec<VenueSummary>>;

    /// Venues whose name contains `term`, ignoring ASCII case.
    fn search_venues(&self, term: &str) -> Result<Vec<VenueSummary>>;

    fn get_venue(&self, venue_id: i64) -> Result<Option<Venue>>;

    /// Shows at a venue, earliest first.
    fn get_venue_shows(&self, venue_id: i64) -> Result<Vec<VenueShow>>;

    /// Replace every field of a venue.
    /// Returns `false` if there is no such venue.
    fn update_venue(&mut self, venue_id: i64, venue: &NewVenue) -> Result<bool>;

    /// Delete a venue and its shows.
    /// Returns `true` if a venue was removed.
    fn delete_venue(&mut self, venue_id: i64) -> Result<bool>;

    /// All artists ordered by id.
    fn list_artists(&self) -> Result<Vec<ArtistSummary>>;

    /// Artists whose name contains `term`, ignoring ASCII case.
    fn search_artists(&self, term: &str) -> Result<Vec<ArtistSummary>>;

    fn get_artist(&self, artist_id: i64) -> Result<Option<Artist>>;

    /// Shows an artist plays, earliest first.
    fn get_artist_shows(&self, artist_id: i64) -> Result<Vec<ArtistShow>>;

    /// Replace every field of an artist.
    /// Returns `false` if there is no such artist.
    fn update_artist(&mut self, artist_id: i64, artist: &NewArtist) -> Result<bool>;

    /// All shows, earliest first.
    fn list_shows(&self) -> Result<Vec<ShowListing>>;

    /// Shows whose venue or artist name contains `term`, ignoring ASCII case.
    fn search_shows(&self, term: &str) -> Result<Vec<ShowListing>>;
}

/// Whether `err` was caused by a UNIQUE, FOREIGN KEY or NOT NULL violation.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
        )
    })
}

fn genres_to_column(genres: &[String]) -> String {
    genres
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn genres_from_column(column: &str) -> Vec<String> {
    column
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genres_round_trip_drops_blanks() {
        let genres = vec!["Jazz".to_string(), " ".to_string(), " Folk ".to_string()];

        let column = genres_to_column(&genres);

        assert_eq!(column, "Jazz,Folk");
        assert_eq!(genres_from_column(&column), vec!["Jazz", "Folk"]);
    }

    #[test]
    fn empty_genre_column_is_empty_list() {
        assert!(genres_from_column("").is_empty());
    }
}
