use super::{
    Artist, ArtistShow, ArtistSummary, Database, NewArtist, NewShow, NewVenue, ShowListing, Venue,
    VenueShow, VenueSummary, genres_from_column, genres_to_column,
};
use crate::util::format_iso_string;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::info;

pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {path}"))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL mode")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;

        let mut db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    fn migrate(&mut self) -> Result<()> {
        const MIGRATIONS: &[&str] = &[
            include_str!("../../migrations/0001_create_venues_and_artists.sql"),
            include_str!("../../migrations/0002_create_shows.sql"),
        ];

        let version: u32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .context("Failed to read user_version")?;

        for (i, sql) in MIGRATIONS.iter().enumerate() {
            let target = (i + 1) as u32;
            if version < target {
                info!("Running database migration: v{} → v{}", target - 1, target);
                self.conn
                    .execute_batch(sql)
                    .with_context(|| format!("Migration v{} → v{} failed", target - 1, target))?;
                self.conn
                    .pragma_update(None, "user_version", target)
                    .with_context(|| format!("Failed to set user_version to {target}"))?;
            }
        }

        Ok(())
    }

    fn query_venue_summaries(&self, term: Option<&str>) -> Result<Vec<VenueSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, city, state
                 FROM venues
                 WHERE ?1 IS NULL OR name LIKE '%' || ?1 || '%'
                 ORDER BY state, city, name",
            )
            .context("Failed to prepare venue summary query")?;

        let mut venues = stmt
            .query_map([term], |row| {
                Ok(VenueSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    city: row.get(2)?,
                    state: row.get(3)?,
                    show_start_times: Vec::new(),
                })
            })
            .context("Failed to query venues")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read venue rows")?;

        let mut start_times = self.show_start_times_by("venue_id")?;
        for venue in &mut venues {
            if let Some(times) = start_times.remove(&venue.id) {
                venue.show_start_times = times;
            }
        }

        Ok(venues)
    }

    fn query_artist_summaries(&self, term: Option<&str>) -> Result<Vec<ArtistSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name
                 FROM artists
                 WHERE ?1 IS NULL OR name LIKE '%' || ?1 || '%'
                 ORDER BY id",
            )
            .context("Failed to prepare artist summary query")?;

        let mut artists = stmt
            .query_map([term], |row| {
                Ok(ArtistSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    show_start_times: Vec::new(),
                })
            })
            .context("Failed to query artists")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read artist rows")?;

        let mut start_times = self.show_start_times_by("artist_id")?;
        for artist in &mut artists {
            if let Some(times) = start_times.remove(&artist.id) {
                artist.show_start_times = times;
            }
        }

        Ok(artists)
    }

    /// Start times of every show, keyed by `column` (`venue_id` or `artist_id`).
    fn show_start_times_by(&self, column: &'static str) -> Result<HashMap<i64, Vec<String>>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {column}, start_time FROM shows ORDER BY start_time"
            ))
            .context("Failed to prepare show start time query")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .context("Failed to query show start times")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read show start time rows")?;

        let mut by_key: HashMap<i64, Vec<String>> = HashMap::new();
        for (id, start_time) in rows {
            by_key.entry(id).or_default().push(start_time);
        }

        Ok(by_key)
    }

    fn query_shows(&self, term: Option<&str>) -> Result<Vec<ShowListing>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT v.id, v.name, a.id, a.name, a.image_link, s.start_time
                 FROM shows s
                 JOIN venues v ON v.id = s.venue_id
                 JOIN artists a ON a.id = s.artist_id
                 WHERE ?1 IS NULL
                    OR v.name LIKE '%' || ?1 || '%'
                    OR a.name LIKE '%' || ?1 || '%'
                 ORDER BY s.start_time",
            )
            .context("Failed to prepare show query")?;

        let shows = stmt
            .query_map([term], |row| {
                Ok(ShowListing {
                    venue_id: row.get(0)?,
                    venue_name: row.get(1)?,
                    artist_id: row.get(2)?,
                    artist_name: row.get(3)?,
                    artist_image_link: row.get(4)?,
                    start_time: row.get(5)?,
                })
            })
            .context("Failed to query shows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read show rows")?;

        Ok(shows)
    }
}

fn venue_from_row(row: &Row<'_>) -> rusqlite::Result<Venue> {
    let genres: String = row.get(6)?;
    Ok(Venue {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        state: row.get(3)?,
        address: row.get(4)?,
        phone: row.get(5)?,
        genres: genres_from_column(&genres),
        image_link: row.get(7)?,
        facebook_link: row.get(8)?,
        website: row.get(9)?,
        seeking_talent: row.get(10)?,
        seeking_description: row.get(11)?,
    })
}

fn artist_from_row(row: &Row<'_>) -> rusqlite::Result<Artist> {
    let genres: String = row.get(5)?;
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        state: row.get(3)?,
        phone: row.get(4)?,
        genres: genres_from_column(&genres),
        image_link: row.get(6)?,
        facebook_link: row.get(7)?,
        seeking_venue: row.get(8)?,
        seeking_description: row.get(9)?,
    })
}

impl Database for SqliteDatabase {
    fn insert_venue(&mut self, venue: &NewVenue) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO venues
                    (name, city, state, address, phone, genres, image_link,
                     facebook_link, website, seeking_talent, seeking_description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    venue.name,
                    venue.city,
                    venue.state,
                    venue.address,
                    venue.phone,
                    genres_to_column(&venue.genres),
                    venue.image_link,
                    venue.facebook_link,
                    venue.website,
                    venue.seeking_talent,
                    venue.seeking_description,
                ],
            )
            .with_context(|| format!("Failed to insert venue {}", venue.name))?;

        Ok(self.conn.last_insert_rowid())
    }

    fn insert_artist(&mut self, artist: &NewArtist) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO artists
                    (name, city, state, phone, genres, image_link, facebook_link,
                     seeking_venue, seeking_description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    artist.name,
                    artist.city,
                    artist.state,
                    artist.phone,
                    genres_to_column(&artist.genres),
                    artist.image_link,
                    artist.facebook_link,
                    artist.seeking_venue,
                    artist.seeking_description,
                ],
            )
            .with_context(|| format!("Failed to insert artist {}", artist.name))?;

        Ok(self.conn.last_insert_rowid())
    }

    fn insert_show(&mut self, show: &NewShow) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO shows (venue_id, artist_id, start_time) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    show.venue_id,
                    show.artist_id,
                    format_iso_string(&show.start_time),
                ],
            )
            .context("Failed to insert show")?;

        Ok(self.conn.last_insert_rowid())
    }

    fn list_venues(&self) -> Result<Vec<VenueSummary>> {
        self.query_venue_summaries(None)
    }

    fn search_venues(&self, term: &str) -> Result<Vec<VenueSummary>> {
        self.query_venue_summaries(Some(term))
    }

    fn get_venue(&self, venue_id: i64) -> Result<Option<Venue>> {
        self.conn
            .query_row(
                "SELECT id, name, city, state, address, phone, genres, image_link,
                        facebook_link, website, seeking_talent, seeking_description
                 FROM venues WHERE id = ?1",
                [venue_id],
                venue_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to query venue {venue_id}"))
    }

    fn get_venue_shows(&self, venue_id: i64) -> Result<Vec<VenueShow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.id, a.name, a.image_link, s.start_time
                 FROM shows s
                 JOIN artists a ON a.id = s.artist_id
                 WHERE s.venue_id = ?1
                 ORDER BY s.start_time",
            )
            .context("Failed to prepare get_venue_shows query")?;

        let shows = stmt
            .query_map([venue_id], |row| {
                Ok(VenueShow {
                    artist_id: row.get(0)?,
                    artist_name: row.get(1)?,
                    artist_image_link: row.get(2)?,
                    start_time: row.get(3)?,
                })
            })
            .context("Failed to query venue shows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read venue show rows")?;

        Ok(shows)
    }

    fn update_venue(&mut self, venue_id: i64, venue: &NewVenue) -> Result<bool> {
        let changes = self
            .conn
            .execute(
                "UPDATE venues
                 SET name = ?2, city = ?3, state = ?4, address = ?5, phone = ?6, genres = ?7,
                     image_link = ?8, facebook_link = ?9, website = ?10, seeking_talent = ?11,
                     seeking_description = ?12
                 WHERE id = ?1",
                rusqlite::params![
                    venue_id,
                    venue.name,
                    venue.city,
                    venue.state,
                    venue.address,
                    venue.phone,
                    genres_to_column(&venue.genres),
                    venue.image_link,
                    venue.facebook_link,
                    venue.website,
                    venue.seeking_talent,
                    venue.seeking_description,
                ],
            )
            .with_context(|| format!("Failed to update venue {venue_id}"))?;

        Ok(changes > 0)
    }

    fn delete_venue(&mut self, venue_id: i64) -> Result<bool> {
        let changes = self
            .conn
            .execute("DELETE FROM venues WHERE id = ?1", [venue_id])
            .with_context(|| format!("Failed to delete venue {venue_id}"))?;

        Ok(changes > 0)
    }

    fn list_artists(&self) -> Result<Vec<ArtistSummary>> {
        self.query_artist_summaries(None)
    }

    fn search_artists(&self, term: &str) -> Result<Vec<ArtistSummary>> {
        self.query_artist_summaries(Some(term))
    }

    fn get_artist(&self, artist_id: i64) -> Result<Option<Artist>> {
        self.conn
            .query_row(
                "SELECT id, name, city, state, phone, genres, image_link, facebook_link,
                        seeking_venue, seeking_description
                 FROM artists WHERE id = ?1",
                [artist_id],
                artist_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to query artist {artist_id}"))
    }

    fn get_artist_shows(&self, artist_id: i64) -> Result<Vec<ArtistShow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT v.id, v.name, v.image_link, s.start_time
                 FROM shows s
                 JOIN venues v ON v.id = s.venue_id
                 WHERE s.artist_id = ?1
                 ORDER BY s.start_time",
            )
            .context("Failed to prepare get_artist_shows query")?;

        let shows = stmt
            .query_map([artist_id], |row| {
                Ok(ArtistShow {
                    venue_id: row.get(0)?,
                    venue_name: row.get(1)?,
                    venue_image_link: row.get(2)?,
                    start_time: row.get(3)?,
                })
            })
            .context("Failed to query artist shows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read artist show rows")?;

        Ok(shows)
    }

    fn update_artist(&mut self, artist_id: i64, artist: &NewArtist) -> Result<bool> {
        let changes = self
            .conn
            .execute(
                "UPDATE artists
                 SET name = ?2, city = ?3, state = ?4, phone = ?5, genres = ?6, image_link = ?7,
                     facebook_link = ?8, seeking_venue = ?9, seeking_description = ?10
                 WHERE id = ?1",
                rusqlite::params![
                    artist_id,
                    artist.name,
                    artist.city,
                    artist.state,
                    artist.phone,
                    genres_to_column(&artist.genres),
                    artist.image_link,
                    artist.facebook_link,
                    artist.seeking_venue,
                    artist.seeking_description,
                ],
            )
            .with_context(|| format!("Failed to update artist {artist_id}"))?;

        Ok(changes > 0)
    }

    fn list_shows(&self) -> Result<Vec<ShowListing>> {
        self.query_shows(None)
    }

    fn search_shows(&self, term: &str) -> Result<Vec<ShowListing>> {
        self.query_shows(Some(term))
    }
}
