use crate::db::{
    Artist, ArtistShow, Database, NewArtist, NewShow, NewVenue, SqliteDatabase, Venue, VenueShow,
    VenueSummary, is_constraint_violation,
};
use crate::util::{MIN_STORABLE_YEAR, parse_iso_string};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Datelike, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};
use tracing::{error, info, warn};

const INDEX_HTML: &str = include_str!("../static/index.html");

pub type Db = Arc<Mutex<SqliteDatabase>>;

/// A venue or artist with its number of upcoming shows.
#[derive(Debug, Serialize)]
struct Listing {
    id: i64,
    name: String,
    num_upcoming_shows: usize,
}

#[derive(Debug, Serialize)]
struct Area {
    city: String,
    state: String,
    venues: Vec<Listing>,
}

#[derive(Debug, Serialize)]
struct VenueDetail {
    #[serde(flatten)]
    venue: Venue,
    past_shows: Vec<VenueShow>,
    upcoming_shows: Vec<VenueShow>,
    past_shows_count: usize,
    upcoming_shows_count: usize,
}

#[derive(Debug, Serialize)]
struct ArtistDetail {
    #[serde(flatten)]
    artist: Artist,
    past_shows: Vec<ArtistShow>,
    upcoming_shows: Vec<ArtistShow>,
    past_shows_count: usize,
    upcoming_shows_count: usize,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    search_term: String,
}

#[derive(Debug, Deserialize)]
struct ShowRequest {
    venue_id: i64,
    artist_id: i64,
    start_time: String,
}

fn lock(db: &Db) -> Result<MutexGuard<'_, SqliteDatabase>, Response> {
    db.lock().map_err(|_| {
        error!("Database mutex poisoned");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

fn today_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// `Some(true)` for shows starting today or later. `None` if the stored
/// start time cannot be read.
fn is_upcoming(start_time: &str, today: DateTime<Utc>) -> Option<bool> {
    match parse_iso_string(start_time) {
        Some(at) => Some(at >= today),
        None => {
            warn!(start_time, "Skipping show with unreadable start time");
            None
        }
    }
}

fn count_upcoming(start_times: &[String], today: DateTime<Utc>) -> usize {
    start_times
        .iter()
        .filter(|t| is_upcoming(t, today) == Some(true))
        .count()
}

fn listing(id: i64, name: String, start_times: &[String], today: DateTime<Utc>) -> Listing {
    Listing {
        id,
        name,
        num_upcoming_shows: count_upcoming(start_times, today),
    }
}

/// Split shows into `(past, upcoming)`, dropping any whose start time is unreadable.
fn split_shows<T>(
    shows: Vec<T>,
    start_time: impl Fn(&T) -> &str,
    today: DateTime<Utc>,
) -> (Vec<T>, Vec<T>) {
    let mut past = Vec::new();
    let mut upcoming = Vec::new();
    for show in shows {
        match is_upcoming(start_time(&show), today) {
            Some(true) => upcoming.push(show),
            Some(false) => past.push(show),
            None => {}
        }
    }
    (past, upcoming)
}

/// Group venues into areas. Expects input ordered by (state, city).
fn group_by_area(venues: Vec<VenueSummary>, today: DateTime<Utc>) -> Vec<Area> {
    let mut areas: Vec<Area> = Vec::new();

    for venue in venues {
        let same_area = areas
            .last()
            .is_some_and(|a| a.city == venue.city && a.state == venue.state);

        if !same_area {
            areas.push(Area {
                city: venue.city.clone(),
                state: venue.state.clone(),
                venues: Vec::new(),
            });
        }

        if let Some(area) = areas.last_mut() {
            area.venues.push(listing(venue.id, venue.name, &venue.show_start_times, today));
        }
    }

    areas
}

async fn index() -> Response {
    ([(header::CONTENT_TYPE, "text/html")], INDEX_HTML).into_response()
}

async fn list_venues(State(db): State<Db>) -> Response {
    let db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.list_venues() {
        Ok(venues) => Json(group_by_area(venues, today_start(Utc::now()))).into_response(),
        Err(err) => {
            error!(error = %err, "Failed to query venues");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn search_venues(State(db): State<Db>, Json(req): Json<SearchRequest>) -> Response {
    let db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.search_venues(&req.search_term) {
        Ok(venues) => {
            let today = today_start(Utc::now());
            let data: Vec<_> = venues
                .into_iter()
                .map(|v| listing(v.id, v.name, &v.show_start_times, today))
                .collect();
            Json(json!({ "count": data.len(), "data": data })).into_response()
        }
        Err(err) => {
            error!(error = %err, search_term = %req.search_term, "Failed to search venues");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn show_venue(State(db): State<Db>, Path(venue_id): Path<i64>) -> Response {
    let db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let venue = match db.get_venue(venue_id) {
        Ok(Some(venue)) => venue,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!(error = %err, venue_id, "Failed to query venue");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let shows = match db.get_venue_shows(venue_id) {
        Ok(shows) => shows,
        Err(err) => {
            error!(error = %err, venue_id, "Failed to query venue shows");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let (past_shows, upcoming_shows) =
        split_shows(shows, |s| s.start_time.as_str(), today_start(Utc::now()));

    Json(VenueDetail {
        venue,
        past_shows_count: past_shows.len(),
        upcoming_shows_count: upcoming_shows.len(),
        past_shows,
        upcoming_shows,
    })
    .into_response()
}

async fn create_venue(State(db): State<Db>, Json(venue): Json<NewVenue>) -> Response {
    if venue.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "name is required" })))
            .into_response();
    }

    let mut db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.insert_venue(&venue) {
        Ok(id) => {
            info!(venue_id = id, name = %venue.name, "Venue listed");
            (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
        }
        Err(err) if is_constraint_violation(&err) => {
            warn!(error = %err, name = %venue.name, "Venue already exists");
            (StatusCode::CONFLICT, Json(json!({ "error": "venue already exists" })))
                .into_response()
        }
        Err(err) => {
            error!(error = %err, name = %venue.name, "Failed to insert venue");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn edit_venue(
    State(db): State<Db>,
    Path(venue_id): Path<i64>,
    Json(venue): Json<NewVenue>,
) -> Response {
    if venue.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "name is required" })))
            .into_response();
    }

    let mut db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.update_venue(venue_id, &venue) {
        Ok(true) => {
            info!(venue_id, name = %venue.name, "Venue updated");
            Json(json!({ "id": venue_id })).into_response()
        }
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) if is_constraint_violation(&err) => {
            warn!(error = %err, venue_id, name = %venue.name, "Venue update conflicts");
            (StatusCode::CONFLICT, Json(json!({ "error": "venue already exists" })))
                .into_response()
        }
        Err(err) => {
            error!(error = %err, venue_id, "Failed to update venue");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn delete_venue(State(db): State<Db>, Path(venue_id): Path<String>) -> Response {
    let Ok(id) = venue_id.parse::<i64>() else {
        warn!(venue_id = %venue_id, "Delete requested for malformed venue id");
        return (StatusCode::NOT_FOUND, Json(json!({ "success": false }))).into_response();
    };

    let mut db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.delete_venue(id) {
        Ok(true) => {
            info!(venue_id = id, "Venue deleted");
            Json(json!({ "success": true })).into_response()
        }
        Ok(false) => {
            warn!(venue_id = id, "Delete requested for unknown venue");
            (StatusCode::NOT_FOUND, Json(json!({ "success": false }))).into_response()
        }
        Err(err) => {
            error!(error = %err, venue_id = id, "Failed to delete venue");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn create_artist(State(db): State<Db>, Json(artist): Json<NewArtist>) -> Response {
    if artist.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "name is required" })))
            .into_response();
    }

    let mut db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.insert_artist(&artist) {
        Ok(id) => {
            info!(artist_id = id, name = %artist.name, "Artist listed");
            (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
        }
        Err(err) if is_constraint_violation(&err) => {
            warn!(error = %err, name = %artist.name, "Artist already exists");
            (StatusCode::CONFLICT, Json(json!({ "error": "artist already exists" })))
                .into_response()
        }
        Err(err) => {
            error!(error = %err, name = %artist.name, "Failed to insert artist");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn list_artists(State(db): State<Db>) -> Response {
    let db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.list_artists() {
        Ok(artists) => {
            let today = today_start(Utc::now());
            let data: Vec<_> = artists
                .into_iter()
                .map(|a| listing(a.id, a.name, &a.show_start_times, today))
                .collect();
            Json(data).into_response()
        }
        Err(err) => {
            error!(error = %err, "Failed to query artists");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn search_artists(State(db): State<Db>, Json(req): Json<SearchRequest>) -> Response {
    let db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.search_artists(&req.search_term) {
        Ok(artists) => {
            let today = today_start(Utc::now());
            let data: Vec<_> = artists
                .into_iter()
                .map(|a| listing(a.id, a.name, &a.show_start_times, today))
                .collect();
            Json(json!({ "count": data.len(), "data": data })).into_response()
        }
        Err(err) => {
            error!(error = %err, search_term = %req.search_term, "Failed to search artists");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn show_artist(State(db): State<Db>, Path(artist_id): Path<i64>) -> Response {
    let db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let artist = match db.get_artist(artist_id) {
        Ok(Some(artist)) => artist,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!(error = %err, artist_id, "Failed to query artist");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let shows = match db.get_artist_shows(artist_id) {
        Ok(shows) => shows,
        Err(err) => {
            error!(error = %err, artist_id, "Failed to query artist shows");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let (past_shows, upcoming_shows) =
        split_shows(shows, |s| s.start_time.as_str(), today_start(Utc::now()));

    Json(ArtistDetail {
        artist,
        past_shows_count: past_shows.len(),
        upcoming_shows_count: upcoming_shows.len(),
        past_shows,
        upcoming_shows,
    })
    .into_response()
}

async fn edit_artist(
    State(db): State<Db>,
    Path(artist_id): Path<i64>,
    Json(artist): Json<NewArtist>,
) -> Response {
    if artist.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "name is required" })))
            .into_response();
    }

    let mut db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.update_artist(artist_id, &artist) {
        Ok(true) => {
            info!(artist_id, name = %artist.name, "Artist updated");
            Json(json!({ "id": artist_id })).into_response()
        }
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) if is_constraint_violation(&err) => {
            warn!(error = %err, artist_id, name = %artist.name, "Artist update conflicts");
            (StatusCode::CONFLICT, Json(json!({ "error": "artist already exists" })))
                .into_response()
        }
        Err(err) => {
            error!(error = %err, artist_id, "Failed to update artist");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Upcoming shows only; past ones are reachable through venue and artist pages.
async fn list_shows(State(db): State<Db>) -> Response {
    let db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.list_shows() {
        Ok(shows) => {
            let (_, upcoming) =
                split_shows(shows, |s| s.start_time.as_str(), today_start(Utc::now()));
            Json(upcoming).into_response()
        }
        Err(err) => {
            error!(error = %err, "Failed to query shows");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn search_shows(State(db): State<Db>, Json(req): Json<SearchRequest>) -> Response {
    let db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.search_shows(&req.search_term) {
        Ok(shows) => Json(json!({ "count": shows.len(), "data": shows })).into_response(),
        Err(err) => {
            error!(error = %err, search_term = %req.search_term, "Failed to search shows");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn create_show(State(db): State<Db>, Json(req): Json<ShowRequest>) -> Response {
    let start_time = match DateTime::parse_from_rfc3339(&req.start_time) {
        Ok(at) => at.with_timezone(&Utc),
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid start_time: {err}") })),
            )
                .into_response();
        }
    };

    if start_time.year() < MIN_STORABLE_YEAR {
        let message = format!("start_time year must be {MIN_STORABLE_YEAR} or later");
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
    }

    let mut db = match lock(&db) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let show = NewShow {
        venue_id: req.venue_id,
        artist_id: req.artist_id,
        start_time,
    };

    match db.insert_show(&show) {
        Ok(id) => {
            info!(
                show_id = id,
                venue_id = show.venue_id,
                artist_id = show.artist_id,
                "Show listed"
            );
            (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
        }
        Err(err) if is_constraint_violation(&err) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "venue or artist does not exist" })),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to insert show");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router(db: Db) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/venues", get(list_venues).post(create_venue))
        .route("/venues/search", post(search_venues))
        .route("/venues/{id}", get(show_venue).delete(delete_venue))
        .route("/venues/{id}/edit", post(edit_venue).patch(edit_venue))
        .route("/artists", get(list_artists).post(create_artist))
        .route("/artists/search", post(search_artists))
        .route("/artists/{id}", get(show_artist))
        .route("/artists/{id}/edit", post(edit_artist).patch(edit_artist))
        .route("/shows", get(list_shows).post(create_show))
        .route("/shows/search", post(search_shows))
        .with_state(db)
}

/// Serve the API until `running` is cleared.
pub fn start(db_path: &str, bind: &str, port: u16, running: Arc<AtomicBool>) -> Result<()> {
    let db = SqliteDatabase::open(db_path)?;
    let app = router(Arc::new(Mutex::new(db)));

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime for web server")?;

    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind((bind, port))
            .await
            .with_context(|| format!("Web server failed to bind {bind}:{port}"))?;

        info!(bind, port, "Web server listening");

        let shutdown = async move {
            while running.load(Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
            info!("Web server shutting down");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Web server error")
    })
}
