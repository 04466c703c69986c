//! PropFlow intake client runner.
//!
//! Drives the property draft wizard and the live update channel from the
//! command line, against the configured backend:
//!
//! ```text
//! propflow [status]                 show the saved draft
//! propflow set city=Pune area=1200  patch draft fields
//! propflow photo <file> [room]      attach a photo
//! propflow next | back | step <n>   move through the wizard
//! propflow submit                   create, upload and finalize
//! propflow discard                  drop the draft
//! propflow login <token> | logout
//! propflow watch                    follow live updates until Ctrl-C
//! ```

mod config;
mod database;
mod error;
mod models;
mod services;

use config::{AppConfig, CONFIG_FILE};
use database::SqliteStorage;
use error::AppError;
use live_channel::{LiveChannel, QueryCache, WsConnector};
use models::{DraftPatch, PhotoItem};
use property_api::{ApiError, HttpPropertyApi, PropertyType};
use services::{CaptureCache, DraftStore, Session, SharedDraftStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(args).await {
        log::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(args: Vec<String>) -> Result<(), AppError> {
    let config = AppConfig::load(Path::new(CONFIG_FILE))?;
    let storage = Arc::new(SqliteStorage::open(&config.database_path())?);
    let session = Session::restore(storage.clone());
    let captures = Arc::new(CaptureCache::new(config.capture_dir()));
    log::debug!("Captures kept in {}", captures.dir().display());
    let api = Arc::new(HttpPropertyApi::new(
        config.api_config(),
        session.token_provider(),
    )?);

    let mut store = DraftStore::load(storage, api, captures.clone());
    if store.has_resumable_draft() {
        log::info!("Resuming saved draft");
    }

    let command = args.first().map(String::as_str).unwrap_or("status");
    match command {
        "status" => print_status(&store, &config),
        "set" => {
            let patch = parse_patch(&args[1..])?;
            store.set_field(patch);
            print_status(&store, &config);
        }
        "photo" => {
            let file = args
                .get(1)
                .ok_or_else(|| AppError::Validation("Usage: photo <file> [room]".to_string()))?;
            if !Path::new(file).is_file() {
                return Err(AppError::NotFound(format!("Photo file {}", file)));
            }
            let bytes = std::fs::read(file)?;
            let extension = Path::new(file)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("jpg");
            let uri = captures.store(&bytes, extension)?;
            let mut photo = PhotoItem::new(uri, bytes);
            if let Some(room) = args.get(2) {
                photo = photo.with_room_category(room.as_str());
            }
            println!("Added photo {}", photo.id);
            store.add_photo(photo);
        }
        "next" => match store.advance() {
            Ok(step) => {
                println!("Now at step '{}'", step.as_str());
                if store.wizard().is_last() {
                    println!("Last step: run 'submit' when ready");
                }
            }
            Err(blocked) => println!("Cannot continue: {}", blocked),
        },
        "back" => println!("Now at step '{}'", store.back().as_str()),
        "step" => {
            let index = args
                .get(1)
                .and_then(|n| n.parse::<i64>().ok())
                .ok_or_else(|| AppError::Validation("Usage: step <n>".to_string()))?;
            store.set_step(index);
            println!("Now at step '{}'", store.current_step().as_str());
        }
        "discard" => {
            store.reset_draft();
            println!("Draft discarded");
        }
        "submit" => submit(store, &config).await?,
        "login" => {
            let token = args
                .get(1)
                .ok_or_else(|| AppError::Validation("Usage: login <token>".to_string()))?;
            session.login(token.as_str())?;
        }
        "logout" => session.logout()?,
        "watch" => watch(&session, &config).await?,
        other => {
            return Err(AppError::Validation(format!("Unknown command '{}'", other)));
        }
    }
    Ok(())
}

fn print_status(store: &DraftStore, config: &AppConfig) {
    let draft = store.draft();
    println!("Step:        {}", store.current_step().as_str());
    println!(
        "Type:        {}",
        draft.property_type.map(|t| t.as_str()).unwrap_or("-")
    );
    println!(
        "Area:        {}",
        draft
            .area_sq_ft
            .map(|a| format!("{} sq ft", a))
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Address:     {}, {}, {} {}",
        draft.address.as_deref().unwrap_or("-"),
        draft.city.as_deref().unwrap_or("-"),
        draft.state.as_deref().unwrap_or("-"),
        draft.pincode.as_deref().unwrap_or("-")
    );
    println!("Photos:      {}", store.photos().len());
    if let Some(saved) = store.last_saved_at() {
        println!("Last saved:  {}", saved.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Err(e) = draft.validate() {
        println!("Incomplete:  {}", e);
    }
    for id in store.location_warnings(config.max_photo_distance_km) {
        println!("Warning:     photo {} was taken away from the property", id);
    }
}

/// Parses `key=value` pairs into a draft patch
fn parse_patch(pairs: &[String]) -> Result<DraftPatch, AppError> {
    fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
        value
            .parse()
            .map_err(|_| AppError::Validation(format!("'{}' is not a valid {}", value, key)))
    }

    let mut patch = DraftPatch::default();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| AppError::Validation(format!("Expected key=value, got '{}'", pair)))?;
        match key {
            "type" => {
                patch.property_type = Some(PropertyType::parse(value).ok_or_else(|| {
                    let known: Vec<&str> = PropertyType::all().iter().map(|t| t.as_str()).collect();
                    AppError::Validation(format!(
                        "Unknown property type '{}', expected one of: {}",
                        value,
                        known.join(", ")
                    ))
                })?)
            }
            "area" => patch.area_sq_ft = Some(number(key, value)?),
            "bedrooms" => patch.bedrooms = Some(number(key, value)?),
            "bathrooms" => patch.bathrooms = Some(number(key, value)?),
            "floor" => patch.floor = Some(number(key, value)?),
            "total_floors" => patch.total_floors = Some(number(key, value)?),
            "age" => patch.age_years = Some(number(key, value)?),
            "address" => patch.address = Some(value.to_string()),
            "city" => patch.city = Some(value.to_string()),
            "state" => patch.state = Some(value.to_string()),
            "pincode" => patch.pincode = Some(value.to_string()),
            "lat" => patch.lat = Some(number(key, value)?),
            "lng" => patch.lng = Some(number(key, value)?),
            _ => return Err(AppError::Validation(format!("Unknown field '{}'", key))),
        }
    }
    Ok(patch)
}

async fn submit(store: DraftStore, config: &AppConfig) -> Result<(), AppError> {
    let far = store.location_warnings(config.max_photo_distance_km);
    if !far.is_empty() {
        log::warn!("{} photo(s) taken away from the pinned location", far.len());
    }

    let shared = SharedDraftStore::new(store);
    let mut progress = shared.subscribe_submission();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let state = *progress.borrow_and_update();
            log::info!("Submission: {}", state);
        }
    });

    let result = shared.submit().await;
    let failed = shared
        .lock()
        .await
        .job()
        .map(|job| job.failed_photos())
        .unwrap_or_default();
    drop(shared);
    if let Err(e) = reporter.await {
        log::warn!("Submission progress reporter failed: {}", e);
    }

    match result {
        Ok(id) => {
            println!("Submitted property {}", id);
            Ok(())
        }
        Err(e) => {
            match e.stage() {
                Some(stage) => log::error!("Submit stopped while {}: {}", stage.as_str(), e),
                None => log::error!("{}", e),
            }
            for id in failed {
                println!("Photo {} was not uploaded", id);
            }
            if e.api_error().is_some_and(ApiError::is_retryable) {
                println!("The draft is saved; run 'submit' again to resume.");
            }
            Err(AppError::Other(e.user_message()))
        }
    }
}

async fn watch(session: &Session, config: &AppConfig) -> Result<(), AppError> {
    if !session.is_authenticated() {
        return Err(AppError::Validation("Log in first".to_string()));
    }

    let cache = Arc::new(QueryCache::new());
    let mut invalidations = cache.subscribe();
    let connector = WsConnector::new(Duration::from_secs(config.connect_timeout_secs));
    let channel = LiveChannel::new(config.live_channel_config(), Arc::new(connector), cache.clone());
    let mut messages = channel.subscribe_messages();

    let driver = channel.run(session.subscribe());
    tokio::pin!(driver);
    log::info!("Watching for live updates, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = &mut driver => break,
            key = invalidations.recv() => {
                match key {
                    Ok(key) => println!("Invalidated {:?}", key),
                    Err(RecvError::Lagged(n)) => log::warn!("Missed {} invalidations", n),
                    Err(RecvError::Closed) => break,
                }
            }
            changed = messages.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(message) = messages.borrow_and_update().clone() {
                    log::debug!("Live message: {:?}", message);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
