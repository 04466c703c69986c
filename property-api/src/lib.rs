//! # Property API
//!
//! REST client for the property intake endpoints of the valuation backend.
//!
//! This crate provides:
//! - The request/response contract for creating a property
//! - A [`PropertyApi`] trait covering the three intake calls (create, upload photo, finalize)
//! - A reqwest-backed implementation, [`HttpPropertyApi`]
//! - An [`ApiError`] type with user-facing messages
//!
//! ## Separation of Concerns
//!
//! This crate does **not** hold draft state, retry calls or decide when a
//! submission is complete. Sequencing the calls is the caller's job.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use property_api::{ApiConfig, HttpPropertyApi, PropertyApi};
//!
//! let api = HttpPropertyApi::new(ApiConfig::default(), || Some("token".to_string()))?;
//! let id = api.create_property(&request).await?;
//! api.submit_property(&id).await?;
//! ```

pub mod error;
pub mod models;
pub mod service;

pub use error::{ApiError, ApiResult};
pub use models::{CreatePropertyRequest, PhotoUpload, PropertyId, PropertyResponse, PropertyType};
pub use service::{ApiConfig, HttpPropertyApi, PropertyApi};
