//! Client for the remote generation provider (Gemini API).
//!
//! This crate provides:
//! - The `RemoteJobClient` boundary the job tracker drives
//! - `VeoClient`, its HTTP implementation for long-running video jobs
//! - `ImageClient` for synchronous still-image generation

pub mod client;
pub mod error;
pub mod image;
pub mod types;

pub use client::{RemoteJobClient, VeoClient, VeoClientConfig};
pub use error::{ClientError, ClientResult};
pub use image::ImageClient;
