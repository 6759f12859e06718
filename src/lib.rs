//! Tastebase: a personal recipe manager.
//!
//! Recipes come in through [`ingest::RecipeParser`], which tries JSON-LD on a
//! fetched page, then an LLM, then regex salvage. Photos are transcribed by a
//! vision model and then take the text path. Recipes are kept in a SQLite
//! [`store::Database`] with images on disk in a [`media::ImageStore`], and
//! served by the JSON API in [`server`].

pub mod chat;
pub mod config;
pub mod error;
pub mod ingest;
pub mod maintenance;
pub mod media;
pub mod model;
pub mod providers;
pub mod server;
pub mod store;

pub use config::{load_config, AppConfig};
pub use error::{Result, TastebaseError};
pub use ingest::{ParseMethod, ParseOutcome, RecipeParser};
pub use model::{Difficulty, ParsedIngredient, ParsedInstruction, ParsedRecipe};
