//! Recipe ingestion: URL detection, page fetching, JSON-LD extraction,
//! LLM extraction and regex salvage.

pub mod duration;
pub mod fetcher;
pub mod ingredient;
pub mod input;
pub mod json_ld;
pub mod llm;
pub mod page_text;
pub mod pipeline;
pub mod salvage;

pub use fetcher::PageFetcher;
pub use input::{classify, RecipeInput};
pub use json_ld::JsonLdExtractor;
pub use llm::{decode_recipe, extract_json_object, LlmExtraction, LlmRecipeExtractor};
pub use pipeline::{ParseMethod, ParseOutcome, RecipeParser};
pub use salvage::salvage;
