//! Provider configuration
//!
//! Properties are a flat string-keyed map (`base.url`, `filter`, ...), either
//! built in code or loaded from a TOML file, and validated once into
//! `ProviderSettings` when the provider is initialized.
//!
//! # Example
//!
//! ```no_run
//! use nar_harvest::config::{load_properties, validate};
//! use std::path::Path;
//!
//! let properties = load_properties(Path::new("provider.toml")).unwrap();
//! let settings = validate(&properties).unwrap();
//! println!("Listing root: {}", settings.base_url);
//! ```

mod duration;
mod parser;
mod types;
mod validation;

pub use duration::parse_duration;
pub use parser::{load_properties, load_settings, parse_properties};
pub use types::*;
pub use validation::validate;
