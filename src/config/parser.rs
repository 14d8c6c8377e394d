use crate::config::types::{ProviderProperties, ProviderSettings};
use crate::config::validation::validate;
use crate::{ConfigError, ConfigResult};
use std::path::Path;
use toml::{Table, Value};

/// Loads provider properties from a TOML file
///
/// Nested tables are flattened into dotted keys, so `[base] url = "..."` and
/// `"base.url" = "..."` are equivalent. Scalars are kept in their textual
/// form; arrays are rejected.
///
/// # Arguments
///
/// * `path` - Path to the TOML properties file
///
/// # Returns
///
/// * `Ok(ProviderProperties)` - The flattened properties, not yet validated
/// * `Err(ConfigError)` - Failed to read or parse the file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use nar_harvest::config::load_properties;
///
/// let properties = load_properties(Path::new("provider.toml")).unwrap();
/// println!("Listing root: {:?}", properties.get("base.url"));
/// ```
pub fn load_properties(path: &Path) -> ConfigResult<ProviderProperties> {
    let content = std::fs::read_to_string(path)?;
    parse_properties(&content)
}

/// Parses provider properties from TOML text
pub fn parse_properties(content: &str) -> ConfigResult<ProviderProperties> {
    let table: Table = toml::from_str(content)?;

    let mut properties = ProviderProperties::new();
    flatten(&table, "", &mut properties)?;
    Ok(properties)
}

/// Loads and validates provider settings in one step
pub fn load_settings(path: &Path) -> ConfigResult<ProviderSettings> {
    let properties = load_properties(path)?;
    validate(&properties)
}

fn flatten(table: &Table, prefix: &str, properties: &mut ProviderProperties) -> ConfigResult<()> {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        let text = match value {
            Value::Table(nested) => {
                flatten(nested, &key, properties)?;
                continue;
            }
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Datetime(d) => d.to_string(),
            Value::Array(_) => {
                return Err(ConfigError::Invalid {
                    key,
                    message: "arrays are not supported".to_string(),
                })
            }
        };
        properties.set(key, text);
    }
    Ok(())
}
