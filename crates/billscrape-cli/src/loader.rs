//! Customer identifier loading from `.txt` and `.yaml` input files.
//!
//! `.txt` files hold one identifier per line; blank lines and lines starting
//! with `#` are skipped. `.yaml`/`.yml` files carry identifiers together with
//! the account metadata the report needs. Identifiers repeated across files
//! keep the first file as their source.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

/// Account metadata supplied alongside identifiers in YAML inputs.
///
/// Text fields also accept bare numbers, since exported sheets often write
/// identifiers and route numbers unquoted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct CustomerMetadata {
    #[serde(deserialize_with = "de_text")]
    pub customer_number: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub address: Option<String>,
    /// Meter-reading route number.
    #[serde(default, deserialize_with = "de_opt_text")]
    pub rbm: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub substation: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub tariff: Option<String>,
    #[serde(default, deserialize_with = "de_power")]
    pub power: Option<u64>,
}

fn yaml_text(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn de_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    serde_yaml::Value::deserialize(deserializer).map(|v| yaml_text(v).unwrap_or_default())
}

fn de_opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    serde_yaml::Value::deserialize(deserializer).map(yaml_text)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn de_power<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        serde_yaml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct CustomerFile {
    customers: Vec<CustomerMetadata>,
}

/// Deduplicated identifiers in first-seen order, with provenance.
#[derive(Debug, Default)]
pub(crate) struct LoadedCustomers {
    pub numbers: Vec<String>,
    /// Identifier → file name it was first loaded from.
    pub sources: HashMap<String, String>,
    pub metadata: HashMap<String, CustomerMetadata>,
}

impl LoadedCustomers {
    fn insert(&mut self, seen: &mut HashSet<String>, number: String, source: &str) {
        if seen.insert(number.clone()) {
            self.sources.insert(number.clone(), source.to_owned());
            self.numbers.push(number);
        }
    }

    /// Identifier → position in input order, used to re-sort results.
    pub(crate) fn input_order(&self) -> HashMap<&str, usize> {
        self.numbers
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect()
    }

    pub(crate) fn source_of(&self, customer_number: &str) -> &str {
        self.sources.get(customer_number).map_or("", String::as_str)
    }
}

fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt" | "yaml" | "yml")
    )
}

/// Lists the supported input files in `dir`, sorted by name.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read.
pub(crate) fn list_input_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("cannot read input directory {}: {e}", dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_supported(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Loads every identifier from `paths`. Unreadable or unsupported files are
/// logged and skipped so one bad file does not abort the run.
pub(crate) fn load_customers(paths: &[PathBuf]) -> LoadedCustomers {
    let mut loaded = LoadedCustomers::default();
    let mut seen = HashSet::new();

    for path in paths {
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_owned();

        if !is_supported(path) {
            tracing::warn!(file = %path.display(), "skipping unsupported input file");
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "failed to read input file");
                continue;
            }
        };

        let before = loaded.numbers.len();
        if path.extension().and_then(|e| e.to_str()) == Some("txt") {
            for number in parse_txt(&content) {
                loaded.insert(&mut seen, number, &source);
            }
        } else {
            match serde_yaml::from_str::<CustomerFile>(&content) {
                Ok(file) => {
                    for customer in file.customers {
                        let number = customer.customer_number.trim().to_owned();
                        if number.is_empty() {
                            continue;
                        }
                        loaded.metadata.entry(number.clone()).or_insert(customer);
                        loaded.insert(&mut seen, number, &source);
                    }
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "failed to parse customer file");
                    continue;
                }
            }
        }

        tracing::info!(
            file = %source,
            loaded = loaded.numbers.len() - before,
            "loaded customer numbers"
        );
    }

    tracing::info!(
        total = loaded.numbers.len(),
        files = paths.len(),
        "unique customer numbers loaded"
    );
    loaded
}

fn parse_txt(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}
