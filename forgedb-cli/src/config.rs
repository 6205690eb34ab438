use serde_derive::{Deserialize, Serialize};

/// Shell settings loaded via `confy`, the teacher's config-loading crate.
/// Persisted at the platform config directory under `forgedb-cli/config.toml`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigLoad {
    version: u8,

    pub prompt: Option<String>,

    /// Show a row-count/timing line after each statement.
    /// Only meaningful in non-interactive (batch) mode; the REPL always
    /// shows it.
    pub show_stats: Option<bool>,

    /// Multi-line mode: accumulate input across lines until a `;`
    /// terminator is seen, rather than treating every line as one
    /// statement. Default true.
    pub multi_line: Option<bool>,

    /// The differential-privacy epsilon a fresh session starts with,
    /// before any `SET DP_EPSILON = ...` (§4.10).
    pub dp_epsilon: Option<f64>,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad {
            version: 0,
            prompt: Some("forgedb".to_string()),
            show_stats: Some(false),
            multi_line: Some(true),
            dp_epsilon: Some(1.0),
        }
    }
}

impl ConfigLoad {
    /// Loads settings from `path` via `confy`, falling back to
    /// [`ConfigLoad::default`] when the file is missing or unreadable
    /// rather than failing the whole shell over a config typo.
    pub fn load(path: &str) -> Self {
        confy::load_path(path).unwrap_or_default()
    }

    pub fn terminal_update(&mut self) {
        self.show_stats = Some(true);
    }
}
