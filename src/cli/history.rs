//! # History File Management
//!
//! By default the REPL history is stored in `~/.chwire_history`.
//!
//! The `CHWIRE_HISTORY` environment variable overrides the location:
//!
//! ```bash
//! export CHWIRE_HISTORY=/custom/path/history
//! chwire ./response.bin
//! ```
//!
//! An empty `CHWIRE_HISTORY` disables history persistence.

use std::env;
use std::path::PathBuf;

const DEFAULT_HISTORY_FILE: &str = ".chwire_history";
const HISTORY_ENV_VAR: &str = "CHWIRE_HISTORY";

pub fn history_path() -> Option<PathBuf> {
    resolve(env::var(HISTORY_ENV_VAR).ok(), env::var("HOME").ok())
}

fn resolve(custom: Option<String>, home: Option<String>) -> Option<PathBuf> {
    match custom {
        Some(path) if path.is_empty() => None,
        Some(path) => Some(PathBuf::from(path)),
        None => home.map(|home| PathBuf::from(home).join(DEFAULT_HISTORY_FILE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_history_path_is_in_home() {
        let path = resolve(None, Some("/home/ada".into()));
        assert_eq!(path, Some(PathBuf::from("/home/ada/.chwire_history")));
    }

    #[test]
    fn custom_history_path_wins_over_home() {
        let path = resolve(Some("/custom/path".into()), Some("/home/ada".into()));
        assert_eq!(path, Some(PathBuf::from("/custom/path")));
    }

    #[test]
    fn empty_override_disables_history() {
        assert_eq!(resolve(Some(String::new()), Some("/home/ada".into())), None);
    }

    #[test]
    fn no_home_and_no_override_means_no_history() {
        assert_eq!(resolve(None, None), None);
    }
}
