// Copyright 2022 - 2025 Martin Pool.

//! `bcmutants.toml` configuration file (`spec.md` §7).
//!
//! The config file is read after parsing command line arguments, and
//! after finding the module(s) to mutate, because these together
//! determine its location.

use std::collections::BTreeSet;
use std::default::Default;
use std::fs::read_to_string;
use std::time::Duration;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::operators::{self, OperatorId};
use crate::Result;

const DEFAULT_MAX_DISTANCE: u32 = 4;
const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Configuration read from a config file.
///
/// This is similar to [`Options`], and eventually merged into it, but
/// separate because it can be deserialized directly and every field is
/// optional: a missing `bcmutants.toml` is equivalent to an empty one.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Fail the whole run on a toolchain error rather than just the one
    /// module/mutant that failed to build (`spec.md` §7).
    pub strict: bool,
    /// Operator group names (`spec.md` §4.1); an empty list means
    /// `["default"]`.
    pub operator_groups: Vec<String>,
    pub max_distance: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub cache_dir: Option<Utf8PathBuf>,
    pub workers: Option<usize>,
}

impl Config {
    pub fn read_file(path: &Utf8Path) -> Result<Config> {
        let toml = read_to_string(path).with_context(|| format!("read config {path:?}"))?;
        toml::de::from_str(&toml).with_context(|| format!("parse toml from {path:?}"))
    }

    /// Read `bcmutants.toml` from `dir`, or return the default (empty)
    /// config if it doesn't exist.
    pub fn read_tree_config(dir: &Utf8Path) -> Result<Config> {
        let path = dir.join("bcmutants.toml");
        if path.exists() {
            Config::read_file(&path)
        } else {
            Ok(Config::default())
        }
    }
}

/// Fully resolved options the rest of the engine runs with: every
/// optional `Config` field has been given its default and every operator
/// group name has been expanded to concrete operator ids.
#[derive(Debug, Clone)]
pub struct Options {
    pub strict: bool,
    pub operator_ids: BTreeSet<OperatorId>,
    pub max_distance: u32,
    pub timeout: Duration,
    pub cache_dir: Option<Utf8PathBuf>,
    pub workers: usize,
}

impl Options {
    pub fn from_config(config: &Config) -> Result<Options> {
        let groups: Vec<&str> = if config.operator_groups.is_empty() {
            vec!["default"]
        } else {
            config.operator_groups.iter().map(String::as_str).collect()
        };
        let mut operator_ids = BTreeSet::new();
        for group in groups {
            operator_ids.extend(operators::expand_group(group)?);
        }
        Ok(Options {
            strict: config.strict,
            operator_ids,
            max_distance: config.max_distance.unwrap_or(DEFAULT_MAX_DISTANCE),
            timeout: Duration::from_millis(config.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            cache_dir: config.cache_dir.clone(),
            workers: config.workers.unwrap_or_else(crate::executor::effective_workers),
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_config_expands_to_the_default_operator_group() {
        let options = Options::from_config(&Config::default()).unwrap();
        assert!(options.operator_ids.contains(&OperatorId::AddToSub));
        assert!(!options.operator_ids.contains(&OperatorId::LogicalOrToAnd));
        assert_eq!(options.max_distance, DEFAULT_MAX_DISTANCE);
    }

    #[test]
    fn unknown_operator_group_is_rejected() {
        let config = Config { operator_groups: vec!["not_a_group".into()], ..Config::default() };
        assert!(Options::from_config(&config).is_err());
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
        let config = Config::read_tree_config(&dir).unwrap();
        assert_eq!(config, Config::default());
    }
}
