use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::decompose::DEFAULT_MINIMUM_UNCOVERED_LENGTH;
use crate::error::PipelineError;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub single_output: Option<PathBuf>,
    #[serde(default)]
    pub per_record_dir: Option<PathBuf>,
    #[serde(default)]
    pub per_family_dir: Option<PathBuf>,
    #[serde(default)]
    pub minimum_uncovered_length: Option<usize>,
    #[serde(default)]
    pub strict_protein_ids: Option<bool>,
    #[serde(default)]
    pub no_cache: Option<bool>,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TaxonomyConfig {
    #[serde(default)]
    pub taxdump_dir: Option<PathBuf>,
    #[serde(default)]
    pub offline: bool,
}

/// Command-line values; anything set here wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<PathBuf>,
    pub single_output: Option<PathBuf>,
    pub per_record_dir: Option<PathBuf>,
    pub per_family_dir: Option<PathBuf>,
    pub minimum_uncovered_length: Option<usize>,
    pub strict_protein_ids: bool,
    pub no_cache: bool,
    pub taxdump_dir: Option<PathBuf>,
    pub offline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTargets {
    pub single_output: Option<Utf8PathBuf>,
    pub per_record_dir: Option<Utf8PathBuf>,
    pub per_family_dir: Option<Utf8PathBuf>,
}

impl OutputTargets {
    pub fn is_empty(&self) -> bool {
        self.single_output.is_none() && self.per_record_dir.is_none() && self.per_family_dir.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomySource {
    Offline,
    Taxdump(PathBuf),
    Datasets,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub input: PathBuf,
    pub outputs: OutputTargets,
    pub minimum_uncovered_length: usize,
    pub strict_protein_ids: bool,
    pub cache: bool,
    pub taxonomy: TaxonomySource,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, PipelineError> {
        let config = match path {
            Some(path) => Self::load(Path::new(path))?,
            None => Config::default(),
        };
        Self::resolve_config(config, overrides)
    }

    pub fn load(path: &Path) -> Result<Config, PipelineError> {
        let content =
            fs::read_to_string(path).map_err(|_| PipelineError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| PipelineError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, PipelineError> {
        let input = overrides
            .input
            .or(config.input)
            .ok_or(PipelineError::MissingInput)?;

        let outputs = OutputTargets {
            single_output: utf8(overrides.single_output.or(config.single_output))?,
            per_record_dir: utf8(overrides.per_record_dir.or(config.per_record_dir))?,
            per_family_dir: utf8(overrides.per_family_dir.or(config.per_family_dir))?,
        };
        if outputs.is_empty() {
            return Err(PipelineError::NoOutputConfigured);
        }

        let taxonomy = if overrides.offline {
            TaxonomySource::Offline
        } else if let Some(dir) = overrides.taxdump_dir {
            TaxonomySource::Taxdump(dir)
        } else if config.taxonomy.offline {
            TaxonomySource::Offline
        } else if let Some(dir) = config.taxonomy.taxdump_dir {
            TaxonomySource::Taxdump(dir)
        } else if let Some(dir) = default_taxdump_dir().filter(|dir| dir.join("nodes.dmp").exists())
        {
            TaxonomySource::Taxdump(dir)
        } else {
            TaxonomySource::Datasets
        };

        Ok(ResolvedConfig {
            input,
            outputs,
            minimum_uncovered_length: overrides
                .minimum_uncovered_length
                .or(config.minimum_uncovered_length)
                .unwrap_or(DEFAULT_MINIMUM_UNCOVERED_LENGTH),
            strict_protein_ids: overrides.strict_protein_ids
                || config.strict_protein_ids.unwrap_or(false),
            cache: !(overrides.no_cache || config.no_cache.unwrap_or(false)),
            taxonomy,
        })
    }
}

fn utf8(path: Option<PathBuf>) -> Result<Option<Utf8PathBuf>, PipelineError> {
    path.map(|path| {
        Utf8PathBuf::from_path_buf(path)
            .map_err(|path| PipelineError::Filesystem(format!("non UTF-8 path: {}", path.display())))
    })
    .transpose()
}

pub fn default_taxdump_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.cache_dir().join("genpept-fasta").join("taxdump"))
}
