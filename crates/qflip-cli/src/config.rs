use crate::cli::FlipArgs;
use crate::error::{CliError, Result};
use qflip::core::io::bvec::BvecLayout;
use qflip::core::loss::DEFAULT_ORDER;
use qflip::engine::config::{self as core_config, Criterion, DEFAULT_TIME_LIMIT_SECS};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialFlipSection {
    criteria: Option<String>,
    time_limit: Option<f64>,
    weight: Option<f64>,
    order: Option<i32>,
    verbose: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialIoSection {
    fslgrad: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialFlipConfig {
    flip: Option<PartialFlipSection>,
    io: Option<PartialIoSection>,
}

/// Fully resolved settings of a `flip` invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub core_config: core_config::FlipConfig,
    pub layout: BvecLayout,
}

impl PartialFlipConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Loads the configuration file if one was given; otherwise starts empty.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Resolves the final configuration. Command-line arguments take precedence over
    /// `--set` values, which take precedence over the file, which takes precedence over
    /// the built-in defaults.
    pub fn merge_with_cli(mut self, args: &FlipArgs, verbosity: u8) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;

        let flip = self.flip.take().unwrap_or_default();
        let io = self.io.take().unwrap_or_default();

        let criterion = match args.criteria.as_ref().or(flip.criteria.as_ref()) {
            Some(name) => name.parse::<Criterion>()?,
            None => Criterion::default(),
        };
        let verbose = verbosity > 0 || flip.verbose.unwrap_or(false);

        let mut builder = core_config::FlipConfigBuilder::new()
            .criterion(criterion)
            .time_limit_secs(
                args.time_limit
                    .or(flip.time_limit)
                    .unwrap_or(DEFAULT_TIME_LIMIT_SECS),
            )
            .order(args.order.or(flip.order).unwrap_or(DEFAULT_ORDER))
            .verbose(verbose);
        if let Some(weight) = args.weight.or(flip.weight) {
            builder = builder.weight(weight);
        }

        let layout = BvecLayout::from_fslgrad_flag(args.fslgrad || io.fslgrad.unwrap_or(false));

        Ok(AppConfig {
            core_config: builder.build()?,
            layout,
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            let invalid = |kind: &str| {
                CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value_str))
            };
            let flip = || PartialFlipSection::default();

            match key {
                "flip.criteria" => {
                    self.flip.get_or_insert_with(flip).criteria = Some(value_str.to_string());
                }
                "flip.time-limit" => {
                    self.flip.get_or_insert_with(flip).time_limit =
                        Some(value_str.parse().map_err(|_| invalid("float"))?);
                }
                "flip.weight" => {
                    self.flip.get_or_insert_with(flip).weight =
                        Some(value_str.parse().map_err(|_| invalid("float"))?);
                }
                "flip.order" => {
                    self.flip.get_or_insert_with(flip).order =
                        Some(value_str.parse().map_err(|_| invalid("integer"))?);
                }
                "flip.verbose" => {
                    self.flip.get_or_insert_with(flip).verbose =
                        Some(value_str.parse().map_err(|_| invalid("boolean"))?);
                }
                "io.fslgrad" => {
                    self.io.get_or_insert_with(Default::default).fslgrad =
                        Some(value_str.parse().map_err(|_| invalid("boolean"))?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
