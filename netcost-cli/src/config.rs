use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Args;

/// Config file which is loaded if `--config` is not specified and it exists
/// in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "netcost.json";

/// Default path for the DOT export of the graph.
pub const DEFAULT_DOT_OUTPUT: &str = "graph.dot";

/// Contents of a JSON config file. All keys are optional.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Path of the network document to analyze.
    pub input_graph_json: Option<PathBuf>,

    /// Write a DOT file of the graph and print each node as it is built.
    pub debug_graph: Option<bool>,

    /// Path for the DOT file.
    pub dot_output: Option<PathBuf>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<ConfigFile, ConfigError> {
        let json = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            error: err,
        })?;
        serde_json::from_str(&json).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            error: err,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Read {
        path: PathBuf,
        error: std::io::Error,
    },

    /// The config file is not valid.
    Parse {
        path: PathBuf,
        error: serde_json::Error,
    },

    /// No network document was given on the command line or in the config.
    MissingGraph,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, error } => {
                write!(f, "failed to read config \"{}\": {}", path.display(), error)
            }
            ConfigError::Parse { path, error } => {
                write!(f, "invalid config \"{}\": {}", path.display(), error)
            }
            ConfigError::MissingGraph => write!(
                f,
                "missing `<graph>` arg and no `input_graph_json` in config"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Read { error, .. } => Some(error),
            ConfigError::Parse { error, .. } => Some(error),
            ConfigError::MissingGraph => None,
        }
    }
}

/// Settings for a run of the CLI, after combining command-line arguments,
/// the config file and environment flags.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub input_graph_json: PathBuf,
    pub debug_graph: bool,
    pub dot_output: PathBuf,
    pub json: bool,
    pub verbose: bool,
}

impl Config {
    /// Load the config file named by `args`, or the default config file if
    /// present, and combine it with `args` and the environment.
    pub fn load(args: &Args) -> Result<Config, ConfigError> {
        let file = match &args.config {
            Some(path) => ConfigFile::load(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    ConfigFile::load(default_path)?
                } else {
                    ConfigFile::default()
                }
            }
        };
        Config::resolve(args, file, |name| std::env::var(name).ok())
    }

    /// Combine command-line arguments, config file values and environment
    /// flags. Command-line arguments take precedence, followed by the
    /// environment and then the config file.
    pub fn resolve(
        args: &Args,
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigError> {
        let input_graph_json = args
            .graph
            .clone()
            .or(file.input_graph_json)
            .ok_or(ConfigError::MissingGraph)?;

        let debug_graph = args.debug
            || env("NETCOST_DEBUG")
                .map(|val| str_as_bool(&val))
                .or(file.debug_graph)
                .unwrap_or(false);

        let dot_output = args
            .dot
            .clone()
            .or(file.dot_output)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOT_OUTPUT));

        let verbose = args.verbose
            || env("NETCOST_VERBOSE")
                .map(|val| str_as_bool(&val))
                .unwrap_or(false);

        Ok(Config {
            input_graph_json,
            debug_graph,
            dot_output,
            json: args.json,
            verbose,
        })
    }

    /// Return true if nodes should be printed as they are built and computed.
    ///
    /// This is always false for JSON output, so that stdout holds only the
    /// JSON document.
    pub fn verbose(&self) -> bool {
        !self.json && (self.verbose || self.debug_graph)
    }
}

/// Interpret a string value such as "1" or "no" as a boolean.
pub fn str_as_bool(s: &str) -> bool {
    match s {
        "1" | "true" | "t" | "yes" | "y" => true,
        "0" | "false" | "f" | "no" | "n" => false,
        _ => {
            eprintln!("Unrecognized boolean value \"{}\"", s);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use netcost_testing::TestCases;

    use super::{str_as_bool, Config, ConfigError, ConfigFile};
    use crate::Args;

    fn no_env(_name: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_str_as_bool() {
        #[derive(Debug)]
        struct Case {
            value: &'static str,
            expected: bool,
        }

        let cases = [
            ("1", true),
            ("true", true),
            ("y", true),
            ("yes", true),
            ("0", false),
            ("no", false),
            ("f", false),
            ("maybe", false),
        ]
        .map(|(value, expected)| Case { value, expected });

        cases.test_each(|case| assert_eq!(str_as_bool(case.value), case.expected));
    }

    #[test]
    fn test_parse_config_file() {
        let file: ConfigFile = serde_json::from_str(
            r#"{ "input_graph_json": "resnet.json", "debug_graph": true }"#,
        )
        .unwrap();
        assert_eq!(file.input_graph_json, Some(PathBuf::from("resnet.json")));
        assert_eq!(file.debug_graph, Some(true));
        assert_eq!(file.dot_output, None);

        let err = serde_json::from_str::<ConfigFile>(r#"{ "input_graph": "x" }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_resolve_from_file() {
        let file = ConfigFile {
            input_graph_json: Some("net.json".into()),
            debug_graph: Some(true),
            dot_output: None,
        };
        let config = Config::resolve(&Args::default(), file, no_env).unwrap();
        assert_eq!(
            config,
            Config {
                input_graph_json: "net.json".into(),
                debug_graph: true,
                dot_output: "graph.dot".into(),
                json: false,
                verbose: false,
            }
        );
    }

    #[test]
    fn test_args_override_file() {
        let file = ConfigFile {
            input_graph_json: Some("net.json".into()),
            debug_graph: Some(false),
            dot_output: Some("net.dot".into()),
        };
        let args = Args {
            graph: Some("other.json".into()),
            debug: true,
            dot: Some("other.dot".into()),
            json: true,
            ..Default::default()
        };
        let config = Config::resolve(&args, file, no_env).unwrap();
        assert_eq!(config.input_graph_json, PathBuf::from("other.json"));
        assert!(config.debug_graph);
        assert_eq!(config.dot_output, PathBuf::from("other.dot"));
        assert!(config.json);
    }

    #[test]
    fn test_env_flags() {
        let file = ConfigFile {
            input_graph_json: Some("net.json".into()),
            debug_graph: Some(true),
            dot_output: None,
        };
        let env = |name: &str| match name {
            "NETCOST_DEBUG" => Some("0".to_string()),
            "NETCOST_VERBOSE" => Some("1".to_string()),
            _ => None,
        };
        let config = Config::resolve(&Args::default(), file, env).unwrap();
        assert!(!config.debug_graph);
        assert!(config.verbose);
    }

    #[test]
    fn test_json_disables_verbose() {
        let args = Args {
            graph: Some("net.json".into()),
            debug: true,
            verbose: true,
            ..Default::default()
        };
        let config = Config::resolve(&args, ConfigFile::default(), no_env).unwrap();
        assert!(config.verbose());

        let config = Config { json: true, ..config };
        assert!(!config.verbose());
        assert!(config.debug_graph);
    }

    #[test]
    fn test_missing_graph() {
        let result = Config::resolve(&Args::default(), ConfigFile::default(), no_env);
        assert!(matches!(result, Err(ConfigError::MissingGraph)));
    }

    #[test]
    fn test_load_missing_config() {
        let args = Args {
            config: Some("no-such-config.json".into()),
            ..Default::default()
        };
        let result = Config::load(&args);
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
