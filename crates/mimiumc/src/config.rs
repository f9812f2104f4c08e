use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Compiler settings, read from a TOML file.
///
/// Every field has a default, so an empty file (or no file at all) gives
/// the standard conventions: the entry function is `dsp` and memory object
/// types are named `<function>.mem`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Name of the top-level function whose memory object is allocated.
    pub entry: String,
    pub memory_suffix: String,
    pub dump: DumpConfig,
}

/// What the `mimiumc` binary prints when no `--emit` is given.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    pub types: bool,
    pub mir: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            entry: "dsp".to_string(),
            memory_suffix: ".mem".to_string(),
            dump: DumpConfig::default(),
        }
    }
}

impl CompilerConfig {
    pub fn from_file(path: &Path) -> Result<CompilerConfig, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        content.parse()
    }
}

impl FromStr for CompilerConfig {
    type Err = String;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config = "".parse::<CompilerConfig>().unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.entry, "dsp");
        assert_eq!(config.memory_suffix, ".mem");
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
entry = "synth"
memory_suffix = "_state"

[dump]
types = true
mir = true
"#;
        let config = toml.parse::<CompilerConfig>().unwrap();
        assert_eq!(config.entry, "synth");
        assert_eq!(config.memory_suffix, "_state");
        assert!(config.dump.types);
        assert!(config.dump.mir);
    }

    #[test]
    fn partial_dump_section() {
        let config = "[dump]\nmir = true\n".parse::<CompilerConfig>().unwrap();
        assert!(config.dump.mir);
        assert!(!config.dump.types);
        assert_eq!(config.entry, "dsp");
    }

    #[test]
    fn reject_wrong_type() {
        let err = "entry = 3\n".parse::<CompilerConfig>().unwrap_err();
        assert!(err.starts_with("Failed to parse config"), "{}", err);
    }
}
