//! Compiler configuration (spec.md §6, SPEC_FULL.md "Configuration").
//!
//! Grounded on the teacher's `config.rs` builder pattern: a plain data
//! struct built up with `with_*` methods, optionally merged with a TOML
//! file on disk via serde. The fields here hold C-compiler knobs instead
//! of the teacher's FFI-builtin table, but the shape — builder methods,
//! a `Default` derive, a `#[cfg(test)]` module beside it — is the same.

use serde::Deserialize;
use std::path::PathBuf;

/// `-W{all,extra,error}` (spec.md §6). `Error` promotes every warning to
/// an error (`Diagnostics::warn` already does the promotion once this is
/// threaded into `Diagnostics::new`); `All`/`Extra` only widen which
/// warnings the typechecker/translator choose to emit, so they are
/// recorded here purely for those call sites to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarnLevel {
    #[default]
    Normal,
    All,
    Extra,
    Error,
}

/// `-Onnn` (spec.md §6): parsed and threaded through so `--emit-llvm`
/// output reflects the flag, but this compiler performs no optimization
/// passes of its own — the level is recorded only, matching spec.md §6's
/// "accepted but only recorded" note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    #[default]
    O0,
    O1,
    O2,
    O3,
}

impl OptLevel {
    pub fn from_flag(level: u8) -> Option<Self> {
        match level {
            0 => Some(OptLevel::O0),
            1 => Some(OptLevel::O1),
            2 => Some(OptLevel::O2),
            3 => Some(OptLevel::O3),
            _ => None,
        }
    }

    pub fn as_clang_flag(self) -> &'static str {
        match self {
            OptLevel::O0 => "-O0",
            OptLevel::O1 => "-O1",
            OptLevel::O2 => "-O2",
            OptLevel::O3 => "-O3",
        }
    }
}

/// One `-D NAME[=VALUE]` command-line macro definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandLineDefine {
    pub name: String,
    pub value: Option<String>,
}

/// Compiler-wide configuration, assembled from CLI flags and optionally
/// merged with a `ccir.toml` project file (spec.md §6 "may be overridden
/// by a project `ccir.toml`"). `Deserialize` lets `toml::from_str` build
/// one directly from disk; the CLI then overlays flags on top via the
/// `with_*` builder methods.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// `-I` directories, searched before the system defaults.
    pub include_paths: Vec<PathBuf>,

    /// `-D` command-line macros, applied in order after the predefined
    /// table (spec.md §6 predefined-macro list).
    pub defines: Vec<CommandLineDefine>,

    /// `-U` command-line undefinitions, applied after `defines`.
    pub undefines: Vec<String>,

    #[serde(skip)]
    pub warn_level: WarnLevel,

    #[serde(skip)]
    pub opt_level: OptLevel,

    /// `-l` libraries passed through to the linker.
    pub libraries: Vec<String>,

    /// `-L` library search directories passed through to the linker.
    pub library_paths: Vec<PathBuf>,

    /// `-g`: recorded only, no debug info is emitted (spec.md §6).
    #[serde(skip)]
    pub debug_info: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn with_define(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.defines.push(CommandLineDefine { name: name.into(), value });
        self
    }

    pub fn with_undefine(mut self, name: impl Into<String>) -> Self {
        self.undefines.push(name.into());
        self
    }

    pub fn with_library(mut self, lib: impl Into<String>) -> Self {
        self.libraries.push(lib.into());
        self
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_paths.push(path.into());
        self
    }

    pub fn with_warn_level(mut self, level: WarnLevel) -> Self {
        self.warn_level = level;
        self
    }

    pub fn with_opt_level(mut self, level: OptLevel) -> Self {
        self.opt_level = level;
        self
    }

    /// Loads a `ccir.toml` project file and merges the CLI's flags on top
    /// of it: CLI-supplied include paths/defines/libraries are appended
    /// after the file's own, matching the teacher's "defaults, then user
    /// overrides extend rather than replace" merge shape.
    pub fn merge_toml(mut self, toml_src: &str) -> Result<Self, toml::de::Error> {
        let from_file: CompilerConfig = toml::from_str(toml_src)?;
        let mut merged = from_file;
        merged.include_paths.extend(self.include_paths.drain(..));
        merged.defines.extend(self.defines.drain(..));
        merged.undefines.extend(self.undefines.drain(..));
        merged.libraries.extend(self.libraries.drain(..));
        merged.library_paths.extend(self.library_paths.drain(..));
        merged.warn_level = self.warn_level;
        merged.opt_level = self.opt_level;
        merged.debug_info = self.debug_info;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_include_paths_and_defines() {
        let config = CompilerConfig::new()
            .with_include_path("/opt/inc")
            .with_define("FOO", Some("1".to_string()))
            .with_define("BAR", None);

        assert_eq!(config.include_paths, vec![PathBuf::from("/opt/inc")]);
        assert_eq!(config.defines.len(), 2);
        assert_eq!(config.defines[0].name, "FOO");
        assert_eq!(config.defines[1].value, None);
    }

    #[test]
    fn opt_level_from_flag_rejects_out_of_range() {
        assert_eq!(OptLevel::from_flag(3), Some(OptLevel::O3));
        assert_eq!(OptLevel::from_flag(4), None);
    }

    #[test]
    fn merge_toml_appends_cli_paths_after_file_paths() {
        let toml_src = r#"
            include_paths = ["/from/file"]
            libraries = ["m"]
        "#;
        let config = CompilerConfig::new().with_include_path("/from/cli").merge_toml(toml_src).unwrap();
        assert_eq!(config.include_paths, vec![PathBuf::from("/from/file"), PathBuf::from("/from/cli")]);
        assert_eq!(config.libraries, vec!["m".to_string()]);
    }
}
