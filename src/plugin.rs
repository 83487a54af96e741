//! roodmus plugin descriptor
//!
//! Knows how to enter the roodmus conda environment, how to turn a subcommand
//! plus arguments into one shell command line, and how the environment is
//! installed in the first place.

use std::path::Path;

use crate::config::EnvironmentConfig;

/// Supported roodmus binary version; also names the conda environment
pub const ROODMUS_VERSION: &str = "1.0";

/// File touched in the install prefix once installation has succeeded
pub const INSTALLED_SENTINEL: &str = "roodmus_installed";

/// Environment variable overriding the conda activation command
pub const CONDA_ACTIVATION_ENV: &str = "ROODMUS_CONDA_ACTIVATION_CMD";

/// Makes `conda activate` usable from `bash -c`
pub const DEFAULT_CONDA_ACTIVATION_CMD: &str = r#"eval "$(conda shell.bash hook)""#;

pub const PLUGIN_URL: &str = "https://github.com/scipion-em/scipion-em-roodmus";

const PIPELINER_REPO: &str = "https://gitlab.com/ccpem/ccpem-pipeliner.git";
const PIPELINER_COMMIT: &str = "bedbedbe183ad497dbaa82a638f210d316ba9bae";

/// Citation for methods sections
pub const ROODMUS_CITATION: &str = "M. Joosten, J. Greer, J. Parkhurst, T. Burnley, and A.J. Jakobi. \
Roodmus: A toolkit for benchmarking heterogeneous electron cryo-microscopy reconstructions. \
BioRxiv 590932 (2024). https://doi.org/10.1101/2024.04.29.590932";

/// Builds roodmus command lines for one environment setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    conda_activation_cmd: String,
    activate: bool,
    program: String,
}

impl Plugin {
    /// Resolve the activation command: config value, then
    /// `ROODMUS_CONDA_ACTIVATION_CMD`, then the conda shell hook.
    /// A trailing `&&` is dropped; commands are joined here.
    pub fn from_config(env: &EnvironmentConfig) -> Self {
        let conda_activation_cmd = env
            .conda_activation_cmd
            .clone()
            .or_else(|| std::env::var(CONDA_ACTIVATION_ENV).ok())
            .map(|cmd| cmd.trim().trim_end_matches("&&").trim_end().to_string())
            .filter(|cmd| !cmd.is_empty())
            .unwrap_or_else(|| DEFAULT_CONDA_ACTIVATION_CMD.to_string());

        Self {
            conda_activation_cmd,
            activate: env.activate,
            program: env.program.clone(),
        }
    }

    /// Name of the conda environment holding roodmus
    pub fn env_name() -> String {
        format!("roodmus-{}", ROODMUS_VERSION)
    }

    pub fn env_activation() -> String {
        format!("conda activate {}", Self::env_name())
    }

    pub fn conda_activation_cmd(&self) -> &str {
        &self.conda_activation_cmd
    }

    /// `<activation> && roodmus <subcommand>`, or just the program when
    /// activation is disabled
    pub fn program_command(&self, subcommand: &str) -> String {
        let program = format!("{} {}", shell_quote(&self.program), subcommand);
        if self.activate {
            format!(
                "{} && {} && {}",
                self.conda_activation_cmd,
                Self::env_activation(),
                program
            )
        } else {
            program
        }
    }

    /// Full command line with every argument shell-quoted
    pub fn command(&self, subcommand: &str, args: &[String]) -> String {
        let mut cmd = self.program_command(subcommand);
        for arg in args {
            cmd.push(' ');
            cmd.push_str(&shell_quote(arg));
        }
        cmd
    }

    /// Shell command creating the conda environment and installing roodmus.
    ///
    /// Runs from the install prefix and touches [`INSTALLED_SENTINEL`] last,
    /// so a partial install is retried on the next attempt.
    pub fn installation_commands(&self) -> String {
        let env_name = Self::env_name();
        [
            format!(
                "{} && conda create -n {} python=3.10 conda-forge::fftw -y",
                self.conda_activation_cmd, env_name
            ),
            format!("conda activate {}", env_name),
            "pip install roodmus".to_string(),
            "pip install openmm".to_string(),
            format!("git clone {}", PIPELINER_REPO),
            "cd ccpem-pipeliner".to_string(),
            format!("git checkout {}", PIPELINER_COMMIT),
            "pip install -e .".to_string(),
            "cd ..".to_string(),
            format!("touch {}", INSTALLED_SENTINEL),
        ]
        .join(" && ")
    }

    /// True once the installation commands have completed in `prefix`
    pub fn is_installed(prefix: &Path) -> bool {
        prefix.join(INSTALLED_SENTINEL).exists()
    }
}

/// Quote a word for `bash -c`, leaving plain words untouched
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r#"'\''"#))
    }
}
