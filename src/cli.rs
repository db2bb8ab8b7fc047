//! Command-line interface implementation
//!
//! `build` and `start` parse flags into raw options and hand off to the
//! launcher, which re-invokes this executable as `esmb exec <command>`
//! with the options serialized into the environment. The hidden `exec`
//! subcommand is where the pipeline actually runs.

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

use crate::build::{BuildContext, Pipeline};
use crate::config::loader::{load_project_config, merge_project_config, project_config_path};
use crate::config::schema::{BuildConfig, RawOptions};
use crate::launcher;
use crate::watch;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;

/// esmb - Build an ES-module distribution from a source tree
#[derive(Parser)]
#[command(name = "esmb")]
#[command(about = "Build an ES-module distribution from a source tree")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build esm
    Build(BuildArgs),
    /// Start watch
    Start(BuildArgs),
    /// Run a build in-process; spawned by `build` and `start`
    #[command(hide = true)]
    Exec {
        /// `build` or `start`
        command: String,
    },
}

/// Flags shared by `build` and `start`.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Project root directory, default: current working directory
    #[arg(long)]
    pub root: Option<String>,

    /// Project config file path, default: <root>/esm-project.config.toml
    #[arg(long, visible_alias = "build-config")]
    pub esm_config: Option<String>,

    /// Babel config file path, default: <root>/babel.config.toml
    #[arg(long)]
    pub babel_config: Option<String>,

    /// Postcss config file path, default: <root>/postcss.config.toml
    #[arg(long)]
    pub postcss_config: Option<String>,

    /// Less config file path, default: <root>/less.config.toml
    #[arg(long)]
    pub less_config: Option<String>,

    /// Scss config file path, default: <root>/scss.config.toml
    #[arg(long)]
    pub scss_config: Option<String>,

    /// Alias config file path, default: <root>/alias.config.toml
    #[arg(long)]
    pub alias_config: Option<String>,

    /// Comma-separated patterns of files to skip, relative to the root
    #[arg(long)]
    pub ignore: Option<String>,

    /// Source directory, default: src
    #[arg(long)]
    pub src: Option<String>,

    /// Output directory, default: esm
    #[arg(long)]
    pub out: Option<String>,

    /// TypeScript project: also pick up .ts/.tsx sources
    #[arg(long, visible_alias = "ts")]
    pub typescript: bool,

    /// Copy stylesheets through instead of compiling them
    // The flag keeps its historical spelling.
    #[arg(long = "disable-complie-styles", alias = "disable-compile-styles")]
    pub disable_compile_styles: bool,

    /// Do not clean the output directory before building
    #[arg(long)]
    pub disable_clean: bool,

    /// Generate sourcemaps for scripts
    #[arg(long)]
    pub sourcemap: bool,
}

impl BuildArgs {
    /// Convert parsed flags into raw options. Unset boolean flags stay
    /// unset so project-config values can fill them in.
    pub fn into_raw(self) -> RawOptions {
        RawOptions {
            root: self.root,
            src: self.src,
            out: self.out,
            esm_config: self.esm_config,
            babel_config: self.babel_config,
            postcss_config: self.postcss_config,
            less_config: self.less_config,
            scss_config: self.scss_config,
            alias_config: self.alias_config,
            ignore: self.ignore,
            typescript: self.typescript.then_some(true),
            disable_compile_styles: self.disable_compile_styles.then_some(true),
            disable_clean: self.disable_clean.then_some(true),
            sourcemap: self.sourcemap.then_some(true),
            command_prefix: None,
        }
    }
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => launcher::exec_command("build", &args.into_raw()),
        Commands::Start(args) => launcher::exec_command("start", &args.into_raw()),
        Commands::Exec { command } => run_exec(&command),
    }
}

/// Execute a build in the spawned child process.
fn run_exec(command: &str) -> ExitCode {
    let options = match launcher::options_from_env() {
        Ok(options) => options,
        Err(error) => {
            eprintln!("Error: {}", error);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let options = match apply_project_config(options) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("Error: {}", error);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let ctx = BuildContext::new(BuildConfig::resolve(&options));
    let pipeline = Pipeline::new(&ctx);

    let result: Result<(), String> = match command {
        "build" => pipeline.build().map(|_| ()).map_err(|e| e.to_string()),
        "start" => pipeline.build().map_err(|e| e.to_string()).and_then(|_| {
            watch::watch_and_rebuild(&ctx, &pipeline).map_err(|e| e.to_string())
        }),
        other => {
            eprintln!("Error: unknown command '{}'", other);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(message) => {
            ctx.reporter().error(&message);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Layer project-config defaults underneath the given options.
fn apply_project_config(options: RawOptions) -> Result<RawOptions, crate::config::ConfigError> {
    let root = BuildConfig::resolve(&options).root_dir;
    let config_path = project_config_path(&options, &root);
    let file = load_project_config(&config_path)?;
    Ok(merge_project_config(options, file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_build_flags_map_to_raw_options() {
        let cli = parse(&[
            "esmb",
            "build",
            "--root",
            "/project",
            "--src",
            "lib",
            "--out",
            "dist",
            "--typescript",
            "--sourcemap",
            "--ignore",
            "lib/**/*.test.js",
        ]);
        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        let raw = args.into_raw();
        assert_eq!(raw.root.as_deref(), Some("/project"));
        assert_eq!(raw.src.as_deref(), Some("lib"));
        assert_eq!(raw.out.as_deref(), Some("dist"));
        assert_eq!(raw.typescript, Some(true));
        assert_eq!(raw.sourcemap, Some(true));
        assert_eq!(raw.ignore.as_deref(), Some("lib/**/*.test.js"));
        // Unset flags stay unset for project-config layering.
        assert_eq!(raw.disable_clean, None);
        assert_eq!(raw.disable_compile_styles, None);
    }

    #[test]
    fn test_disable_styles_flag_spellings() {
        for flag in ["--disable-complie-styles", "--disable-compile-styles"] {
            let cli = parse(&["esmb", "start", flag]);
            let Commands::Start(args) = cli.command else {
                panic!("expected start");
            };
            assert_eq!(args.into_raw().disable_compile_styles, Some(true));
        }
    }

    #[test]
    fn test_exec_subcommand_parses() {
        let cli = parse(&["esmb", "exec", "build"]);
        assert!(matches!(cli.command, Commands::Exec { command } if command == "build"));
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["esmb"]).is_err());
    }
}
