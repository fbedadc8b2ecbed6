use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use playbill_ast::span::LineIndex;
use playbill_compose::{
    bootstrap, Bootstrap, BootstrapOptions, EngineConfig, GameFeature, IncludeNode, ProfileRoot,
    RecordingInitializer, RequirementTable, DEFAULT_MAX_FRAGMENT_BYTES, DEFAULT_MAX_INCLUDE_DEPTH,
};
use playbill_parse::parse_str;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "playbill")]
#[command(about = "Playbill: compose engine profiles from included fragments")]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose a profile and initialize its enabled subsystems
    Compose {
        #[command(flatten)]
        profile: ProfileArgs,

        /// Entry fragment, relative to the profile root
        entry: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,

        /// Print the configuration fingerprint
        #[arg(long)]
        fingerprint: bool,
    },

    /// Print the include tree of a profile
    Tree {
        #[command(flatten)]
        profile: ProfileArgs,

        /// Entry fragment, relative to the profile root
        entry: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },

    /// Parse a single fragment and dump its syntax tree
    Parse {
        /// Path to the fragment
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
}

#[derive(Args, Debug)]
struct ProfileArgs {
    /// Directory every include path resolves against
    #[arg(long, env = "PLAYBILL_PROFILE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Maximum include nesting
    #[arg(long, default_value_t = DEFAULT_MAX_INCLUDE_DEPTH)]
    max_include_depth: usize,

    /// Maximum fragment size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAGMENT_BYTES)]
    max_fragment_bytes: u64,

    /// Extra root key an enabled feature needs, e.g. `Audio=Audio`
    #[arg(long = "require", value_name = "FEATURE=KEY", value_parser = parse_requirement)]
    require: Vec<(GameFeature, String)>,
}

impl ProfileArgs {
    fn options(&self) -> BootstrapOptions {
        let mut requirements = RequirementTable::default();
        for (feature, key) in &self.require {
            requirements.require(*feature, key.clone());
        }
        BootstrapOptions {
            max_include_depth: self.max_include_depth,
            max_fragment_bytes: self.max_fragment_bytes,
            requirements,
        }
    }
}

fn parse_requirement(s: &str) -> Result<(GameFeature, String), String> {
    let (feature, key) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FEATURE=KEY, got '{}'", s))?;
    let feature = GameFeature::from_name(feature.trim())
        .ok_or_else(|| format!("unknown feature '{}'", feature.trim()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("required key is empty".into());
    }
    Ok((feature, key.to_string()))
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Pretty,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let result = match cli.command {
        Commands::Compose {
            profile,
            entry,
            format,
            fingerprint,
        } => cmd_compose(&profile, &entry, format, fingerprint),
        Commands::Tree {
            profile,
            entry,
            format,
        } => cmd_tree(&profile, &entry, format),
        Commands::Parse { file, format } => cmd_parse(&file, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().without_time().with_writer(std::io::stderr))
            .init();
    }
}

fn cmd_compose(profile: &ProfileArgs, entry: &str, format: Format, fingerprint: bool) -> Result<()> {
    let mut engine = RecordingInitializer::default();
    let config = bootstrap(&profile.root, entry, profile.options(), &mut engine)?;

    match format {
        Format::Pretty => print_config(entry, &config, &engine.initialized, fingerprint),
        Format::Json => {
            let mut out = serde_json::json!({
                "entry": entry,
                "config": config,
                "initialized": engine.initialized.iter().map(|f| f.name()).collect::<Vec<_>>(),
            });
            if fingerprint {
                out["fingerprint"] = config.fingerprint().into();
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn print_config(entry: &str, config: &EngineConfig, initialized: &[GameFeature], fingerprint: bool) {
    println!("profile: {}", entry);
    println!(
        "design resolution: {}x{}",
        config.design_width(),
        config.design_height()
    );
    println!("layers: {}", config.layer_count());
    println!("features: {}", config.features());
    if let Some(vm) = config.vm() {
        println!(
            "vm: start script {} (buffer {}), instruction set {}, return ids {}",
            vm.start_script, vm.start_script_buffer, vm.instruction_set, vm.use_return_ids
        );
    }
    let sections: Vec<&str> = config.sections().keys().map(String::as_str).collect();
    if !sections.is_empty() {
        println!("sections: {}", sections.join(", "));
    }
    let names: Vec<&str> = initialized.iter().map(|f| f.name()).collect();
    println!("initialized: {}", names.join(", "));
    if fingerprint {
        println!("fingerprint: {}", config.fingerprint());
    }
}

fn cmd_tree(profile: &ProfileArgs, entry: &str, format: Format) -> Result<()> {
    let mut session = Bootstrap::new(ProfileRoot::new(&profile.root)?, profile.options());
    session.compose(entry)?;
    let Some(tree) = session.include_tree() else {
        bail!("profile composed without an include tree");
    };

    match format {
        Format::Pretty => print_tree(tree, 0),
        Format::Json => println!("{}", serde_json::to_string_pretty(tree)?),
    }
    Ok(())
}

fn print_tree(node: &IncludeNode, depth: usize) {
    println!("{}{}", "  ".repeat(depth), node.path);
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

fn cmd_parse(file: &Path, format: Format) -> Result<()> {
    let src = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read '{}'", file.display()))?;

    if src.len() as u64 > DEFAULT_MAX_FRAGMENT_BYTES {
        bail!(
            "fragment exceeds {}MB limit ({} bytes)",
            DEFAULT_MAX_FRAGMENT_BYTES / 1_000_000,
            src.len()
        );
    }

    let name = file.display().to_string();
    debug!(file = %name, bytes = src.len(), "parsing fragment");
    let program = parse_str(&name, &src).map_err(|e| {
        let lc = LineIndex::new(&src).line_col(e.span.start);
        anyhow::anyhow!("{}:{}: {}", name, lc, e.message)
    })?;

    match format {
        Format::Pretty => println!("{:#?}", program),
        Format::Json => println!("{}", serde_json::to_string_pretty(&program)?),
    }
    Ok(())
}
