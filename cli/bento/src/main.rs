//! bento CLI: partition memory and link functions across a tree of boxes.

mod commands;
mod recipe;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bento", version, about = "Memory partitioning and linking for bento boxes")]
struct Cli {
    /// Recipe file (default: nearest bento.toml)
    #[arg(long, short, global = true)]
    recipe: Option<PathBuf>,
    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place memories and allocate sections, then show the layout
    Boxes,
    /// Resolve imports and show every link
    Links,
    /// Run all stages and emit build artifacts
    Build {
        /// Emit the resolved tree and artifacts as JSON
        #[arg(long)]
        json: bool,
        /// Write JSON to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List built-in runtimes and their components
    Runtimes,
    /// Show the error table, or look up one error by name or code
    Errors {
        /// Error name (e.g. ENOENT) or code (e.g. -2)
        #[arg(allow_negative_numbers = true)]
        query: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let recipe_path = || -> anyhow::Result<PathBuf> {
        recipe::resolve(cli.recipe.as_deref(), &std::env::current_dir()?)
    };
    match cli.command {
        Commands::Boxes => commands::boxes::run(&recipe_path()?),
        Commands::Links => commands::links::run(&recipe_path()?),
        Commands::Build { json, output } => {
            commands::build::run(&recipe_path()?, json, output.as_deref())
        }
        Commands::Runtimes => commands::runtimes::run(),
        Commands::Errors { query } => commands::errors::run(query.as_deref()),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::path::Path;

    const RECIPE: &str = r#"
name = "sys"
runtime = "system"

[memory]
flash = "rx 0x08000000-0x0803ffff"
ram = "rw 0x20000000-0x2000ffff"

[section]
stack = 0x1000

[import]
box1_main = "fn() -> err"
box2_main = { type = "fn() -> err", weak = true }

[box.box1]
runtime = "armv7m_mpu"
memory.flash = { mode = "rx", size = 0x8000, align = 0x8000 }
memory.ram = { mode = "rw", size = 0x4000, align = 0x4000 }
section.stack = 0x800
export.box1_main = "fn() -> err"

[box.box2]
runtime = "jumptable"
memory.flash = "rx 0x4000"
memory.ram = "rw 0x2000"
section.stack = 0x400
"#;

    fn write_recipe(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(recipe::RECIPE_FILE);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Full workflow: boxes, links, build.
    #[test]
    fn boxes_links_build_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(dir.path(), RECIPE);

        let mut system = recipe::load(&path).unwrap();
        let report = system.boxes().unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        let layout = commands::boxes::render(&system, &report);
        assert!(layout.contains("box sys.box1 (armv7m_mpu)"), "{layout}");
        assert!(layout.contains("jumptable"), "{layout}");

        system.link().unwrap();
        let links = commands::links::render(&system);
        assert!(links.contains("-> sys.box1.box1_main"), "{links}");
        assert!(links.contains("import sys.box2_main: fn() -> err (weak)"), "{links}");

        let artifacts = system.build().unwrap();
        let json = commands::build::to_json(&system, &artifacts).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(doc["tree"]["nodes"].as_array().unwrap().len() == 3);
        assert!(!doc["artifacts"]["entries"].as_array().unwrap().is_empty());
    }

    #[test]
    fn layout_and_links_render_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let text = RECIPE.replace("section.stack = 0x400\n", "");
        let path = write_recipe(dir.path(), &text);

        let mut system = recipe::load(&path).unwrap();
        let report = system.boxes().unwrap();
        let layout = commands::boxes::render(&system, &report);
        assert!(layout.ends_with("warning: box box2 has no stack\n"), "{layout}");
        let lines: Vec<_> = layout.lines().collect();
        assert_eq!(lines.iter().filter(|l| **l == "  memories:").count(), 3);
        assert_eq!(lines.iter().filter(|l| **l == "  sections:").count(), 3);
        assert_eq!(lines.iter().filter(|l| **l == "  free:").count(), 3);

        system.link().unwrap();
        let links = commands::links::render(&system);
        for path in ["box sys", "box sys.box1", "box sys.box2"] {
            assert!(links.lines().any(|l| l == path), "{links}");
        }
        assert!(links.ends_with('\n'));
    }

    #[test]
    fn build_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(dir.path(), RECIPE);
        let out = dir.path().join("out.json");
        commands::build::run(&path, false, Some(&out)).unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(doc["tree"]["nodes"][0]["name"], "sys");
    }

    #[test]
    fn link_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let recipe = RECIPE.replace("export.box1_main", "export.box1_other");
        let path = write_recipe(dir.path(), &recipe);
        let err = commands::links::run(&path).unwrap_err();
        assert!(format!("{err:#}").contains("box1_main"));
    }

    #[test]
    fn runtimes_listing() {
        let listing = commands::runtimes::render().unwrap();
        assert!(listing.contains("noop"));
        assert!(listing.contains("(no components)"));
        assert!(listing.contains("abort, write, jumptable, armv7m_mpu"));
    }

    #[test]
    fn error_lookup() {
        assert_eq!(commands::errors::lookup("ENOENT").unwrap().code, 2);
        assert_eq!(commands::errors::lookup("-22").unwrap().name, "INVAL");
        assert!(commands::errors::lookup("EBOGUS").is_err());
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from(["bento", "-r", "x.toml", "build", "--json"]).unwrap();
        assert_eq!(cli.recipe.as_deref(), Some(Path::new("x.toml")));
        assert!(matches!(cli.command, Commands::Build { json: true, output: None }));

        let cli = Cli::try_parse_from(["bento", "errors", "-2"]).unwrap();
        assert!(matches!(cli.command, Commands::Errors { query: Some(ref q) } if q == "-2"));
    }
}
