use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use xfchess_analysis::core::{init_logging, AnalysisSettings};
use xfchess_analysis::notation::{parse, write, write_game, WriteOptions};
use xfchess_analysis::rules::ShakmatyRules;
use xfchess_analysis::session::{export_with, AnalysisSession, SessionStore};
use xfchess_analysis::tree::{CandidateMove, PositionPath, VariationTree};

#[derive(Parser, Debug)]
#[command(name = "xfchess-analysis", version, about = "Inspect and edit annotated chess games")]
struct Cli {
    /// Settings file (defaults to the user config dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of a game, or of one position in it
    Show {
        /// Game file, `-` for stdin
        input: PathBuf,
        /// Position path such as `0.0.1` or `[0,0,1]`
        #[arg(long)]
        path: Option<PositionPath>,
    },
    /// Graft a line of moves onto a game and write the result
    Apply {
        input: PathBuf,
        /// Space separated moves, e.g. "e4 e5 Nf3"
        #[arg(long)]
        line: String,
        /// Position to start from (the root by default)
        #[arg(long)]
        at: Option<PositionPath>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Re-write a game in canonical form
    Normalize {
        input: PathBuf,
        /// Write only the subtree below this position
        #[arg(long)]
        from: Option<PositionPath>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Manage saved sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// Store a game and cursor under a key
    Save {
        key: String,
        input: PathBuf,
        #[arg(long)]
        path: Option<PositionPath>,
    },
    /// Print a stored session's game and cursor
    Load { key: String },
    /// Delete a stored session
    Remove { key: String },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write a `.pgn` file instead of printing
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    no_comments: bool,
    #[arg(long)]
    no_symbols: bool,
    #[arg(long)]
    no_variations: bool,
}

impl OutputArgs {
    fn options(&self, base: WriteOptions) -> WriteOptions {
        WriteOptions {
            comments: base.comments && !self.no_comments,
            symbols: base.symbols && !self.no_symbols,
            variations: base.variations && !self.no_variations,
            ..base
        }
    }

    fn emit(&self, tree: &VariationTree, options: &WriteOptions) -> Result<()> {
        match &self.output {
            Some(path) => {
                let written = export_with(tree, path, options)?;
                println!("wrote {}", written.display());
            }
            None => print!("{}", write_game(tree, options)),
        }
        Ok(())
    }

    fn emit_text(&self, text: &str) -> Result<()> {
        match &self.output {
            Some(path) => {
                let path = path.with_extension("pgn");
                fs::write(&path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("wrote {}", path.display());
            }
            None => print!("{text}"),
        }
        Ok(())
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_game(path: &Path, rules: &ShakmatyRules) -> Result<VariationTree> {
    let text = read_input(path)?;
    parse(&text, rules).with_context(|| format!("failed to parse {}", path.display()))
}

fn show(tree: &VariationTree, path: Option<&PositionPath>) {
    for (key, value) in tree.headers.iter() {
        println!("{key}: {value}");
    }
    if let Some(speed) = tree.headers.speed() {
        println!("Speed: {speed:?}");
    }
    println!("Positions: {}", tree.len());
    println!("Mainline: {}", tree.mainline_san(tree.root()));

    if let Some(path) = path {
        let located = tree.locate(path);
        let moves: Vec<&str> = tree
            .moves_to(located.node)
            .into_iter()
            .map(|mv| mv.san.as_str())
            .collect();
        println!();
        println!("Path: {}", tree.position_of(located.node));
        if located.clamped {
            println!("(clamped from {path})");
        }
        println!("Moves: {}", moves.join(" "));
        if let Some(state) = tree.state(located.node) {
            println!("FEN: {state}");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(AnalysisSettings::default_path);
    let settings = AnalysisSettings::load_or_default(&settings_path);
    init_logging(&settings.log_filter);

    let rules = ShakmatyRules::new();

    match cli.command {
        Command::Show { input, path } => {
            let tree = load_game(&input, &rules)?;
            show(&tree, path.as_ref());
        }
        Command::Apply {
            input,
            line,
            at,
            output,
        } => {
            let mut tree = load_game(&input, &rules)?;
            let start = at
                .as_ref()
                .map_or(tree.root(), |path| tree.go_to_position(path));
            let end = tree
                .apply_line(&rules, start, &CandidateMove::san_line(&line))
                .with_context(|| format!("cannot apply \"{line}\""))?;
            info!("Line ends at {}", tree.position_of(end));
            output.emit(&tree, &output.options(settings.export))?;
        }
        Command::Normalize {
            input,
            from,
            output,
        } => {
            let tree = load_game(&input, &rules)?;
            let options = output.options(settings.export);
            let start = from
                .as_ref()
                .map_or(tree.root(), |path| tree.go_to_position(path));
            if start == tree.root() {
                output.emit(&tree, &options)?;
            } else {
                output.emit_text(&write(&tree, start, &options))?;
            }
        }
        Command::Session { action } => {
            let mut store = settings.session_store();
            match action {
                SessionAction::Save { key, input, path } => {
                    let tree = load_game(&input, &rules)?;
                    let mut session = AnalysisSession::with_tree(tree, rules);
                    if let Some(path) = &path {
                        session.go_to(path);
                    }
                    session.save(&mut store, &key)?;
                    println!("saved '{key}' at {}", session.cursor_path());
                }
                SessionAction::Load { key } => {
                    let session = AnalysisSession::load(&store, &key, rules)?
                        .with_context(|| format!("no session named '{key}'"))?;
                    print!("{}", write_game(session.tree(), &settings.export));
                    println!("cursor: {}", session.cursor_path());
                }
                SessionAction::Remove { key } => {
                    store.remove(&key)?;
                    println!("removed '{key}'");
                }
            }
        }
    }

    Ok(())
}
