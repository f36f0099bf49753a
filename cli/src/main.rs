//! tw — inspect an observed JSON tree and replay mutations against it.
//!
//! # Usage
//!
//! ```text
//! tw snapshot state.json
//! tw snapshot state.json a.b
//! tw replay state.json script.tw --watch a.b --watch a.c
//! tw replay state.json script.tw --config tree.yaml
//! ```
//!
//! Set `RUST_LOG=treewatch=debug` to see mutation and diagnostic events.

mod script;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use treewatch_core::{Observed, Options, TreeConfig};

use script::Replay;


#[derive(Parser)]
#[command(name = "tw")]
#[command(about = "Inspect and replay mutations on an observed JSON tree", long_about = None)]
struct Cli {
    /// Tree config file (YAML, or JSON when the extension is .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tree, or the value at a dotted path, as JSON
    Snapshot {
        state: PathBuf,
        path: Option<String>,
    },
    /// Apply a script of mutations, printing outcomes and watched signals
    Replay {
        state: PathBuf,
        script: PathBuf,
        /// Dotted path to print every signal for; repeatable
        #[arg(short, long)]
        watch: Vec<String>,
    },
}


fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match TreeConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("tw: {}", e);
                process::exit(1);
            }
        },
        None => TreeConfig::default(),
    };

    let result = match cli.command {
        Commands::Snapshot { state, path } => run_snapshot(&state, path.as_deref(), config),
        Commands::Replay { state, script, watch } => run_replay(&state, &script, &watch, config),
    };

    if let Err(e) = result {
        eprintln!("tw: {}", e);
        process::exit(1);
    }
}


fn run_snapshot(state: &Path, path: Option<&str>, config: TreeConfig) -> Result<(), String> {
    let tree = open_tree(state, config)?;
    let value = match path {
        None => tree.snapshot().to_value(),
        Some(p) => tree.try_snapshot_at(p).map_err(|e| e.to_string())?.to_value(),
    };
    let text = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}


fn run_replay(state: &Path, script: &Path, watch: &[String], config: TreeConfig) -> Result<(), String> {
    let tree = open_tree(state, config)?;
    let text = std::fs::read_to_string(script)
        .map_err(|e| format!("cannot read {}: {}", script.display(), e))?;
    let ops = script::parse_script(&text)?;
    tracing::debug!(ops = ops.len(), watches = watch.len(), "replaying script");

    let replay = Replay::new(tree, watch);
    for op in &ops {
        let applied = replay.apply(op);
        for line in replay.take_output() {
            println!("{}", line);
        }
        applied?;
    }
    replay.finish();
    Ok(())
}


fn load_state(path: &Path) -> Result<Value, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))
}


fn open_tree(path: &Path, config: TreeConfig) -> Result<Observed, String> {
    let initial = load_state(path)?;
    Observed::with_options(initial, Options::new().with_config(config)).map_err(|e| e.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("tw-cli-test");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn cli_parses_replay_with_watches() {
        let cli = Cli::try_parse_from([
            "tw", "replay", "s.json", "ops.tw", "--watch", "a.b", "-w", "a.c", "--config", "t.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("t.yaml")));
        match cli.command {
            Commands::Replay { watch, .. } => assert_eq!(watch, vec!["a.b", "a.c"]),
            Commands::Snapshot { .. } => panic!("expected replay"),
        }
    }

    #[test]
    fn load_state_reports_bad_json() {
        let path = temp_file("bad.json", "{nope");
        let err = load_state(&path).unwrap_err();
        assert!(err.contains("invalid JSON"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_tree_rejects_non_object_root() {
        let path = temp_file("list.json", "[1, 2]");
        let err = open_tree(&path, TreeConfig::default()).unwrap_err();
        assert!(err.contains("root value must be a JSON object"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn snapshot_of_missing_path_fails() {
        let path = temp_file("state.json", r#"{"a": {"b": 1}}"#);
        assert!(run_snapshot(&path, Some("a.b"), TreeConfig::default()).is_ok());
        let err = run_snapshot(&path, Some("a.x"), TreeConfig::default()).unwrap_err();
        assert!(err.contains("segment 'x'"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replay_stops_at_first_failing_op() {
        let state = temp_file("replay-state.json", r#"{"a": {}}"#);
        let script = temp_file("replay.tw", "set a.b 1\nset x.y 2\nset a.c 3\n");
        let err = run_replay(&state, &script, &[], TreeConfig::default()).unwrap_err();
        assert!(err.contains("segment 'x'"));
        let _ = std::fs::remove_file(&state);
        let _ = std::fs::remove_file(&script);
    }
}
