use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "semquery",
    version,
    about = "Code-intelligence analysis server over a semantic model",
    after_help = r#"Examples:
  semquery serve --model model.json
  semquery request --model model.json --method workspace_status --params '{}'
  semquery request --model model.json --method resolve_symbol --params '{"qualified_name":"Demo.Calculator.Add(int, int)"}'
  semquery request --model model.json --method analyze_dependencies --params '{"qualified_name":"Demo.Worker.Run","depth":3,"include_callers":true}'
  semquery request --model model.json --method inheritance_tree --params '{"qualified_name":"Demo.Shape","direction":"down","max_depth":2}'
  semquery request --model model.json --method find_references --params '{"qualified_name":"Demo.Calculator.total","page_size":25}'
  semquery status --model model.json
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run JSONL RPC server over stdin/stdout.
    Serve {
        /// Semantic model file; omit to start with no workspace loaded
        /// (clients can call load_model).
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Run a single request and exit.
    Request {
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        method: String,
        /// Params as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
        #[arg(long, default_value = "1")]
        id: String,
    },
    /// Print workspace status for a model file.
    Status {
        #[arg(long)]
        model: PathBuf,
    },
}
