use anyhow::Result;
use clap::Parser;
use semquery::{cli, rpc};
use serde_json::Value;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Serve { model } => rpc::serve(model),
        cli::Command::Request {
            model,
            method,
            params,
            id,
        } => {
            let response = rpc::call(model, method, &params, &id)?;
            println!("{response}");
            Ok(())
        }
        cli::Command::Status { model } => {
            let response = rpc::call(Some(model), "workspace_status".to_string(), "{}", "1")?;
            let pretty: Value = serde_json::from_str(&response)?;
            println!("{}", serde_json::to_string_pretty(&pretty)?);
            Ok(())
        }
    }
}
