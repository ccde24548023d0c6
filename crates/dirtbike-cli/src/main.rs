use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use dirtbike_core::{
    CommandStatus, Config, ConvertContext, ConvertRequest, ExecutionOutcome, GlobalOptions,
    SystemEffects,
};
use serde_json::{json, Value};

mod cli;
mod destination;
mod style;

use cli::DirtbikeCli;
use destination::resolve_destination;
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = DirtbikeCli::parse();
    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
    };
    init_tracing(&global);

    let config = Config::from_env()
        .with_python(cli.python.clone())
        .with_admindir(cli.admindir.clone())
        .with_alternates(!cli.no_alternates);
    let cwd = std::env::current_dir()?;
    let destination = resolve_destination(
        cli.directory.as_deref(),
        config.directory_override(),
        &cwd,
    );
    tracing::debug!(destination = %destination.display(), "resolved destination");

    let effects = SystemEffects::new(&config);
    let context = ConvertContext::new(&effects, &config);
    let outcome = dirtbike_core::execute(
        &context,
        &ConvertRequest {
            package: cli.package.clone(),
            destination,
        },
    );
    let code = emit_output(&global, cli.no_color, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(global: &GlobalOptions) {
    let level = if global.trace {
        "trace"
    } else if global.quiet {
        "warn"
    } else {
        match global.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("dirtbike_core={level},dirtbike={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(global: &GlobalOptions, no_color: bool, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();

    if global.json {
        let payload = json!({
            "status": outcome.status,
            "message": outcome.message,
            "details": outcome.details,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    if outcome.status == CommandStatus::Ok {
        if !global.quiet {
            let style = Style::new(no_color, atty::is(Stream::Stdout));
            println!("{}", style.status(outcome.status, &outcome.message));
        }
    } else {
        let style = Style::new(no_color, atty::is(Stream::Stderr));
        eprintln!("{}", style.status(outcome.status, &outcome.message));
        if let Some(hint) = hint_from_details(&outcome.details) {
            eprintln!("{}", style.info(&format!("Hint: {hint}")));
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}
