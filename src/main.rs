use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use sqlplan::{
    analyzer::{ObjectTypes, VariableTypes},
    format, plan_sql, Config, DataType, PlanError, Schema,
};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    signal,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Reads `;`-terminated SQL from stdin and prints each statement's logical plan.
#[derive(Parser, Debug)]
#[command(name = "sqlplan", version, about = "Print logical plans for SQL queries")]
struct Args {
    /// JSON schema with tables, procedures and foreign procedures
    #[arg(short, long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Variable available to queries, as `$name=type` (repeatable)
    #[arg(long = "var", value_name = "NAME=TYPE")]
    vars: Vec<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = sqlplan::config::DEFAULT_LOG_FILTER)]
    log: String,

    /// Do not print a prompt
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let prompt = if args.quiet { "" } else { sqlplan::config::DEFAULT_PROMPT };
    let config = Config::from(args.schema.as_deref(), prompt, &args.log);
    init_logging(&config.log_filter);

    match run(&config, &args.vars).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_vars(vars: &[String]) -> Result<VariableTypes, PlanError> {
    let mut types = VariableTypes::new();
    for var in vars {
        let (name, data_type) = var
            .split_once('=')
            .ok_or_else(|| PlanError::Schema(format!("expected NAME=TYPE, got \"{var}\"")))?;
        types.insert(name.trim().to_string(), DataType::parse(data_type.trim())?);
    }
    Ok(types)
}

async fn run(config: &Config, vars: &[String]) -> Result<(), PlanError> {
    let schema: Schema = config.load_schema().await?;
    let variables = parse_vars(vars)?;
    let objects = ObjectTypes::new();
    info!(tables = schema.tables.len(), procedures = schema.procedures.len(), "schema loaded");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        if buffer.is_empty() && !config.prompt.is_empty() {
            stdout.write_all(config.prompt.as_bytes()).await?;
            stdout.flush().await?;
        }

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
        };

        let Some(line) = line? else {
            break;
        };

        buffer.push_str(&line);
        buffer.push('\n');

        while let Some(end) = statement_end(&buffer) {
            let statement: String = buffer.drain(..=end).collect();
            let sql = statement.trim_end_matches(';').trim();
            if sql.is_empty() {
                continue;
            }

            let output = match plan_sql(sql, &schema, &variables, &objects) {
                Ok(plan) => format(&plan, 0),
                Err(e) => format!("error: {e}\n"),
            };
            stdout.write_all(output.as_bytes()).await?;
        }
        if buffer.trim().is_empty() {
            buffer.clear();
        }
    }

    stdout.flush().await?;
    Ok(())
}

/// Byte offset of the first `;` outside quoted text.
fn statement_end(buffer: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in buffer.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(open), _) if c == open => quote = None,
            (None, ';') => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_end_outside_quotes() {
        assert_eq!(statement_end("select 1; select 2;"), Some(8));
        assert_eq!(statement_end("select 'a;b';"), Some(12));
        assert_eq!(statement_end("select \"x;y\" from t;"), Some(19));
        // a doubled quote closes and reopens, so the text stays quoted
        assert_eq!(statement_end("select 'it''s;';"), Some(15));
        assert_eq!(statement_end("select 'open;"), None);
        assert_eq!(statement_end("select 1"), None);
    }

    #[test]
    fn vars_parse_as_name_and_type() {
        let vars = parse_vars(&["$id=int8".into(), " $tags = text[] ".into()]).unwrap();
        assert_eq!(vars.get("$id"), Some(&DataType::INT));
        assert_eq!(vars.get("$tags"), Some(&DataType::TEXT.array_of()));
        assert!(matches!(parse_vars(&["$id".into()]), Err(PlanError::Schema(_))));
    }
}
