use datareader::config::{default_config_path, load_config};
use datareader::{open_connector, DataReaderError, Result, TypedRowReader, Value};
use std::path::PathBuf;
use std::process;
use tracing::info;

const USAGE: &str = "Usage: datareader [--config PATH] [--json] [--exec] <profile> <sql> [arg...]";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<PathBuf>,
    json: bool,
    exec: bool,
    profile: String,
    sql: String,
    args: Vec<Value>,
}

fn parse_args(argv: &[String]) -> std::result::Result<Options, String> {
    let mut options = Options::default();
    let mut positional = Vec::new();
    let mut iter = argv.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => match iter.next() {
                Some(path) => options.config = Some(PathBuf::from(path)),
                None => return Err("--config needs a path".to_string()),
            },
            "--json" => options.json = true,
            "--exec" => options.exec = true,
            "--help" | "-h" => return Err(USAGE.to_string()),
            _ => positional.push(arg.as_str()),
        }
    }

    if positional.len() < 2 {
        return Err(USAGE.to_string());
    }
    options.profile = positional[0].to_string();
    options.sql = positional[1].to_string();
    options.args = positional[2..].iter().map(|a| Value::parse_literal(a)).collect();
    Ok(options)
}

fn print_rows(reader: &mut TypedRowReader, json: bool) -> Result<()> {
    let names: Vec<String> = reader.column_names().into_iter().map(String::from).collect();
    if !json {
        println!("{}", names.join("\t"));
    }

    while reader.advance()? {
        if json {
            let object: serde_json::Map<String, serde_json::Value> = names
                .iter()
                .cloned()
                .zip(reader.values())
                .map(|(name, value)| -> Result<(String, serde_json::Value)> {
                    Ok((name, serde_json::to_value(value)?))
                })
                .collect::<Result<_>>()?;
            println!("{}", serde_json::to_string(&object)?);
        } else {
            let cells: Vec<String> = reader.values().iter().map(Value::to_string).collect();
            println!("{}", cells.join("\t"));
        }
    }
    info!("{} rows", reader.rows_read());
    reader.close()
}

fn run(options: &Options) -> Result<()> {
    let path = options
        .config
        .clone()
        .or_else(default_config_path)
        .ok_or_else(|| DataReaderError::Config("no configuration path available".to_string()))?;
    let config = load_config(&path)?;

    tracing_subscriber::fmt()
        .with_max_level(config.logging.max_level()?)
        .with_writer(std::io::stderr)
        .init();
    info!("Using configuration {}", path.display());

    let mut connector = open_connector(config.connection(&options.profile)?)?;
    let outcome = if options.exec {
        connector
            .non_query(&options.sql, &options.args)
            .map(|affected| println!("{} rows affected", affected))
    } else {
        connector
            .query(&options.sql, &options.args)
            .and_then(|mut reader| print_rows(&mut reader, options.json))
    };
    connector.close();
    outcome
}

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&argv) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(2);
        }
    };

    if let Err(e) = run(&options) {
        eprintln!("datareader: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(&argv(&[
            "--config",
            "dr.toml",
            "--json",
            "local",
            "SELECT * FROM accounts WHERE id = ? AND name = ?",
            "1",
            "Alice",
        ]))
        .unwrap();

        assert_eq!(options.config, Some(PathBuf::from("dr.toml")));
        assert!(options.json);
        assert!(!options.exec);
        assert_eq!(options.profile, "local");
        assert_eq!(options.args, vec![Value::Int64(1), Value::Text("Alice".into())]);
    }

    #[test]
    fn test_parse_args_requires_profile_and_sql() {
        assert!(parse_args(&argv(&["local"])).is_err());
        assert!(parse_args(&argv(&["--config"])).is_err());
    }
}
