use bytes::Bytes;
use scriptwire_wire::DATA_CHARSET;
use serde::Serialize;

use crate::cmd::{load_declarations, DecodeArgs};
use crate::exit::{schema_error, wire_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{parse_hex, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct DecodeOutput {
    name: String,
    bytes: usize,
    value: serde_json::Value,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let declarations = load_declarations(&args.schema)?;
    if declarations.get(&args.name).is_none() {
        return Err(CliError::usage(format!(
            "no type or packet named `{}` in {}",
            args.name,
            args.schema.display()
        )));
    }
    let schemas = declarations
        .build_unregistered()
        .map_err(|err| schema_error("failed building schemas", err))?;
    let schema = schemas
        .get(&args.name)
        .ok_or_else(|| CliError::usage(format!("`{}` could not be built", args.name)))?;

    let raw = match (&args.payload, &args.hex) {
        (Some(payload), _) => DATA_CHARSET
            .decode(payload)
            .map_err(|err| wire_error("invalid payload", err))?,
        (None, Some(text)) => {
            parse_hex(text).map_err(|err| CliError::usage(format!("--hex: {err}")))?
        }
        (None, None) => return Err(CliError::usage("one of --payload or --hex is required")),
    };
    let bytes = Bytes::from(raw);

    let (record, next) = schema
        .decode(&bytes, 0)
        .map_err(|err| schema_error("decode failed", err))?;
    if next != bytes.len() {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} trailing bytes after {}", bytes.len() - next, args.name),
        ));
    }

    let out = DecodeOutput {
        name: args.name,
        bytes: bytes.len(),
        value: record.to_json(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = match &out.value {
                serde_json::Value::Object(map) => map
                    .iter()
                    .map(|(key, value)| vec![key.clone(), value.to_string()])
                    .collect(),
                serde_json::Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, value)| vec![i.to_string(), value.to_string()])
                    .collect(),
                other => vec![vec![String::new(), other.to_string()]],
            };
            print_table(["FIELD", "VALUE"], rows);
        }
        OutputFormat::Pretty => {
            println!(
                "{}",
                serde_json::to_string_pretty(&out.value).unwrap_or_else(|_| "null".to_string())
            );
        }
    }
    Ok(SUCCESS)
}
