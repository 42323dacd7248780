use rand::rngs::StdRng;
use rand::SeedableRng;
use scriptwire_peer::{split_payload, RequestId};
use scriptwire_schema::DeclKind;
use scriptwire_wire::DATA_CHARSET;
use serde::Serialize;

use crate::cmd::{load_declarations, EncodeArgs};
use crate::exit::{peer_error, schema_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{hex, print_json, print_table, printable, OutputFormat};
use crate::sim::Group;

#[derive(Serialize)]
struct EncodeOutput {
    name: String,
    kind: String,
    id: u32,
    bytes: usize,
    hex: String,
    payload: String,
    chunks: Vec<ChunkOutput>,
}

#[derive(Serialize)]
struct ChunkOutput {
    id: String,
    body: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let declarations = load_declarations(&args.schema)?;
    let decl = declarations.get(&args.name).ok_or_else(|| {
        CliError::usage(format!(
            "no type or packet named `{}` in {}",
            args.name,
            args.schema.display()
        ))
    })?;
    let json: serde_json::Value = serde_json::from_str(&args.json)
        .map_err(|err| CliError::usage(format!("--json is not valid JSON: {err}")))?;

    let mut config = args.sim.peer_config();
    if let Some(max) = args.max_message_size {
        if max == 0 {
            return Err(CliError::usage("--max-message-size must be greater than zero"));
        }
        config.max_message_size = max;
    }

    let mut group = Group::new(1, config.clone())?;
    let registered = group.register_all(&declarations)?;
    let entry = registered
        .iter()
        .find(|r| r.name == decl.name)
        .ok_or_else(|| CliError::new(INTERNAL, format!("{} was not registered", decl.name)))?;

    let record = entry
        .schema
        .record_from_json(&json)
        .map_err(|err| schema_error("invalid value", err))?;
    let bytes = entry
        .schema
        .encode_with_capacity(&record, config.default_encode_buffer_size)
        .map_err(|err| schema_error("encode failed", err))?;

    let chunks = match decl.kind {
        DeclKind::Packet => {
            let mut rng = match config.rng_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let request_id = RequestId::random(&mut rng);
            split_payload(entry.id, &request_id, &bytes, &config)
                .map_err(|err| peer_error("split failed", err))?
                .into_iter()
                .map(|message| ChunkOutput {
                    id: message.id,
                    body: message.body,
                })
                .collect()
        }
        DeclKind::Type => Vec::new(),
    };

    let out = EncodeOutput {
        name: entry.name.clone(),
        kind: entry.kind.to_string(),
        id: entry.id.0,
        bytes: bytes.len(),
        hex: hex(&bytes),
        payload: DATA_CHARSET.encode(&bytes),
        chunks,
    };
    render(&out, format);
    Ok(SUCCESS)
}

fn render(out: &EncodeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut rows = vec![
                vec!["name".to_string(), format!("{} ({})", out.name, out.kind)],
                vec!["id".to_string(), out.id.to_string()],
                vec!["bytes".to_string(), out.bytes.to_string()],
                vec!["hex".to_string(), out.hex.clone()],
                vec!["payload".to_string(), printable(&out.payload)],
            ];
            for chunk in &out.chunks {
                rows.push(vec!["chunk".to_string(), printable(&chunk.id)]);
            }
            print_table(["FIELD", "VALUE"], rows);
        }
        OutputFormat::Pretty => {
            println!("{} {} id={} bytes={}", out.kind, out.name, out.id, out.bytes);
            println!("hex: {}", out.hex);
            println!("payload: {}", printable(&out.payload));
            for (i, chunk) in out.chunks.iter().enumerate() {
                println!("chunk {i}: {} ({} chars)", printable(&chunk.id), chunk.body.chars().count());
            }
        }
    }
}
