use scriptwire_schema::Builtin;
use serde::Serialize;

use crate::cmd::{load_declarations, RegistryArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_table, printable, OutputFormat};
use crate::sim::Group;

#[derive(Serialize)]
struct RegistryOutput {
    peers: usize,
    types: Vec<TypeRow>,
}

#[derive(Serialize)]
struct TypeRow {
    id: u32,
    name: String,
    kind: String,
    signature: String,
}

pub fn run(args: RegistryArgs, format: OutputFormat) -> CliResult<i32> {
    let declarations = load_declarations(&args.schema)?;
    let mut group = Group::new(args.peers, args.sim.peer_config())?;
    let registered = group.register_all(&declarations)?;

    let mut types = Vec::new();
    if args.builtins {
        // built-ins take the first ids in a fixed order
        for (id, builtin) in Builtin::ALL.iter().enumerate() {
            types.push(TypeRow {
                id: id as u32,
                name: builtin.name().to_string(),
                kind: "builtin".to_string(),
                signature: format!("{} ", builtin.name()),
            });
        }
    }
    types.extend(registered.into_iter().map(|r| TypeRow {
        id: r.id.0,
        name: r.name,
        kind: r.kind.to_string(),
        signature: r.signature,
    }));

    let out = RegistryOutput {
        peers: args.peers,
        types,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            ["ID", "NAME", "KIND", "SIGNATURE"],
            out.types.iter().map(|row| {
                vec![
                    row.id.to_string(),
                    row.name.clone(),
                    row.kind.clone(),
                    printable(&row.signature),
                ]
            }),
        ),
        OutputFormat::Pretty => {
            println!("{} peer(s) agree on {} id(s)", out.peers, out.types.len());
            for row in &out.types {
                println!("{:>5}  {:<8} {}", row.id, row.kind, row.name);
            }
        }
    }
    Ok(SUCCESS)
}
