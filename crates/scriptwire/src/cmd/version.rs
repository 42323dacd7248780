use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<Features>,
}

#[derive(Serialize)]
struct Features {
    peer: bool,
    #[serde(rename = "async")]
    async_driver: bool,
    cli: bool,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = VersionOutput {
        name: "scriptwire",
        version: env!("CARGO_PKG_VERSION"),
        target: args.extended.then_some(env!("SCRIPTWIRE_BUILD_TARGET")),
        profile: args.extended.then_some(env!("SCRIPTWIRE_BUILD_PROFILE")),
        features: args.extended.then_some(Features {
            peer: cfg!(feature = "peer"),
            async_driver: cfg!(feature = "async"),
            cli: true,
        }),
    };

    if matches!(format, OutputFormat::Json) {
        print_json(&out);
        return Ok(SUCCESS);
    }

    println!("{} {}", out.name, out.version);
    if let (Some(target), Some(profile), Some(features)) = (out.target, out.profile, &out.features) {
        println!("target: {target} ({profile})");
        println!(
            "features: peer={}, async={}, cli={}",
            features.peer, features.async_driver, features.cli
        );
    }
    Ok(SUCCESS)
}
