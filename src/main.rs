use std::{env, fs, path::PathBuf, process};

use anyhow::{Context, bail};
use log::LevelFilter;

use vrmrig::convert::{AxisConversion, import_gltf_file};
use vrmrig::host::MemoryScene;
use vrmrig::logging::init_logging;
use vrmrig::settings::{ImportSettings, load_import_settings};

const USAGE: &str = "Usage: vrmrig <input.gltf|glb|vrm> [--no-axis-conversion] [--keep-empty] \
[--settings settings.json] [--dump scene.json] [--verbose]";

#[derive(Debug, Default)]
struct CliArgs {
    input: PathBuf,
    settings_path: Option<PathBuf>,
    dump_path: Option<PathBuf>,
    no_axis_conversion: bool,
    keep_empty: bool,
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    init_logging(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let mut settings = match &args.settings_path {
        Some(path) => load_import_settings(path)?,
        None => ImportSettings::default(),
    };
    if args.no_axis_conversion {
        settings.axis_conversion = AxisConversion::None;
    }
    if args.keep_empty {
        settings.prune_empty = false;
    }

    let mut scene = MemoryScene::new();
    let imported = import_gltf_file(&args.input, &settings, &mut scene)?;
    let report = &imported.report;

    println!("Input: {}", args.input.display());
    println!(
        "Nodes: {}, Objects: {} ({} pruned)",
        report.node_count, report.object_count, report.pruned_count
    );
    println!(
        "Armatures: {} [{}], Bones: {}",
        report.armature_names.len(),
        report.armature_names.join(", "),
        report.bone_count
    );
    println!(
        "Skinned meshes: {}, Weight assignments: {}",
        report.skinned_mesh_count, report.weight_assignment_count
    );
    if report.empty {
        println!("Scene is empty after pruning");
    }

    if let Some(path) = &args.dump_path {
        let content =
            serde_json::to_string_pretty(&scene).context("failed to serialize scene as JSON")?;
        fs::write(path, content)
            .with_context(|| format!("failed to write scene dump: {}", path.display()))?;
        println!("Scene written to {}", path.display());
    }

    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut input = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-axis-conversion" => parsed.no_axis_conversion = true,
            "--keep-empty" => parsed.keep_empty = true,
            "--verbose" | "-v" => parsed.verbose = true,
            "--settings" => {
                let path = args.next().context("--settings needs a path")?;
                parsed.settings_path = Some(PathBuf::from(path));
            }
            "--dump" => {
                let path = args.next().context("--dump needs a path")?;
                parsed.dump_path = Some(PathBuf::from(path));
            }
            flag if flag.starts_with('-') => bail!("unknown option: {flag}"),
            other if input.is_some() => bail!("unexpected argument: {other}"),
            other => input = Some(PathBuf::from(other)),
        }
    }

    parsed.input = input.context("missing input file")?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn given_flags_when_parsing_then_options_are_set() {
        let parsed = parse_args(args(&[
            "avatar.vrm",
            "--keep-empty",
            "--dump",
            "scene.json",
            "--no-axis-conversion",
        ]))
        .expect("valid args");

        assert_eq!(parsed.input, PathBuf::from("avatar.vrm"));
        assert!(parsed.keep_empty);
        assert!(parsed.no_axis_conversion);
        assert_eq!(parsed.dump_path, Some(PathBuf::from("scene.json")));
        assert!(parsed.settings_path.is_none());
    }

    #[test]
    fn given_no_input_when_parsing_then_error_is_returned() {
        let error = parse_args(args(&["--keep-empty"])).expect_err("missing input");
        assert!(error.to_string().contains("missing input"));
    }

    #[test]
    fn given_unknown_flag_when_parsing_then_error_is_returned() {
        assert!(parse_args(args(&["a.glb", "--frobnicate"])).is_err());
    }
}
