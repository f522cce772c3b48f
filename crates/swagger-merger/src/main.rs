use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use swagger_merger_core::{
    DiagnosticMessage, Encoding, MergeError, MergeMode, MergeOptions, MergeReport, NativeFetcher,
    SameDocumentPolicy, merge_file,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Merge a Swagger/OpenAPI document split over `$ref`-linked files
#[derive(Parser, Debug)]
#[command(name = "swagger-merger")]
#[command(about = "Resolve $ref markers and merge a document into a single file", long_about = None)]
struct Args {
    /// Entry document (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Output file; `.yaml`/`.yml` writes YAML, anything else JSON (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Merge nested mappings key by key instead of replacing them
    #[arg(long)]
    deep: bool,

    /// Write compact JSON
    #[arg(long)]
    compact: bool,

    /// Keep `#/...` references into the same document as they are
    #[arg(long)]
    keep_internal_refs: bool,

    /// Namespace for downloaded remote references (default: derived from the process id)
    #[arg(long)]
    tag: Option<String>,

    /// Maximum length of a reference chain
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// TOML file with merge options
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print diagnostics as JSON lines instead of text
    #[arg(long)]
    json_diagnostics: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swagger_merger=info,swagger_merger_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let json = args.json_diagnostics;
    if let Err(e) = run(args) {
        if let Some(merge_error) = e.downcast_ref::<MergeError>() {
            display_diagnostic(&merge_error.report(), json);
        }
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let options = build_options(&args)?;
    let tag = args
        .tag
        .clone()
        .unwrap_or_else(|| format!("run-{}", process::id()));

    let fetcher = NativeFetcher::new();
    let report = merge_file(&fetcher, &args.input, &tag, options)
        .with_context(|| format!("Failed to merge {}", args.input.display()))?;

    if report.has_diagnostics() {
        tracing::warn!(dropped = report.diagnostics.len(), "Some references were dropped");
        for diagnostic in &report.diagnostics {
            display_diagnostic(diagnostic, args.json_diagnostics);
        }
    }

    let rendered = render(&report, args.output.as_deref(), args.compact)?;
    match &args.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            tracing::info!(output = %path.display(), "Merged document written");
        }
        None => println!("{}", rendered.trim_end()),
    }
    Ok(())
}

/// Options from the config file (if any) with command-line flags applied on
/// top.
fn build_options(args: &Args) -> Result<MergeOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<MergeOptions>(&text)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => MergeOptions::default(),
    };

    if args.deep {
        options.mode = MergeMode::Deep;
    }
    if args.keep_internal_refs {
        options.same_document = SameDocumentPolicy::Preserve;
    }
    if let Some(max_depth) = args.max_depth {
        options.max_depth = max_depth;
    }
    Ok(options)
}

fn render(report: &MergeReport, output: Option<&Path>, compact: bool) -> Result<String> {
    let encoding = match output {
        Some(path) => Encoding::from_path(path, compact),
        None if compact => Encoding::Json,
        None => Encoding::JsonPretty,
    };
    report.render(encoding).context("Failed to encode merged document")
}

fn format_diagnostic(diagnostic: &DiagnosticMessage, json: bool) -> String {
    if json {
        diagnostic.to_json().to_string()
    } else {
        diagnostic.to_text()
    }
}

fn display_diagnostic(diagnostic: &DiagnosticMessage, json: bool) {
    eprintln!("{}", format_diagnostic(diagnostic, json));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["swagger-merger", "-i", "index.yaml"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let options = build_options(&args(&["--deep", "--keep-internal-refs", "--max-depth", "4"])).unwrap();
        assert_eq!(options.mode, MergeMode::Deep);
        assert_eq!(options.same_document, SameDocumentPolicy::Preserve);
        assert_eq!(options.max_depth, 4);
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("merge.toml");
        fs::write(&config, "mode = \"deep\"\nmax-depth = 16\n").unwrap();

        let config_arg = config.to_string_lossy().into_owned();
        let options = build_options(&args(&["--config", &config_arg, "--max-depth", "3"])).unwrap();
        assert_eq!(options.mode, MergeMode::Deep);
        assert_eq!(options.max_depth, 3);
        assert_eq!(options.same_document, SameDocumentPolicy::Inline);
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("merge.toml");
        fs::write(&config, "unknown = 1\n").unwrap();

        let config_arg = config.to_string_lossy().into_owned();
        let err = build_options(&args(&["--config", &config_arg])).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_run_writes_yaml_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.json"), r#"{"info": {"$ref": "info.yaml"}}"#).unwrap();
        fs::write(dir.path().join("info.yaml"), "title: Pets\n").unwrap();
        let output = dir.path().join("out.yaml");

        let input_arg = dir.path().join("index.json").to_string_lossy().into_owned();
        let output_arg = output.to_string_lossy().into_owned();
        let args = Args::try_parse_from(["swagger-merger", "-i", &input_arg, "-o", &output_arg]).unwrap();
        run(args).unwrap();

        assert_eq!(fs::read_to_string(output).unwrap(), "---\ninfo:\n  title: Pets\n");
    }

    #[test]
    fn test_json_diagnostics() {
        let parsed = args(&["--json-diagnostics"]);
        assert!(parsed.json_diagnostics);

        let err = MergeError::CyclicReference {
            chain: vec!["a.yaml#x".to_string(), "a.yaml#x".to_string()],
        };
        let line = format_diagnostic(&err.report(), true);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["kind"], "error");
        assert_eq!(value["details"][0]["kind"], "note");
        assert!(format_diagnostic(&err.report(), false).starts_with("Error: Cyclic reference"));
    }

    #[test]
    fn test_run_fails_on_cycle() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.yaml"), "a:\n  $ref: '#/a'\n").unwrap();

        let input_arg = dir.path().join("index.yaml").to_string_lossy().into_owned();
        let args = Args::try_parse_from(["swagger-merger", "-i", &input_arg]).unwrap();
        let err = run(args).unwrap_err();
        assert!(format!("{:#}", err).contains("cyclic reference"));
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::CyclicReference { .. })
        ));
    }
}
