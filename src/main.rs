use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{debug, error, info, warn};

use crate::catalog::{AppDescriptor, Catalog, StoreInfo};
use crate::diagnostics::SmokeTester;
use crate::engine::models::{Artifact, Platform};
use crate::engine::{ArtifactFailure, BuildOutcome, GenerationReport, Generator};
use crate::networking::NetworkClient;
use crate::process::{NativeBuildError, NativeToolchain};
use crate::server::ArtifactServer;
use crate::storage::OutputTree;

mod catalog;
mod diagnostics;
mod engine;
mod env;
mod networking;
mod packager;
mod process;
mod server;
mod storage;
mod templates;
mod util;

#[derive(Parser, Debug)]
#[command(
    name = "appwrap",
    author,
    version,
    about = "Placeholder desktop downloads for a catalog of web apps, with a local server and smoke tests"
)]
struct Cli {
    /// Root of the output tree.
    #[arg(long, global = true, default_value = env::DEFAULT_DOWNLOADS_DIR)]
    downloads_dir: PathBuf,

    /// JSON catalog to use instead of the built-in app table.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write placeholder archives for every app (or one).
    Generate(GenerateArgs),
    /// Try the native Electron build, falling back to placeholders.
    Build(BuildArgs),
    /// Serve the downloads directory over HTTP.
    Serve(ServeArgs),
    /// Verify generated artifacts locally and optionally over HTTP.
    Check(CheckArgs),
    /// Print the app catalog.
    List,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Only this app id.
    #[arg(long)]
    app: Option<String>,

    /// Restrict to these platforms (repeatable).
    #[arg(long = "platform", value_parser = parse_platform)]
    platforms: Vec<Platform>,

    /// Also write the download page to the output root.
    #[arg(long)]
    index: bool,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Only this app id.
    #[arg(long)]
    app: Option<String>,

    /// Electron project directory; defaults to `<id>-electron` when it exists.
    #[arg(long, requires = "app")]
    project: Option<PathBuf>,

    /// Create package.json and main.js in the project directory first.
    #[arg(long)]
    scaffold: bool,

    /// Skip the native toolchain and write placeholders directly.
    #[arg(long, conflicts_with_all = ["project", "scaffold", "node", "npm"])]
    no_native: bool,

    /// node executable to use instead of the one on PATH.
    #[arg(long)]
    node: Option<String>,

    /// npm executable to use instead of the one on PATH.
    #[arg(long)]
    npm: Option<String>,

    #[arg(long = "platform", value_parser = parse_platform)]
    platforms: Vec<Platform>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value_t = env::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Open the served root in the default browser.
    #[arg(long)]
    open: bool,

    /// Write the download page before serving.
    #[arg(long)]
    index: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Only this app id.
    #[arg(long)]
    app: Option<String>,

    /// Also fetch every artifact from a running server.
    #[arg(long)]
    http: bool,

    /// Server to fetch from with --http.
    #[arg(long, default_value_t = env::default_server_url())]
    base_url: String,

    /// Seconds to wait for each HTTP request.
    #[arg(long, default_value_t = networking::REQUEST_TIMEOUT.as_secs())]
    timeout: u64,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    Platform::parse(value).ok_or_else(|| format!("unknown platform '{value}' (windows, mac, linux)"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` means the command ran but something it produced or checked failed.
fn run(cli: Cli) -> Result<bool, String> {
    let catalog = Catalog::load_or_embedded(cli.catalog.as_deref())?;
    let tree = OutputTree::new(&cli.downloads_dir);

    match cli.command {
        Command::Generate(args) => generate(&catalog, tree, args),
        Command::Build(args) => build(&catalog, tree, args),
        Command::Serve(args) => serve(&catalog, tree, args),
        Command::Check(args) => check(&catalog, tree, args),
        Command::List => {
            list(&catalog);
            Ok(true)
        }
    }
}

fn selected(catalog: &Catalog, app: Option<&str>) -> Result<Catalog, String> {
    match app {
        Some(id) => catalog.only(id),
        None => Ok(catalog.clone()),
    }
}

fn generate(catalog: &Catalog, tree: OutputTree, args: GenerateArgs) -> Result<bool, String> {
    let apps = selected(catalog, args.app.as_deref())?;
    let generator = Generator::for_catalog(tree, catalog).with_platforms(&args.platforms);
    let reports = generator.generate_all(&apps);
    for report in &reports {
        print_report(report);
    }
    if args.index {
        generator.tree().write_download_page(catalog)?;
    }

    let failed = reports.iter().filter(|r| !r.is_complete()).count();
    let written: usize = reports.iter().map(|r| r.artifacts.len()).sum();
    println!(
        "\n{written} placeholder artifact(s) for {} platform(s) written to {}",
        generator.platforms().len(),
        generator.tree().root().display()
    );
    if failed > 0 {
        warn!("generate: {failed} app(s) had failures");
    }
    Ok(failed == 0)
}

fn build(catalog: &Catalog, tree: OutputTree, args: BuildArgs) -> Result<bool, String> {
    let apps = selected(catalog, args.app.as_deref())?;
    let generator = Generator::for_catalog(tree, catalog).with_platforms(&args.platforms);

    let mut all_ok = true;
    let mut native = 0;
    for app in &apps.apps {
        let outcome = match native_toolchain(app, &catalog.store, &args) {
            Ok(toolchain) => generator.build(app, toolchain.as_ref()),
            Err(reason) => generator.fall_back(app, reason),
        };
        match &outcome {
            BuildOutcome::Native { app_id, .. } => println!("\n{app_id}: native build"),
            BuildOutcome::Placeholder { reason, report } => {
                println!("\n{}: placeholder ({reason})", report.app_id)
            }
        }
        print_artifacts(outcome.artifacts());
        print_failures(outcome.failures());
        debug!("build: {} finished in {}", outcome.app_id(), outcome.final_stage());
        if outcome.is_native() {
            native += 1;
        }
        all_ok &= outcome.failures().is_empty();
    }
    println!(
        "\n{native} of {} app(s) built natively, the rest use placeholders",
        apps.apps.len()
    );
    Ok(all_ok)
}

/// The toolchain to try for `app`, or `None` when no project is configured.
fn native_toolchain(
    app: &AppDescriptor,
    store: &StoreInfo,
    args: &BuildArgs,
) -> Result<Option<NativeToolchain>, NativeBuildError> {
    if args.no_native {
        return Ok(None);
    }
    let explicit = args.project.is_some();
    let project = args
        .project
        .clone()
        .unwrap_or_else(|| env::default_native_project_dir(&app.id));
    if !args.scaffold && !explicit && !project.is_dir() {
        return Ok(None);
    }

    let mut toolchain = NativeToolchain::new(&project);
    if let Some(node) = &args.node {
        toolchain = toolchain.with_node(node);
    }
    if let Some(npm) = &args.npm {
        toolchain = toolchain.with_npm(npm);
    }
    if args.scaffold {
        toolchain.scaffold(app, store)?;
    }
    Ok(Some(toolchain))
}

fn serve(catalog: &Catalog, tree: OutputTree, args: ServeArgs) -> Result<bool, String> {
    if args.index {
        tree.write_download_page(catalog)?;
    }
    if !tree.root().is_dir() {
        warn!(
            "server: {} does not exist yet; run `appwrap generate` first",
            tree.root().display()
        );
    }

    let runtime = runtime()?;
    runtime.block_on(async {
        let server = ArtifactServer::bind(tree.root(), SocketAddr::new(args.bind, args.port)).await?;
        let addr = server.local_addr()?;
        let host = if addr.ip().is_unspecified() {
            "localhost".to_owned()
        } else {
            addr.ip().to_string()
        };
        let url = format!("http://{host}:{}/", addr.port());
        println!("Serving {} at {url} (Ctrl-C to stop)", server.root().display());
        if args.open
            && let Err(err) = open::that(&url)
        {
            warn!("server: unable to open browser: {err}");
        }
        server.serve_until_interrupted().await
    })?;
    Ok(true)
}

fn check(catalog: &Catalog, tree: OutputTree, args: CheckArgs) -> Result<bool, String> {
    let apps = selected(catalog, args.app.as_deref())?;
    let base_url = args.http.then_some(args.base_url.as_str());

    let runtime = runtime()?;
    let tester = SmokeTester::new(tree)
        .with_client(NetworkClient::with_timeout(Duration::from_secs(args.timeout)));
    let report = runtime.block_on(tester.run(&apps.apps, base_url));
    if args.json {
        println!("{}", diagnostics::to_json(&report)?);
    } else {
        print!("{}", diagnostics::format_report(&report));
    }
    if report.passed() {
        info!("check: all {} artifact(s) passed", report.checks.len());
    } else {
        error!("check: {} artifact(s) failed", report.failed_count());
    }
    Ok(report.passed())
}

fn list(catalog: &Catalog) {
    println!(
        "{} by {} ({} apps)\n",
        catalog.store.store_name,
        catalog.store.publisher,
        catalog.apps.len()
    );
    let width = catalog.apps.iter().map(|app| app.id.len()).max().unwrap_or(0);
    for app in &catalog.apps {
        println!("{:<width$}  {:<28}  {}", app.id, app.name, app.url);
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {e}"))
}

fn print_report(report: &GenerationReport) {
    println!("\n{}", report.app_id);
    print_artifacts(&report.artifacts);
    print_failures(&report.failures);
}

fn print_artifacts(artifacts: &[Artifact]) {
    for artifact in artifacts {
        println!(
            "  {:<8} {:<11} {:>9}  {}",
            artifact.platform.label(),
            artifact.kind.label(),
            util::format_size(artifact.size_bytes),
            artifact.path.display()
        );
    }
}

fn print_failures(failures: &[ArtifactFailure]) {
    for failure in failures {
        println!(
            "  {:<8} FAILED      {}: {}",
            failure.platform.label(),
            failure.path.display(),
            failure.error
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(
            StoreInfo {
                store_name: "Cosmic App Store".into(),
                publisher: "Cosmos Coderr".into(),
            },
            vec![AppDescriptor::new("demo-app", "https://example.com/demo")],
        )
        .unwrap()
    }

    fn build_args(project: Option<PathBuf>) -> BuildArgs {
        BuildArgs {
            app: Some("demo-app".into()),
            project,
            scaffold: false,
            no_native: false,
            node: None,
            npm: None,
            platforms: Vec::new(),
        }
    }

    #[test]
    fn scaffold_failure_falls_back_to_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocked"), "not a directory").unwrap();
        let tree = OutputTree::new(dir.path().join("downloads"));
        let args = BuildArgs {
            scaffold: true,
            ..build_args(Some(dir.path().join("blocked/demo-app-electron")))
        };

        assert_eq!(build(&catalog(), tree.clone(), args), Ok(true));
        assert!(tree.artifact_path("demo-app", Platform::Windows).exists());
        assert!(tree.artifact_path("demo-app", Platform::Linux).exists());
    }

    #[test]
    fn scaffold_failure_is_the_fallback_reason() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocked"), "not a directory").unwrap();
        let args = BuildArgs {
            scaffold: true,
            ..build_args(Some(dir.path().join("blocked/demo-app-electron")))
        };
        let catalog = catalog();
        assert!(matches!(
            native_toolchain(&catalog.apps[0], &catalog.store, &args),
            Err(NativeBuildError::ScaffoldFailed(_))
        ));
    }

    #[test]
    fn no_project_means_no_toolchain() {
        let catalog = catalog();
        let args = BuildArgs {
            no_native: true,
            ..build_args(None)
        };
        assert!(matches!(
            native_toolchain(&catalog.apps[0], &catalog.store, &args),
            Ok(None)
        ));
    }

    #[test]
    fn explicit_missing_project_still_writes_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OutputTree::new(dir.path().join("downloads"));
        let args = build_args(Some(dir.path().join("absent")));

        assert_eq!(build(&catalog(), tree.clone(), args), Ok(true));
        assert!(tree.artifact_path("demo-app", Platform::Mac).exists());
    }

    #[test]
    fn parses_toolchain_and_timeout_flags() {
        let cli = Cli::try_parse_from([
            "appwrap", "build", "--app", "demo-app", "--node", "/opt/node", "--npm", "/opt/npm",
        ])
        .unwrap();
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.node.as_deref(), Some("/opt/node"));
                assert_eq!(args.npm.as_deref(), Some("/opt/npm"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["appwrap", "check", "--timeout", "2"]).unwrap();
        match cli.command {
            Command::Check(args) => assert_eq!(args.timeout, 2),
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["appwrap", "build", "--no-native", "--npm", "x"]).is_err());
    }
}
