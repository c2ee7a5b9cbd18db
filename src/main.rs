//! kcsync CLI entrypoint.
//!
//! This is the main entrypoint for the kcsync command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use kcsync::cli::{Cli, Commands, OutputFormatter, StateCommands};
use kcsync::config::{
    ConfigParser, ConfigValidator, DEFAULT_CONFIG_FILES, SyncConfig, find_config_file,
};
use kcsync::error::{KcSyncError, Result};
use kcsync::identity::{MemberTrackingId, TrackingId};
use kcsync::keycloak::KeycloakClient;
use kcsync::state::{HistoryEntry, LocalStateStore, StateStore, SyncOperation};
use kcsync::sync::{ManagedEntry, SyncRunner};

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "KCSYNC_LOG";

/// Starter configuration written by `kcsync init`.
const CONFIG_TEMPLATE: &str = r#"# kcsync configuration
#
# Secrets are read from the environment (or a .env file next to this one):
#   KEYCLOAK_CLIENT_SECRET  client secret of the admin client
#   KEYCLOAK_PASSWORD       password, when `username` is set

keycloak:
  url: http://localhost:8080
  base_path: ""          # "/auth" on legacy distributions
  auth_realm: master
  client_id: kcsync
  # username: admin      # selects the password grant
  timeout_secs: 30

state:
  path: .kcsync/state.json

parallelism: 4

memberships:
  # Users (by username) in a group. An empty list removes everyone;
  # omitting `members` leaves the group alone.
  - realm: my-realm
    kind: group-memberships
    parent: 00000000-0000-0000-0000-000000000000
    members: []

  # Optional client scopes of a client. Non-exhaustive entries only
  # remove scopes kcsync added itself.
  # - realm: my-realm
  #   kind: optional-scopes
  #   parent: <client uuid>
  #   members: [offline_access]
  #   exhaustive: false
"#;

/// What `kcsync import` adopts.
enum ImportTarget {
    Set(TrackingId),
    Member(MemberTrackingId),
}

/// Lines kcsync adds to `.gitignore`.
const GITIGNORE_ENTRIES: &[&str] = &[".env", ".kcsync/"];

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point. Returns false if any set failed.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force).map(|()| true),
        Commands::Validate { warnings } => cmd_validate(config, warnings, &formatter),
        Commands::Plan => cmd_plan(config, &formatter).await,
        Commands::Apply { yes } => cmd_apply(config, yes, &formatter).await,
        Commands::Drift => cmd_drift(config, &formatter).await,
        Commands::Import { id, member } => cmd_import(config, id, member, &formatter).await,
        Commands::State { command } => cmd_state(config, command, &formatter).await,
    }
}

/// Write a starter configuration.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing kcsync in: {}", path.display());

    let config_path = path.join(DEFAULT_CONFIG_FILES[0]);
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)?;
    eprintln!("Created: {}", config_path.display());

    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let missing: Vec<&str> = GITIGNORE_ENTRIES
            .iter()
            .copied()
            .filter(|entry| !existing.lines().any(|line| line.trim() == *entry))
            .collect();
        if !missing.is_empty() {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# kcsync")?;
            for entry in missing {
                writeln!(file, "{entry}")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, format!("{}\n", GITIGNORE_ENTRIES.join("\n")))?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nNext steps:");
    eprintln!("  1. Put KEYCLOAK_CLIENT_SECRET in .env");
    eprintln!("  2. Edit {} with the memberships to manage", DEFAULT_CONFIG_FILES[0]);
    eprintln!("  3. Run 'kcsync validate', then 'kcsync plan'");
    eprintln!("  4. Run 'kcsync apply' to converge Keycloak");

    Ok(())
}

/// Validate configuration without contacting Keycloak.
fn cmd_validate(
    config_path: Option<&Path>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (_, config) = load_config(config_path)?;
    let result = ConfigValidator::new().check(&config);

    println!("{}", formatter.format_validation(&result, show_warnings));
    if result.is_valid() {
        let managed = config.memberships.iter().filter(|m| m.members.is_some()).count();
        eprintln!(
            "\n{} membership entr(y/ies), {managed} managed",
            config.memberships.len()
        );
    }
    Ok(result.is_valid())
}

/// Show the changes apply would make.
async fn cmd_plan(config_path: Option<&Path>, formatter: &OutputFormatter) -> Result<bool> {
    let (config, store) = load_validated(config_path)?;
    let entries = ManagedEntry::from_config(&config)?;
    let state = store.load_or_default().await?;

    let summary = runner(&config)?.plan(&entries, &state).await?;
    println!("{}", formatter.format_plan(&summary));
    Ok(summary.is_success())
}

/// Reconcile every managed set.
async fn cmd_apply(
    config_path: Option<&Path>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (config, store) = load_validated(config_path)?;
    let entries = ManagedEntry::from_config(&config)?;
    let mut state = store.load_or_default().await?;
    let runner = runner(&config)?;

    if !auto_approve {
        let plan = runner.plan(&entries, &state).await?;
        eprintln!("{}", formatter.format_plan(&plan));

        if plan.pending_count() == 0 && plan.parent_gone_count() == 0 && plan.is_success() {
            eprintln!("No changes to apply.");
            return Ok(true);
        }

        eprint!("Do you want to apply this plan? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Apply cancelled.");
            return Ok(true);
        }
    }

    let summary = runner.apply(&entries, &mut state).await?;
    store.save(&state).await?;

    println!("{}", formatter.format_apply(&summary));
    Ok(summary.is_success())
}

/// Report drift without changing anything.
async fn cmd_drift(config_path: Option<&Path>, formatter: &OutputFormatter) -> Result<bool> {
    let (config, store) = load_validated(config_path)?;
    let entries = ManagedEntry::from_config(&config)?;
    let state = store.load_or_default().await?;

    let summary = runner(&config)?.drift(&entries, &state).await?;
    println!("{}", formatter.format_drift(&summary));
    Ok(summary.is_success())
}

/// Adopt an existing set or grant.
async fn cmd_import(
    config_path: Option<&Path>,
    id: Option<String>,
    member: Option<String>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    // Identifiers are decoded before any remote call.
    let target = match (id, member) {
        (_, Some(member)) => ImportTarget::Member(MemberTrackingId::decode(&member)?),
        (Some(id), None) => ImportTarget::Set(TrackingId::decode(&id)?),
        (None, None) => {
            return Err(KcSyncError::internal("an identifier is required"));
        }
    };

    let (config, store) = load_validated(config_path)?;
    let mut state = store.load_or_default().await?;
    let runner = runner(&config)?;

    let outcome = match &target {
        ImportTarget::Set(tracking_id) => {
            let exhaustive = config
                .memberships
                .iter()
                .filter_map(|m| m.tracking_id().ok().map(|id| (id, m.exhaustive)))
                .find(|(id, _)| id == tracking_id)
                .is_none_or(|(_, exhaustive)| exhaustive);
            runner
                .import(tracking_id, exhaustive, &mut state)
                .await
                .map(|members| format!("Imported {tracking_id} ({} member(s))", members.len()))
        }
        ImportTarget::Member(member_id) => runner
            .import_member(member_id, &mut state)
            .await
            .map(|()| format!("Imported {member_id}")),
    };

    // A vanished parent still clears tracking.
    if outcome.as_ref().is_ok() || outcome.as_ref().is_err_and(KcSyncError::is_parent_gone) {
        store.save(&state).await?;
    }

    let message = outcome?;
    println!("{}", formatter.message(true, &message));
    Ok(true)
}

/// Inspect or edit the tracking state.
async fn cmd_state(
    config_path: Option<&Path>,
    command: StateCommands,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (config_file, config) = load_config(config_path)?;
    let store = state_store(&config_file, &config);

    match command {
        StateCommands::Show => {
            match store.load().await? {
                Some(state) => println!("{}", formatter.format_state(&state)),
                None => eprintln!("No state found at {}.", store.path().display()),
            }
            Ok(true)
        }
        StateCommands::Rm { id } => {
            let tracking_id = TrackingId::decode(&id)?;
            let mut state = store.load_or_default().await?;

            if state.forget(&tracking_id).is_none() {
                println!("{}", formatter.message(false, &format!("{tracking_id} is not tracked")));
                return Ok(false);
            }

            state.add_history(HistoryEntry::new(SyncOperation::Forget, vec![tracking_id.encode()]));
            store.save(&state).await?;
            println!("{}", formatter.message(true, &format!("Stopped tracking {tracking_id}")));
            Ok(true)
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.to_path_buf()))
}

/// Loads `.env` and the configuration, with environment overrides applied.
fn load_config(config_path: Option<&Path>) -> Result<(PathBuf, SyncConfig)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    Ok((config_file, config))
}

/// Loads and validates the configuration and opens the state store.
fn load_validated(config_path: Option<&Path>) -> Result<(SyncConfig, LocalStateStore)> {
    let (config_file, config) = load_config(config_path)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        debug!("Configuration warning: {warning}");
    }

    let store = state_store(&config_file, &config);
    Ok((config, store))
}

/// Opens the state store. Relative paths are resolved against the
/// configuration file's directory.
fn state_store(config_file: &Path, config: &SyncConfig) -> LocalStateStore {
    let base = config_file.parent().unwrap_or_else(|| Path::new("."));
    LocalStateStore::new(base.join(&config.state.path))
}

/// Creates a runner over an authenticated Keycloak client.
fn runner(config: &SyncConfig) -> Result<SyncRunner> {
    let settings = ConfigParser::client_settings(&config.keycloak)?;
    let client = KeycloakClient::new(settings)?;
    Ok(SyncRunner::keycloak(Arc::new(client), config.parallelism))
}
