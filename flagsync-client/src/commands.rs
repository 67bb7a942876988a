//! Command implementations

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flagsync_core::{
    AppConfig, ConfigLoader, ConfigurationSyncController, Environment, FileProvider, FlagProvider,
    FlagValue, ImpressionHandler, ImpressionTracker, SyncOptions, SyncState, SyncView, UserContext,
    UserContextStore,
};
use flagsync_utils::{FlagsyncError, Result};

/// Load from an explicit path, or the default location
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(FlagsyncError::ConfigNotFound(path.to_path_buf()));
            }
            ConfigLoader::load_and_validate_from(path)
        }
        None => ConfigLoader::load_and_validate(),
    }
}

/// Run the controller against the file provider until Ctrl-C
pub async fn run(
    config: &AppConfig,
    env: Option<Environment>,
    flags_file: Option<PathBuf>,
    json: bool,
    watch: bool,
) -> Result<()> {
    let env = config.environment(env)?;
    let catalog = config.build_catalog(env)?;
    let user = UserContextStore::default().load_or_generate()?;

    let flags_file = flags_file.unwrap_or_else(|| config.provider.flags_file());
    let provider = FileProvider::new(flags_file);
    let provider = if watch { provider } else { provider.without_watch() };
    tracing::info!(
        environment = %env,
        flags_file = %provider.path().display(),
        "Starting flag sync"
    );

    let controller = ConfigurationSyncController::new(catalog, Arc::new(provider));
    let mut views = controller.subscribe();
    let tracker = Arc::new(ImpressionTracker::new());

    let options = SyncOptions {
        environment: env,
        setup: config.sync.setup_options(),
        access_mode: config.sync.access_mode,
        custom_properties: Vec::new(),
        impression_handler: Some(tracker.clone() as Arc<dyn ImpressionHandler>),
        user: Some(user),
    };
    let credential = config.credential(env);

    let init = controller.clone();
    tokio::spawn(async move {
        if let Err(e) = init.initialize(&credential, options).await {
            // Already surfaced as a Failed view; the run continues on defaults
            tracing::warn!("{}", e);
        }
    });

    let mut stdout = std::io::stdout();
    loop {
        let view = views.borrow_and_update().clone();
        print_view(&mut stdout, &view, &controller, env, json)?;

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    tracing::info!(impressions = tracker.len(), "Flag sync stopped");
    Ok(())
}

/// Print the declared defaults for an environment
pub fn defaults(config: &AppConfig, env: Option<Environment>, json: bool) -> Result<()> {
    let env = config.environment(env)?;
    let catalog = config.build_catalog(env)?;
    let mut stdout = std::io::stdout();

    if json {
        let out = serde_json::to_string_pretty(&catalog.defaults())
            .map_err(|e| FlagsyncError::Serialization(e.to_string()))?;
        writeln!(stdout, "{}", out)?;
        return Ok(());
    }

    writeln!(stdout, "# {} defaults", env.display_name())?;
    for (name, entry) in catalog.iter() {
        let def = &entry.definition;
        write!(stdout, "{} = {} ({})", name, def.default, def.kind())?;
        if !def.options.is_empty() {
            let options: Vec<String> = def.options.iter().map(ToString::to_string).collect();
            write!(stdout, " options=[{}]", options.join(", "))?;
        }
        if def.freeze.is_frozen() {
            write!(stdout, " freeze={:?}", def.freeze)?;
        }
        if let Some(description) = &def.description {
            write!(stdout, "  # {}", description)?;
        }
        writeln!(stdout)?;
    }
    Ok(())
}

/// Print (or regenerate) the persisted targeting user
pub fn user(reset: bool) -> Result<()> {
    let store = UserContextStore::default();
    if reset {
        store.clear()?;
        tracing::info!("Cleared user context at {}", store.path().display());
    }
    let user = store.load_or_generate()?;
    write_user(&mut std::io::stdout(), &user)
}

fn write_user(out: &mut impl Write, user: &UserContext) -> Result<()> {
    let json = serde_json::to_string_pretty(user)
        .map_err(|e| FlagsyncError::Serialization(e.to_string()))?;
    writeln!(out, "{}", json)?;
    Ok(())
}

/// Print one published view; values come from the view's own snapshot
fn print_view<P: FlagProvider>(
    out: &mut impl Write,
    view: &SyncView,
    controller: &ConfigurationSyncController<P>,
    env: Environment,
    json: bool,
) -> Result<()> {
    if json {
        let line = serde_json::to_string(view)
            .map_err(|e| FlagsyncError::Serialization(e.to_string()))?;
        writeln!(out, "{}", line)?;
        return Ok(());
    }

    match &view.state {
        SyncState::Pending => writeln!(out, "[rev {}] {} loading...", view.revision, env)?,
        SyncState::Ready => writeln!(out, "[rev {}] {} ready", view.revision, env)?,
        SyncState::Failed(reason) => {
            writeln!(out, "[rev {}] {} failed: {}", view.revision, env, reason)?
        }
    }

    let reader = controller.reader_for(view.flags.clone());
    for (name, entry) in controller.catalog().iter() {
        let Some(value) = reader.get_value(name) else {
            continue;
        };
        write!(out, "  {} = {}", name, value)?;
        if value == FlagValue::Bool(true) && entry.parent.is_some() && !reader.is_effective(name) {
            write!(out, " (parent off)")?;
        }
        writeln!(out)?;
    }
    Ok(())
}
