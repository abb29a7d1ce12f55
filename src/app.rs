//! Application bootstrap: the standard lifecycle graph wired to the
//! dependency container.
//!
//! Boot is a chain of zero-duration states — `loading_config` then
//! `connecting_db` return [`StateOutcome::Continue`] so one `cycle()`
//! carries the machine all the way into `serving`, which suspends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use wordlette_config::{AppSettings, ConfigLoader};
use wordlette_core::machine::{State, StateBehavior, StateMachine, StateOutcome, always};
use wordlette_core::{BoxError, Container, Error, HttpRequest, HttpResponse, Router};
use wordlette_db::{
    DatabaseController, DriverRegistry, ModelRegistry, ModelSchema, SqliteDriver,
};
use wordlette_events::EventDispatch;

struct LoadConfig {
    path: PathBuf,
}

#[async_trait]
impl StateBehavior for LoadConfig {
    async fn enter(&self, cx: &Container) -> Result<StateOutcome, BoxError> {
        let settings = ConfigLoader::load(&self.path)?;
        info!(site = %settings.site_name, "configuration loaded");

        let drivers = cx.resolve::<DriverRegistry>()?;
        let controller = DatabaseController::new((*drivers).clone(), settings.database.clone());
        cx.register(settings);
        cx.register(controller);
        Ok(StateOutcome::Continue)
    }
}

struct ConnectDatabase;

#[async_trait]
impl StateBehavior for ConnectDatabase {
    async fn enter(&self, cx: &Container) -> Result<StateOutcome, BoxError> {
        let db = cx.resolve::<DatabaseController>()?;
        if let Some(e) = db.connect().await?.err() {
            return Err(e.into());
        }

        let models = cx.resolve::<ModelRegistry>()?;
        if let Some(e) = db.sync_schema(&models).await.err() {
            return Err(e.into());
        }
        info!(models = models.len(), "database ready");
        Ok(StateOutcome::Continue)
    }
}

struct Serving;

#[async_trait]
impl StateBehavior for Serving {
    async fn enter(&self, cx: &Container) -> Result<StateOutcome, BoxError> {
        // The router must be in place before we declare ourselves up.
        let _ = cx.resolve::<Router>()?;
        info!("application serving");
        Ok(StateOutcome::Suspend)
    }

    async fn exit(&self, _cx: &Container) -> Result<(), BoxError> {
        info!("application shutting down");
        Ok(())
    }
}

/// Configures an [`Application`] before boot.
pub struct ApplicationBuilder {
    config_path: PathBuf,
    drivers: DriverRegistry,
    models: ModelRegistry,
    router: Router,
}

impl ApplicationBuilder {
    fn new() -> Self {
        let mut drivers = DriverRegistry::new();
        drivers.register("sqlite", || Arc::new(SqliteDriver::new()));
        Self {
            config_path: PathBuf::from("wordlette.toml"),
            drivers,
            models: ModelRegistry::new(),
            router: Router::new(),
        }
    }

    /// Where `loading_config` reads settings from. Missing files fall
    /// back to defaults, so boot works without one.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = path.as_ref().to_path_buf();
        self
    }

    /// Register an additional database driver.
    pub fn driver<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn wordlette_db::DatabaseDriver> + Send + Sync + 'static,
    {
        self.drivers.register(name, factory);
        self
    }

    /// Declare a model; its table is created during `connecting_db`.
    pub fn model(mut self, schema: ModelSchema) -> Self {
        self.models.register(schema);
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn build(self) -> Result<Application, Error> {
        let container = Container::new();
        container.register(self.drivers);
        container.register(self.models);
        container.register(self.router);
        container.register(EventDispatch::new());

        let loading_config = State::named(
            "loading_config",
            LoadConfig {
                path: self.config_path,
            },
        );
        let connecting_db = State::named("connecting_db", ConnectDatabase);
        let serving = State::named("serving", Serving);

        let machine = StateMachine::builder()
            .start_at(&loading_config)
            .transition(&loading_config, &connecting_db, always())
            .transition(&connecting_db, &serving, always())
            .build()?;

        Ok(Application {
            container,
            machine,
            serving,
        })
    }
}

/// The framework entry point: container, lifecycle machine and router.
pub struct Application {
    container: Container,
    machine: StateMachine,
    serving: State,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Drive the lifecycle until it suspends in `serving`.
    ///
    /// A failure inside any state surfaces as
    /// [`Error::TransitionFailed`] and aborts startup.
    pub async fn start(&mut self) -> Result<(), Error> {
        self.machine.cycle(&self.container).await?;
        Ok(())
    }

    /// Leave `serving`, run exit hooks and close the database.
    pub async fn stop(&mut self) -> Result<(), Error> {
        self.machine.cycle(&self.container).await?;
        if let Ok(db) = self.container.resolve::<DatabaseController>() {
            if let Some(e) = db.disconnect().await.err() {
                warn!(error = %e, "database disconnect failed during shutdown");
            }
        }
        Ok(())
    }

    pub fn is_serving(&self) -> bool {
        self.machine.current() == &self.serving
    }

    pub fn is_stopped(&self) -> bool {
        self.machine.is_stopped()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The shared dispatcher registered at build time.
    pub fn events(&self) -> Result<Arc<EventDispatch>, Error> {
        self.container.resolve::<EventDispatch>()
    }

    /// Route a request through the registered [`Router`].
    pub async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let router = self.container.resolve::<Router>()?;
        Ok(router.handle(request).await)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("state", &self.machine.current().name())
            .finish()
    }
}
