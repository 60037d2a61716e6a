pub mod app;
pub mod clock;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use app::dispatcher::{Dispatcher, HttpSmsProvider};
use app::events_processor::builtin::{SolutionResearchRequestedHandler, UserIntroInquiryHandler};
use app::events_processor::{EventHandlerRegistry, EventProcessor};
use app::llm_client::HttpLlmClient;
use app::orchestrator::Orchestrator;
use app::relevance::LlmRelevanceClassifier;
use app::renderer::LlmRenderer;
use app::task_processor::builtin::{
    ReengagementCheckHandler, ScheduleFollowUpMessageHandler, TriggerSolutionResearchHandler, UpdateUserProfileFieldHandler,
};
use app::task_processor::{TaskHandlerRegistry, TaskProcessor};
use clock::SystemClock;
use config::Config;
use database::DbPool;
use routes::AppState;

/// Everything `main.rs` and `cli::commands::serve` boot, wired once with
/// constructor injection (spec.md §9 Design Notes: no global singletons).
pub struct Runtime {
    pub orchestrator: Orchestrator,
    pub events: Arc<EventProcessor>,
    pub tasks: Arc<TaskProcessor>,
    pub dispatcher: Arc<Dispatcher>,
    pub config: Config,
}

impl Runtime {
    pub fn build(config: Config, pool: DbPool) -> Self {
        let clock = Arc::new(SystemClock);

        let llm_client = Arc::new(HttpLlmClient::new(&config.provider));
        let renderer = Arc::new(LlmRenderer::new(llm_client.clone()));
        let relevance = Arc::new(LlmRelevanceClassifier::new(llm_client));

        let orchestrator = Orchestrator::new(pool.clone(), config.orchestrator.clone(), renderer, relevance, clock.clone());
        let orchestrator_arc = Arc::new(orchestrator.clone());

        let task_registry = Arc::new(TaskHandlerRegistry::new());
        task_registry.register("schedule_follow_up_message", Arc::new(ScheduleFollowUpMessageHandler::new(orchestrator_arc.clone())));
        task_registry.register("update_user_profile_field", Arc::new(UpdateUserProfileFieldHandler::new(pool.clone())));
        task_registry.register("trigger_solution_research", Arc::new(TriggerSolutionResearchHandler::new(pool.clone())));
        task_registry.register("re_engagement_check", Arc::new(ReengagementCheckHandler::new(orchestrator_arc.clone())));

        let tasks = Arc::new(TaskProcessor::new(pool.clone(), config.tasks.clone(), task_registry, clock.clone()));

        let event_registry = Arc::new(EventHandlerRegistry::new());
        event_registry.register("user.intro_inquiry", Arc::new(UserIntroInquiryHandler::new(pool.clone(), orchestrator_arc.clone())));
        event_registry.register("solution.research_requested", Arc::new(SolutionResearchRequestedHandler::new(orchestrator_arc)));
        let events = Arc::new(EventProcessor::new(pool.clone(), config.events.clone(), event_registry, clock.clone()));

        let sms_provider = Arc::new(HttpSmsProvider::new(&config.provider));
        let dispatcher = Arc::new(Dispatcher::new(pool, config.dispatcher.clone(), sms_provider, clock));

        Self { orchestrator, events, tasks, dispatcher, config }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            events: self.events.clone(),
            tasks: self.tasks.clone(),
            events_config: self.config.events.clone(),
            tasks_config: self.config.tasks.clone(),
            started_at: Instant::now(),
        }
    }
}

pub async fn create_app(state: AppState) -> anyhow::Result<Router> {
    let app = routes::routes(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()));
    Ok(app)
}

/// Boots the three pollers (Orchestrator, Event Processor, Task Processor)
/// plus the SMS Dispatcher boundary as concurrent `tokio` tasks sharing one
/// `DbPool`, and the operational HTTP surface (spec.md §6) on top — matching
/// a "one process, several cooperating tasks" shape (spec.md §5).
/// Shared by both binaries (`agentsms`'s `main.rs` and `agentsmsctl serve`).
pub async fn serve(config: Config, pool: DbPool) -> anyhow::Result<()> {
    let server_addr = config.server_addr();
    let runtime = Runtime::build(config, pool);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let orchestrator = runtime.orchestrator.clone();
    let orchestrator_rx = shutdown_rx.clone();
    let orchestrator_handle = tokio::spawn(async move { orchestrator.run(orchestrator_rx).await });

    let events = runtime.events.clone();
    let events_rx = shutdown_rx.clone();
    let events_handle = tokio::spawn(async move { events.run(events_rx).await });

    let tasks = runtime.tasks.clone();
    let tasks_rx = shutdown_rx.clone();
    let tasks_handle = tokio::spawn(async move { tasks.run(tasks_rx).await });

    let dispatcher = runtime.dispatcher.clone();
    let dispatcher_rx = shutdown_rx.clone();
    let dispatcher_handle = tokio::spawn(async move { dispatcher.run(dispatcher_rx).await });

    let app = create_app(runtime.app_state()).await?;
    let listener = tokio::net::TcpListener::bind(&server_addr).await?;
    tracing::info!(addr = %server_addr, "agentsms server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx)).await?;

    let _ = tokio::join!(orchestrator_handle, events_handle, tasks_handle, dispatcher_handle);
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::warn!("shutdown signal received, draining pollers");
    let _ = shutdown_tx.send(true);
}
