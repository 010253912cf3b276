use std::sync::Arc;

use itemcheck::{
    DispatchResult, Dispatcher,
    config::{AgentConfig, read_config_file},
    item_key::make_key,
    util::{get_addr, get_config_path, get_port, get_secret},
};
use rocket::{
    Build, Rocket, State,
    figment::Figment,
    get,
    http::Status,
    request::{FromRequest, Outcome},
    routes,
    serde::json::Json,
};
use serde::Serialize;
use tokio::task::spawn_blocking;
use tracing::{debug, error, instrument};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Serialize)]
struct ItemResponse {
    key: String,
    value: Option<String>,
    error: Option<String>,
}

impl ItemResponse {
    fn new(key: String, outcome: DispatchResult<Option<String>>) -> Self {
        match outcome {
            Ok(value) => Self {
                key,
                value,
                error: None,
            },
            Err(e) => Self {
                key,
                value: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Run a dispatch on the blocking pool, checks may block for the full timeout
async fn dispatch<F>(
    dispatcher: &State<Arc<Dispatcher>>,
    run: F,
) -> Result<DispatchResult<Option<String>>, Status>
where
    F: FnOnce(&Dispatcher) -> DispatchResult<Option<String>> + Send + 'static,
{
    let dispatcher = Arc::clone(dispatcher.inner());
    spawn_blocking(move || run(&dispatcher)).await.map_err(|e| {
        error!("check task failed: {e}");
        Status::InternalServerError
    })
}

#[get("/item?<key>")]
#[instrument(skip(_secret, dispatcher))]
async fn item(
    _secret: SecretKey,
    dispatcher: &State<Arc<Dispatcher>>,
    key: String,
) -> Result<Json<ItemResponse>, Status> {
    let text = key.clone();
    let outcome = dispatch(dispatcher, move |dispatcher| dispatcher.execute_key(&text)).await?;
    Ok(Json(ItemResponse::new(key, outcome)))
}

#[get("/check/<metric>?<param>")]
#[instrument(skip(_secret, dispatcher))]
async fn check(
    _secret: SecretKey,
    dispatcher: &State<Arc<Dispatcher>>,
    metric: String,
    param: Vec<String>,
) -> Result<Json<ItemResponse>, Status> {
    let key = make_key(&metric, &param);
    let outcome = dispatch(dispatcher, move |dispatcher| dispatcher.execute(&metric, &param)).await?;
    Ok(Json(ItemResponse::new(key, outcome)))
}

#[get("/keys")]
fn keys(_secret: SecretKey, dispatcher: &State<Arc<Dispatcher>>) -> Json<Vec<&'static str>> {
    Json(
        dispatcher
            .supported_keys()
            .into_iter()
            .map(|key| key.as_str())
            .collect(),
    )
}

#[get("/ping")]
fn ping() {}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new()
        .with_target("itemcheck", filter::LevelFilter::DEBUG)
        .with_target("itemcheck_agent", filter::LevelFilter::DEBUG)
        .with_target("rocket", filter::LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(true),
        )
        .with(filter)
        .init();
}

/// Shared secret required in the `X-MONITORING-SECRET` header, if any
#[derive(Debug, Clone)]
struct AgentSecret(Option<String>);

fn build_rocket(figment: Figment, dispatcher: Dispatcher, secret: AgentSecret) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(Arc::new(dispatcher))
        .manage(secret)
        .mount("/", routes![item, check, keys, ping])
}

fn get_config() -> Figment {
    rocket::Config::figment()
        .merge(("port", get_port()))
        .merge(("address", get_addr()))
}

fn load_agent_config() -> anyhow::Result<AgentConfig> {
    match get_config_path() {
        Some(path) => read_config_file(&path),
        None => Ok(AgentConfig::default()),
    }
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = load_agent_config()?;
    let dispatcher = Dispatcher::from_config(&config)?;
    debug!("supported keys: {:?}", dispatcher.supported_keys());

    let _rocket = build_rocket(get_config(), dispatcher, AgentSecret(get_secret()))
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("agent stopped: {e}"))?;

    Ok(())
}

#[derive(Debug)]
struct SecretKey;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SecretKey {
    type Error = ();

    async fn from_request(request: &'r rocket::Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(AgentSecret(Some(secret))) = request.rocket().state::<AgentSecret>() else {
            return Outcome::Success(SecretKey);
        };

        match request.headers().get_one("X-MONITORING-SECRET") {
            Some(passed_secret) if passed_secret == secret.as_str() => Outcome::Success(SecretKey),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}
