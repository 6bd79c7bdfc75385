use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use logintrack::event_processor::process_events;
use logintrack::pg_store::PgUserStore;
use logintrack::settings::StoreBackend;
use logintrack::{
    db, routes, AppState, EventDispatcher, EventQueue, LoginTracker, MemoryUserStore,
    RetryPolicy, Settings, UserStore,
};
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load .env file
    dotenv::dotenv().ok();

    let settings = Settings::new().expect("Failed to load configuration");

    let store: Arc<dyn UserStore> = match settings.store.backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&settings.database)
                .await
                .expect("Failed to create pool");
            Arc::new(PgUserStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory user store; records are lost on restart");
            Arc::new(MemoryUserStore::new())
        }
    };

    let tracker = LoginTracker::new(store.clone());

    let (events, receiver) = EventQueue::new(settings.events.queue_capacity);
    let mut dispatcher = EventDispatcher::new(RetryPolicy::from(&settings.events));
    dispatcher.register(Arc::new(tracker.clone()));
    tokio::spawn(process_events(
        receiver,
        Arc::new(dispatcher),
        settings.events.max_in_flight,
    ));

    let app_state = web::Data::new(AppState {
        store,
        tracker,
        events,
    });

    let allowed_origin = settings.server.allowed_origin.clone();
    info!(
        "Starting server at http://{}:{}",
        settings.server.host, settings.server.port
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&allowed_origin)
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::ACCEPT])
            .allowed_header(header::CONTENT_TYPE)
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .configure(routes::configure)
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run()
    .await
}
