pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod service;

use actix_web::{web, App, HttpServer};
use config::Config;
use db::init_db_pool;
use dotenv::dotenv;
use errors::ApiError;
use log::{error, info};
use service::{auth::AuthMiddleware, log::LoggerMiddleware, payments::PaymentClient};
use sqlx::{postgres::Postgres, Pool};

type PGPool = Pool<Postgres>;

pub const AUTH_COOKIE: &str = "auth-token";
pub const SESSION_TTL_DAYS: i64 = 7;

/// Extractor failures answer with the same JSON error body as everything else.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _| ApiError::bad_request(err.to_string()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _| ApiError::bad_request(err.to_string()).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _| ApiError::bad_request(err.to_string()).into())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    service::log::init_logger();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {}", err);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()));
        }
    };
    let pool: PGPool = match init_db_pool(&config.database_url, config.database_max_connections).await {
        Ok(pool) => pool,
        Err(err) => {
            error!("failed to initialise database: {:?}", err);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()));
        }
    };

    let bind = (config.host.clone(), config.port);
    let jwt_secret = config.jwt_secret.clone();
    let client = web::Data::new(PaymentClient::new(&config.stripe_secret_key));
    let config = web::Data::new(config);
    info!("starting server on {}:{} ({})", bind.0, bind.1, config.environment);

    HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(web::Data::new(pool.clone()))
            .app_data(config.clone())
            .app_data(client.clone())
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware {
                        db_pool: pool.clone(),
                        jwt_secret: jwt_secret.clone(),
                    })
                    .service(web::scope("/auth").configure(handlers::auth::init_routes))
                    .service(web::scope("/venues").configure(handlers::venue::init_routes))
                    .service(web::scope("/bookings").configure(handlers::booking::init_routes))
                    .service(web::scope("/notifications").configure(handlers::notification::init_routes))
                    .service(web::scope("/subscriptions").configure(handlers::subscription::init_routes))
                    .service(web::scope("/webhooks").configure(handlers::webhook::init_routes))
                    .service(web::scope("/admin").configure(handlers::admin::init_routes)),
            )
    })
    .bind(bind)?
    .run()
    .await
}
