use actix_web::{
   dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
   Error,
};
use colored::{ColoredString, Colorize};
use env_logger::{Builder, Env};
use futures_util::future::LocalBoxFuture;
use log::{info, Level};
use std::future::{ready, Ready};
use std::io::Write;
use std::time::Instant;

/// Logs every request on the way in and its status and latency on the way out.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
   S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
   S::Future: 'static,
   B: 'static,
{
   type Response = ServiceResponse<B>;
   type Error = Error;
   type InitError = ();
   type Transform = LoggerMiddlewareService<S>;
   type Future = Ready<Result<Self::Transform, Self::InitError>>;

   fn new_transform(&self, service: S) -> Self::Future {
      ready(Ok(LoggerMiddlewareService { service }))
   }
}

pub struct LoggerMiddlewareService<S> {
   service: S,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
   S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
   S::Future: 'static,
   B: 'static,
{
   type Response = ServiceResponse<B>;
   type Error = Error;
   type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

   forward_ready!(service);

   fn call(&self, req: ServiceRequest) -> Self::Future {
      let method = req.method().clone();
      let path = req.uri().path().to_string();
      info!("--> {} {}", method, path);
      let started = Instant::now();
      let fut = self.service.call(req);

      Box::pin(async move {
         let res = fut.await?;
         info!(
            "<-- {} {} {} in {}ms",
            method,
            path,
            res.status().as_u16(),
            started.elapsed().as_millis()
         );
         Ok(res)
      })
   }
}

fn level_tag(level: Level) -> ColoredString {
   let tag = format!("{:<5}", level);
   match level {
      Level::Error => tag.red().bold(),
      Level::Warn => tag.yellow().bold(),
      Level::Info => tag.green().bold(),
      Level::Debug => tag.blue().bold(),
      Level::Trace => tag.magenta().bold(),
   }
}

/// Level comes from `RUST_LOG`, `info` when unset.
pub fn init_logger() {
   Builder::from_env(Env::default().default_filter_or("info"))
      .format(|buf, record| {
         writeln!(
            buf,
            "{} {} [{}] {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            level_tag(record.level()),
            record.target(),
            record.args()
         )
      })
      .init()
}

#[cfg(test)]
mod tests {
   use super::*;
   use actix_web::{test as actix_test, web, App, HttpResponse};

   #[test]
   fn level_tags_are_padded() {
      colored::control::set_override(false);
      assert_eq!(level_tag(Level::Info).to_string(), "INFO ");
      assert_eq!(level_tag(Level::Error).to_string(), "ERROR");
   }

   #[actix_rt::test]
   async fn middleware_passes_response_through() {
      let app = actix_test::init_service(
         App::new()
            .wrap(LoggerMiddleware)
            .route("/ping", web::get().to(|| async { HttpResponse::Ok().body("pong") })),
      )
      .await;
      let res = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/ping").to_request()).await;
      assert!(res.status().is_success());
      assert_eq!(actix_test::read_body(res).await, web::Bytes::from_static(b"pong"));
   }
}
