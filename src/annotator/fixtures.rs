//! Local HTTP server serving canned upstream responses to annotators

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpServer, web};

use crate::model::SourceConfig;

pub(crate) struct FixtureServer {
    pub base_url: String,
    handle: ServerHandle,
}

impl FixtureServer {
    /// Bind an ephemeral port on loopback and serve `routes` from it.
    ///
    /// Must be called from inside an actix system (`#[actix_web::test]`).
    pub(crate) fn start<F>(routes: F) -> Self
    where
        F: Fn(&mut web::ServiceConfig) + Clone + Send + 'static,
    {
        let server = HttpServer::new(move || App::new().configure(routes.clone()))
            .workers(1)
            .disable_signals()
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];

        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://{}", addr),
            handle,
        }
    }

    /// Source configuration pointing at this server, without throttling
    pub(crate) fn source_config(&self) -> SourceConfig {
        SourceConfig {
            base_url: Some(self.base_url.clone()),
            min_interval_ms: Some(0),
            ..Default::default()
        }
    }

    pub(crate) async fn stop(self) {
        self.handle.stop(false).await;
    }
}
