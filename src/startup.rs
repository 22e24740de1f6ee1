use std::net::TcpListener;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

use crate::configuration::{ApplicationSettings, Settings, WebhookSettings};
use crate::database::get_connection_pool;
use crate::email_client::{GenericEmailService, SmtpEmailClient};
use crate::middleware::SaveRequestResponse;
use crate::order_store::{OrderStore, PgOrderStore};
use crate::payment_client::{PaymentProcessor, StripeClient};
use crate::routes::main_route;

/// External collaborators shared by every worker.
#[derive(Clone)]
pub struct AppServices {
    pub order_store: Arc<dyn OrderStore>,
    pub payment_processor: Arc<dyn PaymentProcessor>,
    pub email_client: Arc<dyn GenericEmailService>,
}

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);
        let payment_processor = StripeClient::new(&configuration.payment)
            .context("Failed to build payment processor client")?;
        let email_client = SmtpEmailClient::new(&configuration.email)
            .context("Failed to build SMTP client")?;
        let services = AppServices {
            order_store: Arc::new(PgOrderStore::new(connection_pool)),
            payment_processor: Arc::new(payment_processor),
            email_client: Arc::new(email_client),
        };
        Self::build_with_services(
            configuration.application,
            configuration.payment.webhook,
            services,
        )
    }

    pub fn build_with_services(
        application: ApplicationSettings,
        webhook: WebhookSettings,
        services: AppServices,
    ) -> Result<Self, anyhow::Error> {
        let address = format!("{}:{}", application.host, application.port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();
        tracing::info!("Listening on {}:{}", application.host, port);
        let server = run(listener, application, webhook, services)?;
        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

fn build_cors(origins: &[String]) -> Cors {
    if origins.iter().any(|origin| origin == "*") {
        return Cors::permissive();
    }
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

fn run(
    listener: TcpListener,
    application: ApplicationSettings,
    webhook: WebhookSettings,
    services: AppServices,
) -> Result<Server, anyhow::Error> {
    let order_store = web::Data::from(services.order_store);
    let payment_processor = web::Data::from(services.payment_processor);
    let email_client = web::Data::from(services.email_client);
    let webhook_setting = web::Data::new(webhook);
    let cors_origins = application.cors_origins.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(SaveRequestResponse)
            .wrap(build_cors(&cors_origins))
            .wrap(TracingLogger::default())
            .app_data(order_store.clone())
            .app_data(payment_processor.clone())
            .app_data(email_client.clone())
            .app_data(webhook_setting.clone())
            .configure(main_route)
    })
    .workers(application.workers)
    .listen(listener)?
    .run();

    Ok(server)
}
