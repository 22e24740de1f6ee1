use storefront_checkout::{
    commands::run_custom_commands,
    configuration::get_configuration,
    startup::Application,
    telemetry::{get_json_subscriber, get_subscriber, init_subscriber},
};

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    let configuration = get_configuration().expect("Failed to read configuration.");
    if configuration.application.json_log {
        let subscriber = get_json_subscriber(
            "storefront-checkout".into(),
            configuration.application.log_level.clone(),
            std::io::stdout,
        );
        init_subscriber(subscriber);
    } else {
        let subscriber =
            get_subscriber(configuration.application.log_level.clone(), std::io::stdout);
        init_subscriber(subscriber);
    }

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        run_custom_commands(args, &configuration).await?;
    } else {
        let application = Application::build(configuration).await?;
        application.run_until_stopped().await?;
    }
    Ok(())
}
