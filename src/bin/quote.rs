use std::sync::Arc;

use smartride::{
    backend::RideApi,
    config::Config,
    maps::GoogleMaps,
    pipeline::{Collaborators, QuotePipeline},
};

/// Prints the quote between two addresses as json.
///
/// usage: quote <pickup address> <drop address>
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let (Some(pickup), Some(drop)) = (args.next(), args.next()) else {
        eprintln!("usage: quote <pickup address> <drop address>");
        std::process::exit(2);
    };

    let config = Config::from_env().expect("failed to read configuration");

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .unwrap();
    let maps = Arc::new(GoogleMaps::new(
        client.clone(),
        &config.google_maps_api_base,
        &config.google_maps_api_key,
    ));
    let api = Arc::new(RideApi::new(client, &config.api_base_url));

    let pipeline = QuotePipeline::new(
        Collaborators {
            geocoder: maps.clone(),
            directions: maps,
            pricing: api.clone(),
            bookings: api,
        },
        &config.cache,
        &config.driver_placeholder,
    );

    let result = async {
        let pickup = pipeline.resolve_address(&pickup).await?;
        let drop = pipeline.resolve_address(&drop).await?;
        let quote = pipeline.get_quote(pickup, drop).await?;
        Ok::<_, Box<dyn std::error::Error>>(quote)
    }
    .await;

    match result {
        Ok(quote) => println!("{}", serde_json::to_string_pretty(&quote).unwrap()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
