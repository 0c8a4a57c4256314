use kakasaku::{ConfigBuilder, server};

#[tokio::main]
async fn main() {
    let config = match ConfigBuilder::new().from_env().build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kakasaku: invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    kakasaku::init_tracing_with_config(&config);

    if let Err(e) = server::serve(config).await {
        tracing::error!(target: "kakasaku::server", error = %e, "Server exited with error");
        std::process::exit(1);
    }
}
