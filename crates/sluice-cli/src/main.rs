#[tokio::main]
async fn main() {
    let exit_code = sluice_cli::run().await;
    std::process::exit(exit_code);
}
