//! IMDS CLI Entry Point
//!
//! Command-line interface for the machining decision system.

use std::process;

#[tokio::main]
async fn main() {
    match imds_interface::run_cli().await {
        Ok(status) => {
            let code = status.exit_code();
            if code != 0 {
                process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
