//! Background removal invoker
//!
//! Reads an image on stdin and writes it with the background removed to stdout.

use bgremove_invoker::cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    std::panic::set_hook(Box::new(|info| {
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        eprintln!("Fatal error: {message}");
        std::process::exit(1);
    }));

    cli::main().await
}
