//! kodegen_bundler_node - package a Node.js project with a portable runtime.

use kodegen_bundler_node::cli;
use kodegen_bundler_node::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            let output = OutputManager::new();
            output.error(&format!("{} failed: {e}", e.stage()));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    output.indent(&suggestion);
                }
            }

            process::exit(1);
        }
    }
}
