//
// main.rs
// Perphix-Deid
//
// Binary entry point that hands off execution to the CLI layer.
//

use perphix_deid::cli;

fn main() -> anyhow::Result<()> {
    cli::run()
}
