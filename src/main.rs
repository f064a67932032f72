mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use std::fs;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let output_path = cli.output.clone().unwrap_or_else(|| {
        let mut path = cli.input.clone();
        path.set_extension("svg");
        path
    });

    let params = match &cli.params {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading parameters from {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing parameters from {}", path.display()))?
        }
        None => cli.to_params()?,
    };

    let image = vectrace::load_image(&cli.input)
        .with_context(|| format!("decoding {}", cli.input.display()))?;

    let svg = if cli.posterize {
        vectrace::posterize(&image, &params)?
    } else {
        vectrace::trace(&image, &params.trace)?
    };

    fs::write(&output_path, svg)
        .with_context(|| format!("writing {}", output_path.display()))?;

    println!(
        "Traced {} into {}",
        cli.input.display(),
        output_path.display()
    );
    Ok(())
}
