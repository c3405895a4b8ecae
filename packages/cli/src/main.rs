#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the hazard shapefile converter.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hazard_shp_cli_utils::{IndicatifProgress, MultiProgress, init_logger};
use hazard_shp_convert::config::ConvertConfig;
use hazard_shp_convert::{
    ConvertError, nrml_to_shapefiles, parse_area_source_shp, shapefile_to_nrml,
};
use hazard_shp_source_models::MfdKind;
use hazard_shp_table::{AttributeSchema, CountMode};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "hazard_shp",
    about = "Convert seismic area sources between NRML and ESRI shapefiles"
)]
struct Cli {
    /// TOML configuration file. Command line flags take precedence.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the area sources of an NRML file as one shapefile per MFD type
    NrmlToShp {
        /// NRML source model file
        input: PathBuf,
        /// Directory receiving `<prefix>_as_trgr.shp` and `<prefix>_as_incr.shp`
        out_dir: PathBuf,
        /// Prefix for the output file names
        #[arg(long)]
        prefix: Option<String>,
        /// Store each source's own `num_npd`/`num_hdd` instead of the table maximum
        #[arg(long)]
        per_row_counts: bool,
    },
    /// Convert an area source shapefile to an NRML file
    ShpToNrml {
        /// Area source shapefile (`.shp`)
        input: PathBuf,
        /// NRML file to write
        output: PathBuf,
        /// Read polygons only and fill every other field with placeholders
        #[arg(long)]
        only_geometry: bool,
        /// Source model name (defaults to the input file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the sources of an area source shapefile as JSON
    Inspect {
        /// Area source shapefile (`.shp`)
        input: PathBuf,
        /// Read polygons only and fill every other field with placeholders
        #[arg(long)]
        only_geometry: bool,
    },
    /// Print the shapefile columns an NRML file would produce
    Schema {
        /// NRML source model file
        input: PathBuf,
    },
}

/// One output table as reported by `schema`.
#[derive(Serialize)]
struct TableLayout {
    table: &'static str,
    sources: usize,
    numbered_columns: usize,
    schema: AttributeSchema,
}

fn main() -> ExitCode {
    let multi = init_logger();
    let cli = Cli::parse();

    match run(cli, &multi) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {} failed: {e}", e.stage());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, multi: &MultiProgress) -> Result<(), ConvertError> {
    let mut config = match &cli.config {
        Some(path) => ConvertConfig::load(path)?,
        None => ConvertConfig::default(),
    };

    match cli.command {
        Commands::NrmlToShp {
            input,
            out_dir,
            prefix,
            per_row_counts,
        } => {
            if prefix.is_some() {
                config.write.prefix = prefix;
            }
            if per_row_counts {
                config.write.count_mode = CountMode::PerRow;
            }

            let progress = IndicatifProgress::features_bar(multi, "Writing area sources");
            let paths = nrml_to_shapefiles(&input, &out_dir, &config.write, &progress)?;
            for path in paths {
                println!("{}", path.display());
            }
        }
        Commands::ShpToNrml {
            input,
            output,
            only_geometry,
            name,
        } => {
            config.read.only_geometry |= only_geometry;

            let progress = IndicatifProgress::features_bar(multi, "Reading area sources");
            let model = shapefile_to_nrml(&input, &output, name, &config.read, &progress)?;
            log::info!(
                "Converted {} area sources to {}",
                model.sources.len(),
                output.display()
            );
        }
        Commands::Inspect {
            input,
            only_geometry,
        } => {
            config.read.only_geometry |= only_geometry;

            let progress = IndicatifProgress::features_bar(multi, "Reading area sources");
            let sources = parse_area_source_shp(&input, &config.read, &progress)?;
            print_json(&sources)?;
        }
        Commands::Schema { input } => {
            let model = hazard_shp_nrml::read_source_model(&input)?;
            let layouts: Vec<TableLayout> = MfdKind::ALL
                .iter()
                .filter_map(|&kind| {
                    let sources = model.sources_of_kind(kind).count();
                    (sources > 0).then(|| {
                        let schema = AttributeSchema::derive(kind, &model.sources);
                        TableLayout {
                            table: kind.table_suffix(),
                            sources,
                            numbered_columns: schema.numbered_column_count(),
                            schema,
                        }
                    })
                })
                .collect();
            print_json(&layouts)?;
        }
    }

    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<(), ConvertError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).map_err(std::io::Error::from)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nrml_to_shp_flags() {
        let cli = Cli::try_parse_from([
            "hazard_shp",
            "nrml-to-shp",
            "model.xml",
            "out",
            "--prefix",
            "italy",
            "--per-row-counts",
            "--config",
            "hazard_shp.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("hazard_shp.toml")));
        let Commands::NrmlToShp {
            input,
            out_dir,
            prefix,
            per_row_counts,
        } = cli.command
        else {
            panic!("expected nrml-to-shp");
        };
        assert_eq!(input, PathBuf::from("model.xml"));
        assert_eq!(out_dir, PathBuf::from("out"));
        assert_eq!(prefix.as_deref(), Some("italy"));
        assert!(per_row_counts);
    }

    #[test]
    fn shp_to_nrml_requires_output() {
        assert!(Cli::try_parse_from(["hazard_shp", "shp-to-nrml", "in.shp"]).is_err());
    }
}
