//! Risk field engine toolbox
//!
//! Usage:
//!   riskfield seed --store field.json
//!   riskfield observe --store field.json --lat 51.5 --lng -0.1 \
//!                     --category crime --score 0.8
//!   riskfield render --store field.json --zoom 15 --lat 51.5 --lng -0.1 -o tile.png
//!   riskfield route --store field.json --graph-source graph.json \
//!                   --from-lng -0.1410 --from-lat 51.5154 \
//!                   --to-lng -0.1238 --to-lat 51.5308 --lambda 0.5

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use field_cli::{record_observation, seed_store, SeedConfig};
use heat_tiles::{TileAddress, TileRenderer};
use risk_field::RiskField;
use risk_model::FieldConfig;
use risk_store::RiskStore;
use safe_routing::{load_or_fetch, FileGraphSource, RiskRouter, RouteRequest};

#[derive(Parser, Debug)]
#[command(name = "riskfield", about = "Geospatial risk field engine toolbox")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed a store snapshot with a deterministic synthetic field
    Seed {
        /// Store snapshot to create or extend
        #[arg(long, default_value = "field.json")]
        store: PathBuf,

        /// RNG seed
        #[arg(long, default_value_t = 1337)]
        seed: u64,

        /// Grid resolution in meters
        #[arg(long, default_value_t = 250.0)]
        grid_step_m: f64,
    },
    /// Blend one observed category score into a store snapshot
    Observe {
        #[arg(long, default_value = "field.json")]
        store: PathBuf,

        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lng: f64,

        /// Category label; unrecognized labels collapse to "other"
        #[arg(long)]
        category: String,

        /// Observed score in [0, 1]
        #[arg(long)]
        score: f64,

        /// EMA blend factor; defaults to the configured 0.25
        #[arg(long)]
        alpha: Option<f64>,
    },
    /// Render the heat tile containing a coordinate to a PNG file
    Render {
        #[arg(long, default_value = "field.json")]
        store: PathBuf,

        #[arg(long)]
        zoom: u32,

        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lng: f64,

        #[arg(short, long, default_value = "tile.png")]
        output: PathBuf,
    },
    /// Compute a risk-weighted route and print it as JSON
    Route {
        #[arg(long, default_value = "field.json")]
        store: PathBuf,

        /// Local road-graph cache file
        #[arg(long, default_value = "road_graph_cache.json")]
        graph_cache: PathBuf,

        /// Road-graph source file (region network as JSON)
        #[arg(long, default_value = "road_graph.json")]
        graph_source: PathBuf,

        #[arg(long, default_value = "london")]
        region: String,

        #[arg(long)]
        from_lng: f64,

        #[arg(long)]
        from_lat: f64,

        #[arg(long)]
        to_lng: f64,

        #[arg(long)]
        to_lat: f64,

        /// 0 = shortest distance, 1 = pure risk avoidance
        #[arg(long, default_value_t = 0.5)]
        lambda: f64,
    },
}

fn open_store(path: &Path) -> Result<RiskStore> {
    if path.exists() {
        RiskStore::load(path).with_context(|| format!("loading store snapshot {}", path.display()))
    } else {
        warn!(path = %path.display(), "no store snapshot found, starting empty");
        Ok(RiskStore::new())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Seed {
            store,
            seed,
            grid_step_m,
        } => {
            let field_store = open_store(&store)?;
            let config = SeedConfig {
                seed,
                grid_step_m,
                ..SeedConfig::default()
            };
            let written = seed_store(&field_store, &config)?;
            field_store.save(&store)?;
            info!(written, path = %store.display(), "store snapshot written");
        }
        Command::Observe {
            store,
            lat,
            lng,
            category,
            score,
            alpha,
        } => {
            let field_store = open_store(&store)?;
            record_observation(&field_store, lat, lng, &category, score, alpha)?;
            field_store.save(&store)?;
            info!(path = %store.display(), "store snapshot written");
        }
        Command::Render {
            store,
            zoom,
            lat,
            lng,
            output,
        } => {
            let field_store = Arc::new(open_store(&store)?);
            let renderer = TileRenderer::new(field_store, FieldConfig::default());

            let tile = TileAddress::containing(lat, lng, zoom);
            let png = renderer.render_png(tile)?;
            std::fs::write(&output, &png)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(
                z = tile.z,
                x = tile.x,
                y = tile.y,
                bytes = png.len(),
                path = %output.display(),
                "tile rendered"
            );
        }
        Command::Route {
            store,
            graph_cache,
            graph_source,
            region,
            from_lng,
            from_lat,
            to_lng,
            to_lat,
            lambda,
        } => {
            let field_store = Arc::new(open_store(&store)?);

            let source = FileGraphSource::new(graph_source);
            let graph = Arc::new(
                load_or_fetch(&graph_cache, &source, &region)
                    .context("road graph unavailable, refusing to route")?,
            );

            let field = RiskField::new(field_store, FieldConfig::default());
            let router = RiskRouter::new(graph, field);
            let response = router.route(&RouteRequest {
                start: (from_lng, from_lat),
                end: (to_lng, to_lat),
                lambda,
            })?;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
