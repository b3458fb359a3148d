use std::collections::HashSet;
use std::fs::read_to_string;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use process::{GeometryProcessor, ProcessedElement, Projection, Stream, to_feature};
use rayon::iter::ParallelIterator;
use rayon::slice::ParallelSlice;
use transform::ExportTable;
use types::{Element, ElementKind, PipelineConfig, WayId};
use util::{RocksStore, StoreWriter};

#[derive(Parser)]
#[command(version, about, long_about)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk-load a PBF file into the element store.
    Load {
        #[arg(short, long)]
        osm_pbf_file: String,

        #[arg(short, long)]
        store_path: String,
    },
    /// Stream elements through the pipeline and write GeoJSON features.
    Process {
        #[arg(short, long)]
        osm_pbf_file: String,

        #[arg(short, long)]
        store_path: String,

        #[arg(short, long)]
        config_path: String,

        #[arg(short, long)]
        features_output_path: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Args::parse();

    match cli.command {
        Commands::Load {
            osm_pbf_file,
            store_path,
        } => {
            let start = Instant::now();
            let writer = StoreWriter::create(&store_path)?;
            let stats = extract::load_store(&osm_pbf_file, &writer)?;
            println!(
                "Loaded {} nodes, {} ways, {} relations in {:.2?}",
                stats.nodes,
                stats.ways,
                stats.relations,
                start.elapsed()
            );
        }
        Commands::Process {
            osm_pbf_file,
            store_path,
            config_path,
            features_output_path,
        } => {
            let config = pipeline_config(&config_path)?;
            let processor = GeometryProcessor::create(&config.geometry_type, config.srid)?;
            let projection = Projection::from_srid(config.srid)?;
            let rules = match &config.export_rules {
                Some(path) => ExportTable::from_json_file(path)?,
                None => ExportTable::default_table(),
            };
            // fail fast on a bad backend before any reading starts; each
            // worker stream constructs its own instance later
            transform::create(config.tag_script.as_deref())?;
            let store = RocksStore::open_read_only(&store_path)?;

            let mut features: Vec<String> = Vec::new();
            let mut superseded: HashSet<WayId> = HashSet::new();

            // Relations run first so member ways they supersede are known
            // before the standalone way pass.
            if processor.interests_in(ElementKind::Relation) {
                let start = Instant::now();
                let relations: Vec<Element> = extract::read_relations(&osm_pbf_file)?
                    .into_iter()
                    .map(Element::Relation)
                    .collect();
                let processed = process_elements(
                    &relations,
                    &config,
                    &processor,
                    &rules,
                    &store,
                    projection,
                );
                for item in &processed {
                    superseded.extend(item.superseded_ways.iter().copied());
                }
                println!(
                    "Relations: {} features from {} elements in {:.2?}",
                    processed.len(),
                    relations.len(),
                    start.elapsed()
                );
                features.extend(processed.iter().map(|item| to_feature(item).to_string()));
            }

            if processor.interests_in(ElementKind::Way) {
                let start = Instant::now();
                let ways: Vec<Element> = extract::read_ways(&osm_pbf_file)?
                    .into_iter()
                    .filter(|way| !superseded.contains(&way.id))
                    .map(Element::Way)
                    .collect();
                let processed = process_elements(
                    &ways,
                    &config,
                    &processor,
                    &rules,
                    &store,
                    projection,
                );
                println!(
                    "Ways: {} features from {} elements in {:.2?}",
                    processed.len(),
                    ways.len(),
                    start.elapsed()
                );
                features.extend(processed.iter().map(|item| to_feature(item).to_string()));
            }

            if processor.interests_in(ElementKind::Node) {
                let start = Instant::now();
                let nodes: Vec<Element> = extract::read_nodes(&osm_pbf_file)?
                    .into_iter()
                    .map(Element::Node)
                    .collect();
                let processed = process_elements(
                    &nodes,
                    &config,
                    &processor,
                    &rules,
                    &store,
                    projection,
                );
                println!(
                    "Nodes: {} features from {} elements in {:.2?}",
                    processed.len(),
                    nodes.len(),
                    start.elapsed()
                );
                features.extend(processed.iter().map(|item| to_feature(item).to_string()));
            }

            std::fs::write(&features_output_path, features.join("\n"))?;
            println!(
                "Wrote {} features to {}",
                features.len(),
                features_output_path
            );
        }
    }
    Ok(())
}

/// Fans element batches across worker streams; each stream owns its own
/// assembler scratch state and transform instance.
fn process_elements(
    elements: &[Element],
    config: &PipelineConfig,
    processor: &GeometryProcessor,
    rules: &ExportTable,
    store: &RocksStore,
    projection: Projection,
) -> Vec<ProcessedElement> {
    elements
        .par_chunks(1024)
        .map_init(
            || {
                let transform = transform::create(config.tag_script.as_deref())
                    .expect("transform backend validated at startup");
                Stream::new(
                    processor,
                    transform,
                    rules,
                    store,
                    projection,
                    config.allow_typeless,
                )
            },
            |stream, chunk| {
                chunk
                    .iter()
                    .flat_map(|element| stream.process(element))
                    .collect::<Vec<ProcessedElement>>()
            },
        )
        .flatten()
        .collect()
}

fn pipeline_config(config_path: &str) -> Result<PipelineConfig> {
    let config_str = read_to_string(config_path)
        .with_context(|| format!("reading pipeline config {config_path}"))?;
    serde_json::from_str(&config_str).context("parsing pipeline config")
}
