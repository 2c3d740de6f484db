use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use saga_lineage::genealogy::{
    DisplayPolicy, FamilyId, Filters, IconMode, KingdomId, LayoutConfig, Point,
};
use saga_lineage::genealogy::generate::{generate_document, GeneratorConfig};
use saga_lineage::genealogy::persistence::{load_document, save_document, JsonFileStore};

#[derive(Parser, Debug)]
#[command(name = "saga_lineage")]
#[command(about = "Lay out the family trees of a saga document")]
struct Args {
    /// Document JSON to load (a random demo document is generated if omitted)
    #[arg(short, long)]
    document: Option<PathBuf>,

    /// Seed for the demo document (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Generations below the founders in the demo document
    #[arg(long, default_value = "3")]
    generations: u32,

    /// Founding couples in the demo document
    #[arg(long, default_value = "3")]
    founders: usize,

    /// Lay out only this family instead of the whole canvas
    #[arg(short, long)]
    family: Option<u64>,

    /// Spacing configuration JSON (missing fields keep their defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the layout result as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the document to this JSON file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Only draw members of these kingdoms (repeatable)
    #[arg(long = "kingdom")]
    kingdoms: Vec<u64>,

    /// Only draw these families on the canvas (repeatable)
    #[arg(long = "show-family")]
    show_families: Vec<u64>,

    /// Leave root-2 out of each family layout
    #[arg(long)]
    no_root_partners: bool,

    /// Do not bridge partners across families
    #[arg(long)]
    no_connect: bool,

    /// Draw every family, even redundant founder families
    #[arg(long)]
    explode: bool,

    /// Do not draw crowns above rulers
    #[arg(long)]
    hide_rulers: bool,

    /// Do not draw family name labels
    #[arg(long)]
    hide_family_names: bool,

    /// Draw name plates instead of portraits
    #[arg(long)]
    names: bool,
}

impl Args {
    fn policy(&self) -> DisplayPolicy {
        DisplayPolicy {
            include_root_partners: !self.no_root_partners,
            connect_partners: !self.no_connect,
            explode: self.explode,
            show_rulers: !self.hide_rulers,
            show_family_names: !self.hide_family_names,
            icon_mode: if self.names { IconMode::Name } else { IconMode::Image },
        }
    }

    fn filters(&self) -> Filters {
        let kingdoms: BTreeSet<KingdomId> = self.kingdoms.iter().map(|k| KingdomId(*k)).collect();
        let families: BTreeSet<FamilyId> = self.show_families.iter().map(|f| FamilyId(*f)).collect();
        Filters {
            families: (!families.is_empty()).then_some(families),
            kingdoms: (!kingdoms.is_empty()).then_some(kingdoms),
        }
    }
}

fn load_config(path: &Path) -> Result<LayoutConfig, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("reading {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("parsing {}: {}", path.display(), e))
}

fn run(args: &Args) -> Result<(), String> {
    let mut doc = match &args.document {
        Some(path) => {
            println!("Loading document from {}", path.display());
            load_document(&JsonFileStore::new(path)).map_err(|e| e.to_string())?
        }
        None => {
            let seed = args.seed.unwrap_or_else(rand::random);
            println!("Generating demo document with seed: {}", seed);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let config = GeneratorConfig {
                generations: args.generations,
                founders: args.founders,
                ..GeneratorConfig::default()
            };
            generate_document(&config, &mut rng).map_err(|e| e.to_string())?
        }
    };

    if let Some(path) = &args.config {
        doc.set_config(load_config(path)?);
        info!(path = %path.display(), "spacing configuration loaded");
    }
    println!("{}", doc.summary());

    let policy = args.policy();
    let filters = args.filters();
    doc.set_filters(filters.clone()).map_err(|e| e.to_string())?;

    let json = match args.family {
        Some(id) => {
            let family = FamilyId(id);
            let layout = doc.layout(family, Point::default(), &policy).map_err(|e| e.to_string())?;
            println!(
                "{}: {} nodes, {} segments, {:.0} x {:.0}",
                family,
                layout.positions.len(),
                layout.segments.len(),
                layout.bbox.width(),
                layout.bbox.height()
            );
            serde_json::to_string_pretty(&layout)
        }
        None => {
            let canvas = doc.arrange_canvas(&policy, &filters).map_err(|e| e.to_string())?;
            println!(
                "Canvas: {} families ({} hidden, {} truncated), {} bridges, {:.0} x {:.0}",
                canvas.families.len(),
                canvas.hidden_families.len(),
                canvas.truncated.len(),
                canvas.bridges.len(),
                canvas.bbox.width(),
                canvas.bbox.height()
            );
            for placed in &canvas.families {
                println!("  {} {:<28} {} nodes", placed.family, placed.name, placed.layout.positions.len());
            }
            serde_json::to_string_pretty(&canvas)
        }
    }
    .map_err(|e| format!("serializing layout: {}", e))?;

    if let Some(path) = &args.output {
        fs::write(path, json).map_err(|e| format!("writing {}: {}", path.display(), e))?;
        println!("Layout written to {}", path.display());
    }
    if let Some(path) = &args.save {
        save_document(&doc, &mut JsonFileStore::new(path)).map_err(|e| e.to_string())?;
        println!("Document saved to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
