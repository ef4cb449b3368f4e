use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use fieldmap_cli::source::read_source_fields;
use fieldmap_map::{MapperConfig, MappingEngine};
use fieldmap_model::{EntitySchema, SchemaRegistry};
use tokio::runtime::Runtime;
use tracing::{info, info_span};

use crate::cli::{Cli, DetectArgs, MapArgs, OutputFormatArg, RebuildArgs, SuggestArgs};
use crate::summary::{print_candidates, print_entity_scores, print_mapping, print_schemas};

/// Configuration, schemas and engine shared by every command.
pub struct Session {
    pub config: MapperConfig,
    pub registry: SchemaRegistry,
    pub engine: MappingEngine,
}

impl Session {
    /// Loads configuration and builds the engine. Must run outside the async
    /// runtime: the HTTP embedding client is blocking.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => MapperConfig::load(path).context("load config")?,
            None => MapperConfig::default(),
        }
        .with_env_overrides();
        if let Some(dir) = &cli.schema_dir {
            config.schema_dir = Some(dir.clone());
        }

        let registry = config.build_registry().context("load schemas")?;
        let engine = config.build_engine().context("build mapping engine")?;
        info!(
            entities = registry.len(),
            semantic = engine.semantic().is_some(),
            reasoning = engine.reasoning().is_some(),
            "session ready"
        );
        Ok(Self {
            config,
            registry,
            engine,
        })
    }

    fn schema(&self, entity: &str) -> Result<&EntitySchema> {
        self.registry.get(entity).with_context(|| {
            format!("unknown entity (known: {})", self.registry.entities().join(", "))
        })
    }
}

pub fn run_map(session: &Session, args: &MapArgs) -> Result<()> {
    let sources = read_source_fields(&args.csv, args.samples)?;
    let span = info_span!("map", file = %args.csv.display());
    let _guard = span.enter();

    let entity = match &args.entity {
        Some(entity) => entity.clone(),
        None => {
            let scores = session.engine.detect_entity(&sources, &session.registry);
            let Some(best) = scores.first() else {
                bail!("no schemas are registered");
            };
            info!(entity = %best.entity, score = best.score, "detected entity");
            best.entity.clone()
        }
    };
    let schema = session.schema(&entity)?;
    let hints: HashMap<String, _> = args.hints.iter().cloned().collect();
    let min_confidence = args
        .min_confidence
        .unwrap_or(session.config.thresholds.min_confidence);

    let runtime = build_runtime()?;
    let outcome = runtime.block_on(session.engine.auto_map(&sources, schema, min_confidence, &hints));
    drop(runtime);

    match args.format {
        OutputFormatArg::Table => print_mapping(&outcome, session.engine.thresholds()),
        OutputFormatArg::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(())
}

pub fn run_detect(session: &Session, args: &DetectArgs) -> Result<()> {
    let sources = read_source_fields(&args.csv, 0)?;
    let scores = session.engine.detect_entity(&sources, &session.registry);
    match args.format {
        OutputFormatArg::Table => print_entity_scores(&scores),
        OutputFormatArg::Json => println!("{}", serde_json::to_string_pretty(&scores)?),
    }
    Ok(())
}

pub fn run_suggest(session: &Session, args: &SuggestArgs) -> Result<()> {
    let schema = session.schema(&args.entity)?;
    let candidates = session
        .engine
        .suggest_corrections(&args.column, schema, &args.exclude, args.top_k);
    match args.format {
        OutputFormatArg::Table => print_candidates(&args.column, &candidates),
        OutputFormatArg::Json => println!("{}", serde_json::to_string_pretty(&candidates)?),
    }
    Ok(())
}

pub fn run_schemas(session: &Session) -> Result<()> {
    print_schemas(session.registry.iter());
    Ok(())
}

pub fn run_rebuild(session: &Session, args: &RebuildArgs) -> Result<()> {
    let schemas: Vec<&EntitySchema> = match &args.entity {
        Some(entity) => vec![session.schema(entity)?],
        None => session.registry.iter().collect(),
    };
    for schema in schemas {
        let fields = session
            .engine
            .rebuild_embeddings(schema)
            .with_context(|| format!("rebuild embeddings for {}", schema.entity()))?;
        println!("{}: embedded {fields} field(s)", schema.entity());
    }
    Ok(())
}

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")
}
