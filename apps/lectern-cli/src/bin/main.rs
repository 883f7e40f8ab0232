use anyhow::Result;
use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use lectern_answer::prompts::location_label;
use lectern_answer::{build_generator, Orchestrator};
use lectern_core::chunker::{CharEstimator, Chunker, ChunkingConfig};
use lectern_core::config::{expand_path, Config, EmbeddingSettings};
use lectern_core::text::{normalize_whitespace, title_from_filename, truncate};
use lectern_core::traits::{Embedder, Retriever, TokenCounter, VectorStore};
use lectern_core::types::{FileType, MetadataFilter, Segment, SourceRef};
use lectern_embed::{build_embedder, SubwordCounter};
use lectern_lexical::LexicalHolder;
use lectern_retrieve::RetrievalEngine;
use lectern_store::LanceStore;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <ingest|ask|search|stats> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => ingest(&config, &args).await,
        "ask" => ask(&config, &args).await,
        "search" => search(&config, &args).await,
        "stats" => stats(&config).await,
        _ => {
            eprintln!("Unknown command: {cmd} (expected ingest|ask|search|stats)");
            std::process::exit(1);
        }
    }
}

async fn open_store(config: &Config, dim: usize) -> Result<LanceStore> {
    let data = config.data()?;
    Ok(LanceStore::open(&expand_path(&data.store_dir), &data.table, dim).await?)
}

/// Prefer the exact subword tokenizer shipped with the embedding model;
/// fall back to the character estimate when it is unavailable.
fn token_counter(embedding: &EmbeddingSettings) -> Box<dyn TokenCounter> {
    if let Some(dir) = &embedding.model_dir {
        let path = expand_path(dir).join("tokenizer.json");
        match SubwordCounter::from_file(&path) {
            Ok(counter) => return Box::new(counter),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "no subword tokenizer, estimating tokens by characters"
                );
            }
        }
    }
    Box::new(CharEstimator)
}

fn list_document_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        // Extraction of richer formats (PDF, SRT) happens upstream; the CLI
        // reads plain text sources directly.
        let supported = path
            .extension()
            .and_then(|s| s.to_str())
            .and_then(FileType::from_extension)
            .map(|t| matches!(t, FileType::Txt | FileType::Md))
            .unwrap_or(false);
        if supported {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

async fn ingest(config: &Config, args: &[String]) -> Result<()> {
    let data = config.data()?;
    let force = args.iter().any(|a| a == "--force");
    let data_dir = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(expand_path)
        .unwrap_or_else(|| expand_path(&data.data_dir));

    let chunking: ChunkingConfig = config.section("chunking")?;
    let embedding = config.embedding()?;
    let embedder = build_embedder(&embedding)?;
    let store = open_store(config, embedder.dim()).await?;
    let counter = token_counter(&embedding);
    let chunker = Chunker::new(chunking, counter.as_ref());

    let files = list_document_files(&data_dir);
    if files.is_empty() {
        println!("No supported documents under {}.", data_dir.display());
        return Ok(());
    }
    println!("Ingesting {} files from {}", files.len(), data_dir.display());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );

    let mut ingested = 0usize;
    let mut skipped = 0usize;
    let mut total_chunks = 0usize;
    for path in &files {
        pb.set_message(
            path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
        );
        let added =
            ingest_file(&store, embedder.as_ref(), &chunker, &data_dir, path, force).await?;
        if added > 0 {
            ingested += 1;
            total_chunks += added;
        } else {
            skipped += 1;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "✅ Ingest complete: {ingested} files, {total_chunks} chunks ({skipped} skipped)"
    );
    println!("📊 Store now holds {} segments", store.count().await?);
    Ok(())
}

async fn ingest_file(
    store: &LanceStore,
    embedder: &dyn Embedder,
    chunker: &Chunker<'_>,
    root: &Path,
    path: &Path,
    force: bool,
) -> Result<usize> {
    let Some(file_type) = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FileType::from_extension)
    else {
        return Ok(0);
    };
    let relative = path.strip_prefix(root).unwrap_or(path);
    let source_id = relative.to_string_lossy().replace('\\', "/");
    let filter = MetadataFilter::Source(source_id.clone());

    if force {
        store.delete_where(&filter).await?;
    } else if store.count_where(&filter).await? > 0 {
        tracing::info!(source = %source_id, "already indexed, skipping");
        return Ok(0);
    }

    let raw = std::fs::read_to_string(path)?;
    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        tracing::warn!(source = %source_id, "no text extracted");
        return Ok(0);
    }

    let title = title_from_filename(
        &path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
    );
    // The first directory under the data root names the course.
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    let course_id = (components.len() > 1).then(|| components[0].clone());

    let chunks: Vec<String> = chunker
        .split(&text)
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if chunks.is_empty() {
        return Ok(0);
    }

    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let segments: Vec<Segment> = chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| Segment {
            id: format!("{stem}_{}_c{i}", file_type.as_str()),
            text: chunk,
            source: SourceRef::unpaged(source_id.clone()),
            title: title.clone(),
            file_type,
            course_id: course_id.clone(),
        })
        .collect();

    let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts)?;
    store.upsert(&segments, &vectors).await?;
    tracing::info!(source = %source_id, chunks = segments.len(), "ingested");
    Ok(segments.len())
}

async fn build_engine(config: &Config) -> Result<(Arc<RetrievalEngine>, f32)> {
    let retrieval = config.retrieval()?.validated()?;
    let embedding = config.embedding()?;
    let embedder = build_embedder(&embedding)?;
    let store = Arc::new(open_store(config, embedder.dim()).await?);
    let lexical = retrieval.use_lexical_fusion.then(|| Arc::new(LexicalHolder::new()));
    let threshold = retrieval.score_threshold;
    let engine = RetrievalEngine::new(store, embedder, lexical, retrieval)?;
    Ok((Arc::new(engine), threshold))
}

async fn ask(config: &Config, args: &[String]) -> Result<()> {
    let Some(question) = args.first().cloned() else {
        eprintln!("Usage: lectern ask \"<question>\"");
        std::process::exit(1);
    };
    let (engine, threshold) = build_engine(config).await?;
    let generator = build_generator(&config.generation()?)?;
    let orchestrator = Orchestrator::new(engine, generator, threshold);

    let answer = orchestrator.answer(&question).await;

    println!("[{} | {}]", answer.mode, answer.backend);
    println!();
    println!("{}", answer.text);
    if !answer.citations.is_empty() {
        println!();
        println!("Sources: {}", answer.citations_text);
    }
    if let Some(confidence) = answer.confidence {
        println!("Confidence: {:.1}%", confidence * 100.0);
    }
    println!(
        "Timing: total {:?} (retrieval {:?}, generation {:?})",
        answer.timing.total, answer.timing.retrieval, answer.timing.generation
    );
    Ok(())
}

async fn search(config: &Config, args: &[String]) -> Result<()> {
    let Some(query) = args.first().cloned() else {
        eprintln!("Usage: lectern search \"<query>\"");
        std::process::exit(1);
    };
    let (engine, _) = build_engine(config).await?;
    let results = engine.retrieve(&query).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            i + 1,
            result.score,
            result.segment.title,
            location_label(&result.segment)
        );
        println!("   {}", truncate(&result.segment.text, 160));
    }
    Ok(())
}

async fn stats(config: &Config) -> Result<()> {
    let embedding = config.embedding()?;
    let store = open_store(config, embedding.dim).await?;
    let count = store.count().await?;
    let segments = store.scan().await?;
    let sources: BTreeSet<&str> =
        segments.iter().map(|s| s.source.source_id.as_str()).collect();

    println!("Segments: {count}");
    println!("Sources:  {}", sources.len());
    for source in sources {
        println!("  - {source}");
    }
    Ok(())
}
