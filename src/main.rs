use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dotenv::dotenv;
use futures::StreamExt;
use ragrelay::api::{self, AppState};
use ragrelay::config::{AppConfig, EmbeddingBackend, VectorBackend};
use ragrelay::database::{InMemoryVectorStore, QdrantSettings, QdrantStore, VectorStore};
use ragrelay::llm::{
    ConversationMessage, Embedder, GenerationStreamEvent, HashEmbedder, OpenAIEmbedder,
    StreamingRelay,
};
use ragrelay::providers::{openai_client, OpenAIProvider};
use ragrelay::{ChatEngine, Chunker, Document, PersonaProfile, PromptComposer, RagPipeline};
use serde_json::{Map, Value};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Retrieval-augmented chat over your documents", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long, default_value = "3000")]
        port: u16,
    },
    /// Chunk, embed and index a text file
    Ingest {
        file: PathBuf,
        /// JSON object stored with every chunk
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Answer a question and stream the reply to stdout
    Ask {
        question: String,
        /// Use the OpenRouter Llama profile
        #[arg(long)]
        llama: bool,
    },
    /// Print every indexed chunk
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    let state = build_state(&config)?;

    match args.command.unwrap_or(Command::Serve { port: 3000 }) {
        Command::Serve { port } => run_api_server(state, &config, port).await,
        Command::Ingest { file, metadata } => ingest_file(&state, &file, metadata.as_deref()).await,
        Command::Ask { question, llama } => ask(&state, &question, llama).await,
        Command::List => list_documents(&state).await,
    }
}

fn build_state(config: &AppConfig) -> Result<AppState> {
    let openai = config
        .openai
        .api_key
        .as_deref()
        .map(|key| openai_client(key, config.openai.api_url.as_deref()));

    let embedder: Arc<dyn Embedder> = match (config.embedding_backend, &openai) {
        (EmbeddingBackend::Hash, _) => Arc::new(HashEmbedder::new(config.embedding_dimensions)),
        (EmbeddingBackend::OpenAI, Some(client)) => Arc::new(OpenAIEmbedder::new(
            client.clone(),
            config.openai.embedding_model.clone(),
            config.embedding_dimensions,
        )),
        (EmbeddingBackend::OpenAI, None) => return Err(anyhow!("OPENAI_API_KEY must be set")),
    };

    let store: Arc<dyn VectorStore> = match config.vector_backend {
        VectorBackend::Qdrant => Arc::new(QdrantStore::new(QdrantSettings {
            url: config.qdrant_url.clone(),
            api_key: config.qdrant_api_key.clone(),
            collection: config.index_name.clone(),
            dimensions: config.embedding_dimensions,
            page_size: config.list_page_size,
        })),
        VectorBackend::Memory => Arc::new(InMemoryVectorStore::new(config.embedding_dimensions)),
    };
    info!(
        embedder = embedder.name(),
        store = store.backend(),
        index = %config.index_name,
        "initialised retrieval backends"
    );

    let pipeline = RagPipeline::new(Chunker::new(config.chunk_max_length)?, embedder, store)?
        .with_top_k(config.top_k)
        .with_similarity_threshold(config.similarity_threshold)
        .with_concurrency(config.ingest_concurrency);

    let general = load_persona(config.persona_file.as_deref(), PersonaProfile::general)?;
    let constitution = load_persona(config.llama_persona_file.as_deref(), PersonaProfile::constitution)?;

    let chat = openai.map(|client| {
        ChatEngine::new(
            pipeline.retriever().clone(),
            PromptComposer::new(general.clone()),
            StreamingRelay::new(Arc::new(OpenAIProvider::new(client)), config.relay_buffer),
            config.openai.chat_model.clone(),
            config.top_k,
        )
    });

    let llama_chat = config.openrouter.as_ref().map(|openrouter| {
        let provider = OpenAIProvider::openrouter(&openrouter.api_key, &openrouter.api_url);
        ChatEngine::new(
            pipeline.retriever().clone(),
            PromptComposer::new(constitution),
            StreamingRelay::new(Arc::new(provider), config.relay_buffer),
            openrouter.model.clone(),
            config.top_k,
        )
    });

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        composer: PromptComposer::new(general),
        chat,
        llama_chat,
    })
}

fn load_persona(path: Option<&Path>, builtin: fn() -> PersonaProfile) -> Result<PersonaProfile> {
    match path {
        Some(path) => {
            let profile = PersonaProfile::from_file(path)?;
            info!(persona = %profile, path = %path.display(), "loaded persona profile");
            Ok(profile)
        }
        None => Ok(builtin()),
    }
}

async fn run_api_server(state: AppState, config: &AppConfig, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    match &state.chat {
        Some(engine) => println!("{} {}", "/chat model:".cyan(), engine.model()),
        None => println!("{}", "OPENAI_API_KEY not set: /chat is disabled".yellow()),
    }
    match &state.llama_chat {
        Some(engine) => println!("{} {}", "/llama-chat model:".cyan(), engine.model()),
        None => println!("{}", "OPENROUTER_API_KEY not set: /llama-chat is disabled".yellow()),
    }

    let app = api::create_api(state, config.max_concurrent_requests);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    println!("{} {}", "Server listening on".green(), addr.to_string().bright_green());
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ingest_file(state: &AppState, file: &Path, metadata: Option<&str>) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut extra: Map<String, Value> = match metadata {
        Some(raw) => serde_json::from_str(raw).context("--metadata must be a JSON object")?,
        None => Map::new(),
    };
    extra
        .entry("source")
        .or_insert_with(|| Value::String(file.display().to_string()));

    let report = state.pipeline.ingest(Document::new(text).with_metadata(extra)).await?;
    println!(
        "{} {} ({} chunks)",
        "Indexed".green(),
        report.document_id.bright_white(),
        report.chunks
    );
    Ok(())
}

async fn ask(state: &AppState, question: &str, llama: bool) -> Result<()> {
    let engine = (if llama { &state.llama_chat } else { &state.chat })
        .as_ref()
        .ok_or_else(|| anyhow!("the requested chat provider is not configured"))?;

    let mut stream = engine.answer(&[ConversationMessage::user(question)]).await?;
    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        match event {
            GenerationStreamEvent::Delta(text) => {
                print!("{}", text);
                stdout.flush()?;
            }
            GenerationStreamEvent::Completed => println!(),
            GenerationStreamEvent::Failed(message) => {
                println!();
                return Err(anyhow!("generation failed: {}", message));
            }
        }
    }
    Ok(())
}

async fn list_documents(state: &AppState) -> Result<()> {
    let documents = state.pipeline.list_documents().await?;
    println!("{} {}", documents.len().to_string().bright_white(), "indexed chunks".cyan());
    for document in documents {
        println!("{} {}", document.id.yellow(), document.text);
    }
    Ok(())
}
