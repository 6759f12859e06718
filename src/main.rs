use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tastebase::maintenance::{find_large_files, find_unused_dependencies, LargeFileOptions};
use tastebase::media::storage_stats;
use tastebase::providers::{OpenAIVisionTranscriber, ProviderFactory};
use tastebase::store::Database;
use tastebase::{load_config, RecipeParser};

#[derive(Parser)]
#[command(name = "tastebase", version, about = "Personal recipe manager")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a recipe URL or text and print the result as JSON
    Parse {
        /// URL, or recipe text (use "-" to read stdin)
        input: String,
    },
    /// Parse a photo or scan of a recipe and print the result as JSON
    ParseImage { path: PathBuf },
    /// Run the HTTP API
    Serve,
    /// Manage login sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Disk usage of the upload directory
    StorageStats,
    /// List the longest source files
    LargeFiles {
        #[arg(default_value = ".")]
        root: PathBuf,
        #[arg(long, default_value_t = 500)]
        min_lines: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List Cargo dependencies no source file refers to
    UnusedDeps {
        #[arg(default_value = ".")]
        manifest_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Create the user if needed and print a bearer token
    Create {
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config()?;

    match cli.command {
        Command::Parse { input } => {
            let input = if input == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                input
            };
            let provider = ProviderFactory::from_config(&config.ai);
            let parser = RecipeParser::from_config(&config, provider)?;
            let outcome = parser.parse(&input).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::ParseImage { path } => {
            let image = tokio::fs::read(&path).await?;
            let provider = ProviderFactory::from_config(&config.ai);
            let transcriber = OpenAIVisionTranscriber::from_config(&config.ai)?;
            let parser = RecipeParser::from_config(&config, provider)?
                .with_transcriber(Arc::new(transcriber));
            let outcome = parser.parse_image(&image).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Serve => tastebase::server::serve(&config).await?,
        Command::Session {
            command: SessionCommand::Create { email, name },
        } => {
            let db = Database::connect(&config.storage.database_url).await?;
            let user = db.users().find_or_create(&email, name.as_deref()).await?;
            let ttl = chrono::Duration::hours(config.server.session_ttl_hours);
            let token = db.sessions().create(&user.id, ttl).await?;
            info!("Session created for {}", user.email);
            println!("{token}");
        }
        Command::StorageStats => {
            let stats = storage_stats(Path::new(&config.storage.upload_dir))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::LargeFiles {
            root,
            min_lines,
            limit,
        } => {
            let options = LargeFileOptions {
                min_lines,
                limit,
                ..Default::default()
            };
            for file in find_large_files(&root, &options)? {
                println!("{:>7}  {}", file.lines, file.path.display());
            }
        }
        Command::UnusedDeps { manifest_dir } => {
            let unused = find_unused_dependencies(&manifest_dir)?;
            if unused.is_empty() {
                println!("No unused dependencies found");
            }
            for name in &unused.dependencies {
                println!("[dependencies] {name}");
            }
            for name in &unused.dev_dependencies {
                println!("[dev-dependencies] {name}");
            }
        }
    }

    Ok(())
}
