use clap::{Parser, Subcommand};
use kb_rag::Result;
use kb_rag::commands::{
    delete_document, list_documents, reset_store, serve, show_config, show_status,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kb-rag")]
#[command(about = "Retrieval-augmented question answering over uploaded PDF manuals")]
#[command(version)]
struct Cli {
    /// Data directory holding config and the persisted index
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Show store statistics
    Status,
    /// List indexed documents
    List,
    /// Delete a document and its embeddings
    Delete {
        /// Source filename to delete
        source: String,
    },
    /// Drop the entire index and metadata log
    Reset,
    /// Show the effective configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve(cli.data_dir).await?,
        Commands::Status => show_status(cli.data_dir)?,
        Commands::List => list_documents(cli.data_dir)?,
        Commands::Delete { source } => delete_document(cli.data_dir, &source)?,
        Commands::Reset => reset_store(cli.data_dir)?,
        Commands::Config { .. } => show_config(cli.data_dir)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["kb-rag", "serve"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Serve);
        }
    }

    #[test]
    fn delete_command_takes_a_source() {
        let cli = Cli::try_parse_from(["kb-rag", "delete", "manual.pdf"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Delete { source } = parsed.command {
                assert_eq!(source, "manual.pdf");
            }
        }
    }

    #[test]
    fn data_dir_is_global() {
        let cli = Cli::try_parse_from(["kb-rag", "--data-dir", "/tmp/kb", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.data_dir, Some(PathBuf::from("/tmp/kb")));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["kb-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["kb-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["kb-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
