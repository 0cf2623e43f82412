//! AtlasFS CLI Client
//!
//! Command-line interface for interacting with an AtlasFS coordinator.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use atlasfs::{AtlasError, Client};
use clap::{Parser, Subcommand};

/// AtlasFS CLI
#[derive(Parser, Debug)]
#[command(name = "atlasfs")]
#[command(about = "CLI for the AtlasFS sharded file store")]
#[command(version)]
struct Args {
    /// Coordinator address
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List stored files
    List,

    /// Upload a local file (stored under its file name)
    Upload {
        /// Path of the file to upload
        path: PathBuf,
    },

    /// Download a file
    Download {
        /// Stored file name
        name: String,

        /// Destination file or directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a file
    Delete {
        /// Stored file name
        name: String,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> atlasfs::Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::List => {
            let names = client.list()?;
            if names.is_empty() {
                println!("(no files)");
            }
            for name in names {
                println!("{}", name);
            }
        }

        Commands::Upload { path } => {
            let reply = client.upload_file(&path)?;
            println!("{}", reply);
            if !reply.starts_with(atlasfs::protocol::UPLOAD_COMPLETE) {
                return Err(AtlasError::Remote(reply));
            }
        }

        Commands::Download { name, output } => {
            let output = match output {
                Some(dir) if dir.is_dir() => dir.join(&name),
                Some(path) => path,
                None => PathBuf::from(&name),
            };
            let mut file = BufWriter::new(File::create(&output)?);

            match client.download(&name, &mut file) {
                Ok(download) => {
                    file.flush()?;
                    println!(
                        "Downloaded {} ({} bytes) to {}",
                        download.name,
                        download.length,
                        output.display()
                    );
                }
                Err(e) => {
                    drop(file);
                    let _ = std::fs::remove_file(&output);
                    return Err(e);
                }
            }
        }

        Commands::Delete { name } => {
            let reply = client.delete(&name)?;
            println!("{}", reply);
            if reply != atlasfs::protocol::SUCCESS {
                return Err(AtlasError::Remote(reply));
            }
        }
    }

    Ok(())
}
