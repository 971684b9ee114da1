//! zmatstore CLI Client
//!
//! Command-line interface for interacting with zmatstore.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use zmatstore::protocol::{read_response, write_command, Command, Status};
use zmatstore::{codec, Result};

/// zmatstore CLI
#[derive(Parser, Debug)]
#[command(name = "zmatstore-cli")]
#[command(about = "CLI for the zmatstore document store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3232")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a document
    Create {
        collection: String,
        /// Document as a JSON object
        document: String,
    },

    /// View a document by id
    View { collection: String, id: u64 },

    /// Merge fields into a document
    Update {
        collection: String,
        id: u64,
        /// Fields to set, as a JSON object
        partial: String,
    },

    /// Delete a document
    Delete { collection: String, id: u64 },

    /// Find documents by field value
    Find {
        collection: String,
        field: String,
        /// Value to match, as JSON (`'"A"'`, `42`, `true`)
        value: String,
    },

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let command = build_command(args.command)?;

    let stream = TcpStream::connect(&args.server)?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    let mut reader = BufReader::new(stream);

    write_command(&mut writer, &command)?;
    let response = read_response(&mut reader)?;

    match response.status {
        Status::Ok => {
            println!("{}", serde_json::to_string_pretty(&response.json()?)?);
            Ok(ExitCode::SUCCESS)
        }
        Status::NotFound => {
            eprintln!("not found: {}", response.message());
            Ok(ExitCode::from(2))
        }
        Status::Error => {
            eprintln!("error: {}", response.message());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn build_command(command: Commands) -> Result<Command> {
    Ok(match command {
        Commands::Create {
            collection,
            document,
        } => Command::Create {
            collection,
            document: parse_document(&document)?,
        },
        Commands::View { collection, id } => Command::View { collection, id },
        Commands::Update {
            collection,
            id,
            partial,
        } => Command::Update {
            collection,
            id,
            partial: parse_document(&partial)?,
        },
        Commands::Delete { collection, id } => Command::Delete { collection, id },
        Commands::Find {
            collection,
            field,
            value,
        } => Command::Find {
            collection,
            field,
            value: serde_json::from_str(&value)?,
        },
        Commands::Ping => Command::Ping,
    })
}

fn parse_document(text: &str) -> Result<codec::Document> {
    let value: Value = serde_json::from_str(text)?;
    codec::into_document(value)
}
