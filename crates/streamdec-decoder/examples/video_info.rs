//! Usage:
//! cargo run -p streamdec-decoder --example video-info -- \
//!   --input ./demo/clip.y4m --chunk-size 4096

use std::env;
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use streamdec_decoder::{Configuration, Progress, Response, Session};

struct Args {
    input: Option<PathBuf>,
    chunk_size: usize,
}

enum CliError {
    HelpRequested,
    Message(String),
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(CliError::HelpRequested) => {
            print_usage();
            return Ok(());
        }
        Err(CliError::Message(message)) => {
            eprintln!("{message}");
            print_usage();
            return Err(message.into());
        }
    };

    let input_path = args
        .input
        .ok_or("missing input path (use --input <path>)")?;
    if !input_path.exists() {
        return Err(format!("input file {:?} does not exist", input_path).into());
    }

    let config = Configuration::from_env()?;
    let mut session = Session::open(config)?;
    let mut file = File::open(&input_path)?;
    let mut chunk = vec![0u8; args.chunk_size];
    let mut pushed = 0usize;

    loop {
        match session.ensure_stream_ready()? {
            Progress::Ready(()) => break,
            Progress::EndOfInput => return Err("input ended before a stream was found".into()),
            Progress::Again => {}
        }
        let read = file.read(&mut chunk)?;
        if read == 0 {
            return Err(format!("no decodable video after {pushed} bytes").into());
        }
        session.push(&chunk[..read]);
        pushed += read;
    }

    let read = file.read(&mut chunk)?;
    session.push(&chunk[..read]);

    println!("Input: {}", input_path.display());
    println!(
        "Container: {}",
        session.container_format().unwrap_or_default()
    );
    println!("Video stream: {:?}", session.selected_stream());
    println!("Bytes needed to open: {pushed}");
    match session.poll() {
        Response::Frame(frame) => {
            println!("Width: {}", frame.width());
            println!("Height: {}", frame.height());
            println!("Layout: {}", frame.layout());
            println!("First timestamp: {:.3}s", frame.timestamp());
        }
        other => println!("First poll: {}", other.status()),
    }

    Ok(())
}

fn parse_args() -> Result<Args, CliError> {
    let mut input = None;
    let mut chunk_size = 4096usize;
    let mut iter = env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Err(CliError::HelpRequested),
            "--input" => {
                let value = iter
                    .next()
                    .ok_or_else(|| CliError::Message("--input requires a value".to_string()))?;
                input = Some(PathBuf::from(value));
            }
            "--chunk-size" => {
                let value = iter.next().ok_or_else(|| {
                    CliError::Message("--chunk-size requires a value".to_string())
                })?;
                chunk_size = value
                    .parse::<usize>()
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or_else(|| {
                        CliError::Message("--chunk-size must be a positive number".to_string())
                    })?;
            }
            _ if arg.starts_with('-') => {
                return Err(CliError::Message(format!("unknown flag '{arg}'")));
            }
            _ => {
                if input.is_none() {
                    input = Some(PathBuf::from(arg));
                } else {
                    return Err(CliError::Message(format!("unexpected argument '{arg}'")));
                }
            }
        }
    }

    Ok(Args { input, chunk_size })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  video-info --input <path> [--chunk-size <bytes>]\n\
   (or) video-info <path>"
    );
}
