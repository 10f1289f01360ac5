use std::env;
use std::error::Error;
use std::fs;

use log::info;

use negative_sampling::training::{tokenize, train_on_corpus, TrainingConfiguration};

fn train(filename: &str) -> Result<(), Box<dyn Error>> {
    info!("reading corpus from {:?}", filename);
    let text = fs::read_to_string(filename)?;
    let (corpus, words) = tokenize(&text);
    info!("{} tokens, {} distinct words", corpus.len(), words.len());
    let losses = train_on_corpus(&corpus, &TrainingConfiguration::default())?;
    if let (Some(first), Some(last)) = (losses.first(), losses.last()) {
        info!("loss went from {} to {}", first, last);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = env::args().collect::<Vec<_>>();

    let instructions = "pass `--train [text file]`";

    if args.len() <= 2 {
        println!("{}", instructions);
        return;
    }

    match args[1].as_str() {
        "--train" => {
            if let Err(error) = train(&args[2]) {
                eprintln!("training failed: {}", error);
                std::process::exit(1);
            }
        }
        _ => {
            println!("{}", instructions);
        }
    }
}
