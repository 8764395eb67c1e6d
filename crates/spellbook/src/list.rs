use anyhow::Result;
use clap::Args;
use spellbook_core::Config;

use crate::render;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show spells starting with this letter
    #[arg(short, long, value_parser = parse_letter)]
    pub letter: Option<char>,
}

fn parse_letter(s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(format!("expected a single letter A-Z, got {s:?}")),
    }
}

pub fn execute(args: ListArgs, config: &Config) -> Result<()> {
    let store = render::load_store(config)?;
    let view = store.grouped();

    match args.letter {
        Some(letter) => {
            let records = view.group(letter);
            if records.is_empty() {
                println!("No spells under {letter}");
            } else {
                print!("{}", render::group(letter, records));
            }
        }
        None if view.is_empty() => println!("No spells in {}", config.dataset.display()),
        None => print!("{}", render::groups(&view)),
    }
    Ok(())
}
