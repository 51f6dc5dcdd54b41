// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use clap::{crate_version, Parser, Subcommand};
use layergate::config;
use layergate::engine::TriggerKind;
use layergate::replay;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Trigger decisions for sample playback layers."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists and verifies the layers in a sound bank.
    Layers {
        /// The path to the sound bank.
        bank_path: String,
    },
    /// Replays a MIDI file through a sound bank and prints every trigger.
    Replay {
        /// The path to the sound bank.
        bank_path: String,
        /// The path to the MIDI file.
        midi_path: String,
        /// Overrides the random seed of the bank.
        #[arg[short, long]]
        seed: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Layers { bank_path } => {
            let bank = config::load_bank(&PathBuf::from(&bank_path))?;

            if bank.layers().is_empty() {
                println!("No layers found in {}.", bank_path);
                return Ok(());
            }

            match bank.channel() {
                Some(channel) => println!("Channel: {}", channel),
                None => println!("Channel: all"),
            }
            println!("Layers (count: {}):", bank.layers().len());
            for (index, layer) in bank.layers().iter().enumerate() {
                println!(
                    "- {}: {} (keys {}, velocity {}, trigger {:?}{})",
                    index,
                    layer.name().unwrap_or("unnamed"),
                    layer.key_range(),
                    layer.velocity_range(),
                    layer.trigger(),
                    if layer.trigger().is_release() {
                        ", on note-off"
                    } else {
                        ""
                    },
                );
                for condition in layer.cc_conditions() {
                    println!("    requires cc {} in {}", condition.cc(), condition.range());
                }
                for trigger in layer.cc_triggers() {
                    println!("    triggers on cc {} in {}", trigger.cc(), trigger.range());
                }
            }
        }
        Commands::Replay {
            bank_path,
            midi_path,
            seed,
        } => {
            let triggers = replay::replay_with_bank(
                &PathBuf::from(&bank_path),
                &PathBuf::from(&midi_path),
                seed,
            )?;

            if triggers.is_empty() {
                println!("No triggers.");
                return Ok(());
            }

            println!("Triggers (count: {}):", triggers.len());
            for replayed in triggers.iter() {
                let trigger = replayed.trigger;
                let kind = match trigger.kind {
                    TriggerKind::Attack => "attack",
                    TriggerKind::Release => "release",
                    TriggerKind::Controller => "cc",
                };
                println!(
                    "- tick {}: layer {} {} {} ({:.3})",
                    replayed.tick, trigger.layer, kind, trigger.number, trigger.value
                );
            }
        }
    }

    Ok(())
}
