//! Minimal interactive session against the real API.
//!
//! Needs ANTHROPIC_API_KEY (a .env file works). Sessions are stored
//! under ./sessions.

use std::io::{BufRead, Write};
use tavern_core::narrator::ClaudeNarrator;
use tavern_core::store::FileStore;
use tavern_core::{Game, NewGameConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let narrator = ClaudeNarrator::from_env()?;
    let game = Game::new(Box::new(narrator), Box::new(FileStore::new("sessions")));

    let outcome = game
        .new_game(NewGameConfig {
            character_name: "Bruni".to_string(),
            race: "Dwarf".to_string(),
            class: "Warrior".to_string(),
            language: "English".to_string(),
            use_default_campaign: false,
        })
        .await?;

    println!("{}\n", outcome.narrative);
    let mut suggestions = outcome.suggested_actions;

    let stdin = std::io::stdin();
    loop {
        for (i, action) in suggestions.iter().enumerate() {
            println!("  {}. {action}", i + 1);
        }
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let action = line.trim();
        if action.is_empty() || action == "quit" {
            break;
        }

        let turn = game.process_turn(outcome.session_id, action).await?;
        println!("\n{}\n", turn.narrative);
        for event in &turn.applied_events {
            println!("  * {event}");
        }
        println!(
            "\nHP {}/{}  Gold {}  XP {}/{}\n",
            turn.player.hp,
            turn.player.max_hp,
            turn.player.gold,
            turn.player.experience,
            turn.player.experience_to_next_level
        );
        if turn.game_over {
            println!("Your tale ends here.");
            break;
        }
        suggestions = turn.suggested_actions;
    }

    Ok(())
}
