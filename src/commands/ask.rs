//! Ask command - Route a question to the articles that answer it

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use tracing::error;

use lawsarthi::search::engine::ask_with_deadline;
use lawsarthi::search::format::ERROR_MESSAGE;
use lawsarthi::{Answer, AnswerEngine, AppPaths, Settings};

pub fn run(paths: &AppPaths, settings: Settings, question: &str, json: bool) -> Result<()> {
    let engine = Arc::new(AnswerEngine::from_settings(paths, settings)?);

    let answer = match ask_with_deadline(engine, question.to_string()) {
        Ok(answer) => answer,
        Err(e) => {
            error!(error = %e, "failed to answer question");
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "response": ERROR_MESSAGE,
                        "error": e.to_string(),
                    })
                );
            } else {
                println!("{}", ERROR_MESSAGE.red());
            }
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&answer_json(&answer))?);
    } else {
        print_answer(&answer);
    }

    Ok(())
}

fn answer_json(answer: &Answer) -> serde_json::Value {
    serde_json::json!({
        "response": answer.text,
        "strategy": answer.strategy().map(|s| s.as_str()),
        "articles": answer
            .article_ids()
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>(),
        "similarity": answer.similarity(),
    })
}

fn print_answer(answer: &Answer) {
    if let Some(strategy) = answer.strategy() {
        let label = match answer.similarity() {
            Some(score) => format!("{} {:.2}", strategy.as_str(), score),
            None => strategy.as_str().to_string(),
        };
        println!("{} {}", "→".dimmed(), label.dimmed());
        println!();
    }
    println!("{}", answer.text);
}
