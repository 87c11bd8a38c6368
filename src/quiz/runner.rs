use anyhow::Result;
use console::style;
use dialoguer::Select;
use std::collections::HashMap;
use std::fmt;

use super::{QuizRow, QuizRowSet};

/// Proficiency tier derived from the quiz score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Basic,
    Intermediate,
    Advanced,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Basic => "Basic",
            Tier::Intermediate => "Intermediate",
            Tier::Advanced => "Advanced",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub score: u32,
    pub max_score: u32,
    pub tier: Tier,
}

/// Thirds of the maximum score split the tiers: at most one third is Basic,
/// at most two thirds is Intermediate, above that is Advanced.
pub fn assign_tier(score: u32, max_score: u32) -> Tier {
    let third = f64::from(max_score) / 3.0;
    let score = f64::from(score);

    if score <= third {
        Tier::Basic
    } else if score <= 2.0 * third {
        Tier::Intermediate
    } else {
        Tier::Advanced
    }
}

/// One point per question whose selected option equals the stored correct
/// answer exactly.
pub fn score_answers(rows: &[QuizRow], answers: &HashMap<u32, String>) -> u32 {
    rows.iter()
        .filter(|row| {
            answers
                .get(&row.question_no)
                .is_some_and(|selected| *selected == row.correct_answer)
        })
        .count() as u32
}

/// Present every question as a single-choice prompt, score the answers and
/// render per-option feedback. Scoring only happens once every question has
/// a selected answer; the prompt loop guarantees that.
pub fn run_quiz(row_set: &QuizRowSet) -> Result<QuizOutcome> {
    let rows = row_set.rows();
    let answers = prompt_answers(rows)?;

    let score = score_answers(rows, &answers);
    let max_score = rows.len() as u32;
    let tier = assign_tier(score, max_score);

    eprintln!();
    eprintln!(
        "Your score: {}",
        style(format!("{score}/{max_score}")).bold()
    );
    eprintln!("Your proficiency tier: {}", style(tier).bold().cyan());
    eprintln!();

    render_feedback(rows, &answers);

    Ok(QuizOutcome {
        score,
        max_score,
        tier,
    })
}

fn prompt_answers(rows: &[QuizRow]) -> Result<HashMap<u32, String>> {
    let mut answers = HashMap::with_capacity(rows.len());

    for row in rows {
        let options = row.options();
        let selection = Select::new()
            .with_prompt(format!("{}. {}", row.question_no, row.question_text))
            .items(&options)
            .interact()?;

        answers.insert(row.question_no, options[selection].to_string());
    }

    Ok(answers)
}

/// Mark the correct option, mark a wrong selection, leave the rest plain.
fn render_feedback(rows: &[QuizRow], answers: &HashMap<u32, String>) {
    for row in rows {
        eprintln!(
            "{}",
            style(format!("{}. {}", row.question_no, row.question_text)).bold()
        );
        eprintln!("   {}", style(&row.rationale).italic().dim());

        let selected = answers.get(&row.question_no);
        for option in row.options() {
            if option == row.correct_answer {
                eprintln!("   {} {}", style("✓").green().bold(), style(option).green());
            } else if selected.is_some_and(|answer| answer == option) {
                eprintln!("   {} {}", style("✗").red().bold(), style(option).red());
            } else {
                eprintln!("     {option}");
            }
        }
        eprintln!();
    }
}
