// Colored terminal output for moderation decisions and reputation reads.
//
// main.rs and TerminalSink delegate here. Nothing in this module touches
// storage; callers pass in whatever they already loaded.

use colored::{ColoredString, Colorize};

use crate::feed::ChatEvent;
use crate::moderation::action::{Action, REACTION_EMOJI};
use crate::moderation::policy::{
    EffectiveThreshold, PolicySnapshot, DEFAULT_DELETE_THRESHOLD, DEFAULT_REACT_THRESHOLD,
};
use crate::reputation::calculator::Grade;
use crate::reputation::rank::LeaderboardEntry;
use crate::reputation::KarmaCard;
use crate::toxicity::ToxicityResult;

/// Print one decision, e.g. `DELETE  #c1 m42 by u7  "message text"`.
pub fn display_action(event: &ChatEvent, action: &Action) {
    let label = match action {
        Action::Delete { .. } => "DELETE".red().bold(),
        Action::React => format!("REACT {REACTION_EMOJI}").yellow(),
        Action::None => "ok".dimmed(),
    };
    println!(
        "  {:<8} #{} {} by {}  \"{}\"",
        label,
        event.channel_id,
        event.message_id,
        event.author_id,
        super::truncate_chars(&event.text, 80).dimmed()
    );

    if let Action::Delete {
        notification,
        log_entry,
    } = action
    {
        println!(
            "           {} <@{}> {}",
            "notify".dimmed(),
            notification.mention_user_id,
            notification.text
        );
        if let Some(entry) = log_entry {
            println!(
                "           {} #{} ({:.2}%)",
                "log".dimmed(),
                entry.destination_channel_id,
                entry.toxicity
            );
        }
    }
}

/// Display a user's karma card.
pub fn display_karma(card: &KarmaCard) {
    println!("\n{}", format!("=== Karma for {} ===", card.user_id).bold());
    println!(
        "  Manners score: {:.2}%  {}",
        card.reputation,
        colorize_grade(&card.grade)
    );
    println!("  Messages recorded: {}", card.message_count);

    match (card.position, card.percentile) {
        (Some(position), Some(percentile)) => {
            println!(
                "  Rank: {} of {} (top {:.2}%)",
                position.rank, position.total, percentile
            );
        }
        _ => println!("  Rank: {}", "no data".dimmed()),
    }
}

/// Display the top of the ranking.
pub fn display_leaderboard(entries: &[LeaderboardEntry]) {
    if entries.is_empty() {
        println!("No users ranked yet. Run `mannerly run` on a feed first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Leaderboard (top {}) ===", entries.len()).bold()
    );
    println!();
    println!(
        "  {:>4}  {:<32} {:>8}  {:<5}",
        "Rank".dimmed(),
        "User".dimmed(),
        "Manners".dimmed(),
        "Grade".dimmed(),
    );
    println!("  {}", "-".repeat(54).dimmed());

    for entry in entries {
        println!(
            "  {:>4}. {:<32} {:>7.2}%  {}",
            entry.rank,
            entry.user_id,
            entry.reputation,
            colorize_grade(&entry.grade)
        );
    }
    println!();
}

/// Display a community's effective thresholds.
pub fn display_policy(snapshot: &PolicySnapshot) {
    println!(
        "\n{}",
        format!("=== Policy for community {} ===", snapshot.community_id).bold()
    );
    println!("  Delete above: {}", describe_threshold(&snapshot.delete));
    println!("  React above:  {}", describe_threshold(&snapshot.react));
    match &snapshot.log_channel {
        Some(channel) => println!("  Log channel:  #{}", channel),
        None => println!("  Log channel:  {}", "not set".dimmed()),
    }
}

/// Display an ad-hoc classifier result.
pub fn display_evaluation(result: &ToxicityResult) {
    let line = evaluation_line(result.toxicity);
    // Colored against the default cutoffs; communities may differ
    let colored_line = if DEFAULT_DELETE_THRESHOLD.is_exceeded_by(result.toxicity) {
        line.red().bold()
    } else if DEFAULT_REACT_THRESHOLD.is_exceeded_by(result.toxicity) {
        line.yellow()
    } else {
        line.green()
    };
    println!("{}", colored_line);
    if let Some(lang) = &result.detected_language {
        println!("  Language: {}", lang);
    }
}

/// The one-line verdict for an ad hoc evaluation.
pub fn evaluation_line(toxicity: f64) -> String {
    format!("This message was rated `{:.2}%` negative.", toxicity)
}

fn describe_threshold(effective: &EffectiveThreshold) -> String {
    let shown = if effective.threshold.is_disabled() {
        "disabled".yellow().to_string()
    } else {
        effective.threshold.to_string()
    };
    if effective.is_default {
        format!("{} {}", shown, "(default)".dimmed())
    } else {
        shown
    }
}

/// Paint a grade letter in its band color.
fn colorize_grade(grade: &Grade) -> ColoredString {
    let r = ((grade.color >> 16) & 0xFF) as u8;
    let g = ((grade.color >> 8) & 0xFF) as u8;
    let b = (grade.color & 0xFF) as u8;
    grade.letter.truecolor(r, g, b).bold()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_line_shows_score_once() {
        let line = evaluation_line(95.5);
        assert_eq!(line, "This message was rated `95.50%` negative.");
        assert_eq!(line.matches('%').count(), 1);
    }
}
