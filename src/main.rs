// src/main.rs
// Demo driver: loads a small built-in word list, runs one quiz session end
// to end with a canned question generator, and prints the results.

use std::sync::Arc;

use log::info;

use lexideck::questions::{QuestionError, QuestionSource, QuizKind, QuizQuestion};
use lexideck::rewards::DiscardRewards;
use lexideck::word::{WordContent, WordRecord};
use lexideck::{Answer, Difficulty, Phase, ReviewEngine, SessionKind};

/// Offline stand-in for the AI question service: multiple-choice definition
/// questions with distractors drawn from the rest of the batch.
struct CannedQuestions;

impl QuestionSource for CannedQuestions {
    fn generate(
        &self,
        batch: &[WordRecord],
        pool_words: &[String],
    ) -> Result<Vec<QuizQuestion>, QuestionError> {
        if batch.is_empty() {
            return Err(QuestionError::EmptyResponse);
        }
        info!("generating {} questions ({} distractor candidates)", batch.len(), pool_words.len());
        Ok(batch
            .iter()
            .map(|record| {
                let mut choices: Vec<String> = batch
                    .iter()
                    .filter(|other| other.id != record.id)
                    .take(3)
                    .map(|other| other.content.definition.clone())
                    .collect();
                choices.insert(0, record.content.definition.clone());
                QuizQuestion {
                    word_id: record.id,
                    kind: QuizKind::Options,
                    quiz_type: "definition".into(),
                    prompt: format!("What does '{}' mean?", record.content.word),
                    choices,
                }
            })
            .collect())
    }
}

fn entry(word: &str, definition: &str, pos: &str) -> WordContent {
    WordContent {
        word: word.to_string(),
        definition: definition.to_string(),
        part_of_speech: pos.to_string(),
        examples: Vec::new(),
        mnemonic: None,
        pronunciation: None,
        category: "demo".to_string(),
        etymology: None,
        related_words: Vec::new(),
        antonym: None,
        difficulty: Difficulty::Beginner,
    }
}

fn word_list() -> Vec<WordContent> {
    vec![
        entry("ephemeral", "lasting for a very short time", "adjective"),
        entry("serendipity", "finding something good without looking for it", "noun"),
        entry("laconic", "using very few words", "adjective"),
        entry("ubiquitous", "present or found everywhere", "adjective"),
        entry("obfuscate", "to make deliberately unclear", "verb"),
        entry("pellucid", "translucently clear", "adjective"),
        entry("recalcitrant", "stubbornly resistant to authority", "adjective"),
        entry("sanguine", "optimistic in a difficult situation", "adjective"),
        entry("taciturn", "reserved in speech", "adjective"),
        entry("vestige", "a trace of something that no longer exists", "noun"),
    ]
}

pub fn main() -> Result<(), String> {
    env_logger::init();

    let mut engine = ReviewEngine::new(Arc::new(CannedQuestions), Box::new(DiscardRewards));
    let ids = engine.ingest_words(word_list()).map_err(|e| e.to_string())?;
    println!("Ingested {} words.", ids.len());

    engine.start_session(SessionKind::Quiz).map_err(|e| e.to_string())?;

    // Study pass: show each card and rate our confidence high.
    while let Some(card) = engine.study_card() {
        println!("[study] {} ({}): {}", card.content.word, card.content.part_of_speech, card.content.definition);
        engine.set_confidence(4).map_err(|e| e.to_string())?;
        if !engine.advance_study().map_err(|e| e.to_string())? {
            break;
        }
    }
    engine.begin_questions().map_err(|e| e.to_string())?;

    // Quiz pass: a scripted learner who stumbles on every fourth question.
    let mut index = 0;
    while engine.phase() == Phase::Quiz {
        let question = match engine.current_question() {
            Some(q) => q.clone(),
            None => break,
        };
        let quality = if index % 4 == 3 { 1 } else { 5 };
        let outcome = engine
            .submit_answer(Answer { quality, response_time_ms: Some(2_000 + 500 * index as u32) })
            .map_err(|e| e.to_string())?;
        println!(
            "[quiz] {} -> {} (adjusted quality {}, now {:?})",
            question.prompt,
            if outcome.correct { "correct" } else { "missed" },
            outcome.adjusted_quality,
            outcome.status,
        );
        engine.advance().map_err(|e| e.to_string())?;
        index += 1;
    }

    let summary = engine.end_session().ok_or("session produced no summary")?;
    println!(
        "Session over: {}/{} correct ({:.0}%), streak {} day(s), level {:?}.",
        summary.correct,
        summary.answered,
        summary.accuracy * 100.0,
        engine.streak().streak,
        engine.level(),
    );

    let stats = engine.stats();
    println!(
        "Pool: {} words ({} new, {} learning, {} reviewing, {} mastered).",
        stats.total, stats.new, stats.learning, stats.reviewing, stats.mastered,
    );

    // Everything the host would persist, as one JSON document.
    let snapshot = engine.snapshot().to_json().map_err(|e| e.to_string())?;
    println!("Snapshot is {} bytes of JSON.", snapshot.len());
    Ok(())
}
