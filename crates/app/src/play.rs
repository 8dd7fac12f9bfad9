use std::collections::HashSet;
use std::fmt;
use std::io::{self, BufRead, Write};

use quiz_core::model::{
    AnswerOutcome, ParseIdError, Question, QuestionId, ResultSummary,
};
use services::{QuizSession, SessionLoopService, SessionProgress};

/// How an interactive play-through ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayEnd {
    Completed,
    /// The player quit (or input ended) before the last question.
    Quit,
}

/// Let the player pick one of `sheets`. A single sheet is picked without asking.
///
/// # Errors
///
/// Returns I/O errors from the terminal.
pub fn choose_sheet<R: BufRead, W: Write>(
    sheets: &[String],
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<String>> {
    match sheets {
        [] => return Ok(None),
        [only] => return Ok(Some(only.clone())),
        _ => {}
    }

    writeln!(out, "sheets:")?;
    for (index, sheet) in sheets.iter().enumerate() {
        writeln!(out, "  {}) {sheet}", index + 1)?;
    }
    loop {
        write!(out, "sheet [1-{}]: ", sheets.len())?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let picked = line.trim();
        if let Some(sheet) = sheets.iter().find(|s| s.as_str() == picked) {
            return Ok(Some(sheet.clone()));
        }
        match picked.parse::<usize>() {
            Ok(n) if (1..=sheets.len()).contains(&n) => return Ok(Some(sheets[n - 1].clone())),
            _ => writeln!(out, "unknown sheet: {picked}")?,
        }
    }
}

/// Drive `session` from `input` until it completes or the player quits.
///
/// # Errors
///
/// Returns I/O errors from the terminal and session errors from the loop service.
pub async fn play_session<R: BufRead, W: Write>(
    service: &SessionLoopService,
    session: &mut QuizSession,
    input: &mut R,
    out: &mut W,
) -> Result<PlayEnd, Box<dyn std::error::Error>> {
    while let Some(question) = session.current().cloned() {
        render_question(
            out,
            session.current_index() + 1,
            session.total_questions(),
            &question,
        )?;
        session.mark_presented(service.clock().now());

        let Some(chosen) = read_choice(input, out, question.choices().len())? else {
            return Ok(PlayEnd::Quit);
        };

        let result = service.answer_current(session, chosen).await?;
        render_feedback(out, &question, &result.outcome)?;
        render_progress(out, &session.progress())?;
    }
    Ok(PlayEnd::Completed)
}

fn render_question<W: Write>(
    out: &mut W,
    position: usize,
    total: usize,
    question: &Question,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "[{position}/{total}] ({}) {}",
        question.category(),
        question.prompt()
    )?;
    for (index, choice) in question.choices().iter().enumerate() {
        writeln!(out, "  {}) {choice}", index + 1)?;
    }
    Ok(())
}

/// Read a 1-based choice; `None` when the player quits or input ends.
fn read_choice<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    choices: usize,
) -> io::Result<Option<usize>> {
    loop {
        write!(out, "answer [1-{choices}, q to quit]: ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=choices).contains(&n) => return Ok(Some(n - 1)),
            _ => writeln!(out, "enter a number between 1 and {choices}")?,
        }
    }
}

fn render_feedback<W: Write>(
    out: &mut W,
    question: &Question,
    outcome: &AnswerOutcome,
) -> io::Result<()> {
    if outcome.is_correct {
        writeln!(out, "✓ correct")?;
    } else {
        let answer = question.choice(outcome.correct_choice).unwrap_or_default();
        writeln!(
            out,
            "✗ wrong, the answer is {}) {answer}",
            outcome.correct_choice + 1
        )?;
    }
    if !outcome.explanation.trim().is_empty() {
        writeln!(out, "  {}", outcome.explanation.trim())?;
    }
    Ok(())
}

fn render_progress<W: Write>(out: &mut W, progress: &SessionProgress) -> io::Result<()> {
    writeln!(
        out,
        "progress: {}/{} answered, {} correct ({}%), streak {}",
        progress.answered,
        progress.total,
        progress.correct,
        percent(progress.correct, progress.answered),
        progress.streak
    )
}

/// Print the end-of-session card.
///
/// # Errors
///
/// Returns I/O errors from `out`.
pub fn render_summary<W: Write>(out: &mut W, summary: &ResultSummary) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "──── results ────")?;
    writeln!(out, "answered  {}", summary.answered())?;
    writeln!(
        out,
        "correct   {} ({}%)",
        summary.correct(),
        summary.accuracy_percent()
    )?;
    writeln!(out, "streak    {}", summary.streak())?;

    if !summary.category_stats().is_empty() {
        writeln!(out, "by category:")?;
        for (category, stats) in summary.category_stats() {
            writeln!(
                out,
                "  {category:<16} {}/{} ({}%)",
                stats.correct,
                stats.total,
                percent(stats.correct, stats.total)
            )?;
        }
    }

    if !summary.missed().is_empty() {
        writeln!(out, "missed:")?;
        for question in summary.missed() {
            writeln!(
                out,
                "  #{} [{}] {}",
                question.id(),
                question.category(),
                question.prompt()
            )?;
        }
    }
    Ok(())
}

/// Ask which missed questions to retry. `None` means no retry.
///
/// # Errors
///
/// Returns I/O errors from the terminal.
pub fn prompt_retry<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    missed: &[Question],
) -> io::Result<Option<HashSet<QuestionId>>> {
    loop {
        write!(out, "retry missed? [a]ll, ids like 3,7, or enter to finish: ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match parse_retry_selection(&line, missed) {
            Ok(selection) => return Ok(selection),
            Err(err) => writeln!(out, "{err}")?,
        }
    }
}

/// Why a retry answer was not accepted; the prompt is shown again.
#[derive(Debug, PartialEq, Eq)]
enum RetryInputError {
    BadId(ParseIdError),
    NotMissed,
}

impl fmt::Display for RetryInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryInputError::BadId(err) => write!(f, "{err}"),
            RetryInputError::NotMissed => write!(f, "none of those questions were missed"),
        }
    }
}

fn parse_retry_selection(
    line: &str,
    missed: &[Question],
) -> Result<Option<HashSet<QuestionId>>, RetryInputError> {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("n") {
        return Ok(None);
    }
    if line.eq_ignore_ascii_case("a") || line.eq_ignore_ascii_case("all") {
        return Ok(Some(missed.iter().map(Question::id).collect()));
    }
    let selected = line
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.trim().trim_start_matches('#').parse::<QuestionId>())
        .collect::<Result<HashSet<_>, _>>()
        .map_err(RetryInputError::BadId)?;
    if !missed.iter().any(|q| selected.contains(&q.id())) {
        return Err(RetryInputError::NotMissed);
    }
    Ok(Some(selected))
}

fn percent(part: u32, whole: u32) -> u64 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (u64::from(part), u64::from(whole));
    (part * 100 + whole / 2) / whole
}
