use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use advisor_core::allocation::{AllocationMode, AllocationSelector};
use advisor_core::domain::portfolio::PortfolioView;
use advisor_core::ingest::YahooChartProvider;
use advisor_core::questionnaire::{questions, AnswerSet};
use advisor_core::scoring::{RiskScore, ScoreTable};

#[derive(Debug, Parser)]
#[command(name = "advisor_cli")]
struct Args {
    /// JSON file holding the questionnaire answers as an array of strings, in question order.
    #[arg(long, conflicts_with = "score", required_unless_present = "score")]
    answers: Option<PathBuf>,

    /// Use this risk score directly instead of scoring an answers file.
    #[arg(long)]
    score: Option<f64>,

    /// Print the score and optimizer mode without fetching prices or solving.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = advisor_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let scores = ScoreTable::default();
    scores.validate(questions())?;

    let score = resolve_score(&args, &scores)?;
    let mode = AllocationMode::from_score(score);

    if args.dry_run {
        tracing::info!(risk_score = score.value(), ?mode, dry_run = true, "scored questionnaire");
        println!("{}", serde_json::json!({ "risk_score": score, "mode": mode }));
        return Ok(());
    }

    let provider = YahooChartProvider::from_settings(&settings)?;
    let selector = AllocationSelector::new(Arc::new(provider));

    match selector.select(score).await {
        Ok(allocation) => {
            let view = PortfolioView::new(score, &allocation);
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Err(err) => {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(risk_score = score.value(), error = %err, "portfolio selection failed");
            Err(err)
        }
    }
}

fn resolve_score(args: &Args, scores: &ScoreTable) -> anyhow::Result<RiskScore> {
    if let Some(value) = args.score {
        return Ok(RiskScore::new(value)?);
    }

    let path = args.answers.as_ref().context("--answers or --score is required")?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers file {}", path.display()))?;
    let answers: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("answers file {} is not a JSON array of strings", path.display()))?;

    let answers = AnswerSet::collect(answers)?;
    Ok(scores.score(&answers)?)
}

fn init_sentry(settings: &advisor_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_flag_conflicts_with_answers() {
        let res = Args::try_parse_from(["advisor_cli", "--score", "3.2", "--answers", "a.json"]);
        assert!(res.is_err());
    }

    #[test]
    fn one_input_is_required() {
        assert!(Args::try_parse_from(["advisor_cli", "--dry-run"]).is_err());
    }

    #[test]
    fn explicit_score_maps_to_middle_band() {
        let args = Args::try_parse_from(["advisor_cli", "--score", "3.2", "--dry-run"]).unwrap();
        let score = resolve_score(&args, &ScoreTable::default()).unwrap();
        assert_eq!(
            AllocationMode::from_score(score),
            AllocationMode::TargetReturn { target: 0.11 }
        );
    }

    #[test]
    fn answers_file_is_scored() {
        let path = std::env::temp_dir().join(format!("advisor_cli_answers_{}.json", std::process::id()));
        let answers: Vec<&str> = questions().iter().map(|q| q.choices[2]).collect();
        std::fs::write(&path, serde_json::to_string(&answers).unwrap()).unwrap();

        let args = Args::try_parse_from([
            "advisor_cli".to_string(),
            "--answers".to_string(),
            path.display().to_string(),
        ])
        .unwrap();
        let score = resolve_score(&args, &ScoreTable::default()).unwrap();
        std::fs::remove_file(&path).ok();

        // Third choice everywhere: 3,3,3,4,3,3,4,3,3,3.
        assert!((score.value() - 3.2).abs() < 1e-12);
    }
}
