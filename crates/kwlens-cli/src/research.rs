//! The `research` subcommand: run the pipeline and print the result.

use clap::Args;
use tokio::sync::mpsc;

use kwlens_core::{
    load_profiles, AppConfig, ProgressEvent, ProgressSender, ResearchOptions, ResearchSession,
};

use crate::app::build_pipeline;

#[derive(Debug, Args)]
pub struct ResearchArgs {
    /// Product ASINs, primary first (1-10).
    #[arg(required = true, num_args = 1..=10)]
    pub products: Vec<String>,

    /// Name under which to store the session.
    #[arg(long)]
    pub name: Option<String>,

    /// Named options profile from the profiles file.
    #[arg(long)]
    pub profile: Option<String>,

    /// Skip the (slow, quota-hungry) enrichment phase.
    #[arg(long)]
    pub no_enhancement: bool,
}

pub async fn run(config: &AppConfig, user: &str, args: ResearchArgs) -> anyhow::Result<()> {
    let mut options = resolve_options(config, args.profile.as_deref())?;
    if args.no_enhancement {
        options.enhancement = false;
    }

    let pipeline = build_pipeline(config).await?;

    // Render progress checkpoints as log lines while the run is in flight.
    let (tx, mut rx) = mpsc::channel::<ProgressEvent>(32);
    let progress_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::info!(
                phase = ?event.phase,
                percent = event.percent,
                "{}",
                event.message
            );
        }
    });

    let result = pipeline
        .research_keywords(
            user,
            &args.products,
            options,
            args.name.as_deref(),
            &ProgressSender::new(tx),
        )
        .await?;

    progress_task.await.ok();

    match result.session_id {
        Some(id) => println!("session {id} saved"),
        None => println!("session completed but could not be saved"),
    }
    print_session(&result.session);
    Ok(())
}

fn resolve_options(config: &AppConfig, profile: Option<&str>) -> anyhow::Result<ResearchOptions> {
    let Some(name) = profile else {
        return Ok(ResearchOptions::default());
    };
    let profiles = load_profiles(&config.profiles_path)?;
    let profile = profiles
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("profile '{name}' not found in {}", config.profiles_path.display()))?;
    Ok(profile.options.clone())
}

pub fn print_session(session: &ResearchSession) {
    println!();
    println!("products ({} researched):", session.products.len());
    for comparison in &session.comparisons {
        match &comparison.status {
            kwlens_core::ProductStatus::Collected => println!(
                "  {}  {} keywords, avg volume {}, {} strong / {} weak",
                comparison.asin,
                comparison.total_keywords,
                comparison.avg_search_volume,
                comparison.strong.len(),
                comparison.weak.len(),
            ),
            kwlens_core::ProductStatus::Failed(error) => {
                println!("  {}  FAILED: {error}", comparison.asin);
            }
        }
    }

    println!();
    println!("top aggregated keywords:");
    for keyword in session.aggregated.iter().take(10) {
        println!(
            "  {:5.2}  {}  (volume {}, cpc ${:.2}, {} products ranking)",
            keyword.opportunity_score,
            keyword.keyword,
            keyword.search_volume,
            keyword.avg_cpc,
            keyword.rankings.len(),
        );
    }

    let opportunities = &session.opportunities.opportunities;
    println!();
    println!("opportunities for {} ({}):", session.products[0], opportunities.len());
    for candidate in opportunities {
        println!(
            "  {}  volume {}, {} in top-15, strength {:.1}",
            candidate.keyword,
            candidate.search_volume,
            candidate.competitors_in_top15,
            candidate.competitor_strength,
        );
    }
    if !session.opportunities.mined.is_empty() {
        println!("  (+{} related keywords from mining)", session.opportunities.mined.len());
    }

    match &session.gaps {
        Some(analysis) => {
            println!();
            println!(
                "gaps ({}, total potential {} searches/month):",
                analysis.gaps.len(),
                analysis.summary.total_gap_potential
            );
            for gap in analysis.gaps.iter().take(10) {
                println!(
                    "  [{}] {:?} {}  volume {} — {}",
                    gap.gap_score, gap.gap_type, gap.keyword, gap.search_volume, gap.recommendation,
                );
            }
        }
        None => {
            println!();
            println!("gaps: not available (needs at least two successfully collected products)");
        }
    }
}
