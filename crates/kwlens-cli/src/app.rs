//! Shared wiring: connect the pool, build the provider client, and
//! assemble the research pipeline with its injected collaborators.

use std::sync::Arc;

use kwlens_core::AppConfig;
use kwlens_engine::{
    EnhanceConfig, MemoryCache, PipelineConfig, ResearchPipeline,
};
use kwlens_provider::ProviderClient;

pub async fn build_pipeline(config: &AppConfig) -> anyhow::Result<ResearchPipeline> {
    let pool = kwlens_db::connect_pool(&config.database_url, kwlens_db::PoolConfig::from_env())
        .await?;
    kwlens_db::run_migrations(&pool).await?;

    let provider = ProviderClient::with_base_url(
        config.provider_api_key.as_deref(),
        config.provider_timeout_secs,
        config.provider_max_retries,
        config.provider_retry_backoff_ms,
        &config.provider_base_url,
    )?;

    let pipeline_config = PipelineConfig {
        collect_delay_ms: config.collect_delay_ms,
        enhance: EnhanceConfig {
            batch_size: config.enhance_batch_size.max(1),
            item_delay_ms: config.enhance_item_delay_ms,
            batch_delay_ms: config.enhance_batch_delay_ms,
            ..EnhanceConfig::default()
        },
    };

    Ok(ResearchPipeline::new(
        Arc::new(provider),
        Arc::new(MemoryCache::new()),
        Arc::new(kwlens_db::PgSessionStore::new(pool)),
        pipeline_config,
    ))
}
