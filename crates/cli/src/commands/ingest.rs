//! `switchyard ingest`: Crawl the help center once and update the index.

use switchyard_agent::AgentRuntime;
use switchyard_config::AppConfig;

pub async fn run(mut config: AppConfig, url: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(url) = url {
        config.knowledge.root_url = url;
    }
    if config.knowledge.index_path.is_none() {
        println!("⚠️  knowledge.index_path is not set; the index will not outlive this process");
    }

    println!("📚 Indexing {}", config.knowledge.root_url);
    let runtime = AgentRuntime::from_config(config).await;

    let report = runtime
        .ingest_now()
        .await
        .map_err(|e| format!("Ingestion failed: {e}"))?;

    let elapsed = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;
    println!("   ✅ Done in {elapsed:.1}s");
    println!("   Pages fetched:    {}", report.pages_fetched);
    println!("   Pages unchanged:  {}", report.pages_unchanged);
    println!("   Pages skipped:    {}", report.pages_skipped);
    println!("   Pages failed:     {}", report.pages_failed);
    println!("   Pages removed:    {}", report.pages_removed);
    println!("   Chunks written:   {}", report.chunks_written);
    println!("   Chunks retired:   {}", report.chunks_retired);
    println!("   Chunks indexed:   {}", runtime.index().count().await?);

    Ok(())
}
