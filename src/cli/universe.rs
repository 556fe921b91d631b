use super::ui;
use crate::core::IndexMembershipProvider;
use crate::core::scan::ScanCaches;
use crate::core::universe::resolve_universe;
use anyhow::Result;

/// Prints the deduplicated, sorted scan universe.
pub async fn run(
    index_provider: &dyn IndexMembershipProvider,
    extra_symbols: &[String],
    caches: &ScanCaches,
) -> Result<()> {
    let universe = resolve_universe(
        index_provider,
        extra_symbols,
        caches.universe.as_ref(),
        caches.ttl,
    )
    .await;

    if universe.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "The universe is empty. Add index lists or symbols to the configuration.",
                ui::StyleType::Warning
            )
        );
        return Ok(());
    }

    for symbol in &universe {
        println!("{symbol}");
    }
    println!(
        "\n{}",
        ui::style_text(
            &format!(
                "{} symbols from {} indices",
                universe.len(),
                index_provider.indices().len()
            ),
            ui::StyleType::Subtle
        )
    );
    Ok(())
}
