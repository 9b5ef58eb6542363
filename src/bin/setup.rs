use campus_events::create_default_manager;

/// Creates the database file and schema named by the configuration. Safe to run repeatedly.
pub fn main() -> anyhow::Result<()> {
    let (mut manager, settings) = create_default_manager()?;

    manager.migrate()?;
    let colleges = manager.list_colleges()?;

    tracing::info!(
        database_url = %settings.database_url,
        colleges = colleges.len(),
        "schema is up to date"
    );
    println!("Database ready at {}", settings.database_url);

    Ok(())
}
