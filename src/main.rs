use cht_runner::logic::locate;
use cht_runner::{AppConfig, Session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging, keeping the HTTP stack quiet
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .parse_default_env()
        .init();

    println!("cht-runner: conjugate heat transfer workflow client");

    let config = AppConfig::load()?;
    let session = Session::connect(config)?;

    let projects = locate::list_project_names(session.remote()).await?;
    println!("{} projects:", projects.len());
    for name in &projects {
        println!("  {}", name);
    }

    // Drill into one project when asked to
    let Ok(project_name) = std::env::var("CHT_PROJECT") else {
        return Ok(());
    };
    let project = session.project(&project_name).await?;
    println!("Project '{}' ({})", project.name, project.id);

    for name in locate::list_geometry_names(session.remote(), &project.id).await? {
        println!("  geometry: {}", name);
    }
    for name in locate::list_simulation_names(session.remote(), &project.id).await? {
        println!("  simulation: {}", name);
    }

    if let Ok(simulation_name) = std::env::var("CHT_SIMULATION") {
        let simulation = session.simulation(&project.id, &simulation_name).await?;
        for name in locate::list_run_names(session.remote(), &project.id, &simulation.id).await? {
            println!("  run of '{}': {}", simulation.name, name);
        }
    }

    Ok(())
}
