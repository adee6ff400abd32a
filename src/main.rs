use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use yatube::config::{Cli, Command, Config};
use yatube::state::AppState;
use yatube::{admin, db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure media directory exists
    std::fs::create_dir_all(config.media_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(AppState::new(pool, config)).await,
        Command::CreateUser { username, password } => {
            let user = admin::create_user(&pool, &username, &password, config.auth.bcrypt_cost)?;
            println!("Created user {}", user.username);
            Ok(())
        }
        Command::CreateGroup {
            title,
            slug,
            description,
        } => {
            let group = admin::create_group(&pool, &title, &slug, &description)?;
            println!("Created group /group/{}/", group.slug);
            Ok(())
        }
        Command::ListGroups => print_lines(admin::list_groups(&pool)?),
        Command::ListPosts { search, published } => {
            print_lines(admin::list_posts(&pool, search.as_deref(), published)?)
        }
        Command::SetGroup { post, group } => {
            admin::set_group(&pool, post, group.as_deref())?;
            println!("Post {} updated", post);
            Ok(())
        }
        Command::DeletePost { id } => {
            admin::delete_post(&pool, id)?;
            println!("Deleted post {}", id);
            Ok(())
        }
        Command::ListComments { post } => print_lines(admin::list_comments(&pool, post)?),
        Command::DeleteComment { id } => {
            admin::delete_comment(&pool, id)?;
            println!("Deleted comment {}", id);
            Ok(())
        }
        Command::ListFollows => print_lines(admin::list_follows(&pool)?),
        Command::DeleteFollow { id } => {
            admin::delete_follow(&pool, id)?;
            println!("Deleted follow {}", id);
            Ok(())
        }
    }
}

fn print_lines(lines: Vec<String>) -> anyhow::Result<()> {
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;
    let app = routes::app(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
