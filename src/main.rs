use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rolegraph::cli;
use rolegraph::config::resolve_dir;

#[derive(Parser)]
#[command(name = "rolegraph")]
#[command(about = "Hierarchical role-based access control")]
#[command(version)]
struct Cli {
    /// Data directory (default: ./.rolegraph)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory
    Init,
    /// Add a permission, role or custom role
    AddItem {
        /// permission, role or custom-role
        kind: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Rule that may veto this item
        #[arg(long)]
        rule: Option<String>,
    },
    /// Remove an item with its edges and assignments
    RemoveItem { name: String },
    /// Add a rule
    AddRule {
        name: String,
        /// Registered rule kind, e.g. match_params
        kind: String,
        /// Rule data as JSON
        #[arg(long)]
        data: Option<String>,
    },
    /// Remove a rule
    RemoveRule { name: String },
    /// Make CHILD a child of PARENT
    AddChild {
        parent: String,
        child: String,
        /// Mark the edge as deny
        #[arg(long)]
        deny: bool,
    },
    /// Remove the edge PARENT -> CHILD
    RemoveChild { parent: String, child: String },
    /// Assign an item to a user
    Assign { user: String, item: String },
    /// Revoke an item from a user
    Revoke { user: String, item: String },
    /// Revoke every assignment of a user
    RevokeAll { user: String },
    /// Check whether a user holds an item; prints allow or deny
    Check {
        user: String,
        item: String,
        /// Rule parameter as key=value, repeatable
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    /// List direct children of an item
    Children { name: String },
    /// List permissions below a role or inherited by a user
    Permissions {
        #[arg(long, conflicts_with = "user")]
        role: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// List roles held by a user
    Roles { user: String },
    /// List users directly assigned an item
    Users { item: String },
    /// Manage the shared graph cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Build the snapshot now
    Warm,
    /// Drop the snapshot
    Invalidate,
    /// Print disabled, cold or warm
    Status,
}

fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_env("ROLEGRAPH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let dir = resolve_dir(args.dir.as_deref());

    match args.command {
        Commands::Init => cli::init::run_init(&dir)?,
        Commands::AddItem {
            kind,
            name,
            description,
            rule,
        } => cli::item::run_add_item(
            &dir,
            &kind,
            &name,
            description.as_deref(),
            rule.as_deref(),
        )?,
        Commands::RemoveItem { name } => cli::item::run_remove_item(&dir, &name)?,
        Commands::AddRule { name, kind, data } => {
            cli::item::run_add_rule(&dir, &name, &kind, data.as_deref())?
        }
        Commands::RemoveRule { name } => cli::item::run_remove_rule(&dir, &name)?,
        Commands::AddChild {
            parent,
            child,
            deny,
        } => cli::graph::run_add_child(&dir, &parent, &child, deny)?,
        Commands::RemoveChild { parent, child } => {
            cli::graph::run_remove_child(&dir, &parent, &child)?
        }
        Commands::Assign { user, item } => cli::assign::run_assign(&dir, &user, &item)?,
        Commands::Revoke { user, item } => cli::assign::run_revoke(&dir, &user, &item)?,
        Commands::RevokeAll { user } => cli::assign::run_revoke_all(&dir, &user)?,
        Commands::Check { user, item, params } => {
            cli::query::run_check(&dir, &user, &item, &params)?
        }
        Commands::Children { name } => cli::graph::run_children(&dir, &name)?,
        Commands::Permissions { role, user } => {
            cli::query::run_permissions(&dir, role.as_deref(), user.as_deref())?
        }
        Commands::Roles { user } => cli::query::run_roles(&dir, &user)?,
        Commands::Users { item } => cli::query::run_users(&dir, &item)?,
        Commands::Cache { action } => match action {
            CacheAction::Warm => cli::cache::run_warm(&dir)?,
            CacheAction::Invalidate => cli::cache::run_invalidate(&dir)?,
            CacheAction::Status => cli::cache::run_status(&dir)?,
        },
    }

    Ok(())
}
