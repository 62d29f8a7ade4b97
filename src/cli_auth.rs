use anyhow::{bail, Context, Result};
use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use doujin_catalog_server::user::{Permission, SqliteUserStore, UserManager, UserRole};

fn get_styles() -> Styles {
    Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

fn parse_role(s: &str) -> Result<UserRole> {
    match UserRole::from_str(s) {
        Some(role) => Ok(role),
        None => bail!("Unknown role '{}', expected admin, editor or viewer", s),
    }
}

/// Manages back-office accounts in the user database.
#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to the user database file, usually `<db-dir>/user.db`.
    #[clap(value_parser = parse_path)]
    pub path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a user with the given handle and role.
    AddUser {
        user_handle: String,
        #[clap(value_parser = parse_role)]
        role: UserRole,
    },

    /// Sets or replaces the password of a user.
    SetPassword {
        user_handle: String,
        password: String,
    },

    /// Changes the role of a user.
    SetRole {
        user_handle: String,
        #[clap(value_parser = parse_role)]
        role: UserRole,
    },

    /// Shows role, permissions and active tokens of a user.
    Show { user_handle: String },

    /// Shows all user handles.
    UserHandles,

    /// Shows all available roles and their permissions.
    ListRoles,
}

fn format_permissions(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(|permission| format!("{:?}", permission))
        .collect::<Vec<_>>()
        .join(", ")
}

fn execute_command(command: Command, user_manager: &UserManager) -> Result<()> {
    match command {
        Command::AddUser { user_handle, role } => {
            let user_id = user_manager.add_user(&user_handle, role)?;
            println!(
                "Created user '{}' with id {} and role {}",
                user_handle,
                user_id,
                role.as_str()
            );
        }
        Command::SetPassword {
            user_handle,
            password,
        } => {
            user_manager.set_password(&user_handle, &password)?;
            println!("Password set for '{}'", user_handle);
        }
        Command::SetRole { user_handle, role } => {
            user_manager.set_user_role(&user_handle, role)?;
            println!("'{}' is now {}", user_handle, role.as_str());
        }
        Command::Show { user_handle } => {
            let user_id = user_manager
                .get_user_id(&user_handle)?
                .with_context(|| format!("User '{}' not found", user_handle))?;
            let role = user_manager.get_user_role(user_id)?;
            let permissions = user_manager.get_user_permissions(user_id)?;
            let tokens = user_manager.get_user_tokens(&user_handle)?;

            println!("User: {} (id {})", user_handle, user_id);
            println!(
                "Role: {}",
                role.map(|r| r.as_str()).unwrap_or("<none>")
            );
            println!("Permissions: {}", format_permissions(&permissions));
            println!("Auth tokens: {}", tokens.len());
            for token in tokens.iter() {
                println!("  {:#?}", token);
            }
        }
        Command::UserHandles => {
            let handles = user_manager.get_all_user_handles()?;
            if handles.is_empty() {
                println!("No users.");
            }
            for handle in handles {
                println!("{}", handle);
            }
        }
        Command::ListRoles => {
            for role in [UserRole::Admin, UserRole::Editor, UserRole::Viewer] {
                println!(
                    "{}: {}",
                    role.as_str(),
                    format_permissions(role.permissions())
                );
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let user_store = SqliteUserStore::new(&cli_args.path)
        .with_context(|| format!("Could not open user database at {:?}", cli_args.path))?;
    let user_manager = UserManager::new(Arc::new(user_store));

    execute_command(cli_args.command, &user_manager)
}
