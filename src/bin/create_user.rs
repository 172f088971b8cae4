use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use campus_api::auth::passwords::PasswordService;
use campus_api::auth::responses::Role;
use campus_api::auth::store::{NewUser, UserStore};

/// Provision an account from the command line. This is the bootstrap path
/// for the first admin, before any authenticated session exists.
#[derive(Parser, Debug)]
#[command(name = "create_user", about = "Create a campus back-office account")]
struct Args {
    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Given name.
    #[arg(long)]
    first_name: String,

    /// Family name.
    #[arg(long)]
    last_name: String,

    /// Optional contact phone number.
    #[arg(long)]
    phone: Option<String>,

    /// Role to assign: admin, instructor, parent, or school_admin.
    #[arg(long, default_value = "admin")]
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();

    if !email.contains('@') {
        writeln!(io::stderr(), "error: email must contain '@'")?;
        std::process::exit(1);
    }

    if args.password.chars().count() < 6 {
        writeln!(io::stderr(), "error: password must be at least 6 characters")?;
        std::process::exit(1);
    }

    let role = match Role::parse(args.role.trim()) {
        Some(role) => role,
        None => {
            writeln!(
                io::stderr(),
                "error: unsupported role '{}'. Use admin, instructor, parent, or school_admin.",
                args.role
            )?;
            std::process::exit(1);
        }
    };

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let password_service = PasswordService::new().map_err(|err| {
        io::Error::new(io::ErrorKind::Other, format!("argon2 init failed: {err}"))
    })?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| {
            io::Error::new(io::ErrorKind::Other, format!("password hash failed: {err}"))
        })?;

    let store = UserStore::new(pool.clone());
    let new_user = NewUser {
        email: email.clone(),
        password_hash,
        first_name: args.first_name.trim().to_string(),
        last_name: args.last_name.trim().to_string(),
        phone: args.phone,
        role,
    };

    let mut tx = pool.begin().await?;
    let user_id = match store.create_user_tx(&mut tx, &new_user).await {
        Ok(id) => id,
        Err(err) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
    };
    tx.commit().await?;

    println!("Created {} user '{email}' with id {user_id}", role.as_str());
    Ok(())
}
