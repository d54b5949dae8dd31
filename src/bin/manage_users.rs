//! CLI tool to manage users.
//!
//! Usage:
//!   cargo run --bin manage-users -- create --username <name> [--email <email>] [--password <pw>]
//!   cargo run --bin manage-users -- createsuperuser --username <name> [--email <email>] [--password <pw>]
//!   cargo run --bin manage-users -- list
//!   cargo run --bin manage-users -- with-perm --perm <app.codename> [--backend <name>] [--all]
//!   cargo run --bin manage-users -- deactivate --id <user-id>
//!   cargo run --bin manage-users -- set-password --id <user-id> [--password <pw>]

use std::env;

use gauth_lib::config::Config;
use gauth_lib::db::{self, DbPool};
use gauth_lib::models::user::{ExtraFields, User};
use gauth_lib::services::{AuthServices, BackendArg, WithPermOptions};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = args[1].as_str();
    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return;
    }

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match DbPool::new(&config).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error connecting to database: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = pool.run_migrations().await {
        eprintln!("Error running migrations: {}", e);
        std::process::exit(1);
    }

    let services = match AuthServices::build(&pool, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading authentication services: {}", e);
            std::process::exit(1);
        }
    };

    match command {
        "create" => create(&services, &args, false).await,
        "createsuperuser" => create(&services, &args, true).await,
        "list" | "ls" => list_users(&pool).await,
        "with-perm" => with_perm(&services, &args).await,
        "deactivate" => deactivate(&pool, &args).await,
        "set-password" => set_password(&services, &args).await,
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }
}

/// Value following `--name`, if present.
fn flag_value<'a>(args: &'a [String], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn required(args: &[String], names: &[&str]) -> String {
    match flag_value(args, names) {
        Some(v) => v.to_string(),
        None => {
            eprintln!("Error: {} is required", names[0]);
            std::process::exit(1);
        }
    }
}

async fn create(services: &AuthServices, args: &[String], superuser: bool) {
    let username = required(args, &["--username", "-u"]);
    let email = flag_value(args, &["--email", "-e"]);
    let password = flag_value(args, &["--password", "-p"]);
    let extra = ExtraFields {
        first_name: flag_value(args, &["--first-name"]).map(str::to_string),
        last_name: flag_value(args, &["--last-name"]).map(str::to_string),
        ..Default::default()
    };

    let result = if superuser {
        services
            .users
            .create_superuser(&username, email, password, extra)
            .await
    } else {
        services
            .users
            .create_user(&username, email, password, extra)
            .await
    };

    match result {
        Ok(user) => {
            println!();
            println!("User created.");
            print_header();
            print_user(&user);
            if !user.has_usable_password() {
                println!();
                println!("No password given; the account cannot log in with a password.");
            }
            println!();
        }
        Err(e) => {
            eprintln!("Error creating user: {}", e);
            std::process::exit(1);
        }
    }
}

async fn list_users(pool: &DbPool) {
    let users = match db::users::list(pool.connection()).await {
        Ok(u) => u,
        Err(e) => {
            eprintln!("Error listing users: {}", e);
            std::process::exit(1);
        }
    };

    if users.is_empty() {
        println!("No users found.");
        return;
    }

    println!();
    print_header();
    for user in &users {
        print_user(user);
    }
    println!();
}

async fn with_perm(services: &AuthServices, args: &[String]) {
    let perm = required(args, &["--perm"]);
    let options = WithPermOptions {
        is_active: if has_flag(args, "--all") {
            None
        } else {
            Some(true)
        },
        include_superusers: !has_flag(args, "--no-superusers"),
        backend: flag_value(args, &["--backend", "-b"]).map(BackendArg::from),
        obj: flag_value(args, &["--obj"]).map(|v| match v.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                eprintln!("Error: --obj must be an integer");
                std::process::exit(1);
            }
        }),
    };

    match services.users.with_perm(&perm, options).await {
        Ok(users) if users.is_empty() => println!("No users hold {}.", perm),
        Ok(users) => {
            println!();
            print_header();
            for user in &users {
                print_user(user);
            }
            println!();
        }
        Err(e) => {
            eprintln!("Error looking up permission holders: {}", e);
            std::process::exit(1);
        }
    }
}

fn user_id(args: &[String]) -> i32 {
    match required(args, &["--id", "-i"]).parse() {
        Ok(id) => id,
        Err(_) => {
            eprintln!("Error: --id must be an integer");
            std::process::exit(1);
        }
    }
}

async fn deactivate(pool: &DbPool, args: &[String]) {
    let id = user_id(args);

    match db::users::set_active(pool.connection(), id, false).await {
        Ok(user) => println!("User '{}' ({}) deactivated.", user.username, user.id),
        Err(e) => {
            eprintln!("Error deactivating user: {}", e);
            std::process::exit(1);
        }
    }
}

async fn set_password(services: &AuthServices, args: &[String]) {
    let id = user_id(args);
    let password = flag_value(args, &["--password", "-p"]);

    match services.users.set_password(id, password).await {
        Ok(()) if password.is_some() => println!("Password for user {} updated.", id),
        Ok(()) => println!("Password for user {} set unusable.", id),
        Err(e) => {
            eprintln!("Error setting password: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_header() {
    println!(
        "{:<6} {:<24} {:<32} {:<6} {:<6} {:<8}",
        "ID", "USERNAME", "EMAIL", "STAFF", "SUPER", "STATUS"
    );
    println!("{}", "-".repeat(88));
}

fn print_user(user: &User) {
    let username = truncate(&user.username, 22);
    let email = truncate(&user.email, 30);
    println!(
        "{:<6} {:<24} {:<32} {:<6} {:<6} {:<8}",
        user.id,
        username,
        email,
        if user.is_staff { "yes" } else { "no" },
        if user.is_superuser { "yes" } else { "no" },
        if user.is_active { "active" } else { "inactive" }
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn print_usage() {
    println!("manage-users - user administration for gauth");
    println!();
    println!("Usage:");
    println!("  manage-users create --username <name> [--email <email>] [--password <pw>]");
    println!("               [--first-name <name>] [--last-name <name>]");
    println!("  manage-users createsuperuser --username <name> [--email <email>] [--password <pw>]");
    println!("  manage-users list");
    println!("  manage-users with-perm --perm <app.codename> [--backend <name>] [--obj <id>]");
    println!("               [--all] [--no-superusers]");
    println!("  manage-users deactivate --id <user-id>");
    println!("  manage-users set-password --id <user-id> [--password <pw>]");
    println!();
    println!("Environment:");
    println!("  RUST_ENV, DATABASE_URL, GAUTH_AUTH_BACKENDS, GAUTH_PERMISSION_MODELS");
}
