use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty. Returns true if the process should exit.
pub fn handle_command_line_args() -> bool {
    let args = env::args().skip(1).collect::<Vec<String>>();
    if args.is_empty() {
        return false;
    }
    if args.iter().any(|a| a == "--show-envs") {
        display_envs();
    } else {
        // Anything else, including --help, prints the help
        display_readme();
        display_envs();
    }
    true
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 11] = [
        "RUST_LOG",
        "BMP_HOST",
        "BMP_PORT",
        "BMP_DATABASE_URL",
        "BMP_USE_X_FORWARDED_FOR",
        "BMP_USE_FORWARDED",
        "BMP_PAYSTACK_BASE_URL",
        "BMP_PAYSTACK_CALLBACK_URL",
        "BMP_PAYSTACK_TIMEOUT_SECS",
        "BMP_PAYSTACK_SUBACCOUNT_PERCENT",
        "BMP_PAYSTACK_WHITELIST",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
